//! Domain services for the entries export.
//!
//! Services contain the export logic that operates on domain models, plus
//! the storage and extension seams that logic depends on.

pub mod extensions;
pub mod rows;
pub mod storage;
pub mod transient;

pub use extensions::{ColumnProvider, ConfigurationFilter, ExportExtensions, RowTransformer};
pub use rows::{DateDisplay, RowBuilder};
pub use storage::{EntriesSource, FormsSource, TransientStore};
pub use transient::{DescriptorStore, MemoryTransientStore, REQUEST_TRANSIENT_PREFIX};
