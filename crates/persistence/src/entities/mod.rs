//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod api_key;
pub mod entry;
pub mod form;
pub mod transient;

pub use api_key::ApiKeyEntity;
pub use entry::{EntryEntity, EntryNoteEntity};
pub use form::FormEntity;
pub use transient::TransientEntity;
