//! Domain models for the entries export.

pub mod additional_info;
pub mod configuration;
pub mod descriptor;
pub mod entry;
pub mod entry_query;
pub mod export_args;
pub mod form;

pub use additional_info::AdditionalInfo;
pub use configuration::ExportConfiguration;
pub use descriptor::{Column, ColumnId, RequestDescriptor, StepResponse, StepState};
pub use entry::{Entry, EntryNote};
pub use entry_query::{DateWindow, EntryQuery, ValueCompare, ValueFilter};
pub use export_args::{DateFilter, ExportArgs, RequestArgs, RequestMethod, SearchArgs, SearchField};
pub use form::{FormData, FormField, FormSummary};
