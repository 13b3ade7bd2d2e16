//! Application services.

pub mod entries_export;

pub use entries_export::{EntriesExport, ExportCaller, ExportRequest, ExportSettings, ExportSurface};
