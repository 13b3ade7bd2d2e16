//! Repository implementations for database operations.

pub mod api_key;
pub mod entry;
pub mod form;
pub mod transient;

pub use api_key::ApiKeyRepository;
pub use entry::EntryRepository;
pub use form::FormRepository;
pub use transient::TransientRepository;

use domain::ExportError;

/// Maps a database failure onto the export error taxonomy.
pub(crate) fn storage_error(err: sqlx::Error) -> ExportError {
    tracing::error!(error = %err, "Export storage query failed");
    ExportError::Storage(err.to_string())
}
