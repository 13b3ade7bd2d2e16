//! Export error taxonomy.
//!
//! Every failure of the export flow resolves to one of these variants. The
//! `Display` text of the user-facing variants is the message shown in the
//! browser after the common preamble.

use thiserror::Error;

/// Generic preamble prepended to every export error shown to the user.
pub const COMMON_ERROR: &str =
    "There were problems while preparing your export file. Please recheck export settings and try again.";

/// Errors produced while preparing, running or downloading an export.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExportError {
    #[error("You don't have enough capabilities to complete this request.")]
    Security,

    #[error("Incorrect form ID has been specified.")]
    UnknownFormId,

    #[error("Incorrect entry ID has been specified.")]
    UnknownEntryId,

    #[error("Specified form seems to be broken.")]
    FormData,

    #[error("Unknown request.")]
    UnknownRequest,

    #[error("Export file cannot be retrieved from a file system.")]
    FileNotReadable,

    #[error("Export file is empty.")]
    FileEmpty,

    #[error("The form does not have any fields for export.")]
    FormEmpty,

    /// Entries or transient storage failed.
    #[error("Export data cannot be retrieved from the storage.")]
    Storage(String),

    /// Temporary file I/O failed.
    #[error("Export file cannot be written to a file system.")]
    Io(String),
}

impl ExportError {
    /// Message shown to the user, without the common preamble.
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    /// Technical detail attached to infrastructure failures.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ExportError::Storage(detail) | ExportError::Io(detail) => Some(detail),
            _ => None,
        }
    }

    /// Full error text: preamble, message and, in debug mode, the detail.
    pub fn render(&self, debug: bool) -> String {
        let mut error = format!("{}<br>{}", COMMON_ERROR, self.user_message());
        if debug {
            let detail = self
                .detail()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{:?}", self));
            error.push_str("<br><b>DEBUG</b>: ");
            error.push_str(&detail);
        }
        error
    }
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        ExportError::Storage(err.to_string())
    }
}
