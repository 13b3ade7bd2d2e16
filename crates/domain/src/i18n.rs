//! Strings handed to the export page client.

use serde::Serialize;

use crate::errors::{ExportError, COMMON_ERROR};

/// Localized strings driving the client side progress display.
///
/// `{total_entries}` and `{progress}` are substituted by the client.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExportStrings {
    pub error_prefix: &'static str,
    pub error_form_empty: String,
    pub prc_1_filtering: &'static str,
    pub prc_1_please_wait: &'static str,
    pub prc_2_no_entries: &'static str,
    pub prc_2_total_entries: &'static str,
    pub prc_2_progress: &'static str,
    pub prc_3_done: &'static str,
    pub prc_3_download: &'static str,
    pub prc_3_click_here: &'static str,
}

impl Default for ExportStrings {
    fn default() -> Self {
        Self {
            error_prefix: COMMON_ERROR,
            error_form_empty: ExportError::FormEmpty.user_message(),
            prc_1_filtering: "Generating a list of entries according to your filters.",
            prc_1_please_wait: "This can take a while. Please wait.",
            prc_2_no_entries: "No entries found after applying your filters.",
            prc_2_total_entries: "Number of entries found: {total_entries}.",
            prc_2_progress: "Generating a CSV file: {progress}% completed. Please wait for generation to complete, file download will start automatically.",
            prc_3_done: "The file was generated successfully.",
            prc_3_download: "If the download does not start automatically",
            prc_3_click_here: "click here",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strings_serialize_with_client_keys() {
        let json = serde_json::to_value(ExportStrings::default()).unwrap();
        assert_eq!(json["error_prefix"], COMMON_ERROR);
        assert_eq!(
            json["error_form_empty"],
            "The form does not have any fields for export."
        );
        assert!(json["prc_2_progress"]
            .as_str()
            .unwrap()
            .contains("{progress}%"));
    }
}
