//! Export tuning parameters.

use serde::{Deserialize, Serialize};
use shared::validation::validate_csv_separator;

pub const DEFAULT_REQUEST_DATA_TTL_SECS: i64 = 86_400;
pub const DEFAULT_ENTRIES_PER_STEP: u64 = 1000;
pub const DEFAULT_CSV_EXPORT_SEPARATOR: &str = ",";

/// Field types excluded from exports by default.
pub fn default_disallowed_fields() -> Vec<String> {
    ["divider", "html", "pagebreak", "captcha"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Export configuration after extension filters ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfiguration {
    /// Lifetime of a request descriptor and its temporary file.
    pub request_data_ttl_secs: i64,
    /// Entries processed per step.
    pub entries_per_step: u64,
    pub csv_export_separator: String,
    pub disallowed_fields: Vec<String>,
}

impl Default for ExportConfiguration {
    fn default() -> Self {
        Self {
            request_data_ttl_secs: DEFAULT_REQUEST_DATA_TTL_SECS,
            entries_per_step: DEFAULT_ENTRIES_PER_STEP,
            csv_export_separator: DEFAULT_CSV_EXPORT_SEPARATOR.to_string(),
            disallowed_fields: default_disallowed_fields(),
        }
    }
}

impl ExportConfiguration {
    /// Replaces unusable values with the ones from `defaults`.
    ///
    /// A filter may zero out numbers or blank the separator; those are
    /// restored so consumers can rely on every setting being usable.
    pub fn merged_with(mut self, defaults: &ExportConfiguration) -> Self {
        if self.request_data_ttl_secs <= 0 {
            self.request_data_ttl_secs = defaults.request_data_ttl_secs;
        }
        if self.entries_per_step == 0 {
            self.entries_per_step = defaults.entries_per_step;
        }
        if validate_csv_separator(&self.csv_export_separator).is_err() {
            self.csv_export_separator = defaults.csv_export_separator.clone();
        }
        self
    }

    /// Separator as the single byte the CSV writer expects.
    pub fn separator_byte(&self) -> u8 {
        self.csv_export_separator.bytes().next().unwrap_or(b',')
    }

    pub fn is_disallowed(&self, field_type: &str) -> bool {
        self.disallowed_fields.iter().any(|t| t == field_type)
    }
}
