//! Form definitions as seen by the export.

use serde::{Deserialize, Serialize};
use shared::sanitize::strip_all_tags;

/// Single field of a form definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub id: i64,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub label: String,
}

impl FormField {
    /// Plain text label, falling back to `Field #<id>` when blank.
    pub fn display_label(&self) -> String {
        let label = strip_all_tags(&self.label);
        if label.is_empty() {
            format!("Field #{}", self.id)
        } else {
            label
        }
    }

    fn is_payment(&self) -> bool {
        self.field_type.starts_with("payment-") || self.field_type.ends_with("credit-card")
    }
}

/// Snapshot of a form: identity plus its field definitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormData {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub fields: Vec<FormField>,
}

impl FormData {
    /// Ids of all fields in definition order.
    pub fn field_ids(&self) -> Vec<i64> {
        self.fields.iter().map(|field| field.id).collect()
    }

    pub fn field(&self, id: i64) -> Option<&FormField> {
        self.fields.iter().find(|field| field.id == id)
    }

    /// Fields offered for export, with display labels applied.
    pub fn exportable_fields(&self, disallowed: &[String]) -> Vec<FormField> {
        self.fields
            .iter()
            .filter(|field| !disallowed.iter().any(|t| t == &field.field_type))
            .map(|field| FormField {
                label: field.display_label(),
                ..field.clone()
            })
            .collect()
    }

    /// Whether the form collects payments.
    pub fn has_payment(&self) -> bool {
        self.fields.iter().any(FormField::is_payment)
    }
}

/// Form listing entry for the form picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSummary {
    pub id: i64,
    pub title: String,
}
