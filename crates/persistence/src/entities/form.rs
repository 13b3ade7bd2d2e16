//! Form entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{FormData, FormField};
use sqlx::FromRow;

/// Database row mapping for the forms table.
#[derive(Debug, Clone, FromRow)]
pub struct FormEntity {
    pub id: i64,
    pub title: String,
    pub fields: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FormEntity {
    /// Decodes the stored field definitions into a form snapshot.
    pub fn into_form_data(self) -> Result<FormData, serde_json::Error> {
        let fields: Vec<FormField> = if self.fields.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&self.fields)?
        };
        Ok(FormData {
            id: self.id,
            title: self.title,
            fields,
        })
    }
}
