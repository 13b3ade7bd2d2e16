//! Transient entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database row mapping for the transients table.
#[derive(Debug, Clone, FromRow)]
pub struct TransientEntity {
    pub key: String,
    pub value: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl TransientEntity {
    pub fn is_expired_at(&self, at: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= at)
    }
}
