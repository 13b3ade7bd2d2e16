//! Storage seams used by the export.

use async_trait::async_trait;

use crate::errors::ExportError;
use crate::models::{Entry, EntryNote, EntryQuery, FormData, FormSummary};

/// Key-value store with per-key expiry.
#[async_trait]
pub trait TransientStore: Send + Sync {
    /// Returns the value unless it is missing or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, ExportError>;

    /// Stores a value for `ttl_secs` seconds; a non-positive TTL never expires.
    async fn put(&self, key: &str, value: &str, ttl_secs: i64) -> Result<(), ExportError>;

    async fn delete(&self, key: &str) -> Result<(), ExportError>;

    /// Drops every expired value, returning how many were removed.
    async fn purge_expired(&self) -> Result<u64, ExportError>;
}

/// Read access to form entries.
#[async_trait]
pub trait EntriesSource: Send + Sync {
    /// Number of distinct entries matching the filter, ignoring paging.
    async fn count_entries(&self, query: &EntryQuery) -> Result<u64, ExportError>;

    /// One page of entries, newest first.
    async fn get_entries(&self, query: &EntryQuery) -> Result<Vec<Entry>, ExportError>;

    /// Field ids with stored values on `form_id` that are not in `existing`,
    /// ascending.
    async fn deleted_field_ids(
        &self,
        form_id: i64,
        existing: &[i64],
    ) -> Result<Vec<i64>, ExportError>;

    /// Notes of an entry, newest first.
    async fn entry_notes(&self, entry_id: i64) -> Result<Vec<EntryNote>, ExportError>;

    /// Data of the newest meta row of the given type (`location`, `payment`).
    async fn entry_meta_data(
        &self,
        entry_id: i64,
        meta_type: &str,
    ) -> Result<Option<String>, ExportError>;
}

/// Read access to form definitions.
#[async_trait]
pub trait FormsSource: Send + Sync {
    /// Returns `Ok(None)` for unknown forms and `Err(FormData)` for forms
    /// whose definition cannot be read.
    async fn get_form(&self, form_id: i64) -> Result<Option<FormData>, ExportError>;

    async fn list_forms(&self) -> Result<Vec<FormSummary>, ExportError>;
}
