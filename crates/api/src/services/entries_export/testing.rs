//! In-memory collaborators for export service tests.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use domain::models::{
    Entry, EntryNote, EntryQuery, ExportConfiguration, FormData, FormField, FormSummary,
    RequestArgs,
};
use domain::services::{EntriesSource, FormsSource, MemoryTransientStore};
use domain::ExportError;
use shared::nonce::NonceIssuer;
use tempfile::TempDir;

use super::{EntriesExport, ExportCaller, ExportRequest, ExportSettings};

pub(crate) const FORM_ID: i64 = 1;
pub(crate) const SUBJECT: &str = "1";
const NONCE_SECRET: &str = "test-nonce-secret";
const EXPORT_REFERER: &str = "/admin.php?page=forms-tools&view=export";

#[derive(Default)]
pub(crate) struct FakeEntries {
    entries: RwLock<Vec<Entry>>,
}

impl FakeEntries {
    pub(crate) fn with_entries(count: i64) -> Self {
        let fake = Self::default();
        for id in 1..=count {
            fake.add(id);
        }
        fake
    }

    pub(crate) fn add(&self, id: i64) {
        self.entries.write().unwrap().push(entry(id));
    }

    fn matching(&self, query: &EntryQuery) -> Vec<Entry> {
        let mut matching: Vec<Entry> = self
            .entries
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.form_id == query.form_id)
            .filter(|e| query.entry_id.map_or(true, |id| e.entry_id == id))
            .filter(|e| query.max_entry_id.map_or(true, |max| e.entry_id <= max))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.entry_id.cmp(&a.entry_id));
        matching
    }
}

#[async_trait]
impl EntriesSource for FakeEntries {
    async fn count_entries(&self, query: &EntryQuery) -> Result<u64, ExportError> {
        Ok(self.matching(query).len() as u64)
    }

    async fn get_entries(&self, query: &EntryQuery) -> Result<Vec<Entry>, ExportError> {
        Ok(self
            .matching(query)
            .into_iter()
            .skip(query.offset as usize)
            .take(query.number as usize)
            .collect())
    }

    async fn deleted_field_ids(
        &self,
        _form_id: i64,
        existing: &[i64],
    ) -> Result<Vec<i64>, ExportError> {
        Ok([9].into_iter().filter(|id| !existing.contains(id)).collect())
    }

    async fn entry_notes(&self, _entry_id: i64) -> Result<Vec<EntryNote>, ExportError> {
        Ok(Vec::new())
    }

    async fn entry_meta_data(
        &self,
        _entry_id: i64,
        _meta_type: &str,
    ) -> Result<Option<String>, ExportError> {
        Ok(None)
    }
}

pub(crate) struct FakeForms {
    form: RwLock<FormData>,
}

impl FakeForms {
    pub(crate) fn rename(&self, title: &str) {
        self.form.write().unwrap().title = title.to_string();
    }
}

#[async_trait]
impl FormsSource for FakeForms {
    async fn get_form(&self, form_id: i64) -> Result<Option<FormData>, ExportError> {
        let form = self.form.read().unwrap();
        Ok((form_id == form.id).then(|| form.clone()))
    }

    async fn list_forms(&self) -> Result<Vec<FormSummary>, ExportError> {
        let form = self.form.read().unwrap();
        Ok(vec![FormSummary {
            id: form.id,
            title: form.title.clone(),
        }])
    }
}

pub(crate) fn form() -> FormData {
    let field = |id, field_type: &str, label: &str| FormField {
        id,
        field_type: field_type.to_string(),
        label: label.to_string(),
    };
    FormData {
        id: FORM_ID,
        title: "Contact".to_string(),
        fields: vec![
            field(1, "name", "Name"),
            field(2, "email", "Email"),
            field(3, "text", ""),
            field(4, "divider", "Section"),
        ],
    }
}

pub(crate) fn entry(id: i64) -> Entry {
    let date: DateTime<Utc> = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::minutes(id);
    Entry {
        entry_id: id,
        form_id: FORM_ID,
        post_id: 0,
        user_id: 0,
        status: String::new(),
        entry_type: String::new(),
        viewed: false,
        starred: false,
        fields: format!(
            r#"{{"1":{{"id":1,"value":"Person {id}"}},"2":{{"id":2,"value":"p{id}@example.com"}},"9":{{"id":9,"value":"old {id}"}}}}"#
        ),
        meta: String::new(),
        date,
        date_modified: date,
        ip_address: "10.0.0.1".to_string(),
        user_agent: "Mozilla".to_string(),
        user_uuid: format!("uuid-{}", id),
    }
}

/// An export over fakes with its temporary directory.
pub(crate) struct Harness {
    pub export: EntriesExport,
    pub entries: Arc<FakeEntries>,
    pub forms: Arc<FakeForms>,
    pub transients: Arc<MemoryTransientStore>,
    pub dir: TempDir,
    nonces: NonceIssuer,
}

impl Harness {
    pub(crate) fn new(entry_count: i64) -> Self {
        Self::with_per_step(entry_count, 1000)
    }

    pub(crate) fn with_per_step(entry_count: i64, entries_per_step: u64) -> Self {
        let dir = TempDir::new().unwrap();
        let entries = Arc::new(FakeEntries::with_entries(entry_count));
        let forms = Arc::new(FakeForms {
            form: RwLock::new(form()),
        });
        let transients = Arc::new(MemoryTransientStore::new());
        let nonces = NonceIssuer::new(NONCE_SECRET, 86_400);
        let defaults = ExportConfiguration {
            entries_per_step,
            ..ExportConfiguration::default()
        };
        let settings = ExportSettings {
            uploads_dir: dir.path().to_path_buf(),
            date_format: "%Y-%m-%d %H:%M".to_string(),
            gmt_offset_hours: 0.0,
            debug: false,
            delete_after_download: false,
            require_referer: true,
            sweep_gate_secs: 3600,
        };

        let export = EntriesExport::new(
            entries.clone(),
            forms.clone(),
            transients.clone(),
            nonces.clone(),
            defaults,
            settings,
        );

        Self {
            export,
            entries,
            forms,
            transients,
            dir,
            nonces,
        }
    }

    pub(crate) fn nonce(&self, action: &str) -> String {
        self.nonces.create(action, SUBJECT, Utc::now().timestamp())
    }

    pub(crate) fn verify(&self, nonce: &str, action: &str) -> bool {
        self.nonces
            .verify(nonce, action, SUBJECT, Utc::now().timestamp())
            .is_some()
    }

    fn caller() -> ExportCaller {
        ExportCaller {
            subject: SUBJECT.to_string(),
            can_view_entries: true,
        }
    }

    pub(crate) fn page_request(&self, query: &[(&str, &str)]) -> ExportRequest {
        ExportRequest {
            args: RequestArgs::new(query, &[]),
            referer: None,
            caller: Self::caller(),
        }
    }

    pub(crate) fn ajax_request(
        &self,
        query: &[(&str, &str)],
        body: &[(&str, &str)],
    ) -> ExportRequest {
        ExportRequest {
            args: RequestArgs::new(query, body),
            referer: Some(EXPORT_REFERER.to_string()),
            caller: Self::caller(),
        }
    }

    /// Path of the temporary file of a request.
    pub(crate) fn tmp_file(&self, request_id: &str) -> PathBuf {
        self.dir.path().join("export").join(request_id)
    }
}
