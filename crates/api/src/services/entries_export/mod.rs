//! Entries export service.
//!
//! Wires the request gate, page data and the export actions (AJAX step
//! driver, batch and single entry downloads) to the storage seams. One
//! [`EntriesExport`] is shared by the whole application; every request
//! opens an [`ExportSession`] through [`EntriesExport::init`].

mod download;
mod file;
mod step;

#[cfg(test)]
pub(crate) mod testing;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use domain::i18n::ExportStrings;
use domain::models::{
    AdditionalInfo, DateFilter, ExportConfiguration, FormData, FormField, FormSummary,
    RequestArgs, RequestMethod,
};
use domain::services::{
    DateDisplay, DescriptorStore, EntriesSource, ExportExtensions, FormsSource, TransientStore,
};
use domain::ExportError;
use serde::Serialize;
use shared::nonce::NonceIssuer;
use tracing::{debug, info, warn};

use crate::config::ExportConfig;

pub use file::{ExportDownload, ExportFile, TMPDATA_CLEARED_TRANSIENT};

pub const ACTION_FORM_DATA: &str = "wpforms_tools_entries_export_form_data";
pub const ACTION_STEP: &str = "wpforms_tools_entries_export_step";
pub const ACTION_DOWNLOAD: &str = "wpforms_tools_entries_export_download";
pub const ACTION_SINGLE_ENTRY_DOWNLOAD: &str = "wpforms_tools_single_entry_export_download";

/// Nonce action of the batch export flow.
pub const NONCE_EXPORT: &str = "entries-export";
/// Nonce action of the single entry download.
pub const NONCE_SINGLE_ENTRY: &str = "single-entry-export";

const EXPORT_PAGE_SLUG: &str = "forms-tools";
const EXPORT_VIEW: &str = "export";
pub const EXPORT_PAGE: &str = "admin.php?page=forms-tools&view=export";

/// Service-level export settings.
#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub uploads_dir: PathBuf,
    pub date_format: String,
    pub gmt_offset_hours: f64,
    pub debug: bool,
    pub delete_after_download: bool,
    pub require_referer: bool,
    pub sweep_gate_secs: i64,
}

impl From<&ExportConfig> for ExportSettings {
    fn from(config: &ExportConfig) -> Self {
        Self {
            uploads_dir: config.tmp_dir.clone(),
            date_format: config.date_format.clone(),
            gmt_offset_hours: config.gmt_offset_hours,
            debug: config.debug,
            delete_after_download: config.delete_after_download,
            require_referer: config.require_referer,
            sweep_gate_secs: config.sweep_gate_secs,
        }
    }
}

/// Who is calling, as far as the export is concerned.
#[derive(Debug, Clone)]
pub struct ExportCaller {
    /// Subject the nonces are bound to.
    pub subject: String,
    pub can_view_entries: bool,
}

/// Which export surface a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportSurface {
    Page,
    Ajax,
}

/// Everything the export reads from an incoming request.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub args: RequestArgs,
    pub referer: Option<String>,
    pub caller: ExportCaller,
}

/// Option of the additional information picker.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AdditionalInfoOption {
    pub slug: &'static str,
    pub label: &'static str,
}

/// Data the export page is rendered with.
#[derive(Debug, Clone, Serialize)]
pub struct PageData {
    pub nonce: String,
    pub single_entry_nonce: String,
    pub export_page: &'static str,
    pub i18n: ExportStrings,
    pub forms: Vec<FormSummary>,
    pub additional_info: Vec<AdditionalInfoOption>,
    /// The selected form, 0 when none or when it cannot be loaded.
    pub form_id: i64,
    pub dates: DateFilter,
}

/// Fields of the selected form offered for export.
#[derive(Debug, Clone, Serialize)]
pub struct FormFields {
    pub fields: Vec<FormField>,
}

/// Result of a full cleanup run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Deleted files, `None` when the sweep gate was closed.
    pub files_removed: Option<usize>,
    pub transients_purged: u64,
}

/// The entries export, shared across requests.
#[derive(Clone)]
pub struct EntriesExport {
    entries: Arc<dyn EntriesSource>,
    forms: Arc<dyn FormsSource>,
    transients: Arc<dyn TransientStore>,
    extensions: ExportExtensions,
    defaults: ExportConfiguration,
    nonces: NonceIssuer,
    dates: DateDisplay,
    settings: ExportSettings,
}

impl EntriesExport {
    pub fn new(
        entries: Arc<dyn EntriesSource>,
        forms: Arc<dyn FormsSource>,
        transients: Arc<dyn TransientStore>,
        nonces: NonceIssuer,
        defaults: ExportConfiguration,
        settings: ExportSettings,
    ) -> Self {
        Self {
            entries,
            forms,
            transients,
            extensions: ExportExtensions::new(),
            defaults,
            nonces,
            dates: DateDisplay::new(settings.date_format.clone(), settings.gmt_offset_hours),
            settings,
        }
    }

    pub fn with_extensions(mut self, extensions: ExportExtensions) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn debug(&self) -> bool {
        self.settings.debug
    }

    /// Export configuration after the extension filters ran.
    pub fn configuration(&self) -> ExportConfiguration {
        self.extensions.apply_configuration(&self.defaults)
    }

    /// Mints a nonce for `action` bound to `subject`.
    pub fn create_nonce(&self, action: &str, subject: &str) -> String {
        self.nonces.create(action, subject, Utc::now().timestamp())
    }

    fn file(&self, configuration: &ExportConfiguration) -> ExportFile {
        ExportFile::new(
            &self.settings.uploads_dir,
            configuration.separator_byte(),
            configuration.request_data_ttl_secs,
            self.settings.gmt_offset_hours,
            self.transients.clone(),
        )
        .with_sweep_gate(self.settings.sweep_gate_secs)
        .with_delete_after_download(self.settings.delete_after_download)
    }

    fn descriptors(&self, configuration: &ExportConfiguration) -> DescriptorStore {
        DescriptorStore::new(self.transients.clone(), configuration.request_data_ttl_secs)
    }

    /// Opens a session when the request belongs to the export.
    ///
    /// Returns `None` when the caller lacks the view entries capability or
    /// the request does not look like an export request; the export then
    /// behaves as if it did not exist.
    pub async fn init(
        &self,
        surface: ExportSurface,
        request: ExportRequest,
    ) -> Option<ExportSession<'_>> {
        if !request.caller.can_view_entries {
            debug!(subject = %request.caller.subject, "Export skipped: missing capability");
            return None;
        }

        let recognized = match surface {
            ExportSurface::Page => true,
            ExportSurface::Ajax => self.is_entries_export_ajax(&request),
        };
        if !recognized {
            debug!("Export skipped: not an export request");
            return None;
        }

        let configuration = self.configuration();
        let form_id = request.args.get(RequestMethod::Get).form_id;
        let form_data = self.init_form_data(form_id).await;

        Some(ExportSession {
            export: self,
            request,
            configuration,
            form_data,
        })
    }

    async fn init_form_data(&self, form_id: i64) -> Option<FormData> {
        if form_id == 0 {
            return None;
        }
        match self.forms.get_form(form_id).await {
            Ok(form) => form,
            Err(e) => {
                warn!(form_id = form_id, error = %e, "Failed to load form for export");
                None
            }
        }
    }

    /// Recognizes the two export AJAX actions.
    pub fn is_entries_export_ajax(&self, request: &ExportRequest) -> bool {
        if self.settings.require_referer && !referer_is_export_page(request.referer.as_deref()) {
            return false;
        }

        let args = &request.args;
        if args.action().is_empty() || args.nonce().is_empty() || !args.targets_form_or_request()
        {
            return false;
        }

        matches!(args.action(), ACTION_FORM_DATA | ACTION_STEP)
    }

    /// Removes expired temporary files and transients.
    pub async fn sweep(&self) -> Result<SweepReport, ExportError> {
        let files_removed = self
            .file(&self.configuration())
            .remove_old_export_files()
            .await?;
        if let Some(removed) = files_removed {
            crate::middleware::metrics::record_export_files_swept(removed);
        }
        let transients_purged = self.transients.purge_expired().await?;

        Ok(SweepReport {
            files_removed,
            transients_purged,
        })
    }
}

/// Whether the referer is the export page.
pub fn referer_is_export_page(referer: Option<&str>) -> bool {
    let Some(referer) = referer.filter(|r| !r.is_empty()) else {
        return false;
    };

    let url = match url::Url::parse(referer) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            match url::Url::parse("http://localhost/").and_then(|base| base.join(referer)) {
                Ok(url) => url,
                Err(_) => return false,
            }
        }
        Err(_) => return false,
    };

    let mut page = None;
    let mut view = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "page" => page = Some(value.into_owned()),
            "view" => view = Some(value.into_owned()),
            _ => {}
        }
    }

    page.as_deref() == Some(EXPORT_PAGE_SLUG) && view.as_deref() == Some(EXPORT_VIEW)
}

/// One request handled by the export.
pub struct ExportSession<'a> {
    export: &'a EntriesExport,
    request: ExportRequest,
    configuration: ExportConfiguration,
    form_data: Option<FormData>,
}

impl ExportSession<'_> {
    pub fn configuration(&self) -> &ExportConfiguration {
        &self.configuration
    }

    pub fn args(&self) -> &RequestArgs {
        &self.request.args
    }

    fn verify_nonce(&self, nonce: &str, action: &str) -> bool {
        !nonce.is_empty()
            && self
                .export
                .nonces
                .verify(
                    nonce,
                    action,
                    &self.request.caller.subject,
                    Utc::now().timestamp(),
                )
                .is_some()
    }

    fn file(&self) -> ExportFile {
        self.export.file(&self.configuration)
    }

    fn descriptors(&self) -> DescriptorStore {
        self.export.descriptors(&self.configuration)
    }

    /// Data for rendering the export page.
    ///
    /// Also runs the gated temporary file cleanup.
    pub async fn page_data(&self) -> Result<PageData, ExportError> {
        match self.file().remove_old_export_files().await {
            Ok(Some(removed)) => crate::middleware::metrics::record_export_files_swept(removed),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Export files cleanup failed"),
        }

        let args = self.request.args.get(RequestMethod::Get);
        let subject = &self.request.caller.subject;

        Ok(PageData {
            nonce: self.export.create_nonce(NONCE_EXPORT, subject),
            single_entry_nonce: self.export.create_nonce(NONCE_SINGLE_ENTRY, subject),
            export_page: EXPORT_PAGE,
            i18n: ExportStrings::default(),
            forms: self.export.forms.list_forms().await?,
            additional_info: AdditionalInfo::ALL
                .iter()
                .map(|info| AdditionalInfoOption {
                    slug: info.slug(),
                    label: info.label(),
                })
                .collect(),
            form_id: self.form_data.as_ref().map_or(0, |_| args.form_id),
            dates: args.dates.clone(),
        })
    }

    /// Exportable fields of the form named in the query string.
    pub fn form_data(&self) -> Result<FormFields, ExportError> {
        if !self.verify_nonce(self.request.args.nonce(), NONCE_EXPORT) {
            warn!(subject = %self.request.caller.subject, "Export form data rejected by nonce check");
            return Err(ExportError::Security);
        }

        let form_data = self.form_data.as_ref().ok_or(ExportError::FormData)?;
        let fields = form_data.exportable_fields(&self.configuration.disallowed_fields);

        info!(form_id = form_data.id, fields = fields.len(), "Export form data served");
        Ok(FormFields { fields })
    }
}
