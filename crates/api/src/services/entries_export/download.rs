//! Download actions: the finished batch file and the synchronous single
//! entry export.

use domain::models::{RequestDescriptor, RequestMethod};
use domain::services::RowBuilder;
use domain::ExportError;
use tracing::{info, warn};

use super::{ExportDownload, ExportSession, NONCE_EXPORT, NONCE_SINGLE_ENTRY};
use crate::middleware::metrics::record_export_download;

impl ExportSession<'_> {
    /// Opens the file of a finished batch export.
    pub async fn download_batch(&self) -> Result<ExportDownload, ExportError> {
        let args = self.request.args.get(RequestMethod::Get);

        if !self.verify_nonce(&args.nonce, NONCE_EXPORT) || !self.request.caller.can_view_entries {
            warn!(subject = %self.request.caller.subject, "Export download rejected by security check");
            return Err(ExportError::Security);
        }

        if !args.has_request_id() {
            return Err(ExportError::UnknownRequest);
        }

        let mut descriptor = self.load_descriptor(&args.request_id).await?;
        if let Some(descriptor) = descriptor.as_mut() {
            self.refresh_form_title(descriptor).await;
        }
        let download = self.file().output_file(descriptor.as_ref())?;

        record_export_download("batch");
        info!(
            request_id = %args.request_id,
            file_name = %download.file_name,
            bytes = download.len,
            "Export file downloaded"
        );
        Ok(download)
    }

    /// Names the download after the form's current title. The job's own
    /// snapshot is kept when the form is gone or unreadable.
    async fn refresh_form_title(&self, descriptor: &mut RequestDescriptor) {
        match self.export.forms.get_form(descriptor.db_args.form_id).await {
            Ok(Some(form)) => descriptor.form_data.title = form.title,
            Ok(None) => {}
            Err(e) => {
                warn!(form_id = descriptor.db_args.form_id, error = %e, "Keeping export form title")
            }
        }
    }

    /// Exports one entry in a single pass and opens the result.
    pub async fn download_single_entry(&self) -> Result<ExportDownload, ExportError> {
        let args = self.request.args.get(RequestMethod::Get);

        if args.form_id == 0 {
            return Err(ExportError::UnknownFormId);
        }
        if args.entry_id == 0 {
            return Err(ExportError::UnknownEntryId);
        }
        if !self.verify_nonce(&args.nonce, NONCE_SINGLE_ENTRY)
            || !self.request.caller.can_view_entries
        {
            warn!(subject = %self.request.caller.subject, "Single entry export rejected by security check");
            return Err(ExportError::Security);
        }

        let mut descriptor = self.get_request_data(args).await?;
        let builder = RowBuilder::new(
            self.export.entries.as_ref(),
            &self.export.extensions,
            &self.export.dates,
        );
        let batch = builder.step_rows(&mut descriptor).await?;

        let file = self.file();
        file.write_csv(&batch.rows, &descriptor)?;
        let download = file.output_file(Some(&descriptor))?;

        record_export_download("single_entry");
        info!(
            form_id = args.form_id,
            entry_id = args.entry_id,
            file_name = %download.file_name,
            "Single entry exported"
        );
        Ok(download)
    }
}
