//! AJAX step driver.
//!
//! The first step of a job counts the matching entries and snapshots the
//! form, filters and selection into a request descriptor. Every step then
//! appends one page of rows to the job's file and advances the cursor.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use domain::models::{
    AdditionalInfo, EntryQuery, ExportArgs, RequestDescriptor, RequestMethod, StepResponse,
};
use domain::services::RowBuilder;
use domain::ExportError;
use shared::crypto::sha256_hex;
use shared::pagination::total_steps;
use shared::validation::validate_request_id;
use tracing::{info, warn};

use super::{ExportSession, NONCE_EXPORT};
use crate::middleware::metrics::record_export_step;

/// Disambiguates request ids minted within the same microsecond.
static REQUEST_SEQUENCE: AtomicU64 = AtomicU64::new(0);

impl ExportSession<'_> {
    /// Runs one export step.
    pub async fn export_step(&self) -> Result<StepResponse, ExportError> {
        let args = self.request.args.get(RequestMethod::Post);

        if !self.verify_nonce(self.request.args.nonce(), NONCE_EXPORT)
            || args.nonce.is_empty()
            || args.action.is_empty()
            || !self.request.caller.can_view_entries
        {
            warn!(subject = %self.request.caller.subject, "Export step rejected by security check");
            return Err(ExportError::Security);
        }

        if args.form_id == 0 && !args.has_request_id() {
            return Err(ExportError::UnknownFormId);
        }

        let mut descriptor = if args.has_request_id() {
            let descriptor = self.load_descriptor(&args.request_id).await?.ok_or_else(|| {
                warn!(request_id = %args.request_id, "Export request not found");
                ExportError::UnknownRequest
            })?;
            if descriptor.is_complete() {
                info!(request_id = %descriptor.request_id, "Export request already complete");
                return Ok(descriptor.response());
            }
            descriptor
        } else {
            self.get_request_data(args).await?
        };

        let builder = RowBuilder::new(
            self.export.entries.as_ref(),
            &self.export.extensions,
            &self.export.dates,
        );
        let batch = builder.step_rows(&mut descriptor).await?;

        let file = self.file();
        let mark = file.write_csv(&batch.rows, &descriptor)?;

        descriptor.step += 1;
        if let Err(e) = self.descriptors().save(&descriptor).await {
            file.truncate(&descriptor, mark);
            return Err(e);
        }

        record_export_step(batch.data_rows());
        info!(
            request_id = %descriptor.request_id,
            step = descriptor.step,
            total_steps = descriptor.total_steps,
            rows = batch.data_rows(),
            "Export step completed"
        );

        Ok(descriptor.response())
    }

    /// Loads a stored descriptor; malformed ids never match.
    pub(super) async fn load_descriptor(
        &self,
        request_id: &str,
    ) -> Result<Option<RequestDescriptor>, ExportError> {
        if validate_request_id(request_id).is_err() {
            warn!(request_id = %request_id, "Malformed export request id");
            return Ok(None);
        }
        self.descriptors().load(request_id).await
    }

    /// Builds the descriptor of a new job.
    pub(super) async fn get_request_data(
        &self,
        args: &ExportArgs,
    ) -> Result<RequestDescriptor, ExportError> {
        let per_step = self.configuration.entries_per_step;
        let mut query = EntryQuery::from_args(args);

        let form_data = self
            .export
            .forms
            .get_form(args.form_id)
            .await?
            .ok_or(ExportError::UnknownFormId)?;
        query.max_entry_id = self
            .export
            .entries
            .get_entries(&query.page(1, 0))
            .await?
            .first()
            .map(|entry| entry.entry_id);
        let count = self.export.entries.count_entries(&query).await?;

        let db_args = query.page(per_step, 0);
        let request_id = new_request_id(&db_args)?;

        let single_entry = args.entry_id != 0;
        let fields = if single_entry {
            form_data.field_ids()
        } else {
            args.fields.clone()
        };
        let additional_info = if single_entry {
            AdditionalInfo::ALL.to_vec()
        } else {
            AdditionalInfo::parse_selection(&args.additional_info)
        };

        info!(
            request_id = %request_id,
            form_id = args.form_id,
            count = count,
            "Export request created"
        );

        Ok(RequestDescriptor {
            request_id,
            form_data,
            db_args,
            fields,
            additional_info,
            count,
            step: 0,
            total_steps: total_steps(count, per_step),
            columns_row: None,
        })
    }
}

fn new_request_id(db_args: &EntryQuery) -> Result<String, ExportError> {
    let sequence = REQUEST_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    Ok(sha256_hex(&format!(
        "{}{}{}",
        serde_json::to_string(db_args)?,
        Utc::now().timestamp_micros(),
        sequence
    )))
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::super::{ExportSurface, ACTION_STEP};
    use super::*;
    use domain::models::StepState;
    use std::fs;

    async fn step(harness: &Harness, body: &[(&str, &str)]) -> Result<StepResponse, ExportError> {
        let nonce = harness.nonce(NONCE_EXPORT);
        let mut pairs = vec![("action", ACTION_STEP), ("nonce", nonce.as_str())];
        pairs.extend_from_slice(body);
        let request = harness.ajax_request(&[], &pairs);
        let session = harness
            .export
            .init(ExportSurface::Ajax, request)
            .await
            .expect("export request");
        session.export_step().await
    }

    async fn run_to_stop(harness: &Harness, first: &[(&str, &str)]) -> Vec<StepResponse> {
        let mut responses = vec![step(harness, first).await.unwrap()];
        while responses.last().unwrap().step != StepState::Stop {
            let request_id = responses[0].request_id.clone();
            let response = step(harness, &[("request_id", request_id.as_str())])
                .await
                .unwrap();
            responses.push(response);
        }
        responses
    }

    fn lines(harness: &Harness, request_id: &str) -> Vec<String> {
        fs::read_to_string(harness.tmp_file(request_id))
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn test_concrete_scenario() {
        let harness = Harness::new(2500);
        let responses = run_to_stop(
            &harness,
            &[("form", "1"), ("fields[]", "1"), ("fields[]", "2"), ("fields[]", "3")],
        )
        .await;

        let steps: Vec<StepState> = responses.iter().map(|r| r.step).collect();
        assert_eq!(
            steps,
            vec![StepState::Step(1), StepState::Step(2), StepState::Stop]
        );
        assert_eq!(responses[0].total_steps, Some(3));
        assert_eq!(responses[2].total_steps, None);
        assert!(responses.iter().all(|r| r.count == 2500));

        let lines = lines(&harness, &responses[0].request_id);
        assert_eq!(lines.len(), 2501);
        assert_eq!(lines[0], "Name,Email,Field #3");
        assert_eq!(lines[1], "Person 2500,p2500@example.com,");
        assert_eq!(lines[2500], "Person 1,p1@example.com,");
    }

    #[tokio::test]
    async fn test_header_written_once_and_rows_match_count() {
        let harness = Harness::with_per_step(7, 3);
        let responses = run_to_stop(
            &harness,
            &[("form", "1"), ("fields[]", "1"), ("additional_info[]", "entry_id")],
        )
        .await;

        assert_eq!(responses.len(), 3);
        let lines = lines(&harness, &responses[0].request_id);
        assert_eq!(lines.iter().filter(|l| *l == "Name,Entry ID").count(), 1);
        assert_eq!(lines.len() - 1, 7);
    }

    #[tokio::test]
    async fn test_zero_entries_still_writes_header() {
        let harness = Harness::new(0);
        let response = step(&harness, &[("form", "1"), ("fields[]", "1")])
            .await
            .unwrap();

        assert_eq!(response.step, StepState::Stop);
        assert_eq!(response.count, 0);
        assert_eq!(lines(&harness, &response.request_id), vec!["Name"]);
    }

    #[tokio::test]
    async fn test_snapshot_isolation() {
        let harness = Harness::with_per_step(3, 2);
        let first = step(&harness, &[("form", "1"), ("fields[]", "1")])
            .await
            .unwrap();

        harness.entries.add(4);
        harness.entries.add(5);

        let second = step(&harness, &[("request_id", first.request_id.as_str())])
            .await
            .unwrap();

        assert_eq!(second.step, StepState::Stop);
        assert_eq!(second.count, 3);
        assert_eq!(
            lines(&harness, &first.request_id),
            vec!["Name", "Person 3", "Person 2", "Person 1"]
        );
        let descriptor = harness
            .export
            .descriptors(&harness.export.configuration())
            .load(&first.request_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(descriptor.db_args.max_entry_id, Some(3));
        assert_eq!(descriptor.total_steps, 2);
    }

    #[tokio::test]
    async fn test_deleted_fields_columns() {
        let harness = Harness::new(1);
        let response = step(
            &harness,
            &[("form", "1"), ("fields[]", "1"), ("additional_info[]", "del_fields")],
        )
        .await
        .unwrap();

        let lines = lines(&harness, &response.request_id);
        assert_eq!(lines[0], "Name,Deleted field #9");
        assert_eq!(lines[1], "Person 1,old 1");
    }

    #[tokio::test]
    async fn test_step_errors() {
        let harness = Harness::new(3);

        assert_eq!(
            step(&harness, &[("request_id", "abc")]).await.unwrap_err(),
            ExportError::UnknownRequest
        );
        assert_eq!(
            step(&harness, &[("request_id", "../../etc/passwd")])
                .await
                .unwrap_err(),
            ExportError::UnknownRequest
        );
        assert_eq!(
            step(&harness, &[("form", "42")]).await.unwrap_err(),
            ExportError::UnknownFormId
        );

        let request = harness.ajax_request(
            &[],
            &[("action", ACTION_STEP), ("nonce", "00000000000000000000"), ("form", "1")],
        );
        let session = harness.export.init(ExportSurface::Ajax, request).await.unwrap();
        assert_eq!(session.export_step().await.unwrap_err(), ExportError::Security);
    }

    #[tokio::test]
    async fn test_completed_request_is_not_extended() {
        let harness = Harness::new(2);
        let first = step(&harness, &[("form", "1"), ("fields[]", "1")])
            .await
            .unwrap();
        assert_eq!(first.step, StepState::Stop);

        let again = step(&harness, &[("request_id", first.request_id.as_str())])
            .await
            .unwrap();

        assert_eq!(again.step, StepState::Stop);
        assert_eq!(lines(&harness, &first.request_id).len(), 3);
    }

    #[tokio::test]
    async fn test_single_entry_request_data_selects_everything() {
        let harness = Harness::new(3);
        let request = harness.page_request(&[("form", "1"), ("entry_id", "2")]);
        let session = harness.export.init(ExportSurface::Page, request).await.unwrap();

        let descriptor = session
            .get_request_data(session.args().get(RequestMethod::Get))
            .await
            .unwrap();

        assert_eq!(descriptor.count, 1);
        assert_eq!(descriptor.fields, vec![1, 2, 3, 4]);
        assert_eq!(descriptor.additional_info, AdditionalInfo::ALL.to_vec());
        assert_eq!(descriptor.entry_id(), Some(2));
    }

    #[test]
    fn test_request_ids_are_unique_hex() {
        let query = EntryQuery::from_args(&ExportArgs::empty(RequestMethod::Post));
        let a = new_request_id(&query).unwrap();
        let b = new_request_id(&query).unwrap();
        assert_ne!(a, b);
        assert!(validate_request_id(&a).is_ok());
    }
}
