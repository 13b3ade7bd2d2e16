//! Background job removing expired export files and transients.

use std::sync::Arc;

use tracing::info;

use super::scheduler::{Job, JobFrequency};
use crate::services::EntriesExport;

/// Periodically sweeps the export temporary directory.
///
/// The file sweep is additionally gated by a transient, so a run inside the
/// gate period only purges expired transients.
pub struct ExportSweepJob {
    export: Arc<EntriesExport>,
    interval_minutes: u64,
}

impl ExportSweepJob {
    pub fn new(export: Arc<EntriesExport>, interval_minutes: u64) -> Self {
        Self {
            export,
            interval_minutes,
        }
    }
}

#[async_trait::async_trait]
impl Job for ExportSweepJob {
    fn name(&self) -> &'static str {
        "export_sweep"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(self.interval_minutes)
    }

    fn run_on_start(&self) -> bool {
        true
    }

    async fn execute(&self) -> anyhow::Result<()> {
        let report = self.export.sweep().await?;
        info!(
            files_removed = ?report.files_removed,
            transients_purged = report.transients_purged,
            "Export sweep finished"
        );
        Ok(())
    }
}
