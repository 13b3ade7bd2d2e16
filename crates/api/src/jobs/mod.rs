//! Background job scheduler and job implementations.

mod export_sweep;
mod scheduler;

pub use export_sweep::ExportSweepJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
