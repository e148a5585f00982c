//! Background job scheduler and the pipeline jobs.

mod auto_shutdown;
mod create_report;
mod create_summary;
mod fetch_measurement;
mod pool_metrics;
pub mod scheduler;

pub use auto_shutdown::{AutoShutdownJob, ShutdownOutcome};
pub use create_report::{CreateReportJob, ReportOutcome};
pub use create_summary::CreateSummaryJob;
pub use fetch_measurement::{FetchMeasurementJob, FetchOutcome};
pub use pool_metrics::PoolMetricsJob;
pub use scheduler::{Job, JobScheduler, SchedulerError};
