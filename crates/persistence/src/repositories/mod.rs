//! Repository implementations for database operations.

pub mod measurement;
pub mod plug;
pub mod report;
pub mod summary;

pub use measurement::{MeasurementInput, MeasurementRepository};
pub use plug::PlugRepository;
pub use report::ReportRepository;
pub use summary::SummaryRepository;
