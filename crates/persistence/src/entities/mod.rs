//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod measurement;
pub mod plug;
pub mod report;
pub mod summary;

pub use measurement::MeasurementEntity;
pub use plug::PlugEntity;
pub use report::ReportEntity;
pub use summary::SummaryEntity;
