//! Domain models for the plug monitor.

pub mod measurement;
pub mod plug;
pub mod report;
pub mod summary;

pub use measurement::{Measurement, NewMeasurement, TelemetryReading};
pub use plug::{Plug, UpsertPlugRequest};
pub use report::{NewReport, Report};
pub use summary::{trailing_power_average, NewSummary, Summary};
