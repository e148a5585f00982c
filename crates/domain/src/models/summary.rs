//! Windowed summary model and the aggregation rules that produce it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::time::truncate_to_second;

use super::Measurement;

/// One plug's aggregate over a window of raw measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub id: i64,
    pub plug_id: i64,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub count_measurements: i64,
    pub power_sum: f64,
    pub power_avg: f64,
    pub voltage_avg: f64,
    pub current_avg: f64,
    pub temp_c_avg: f64,
    pub temp_f_avg: f64,
    pub created_at: DateTime<Utc>,
}

/// A summary ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSummary {
    /// Timestamp of the earliest measurement covered.
    pub start_at: DateTime<Utc>,
    /// Timestamp of the latest measurement covered.
    pub end_at: DateTime<Utc>,
    pub count_measurements: i64,
    pub power_sum: f64,
    pub power_avg: f64,
    pub voltage_avg: f64,
    pub current_avg: f64,
    pub temp_c_avg: f64,
    pub temp_f_avg: f64,
    pub created_at: DateTime<Utc>,
}

impl NewSummary {
    /// Collapse a window of measurements into one summary.
    ///
    /// Returns `None` for an empty window; a summary always covers at least
    /// one measurement.
    pub fn from_measurements(measurements: &[Measurement], created_at: DateTime<Utc>) -> Option<Self> {
        let first = measurements.first()?;

        let mut start_at = first.created_at;
        let mut end_at = first.created_at;
        let mut power_sum = 0.0;
        let mut voltage_sum = 0.0;
        let mut current_sum = 0.0;
        let mut temp_c_sum = 0.0;
        let mut temp_f_sum = 0.0;

        for m in measurements {
            start_at = start_at.min(m.created_at);
            end_at = end_at.max(m.created_at);
            power_sum += m.power;
            voltage_sum += m.voltage;
            current_sum += m.current;
            temp_c_sum += m.temp_c;
            temp_f_sum += m.temp_f;
        }

        let count = measurements.len() as f64;

        Some(Self {
            start_at: truncate_to_second(start_at),
            end_at: truncate_to_second(end_at),
            count_measurements: measurements.len() as i64,
            power_sum,
            power_avg: power_sum / count,
            voltage_avg: voltage_sum / count,
            current_avg: current_sum / count,
            temp_c_avg: temp_c_sum / count,
            temp_f_avg: temp_f_sum / count,
            created_at,
        })
    }
}

/// Mean of the summaries' average power.
///
/// Every summary weighs the same regardless of how many raw samples it
/// covers. No summaries means no load: the result is `0.0`.
pub fn trailing_power_average(summaries: &[Summary]) -> f64 {
    if summaries.is_empty() {
        return 0.0;
    }
    summaries.iter().map(|s| s.power_avg).sum::<f64>() / summaries.len() as f64
}
