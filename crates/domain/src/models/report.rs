//! Daily report model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::Summary;

/// One plug's summaries for a single calendar day, stored verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: i64,
    pub plug_id: i64,
    /// The day being reported on, not the day of creation.
    pub report_date: NaiveDate,
    pub summaries: Vec<Summary>,
    pub created_at: DateTime<Utc>,
}

/// A report ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub report_date: NaiveDate,
    /// Ordered by `start_at`.
    pub summaries: Vec<Summary>,
    pub created_at: DateTime<Utc>,
}

impl NewReport {
    pub fn new(report_date: NaiveDate, mut summaries: Vec<Summary>, created_at: DateTime<Utc>) -> Self {
        summaries.sort_by_key(|s| s.start_at);
        Self {
            report_date,
            summaries,
            created_at,
        }
    }

    /// Total number of raw measurements behind this report.
    pub fn measurement_count(&self) -> i64 {
        self.summaries.iter().map(|s| s.count_measurements).sum()
    }
}
