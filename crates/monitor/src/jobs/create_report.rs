//! Daily report job.

use std::sync::Arc;

use chrono::{Local, Utc};
use domain::models::{NewReport, Plug};
use domain::services::{PlugRegistry, TelemetryStore};
use metrics::counter;
use shared::time::{truncate_to_second, DayWindow};
use tracing::{error, info, warn};

use super::scheduler::Job;

/// Result of building one plug's report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    Created,
    /// A report for the day was already stored and is left untouched.
    AlreadyExists,
    Failed,
}

/// Compacts each plug's summaries for the previous local calendar day into
/// one immutable report.
pub struct CreateReportJob {
    registry: Arc<dyn PlugRegistry>,
    store: Arc<dyn TelemetryStore>,
}

impl CreateReportJob {
    pub fn new(registry: Arc<dyn PlugRegistry>, store: Arc<dyn TelemetryStore>) -> Self {
        Self { registry, store }
    }

    /// Build reports for `day` for every plug.
    pub async fn run_for_day(&self, day: &DayWindow) -> Result<Vec<(i64, ReportOutcome)>, String> {
        let plugs = self
            .registry
            .list_plugs()
            .await
            .map_err(|e| format!("Failed to list plugs: {}", e))?;

        let mut outcomes = Vec::with_capacity(plugs.len());
        for plug in &plugs {
            outcomes.push((plug.id, self.report_plug(plug, day).await));
        }
        Ok(outcomes)
    }

    async fn report_plug(&self, plug: &Plug, day: &DayWindow) -> ReportOutcome {
        let summaries = match self.store.find_summaries(plug.id, &day.window).await {
            Ok(summaries) => summaries,
            Err(e) => {
                error!(plug_id = plug.id, plug_name = %plug.name, date = %day.date, error = %e, "Failed to read summaries");
                return ReportOutcome::Failed;
            }
        };

        let report = NewReport::new(day.date, summaries, truncate_to_second(Utc::now()));
        match self.store.insert_report(plug.id, &report).await {
            Ok(Some(stored)) => {
                counter!("plug_reports_created_total").increment(1);
                info!(
                    plug_id = plug.id,
                    report_id = stored.id,
                    date = %day.date,
                    summaries = stored.summaries.len(),
                    measurements = report.measurement_count(),
                    "Report created"
                );
                ReportOutcome::Created
            }
            Ok(None) => {
                warn!(plug_id = plug.id, date = %day.date, "Report already exists");
                ReportOutcome::AlreadyExists
            }
            Err(e) => {
                error!(plug_id = plug.id, plug_name = %plug.name, date = %day.date, error = %e, "Failed to insert report");
                ReportOutcome::Failed
            }
        }
    }
}

#[async_trait::async_trait]
impl Job for CreateReportJob {
    async fn execute(&self) -> Result<(), String> {
        let day = DayWindow::previous_day(&Local, Utc::now());
        let outcomes = self.run_for_day(&day).await?;
        let created = outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == ReportOutcome::Created)
            .count();
        info!(date = %day.date, plugs = outcomes.len(), created, "Report run finished");
        Ok(())
    }
}
