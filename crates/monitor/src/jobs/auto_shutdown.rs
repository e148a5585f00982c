//! Auto-shutdown job: switch off plugs whose recent load stays under their
//! threshold.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use domain::models::{trailing_power_average, Plug};
use domain::services::{PlugRegistry, TelemetryStore};
use metrics::counter;
use shared::time::TimeWindow;
use tracing::{debug, error, info};

use super::scheduler::Job;
use crate::services::{PlugControlService, ToggleOrigin};

/// Decision taken for one plug.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShutdownOutcome {
    /// Off, or no threshold configured.
    NotEligible,
    /// Trailing average above threshold.
    AboveThreshold(f64),
    SwitchedOff(f64),
    /// The toggle failed or left the plug on.
    Failed,
}

/// Evaluates every plug that is on and has a threshold.
///
/// The trailing average is the mean of the summaries' average power over the
/// trailing window (boundaries on whole minutes). A window without summaries
/// counts as zero load, so a plug that stopped reporting is switched off.
pub struct AutoShutdownJob {
    registry: Arc<dyn PlugRegistry>,
    store: Arc<dyn TelemetryStore>,
    control: Arc<PlugControlService>,
    trailing: Duration,
}

impl AutoShutdownJob {
    pub fn new(
        registry: Arc<dyn PlugRegistry>,
        store: Arc<dyn TelemetryStore>,
        control: Arc<PlugControlService>,
        trailing: Duration,
    ) -> Self {
        Self {
            registry,
            store,
            control,
            trailing,
        }
    }

    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<Vec<(i64, ShutdownOutcome)>, String> {
        let plugs = self
            .registry
            .list_plugs()
            .await
            .map_err(|e| format!("Failed to list plugs: {}", e))?;

        let window = TimeWindow::trailing_minutes(now, self.trailing);
        let mut outcomes = Vec::with_capacity(plugs.len());
        for plug in &plugs {
            outcomes.push((plug.id, self.evaluate(plug, &window).await));
        }
        Ok(outcomes)
    }

    async fn evaluate(&self, plug: &Plug, window: &TimeWindow) -> ShutdownOutcome {
        let Some(threshold) = plug.auto_shutdown_threshold_if_on() else {
            return ShutdownOutcome::NotEligible;
        };

        // A read failure is not an empty window: never shut down on it.
        let summaries = match self.store.find_summaries(plug.id, window).await {
            Ok(summaries) => summaries,
            Err(e) => {
                error!(plug_id = plug.id, plug_name = %plug.name, error = %e, "Failed to read summaries");
                return ShutdownOutcome::Failed;
            }
        };

        let average = trailing_power_average(&summaries);
        if average > threshold {
            debug!(plug_id = plug.id, average, threshold, "Load above threshold");
            return ShutdownOutcome::AboveThreshold(average);
        }

        match self.control.toggle(plug, ToggleOrigin::AutoShutdown).await {
            Ok(outcome) if !outcome.is_on_now() => {
                counter!("plug_auto_shutdowns_total").increment(1);
                info!(
                    plug_id = plug.id,
                    plug_name = %plug.name,
                    average,
                    threshold,
                    summaries = summaries.len(),
                    "Plug switched off by auto-shutdown"
                );
                ShutdownOutcome::SwitchedOff(average)
            }
            Ok(_) => {
                error!(plug_id = plug.id, plug_name = %plug.name, "Auto-shutdown toggle left the plug on");
                ShutdownOutcome::Failed
            }
            Err(e) => {
                error!(plug_id = plug.id, plug_name = %plug.name, error = %e, "Auto-shutdown toggle failed");
                ShutdownOutcome::Failed
            }
        }
    }
}

#[async_trait::async_trait]
impl Job for AutoShutdownJob {
    async fn execute(&self) -> Result<(), String> {
        let outcomes = self.run_at(Utc::now()).await?;
        let switched = outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, ShutdownOutcome::SwitchedOff(_)))
            .count();
        debug!(plugs = outcomes.len(), switched, "Auto-shutdown run finished");
        Ok(())
    }
}
