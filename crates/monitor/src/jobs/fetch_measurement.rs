//! Ingestion job: one telemetry reading per plug per tick.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use domain::models::{NewMeasurement, Plug};
use domain::services::{PlugRegistry, TelemetryClient, TelemetryStore};
use metrics::counter;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use super::scheduler::Job;

/// How long a run waits for its polls before returning to the scheduler.
///
/// Must stay under the ingestion cadence.
pub const DEFAULT_POLL_BUDGET: Duration = Duration::from_millis(900);

/// What happened to one plug during an ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Stored,
    /// A reading for this plug and second already exists.
    Duplicate,
    DeviceFailed,
    StoreFailed,
    /// The plug's poll from an earlier tick has not finished; not polled again.
    Busy,
    /// Still polling when the run returned; it finishes in the background.
    Pending,
}

type PlugSet = Arc<Mutex<HashSet<i64>>>;

fn lock(set: &PlugSet) -> MutexGuard<'_, HashSet<i64>> {
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Marks a plug as being polled until dropped, panics included.
struct PlugPoll {
    plug_id: i64,
    polling: PlugSet,
}

impl PlugPoll {
    fn acquire(polling: &PlugSet, plug_id: i64) -> Option<Self> {
        lock(polling).insert(plug_id).then(|| Self {
            plug_id,
            polling: Arc::clone(polling),
        })
    }
}

impl Drop for PlugPoll {
    fn drop(&mut self) {
        lock(&self.polling).remove(&self.plug_id);
    }
}

/// Polls every plug and appends one raw measurement each.
///
/// Each plug is polled in its own task. A run waits at most the poll budget;
/// polls still outstanding keep running and their plug is skipped on later
/// ticks until they finish, so a slow or dead plug only costs its own
/// samples.
pub struct FetchMeasurementJob {
    registry: Arc<dyn PlugRegistry>,
    store: Arc<dyn TelemetryStore>,
    client: Arc<dyn TelemetryClient>,
    polling: PlugSet,
    poll_budget: Duration,
}

impl FetchMeasurementJob {
    pub fn new(
        registry: Arc<dyn PlugRegistry>,
        store: Arc<dyn TelemetryStore>,
        client: Arc<dyn TelemetryClient>,
    ) -> Self {
        Self {
            registry,
            store,
            client,
            polling: Arc::default(),
            poll_budget: DEFAULT_POLL_BUDGET,
        }
    }

    pub fn with_poll_budget(mut self, poll_budget: Duration) -> Self {
        self.poll_budget = poll_budget;
        self
    }

    /// Poll all plugs once, returning each plug's outcome.
    pub async fn run(&self) -> Result<Vec<(i64, FetchOutcome)>, String> {
        let plugs = self
            .registry
            .list_plugs()
            .await
            .map_err(|e| format!("Failed to list plugs: {}", e))?;

        let deadline = Instant::now() + self.poll_budget;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut outcomes = Vec::with_capacity(plugs.len());
        let mut started = Vec::new();

        for plug in plugs {
            let Some(poll) = PlugPoll::acquire(&self.polling, plug.id) else {
                debug!(plug_id = plug.id, plug_name = %plug.name, "Previous poll still running, skipping plug");
                outcomes.push((plug.id, FetchOutcome::Busy));
                continue;
            };

            started.push(plug.id);
            let store = Arc::clone(&self.store);
            let client = Arc::clone(&self.client);
            let tx = tx.clone();
            tokio::spawn(async move {
                let outcome = fetch_one(&plug, store.as_ref(), client.as_ref()).await;
                drop(poll);
                // The run may have returned already.
                let _ = tx.send((plug.id, outcome));
            });
        }
        drop(tx);

        let mut finished = HashSet::new();
        let mut timed_out = false;
        while finished.len() < started.len() {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some((plug_id, outcome))) => {
                    finished.insert(plug_id);
                    outcomes.push((plug_id, outcome));
                }
                Ok(None) => break,
                Err(_) => {
                    timed_out = true;
                    break;
                }
            }
        }

        for plug_id in started.into_iter().filter(|id| !finished.contains(id)) {
            if timed_out {
                warn!(plug_id, budget_ms = self.poll_budget.as_millis() as u64, "Plug poll still running after budget");
                outcomes.push((plug_id, FetchOutcome::Pending));
            } else {
                error!(plug_id, "Plug poll task aborted");
            }
        }
        Ok(outcomes)
    }
}

async fn fetch_one(plug: &Plug, store: &dyn TelemetryStore, client: &dyn TelemetryClient) -> FetchOutcome {
    let reading = match client.get_status(&plug.url).await {
        Ok(reading) => reading,
        Err(e) => {
            counter!("plug_telemetry_failures_total").increment(1);
            warn!(plug_id = plug.id, plug_name = %plug.name, error = %e, "Skipping plug, no reading this tick");
            return FetchOutcome::DeviceFailed;
        }
    };

    let measurement = NewMeasurement::from_reading(&reading, Utc::now());
    match store.insert_measurement(plug.id, &measurement).await {
        Ok(true) => {
            counter!("plug_measurements_ingested_total").increment(1);
            debug!(plug_id = plug.id, power = reading.power, "Measurement stored");
            FetchOutcome::Stored
        }
        Ok(false) => {
            debug!(plug_id = plug.id, "Measurement for this second already stored");
            FetchOutcome::Duplicate
        }
        Err(e) => {
            error!(plug_id = plug.id, plug_name = %plug.name, error = %e, "Failed to store measurement");
            FetchOutcome::StoreFailed
        }
    }
}

#[async_trait::async_trait]
impl Job for FetchMeasurementJob {
    async fn execute(&self) -> Result<(), String> {
        let outcomes = self.run().await?;
        let stored = outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == FetchOutcome::Stored)
            .count();
        debug!(plugs = outcomes.len(), stored, "Ingestion run finished");
        Ok(())
    }
}
