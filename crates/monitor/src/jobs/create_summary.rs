//! Summary aggregation job: roll up the last closed window, then compact it.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use domain::models::{NewSummary, Plug};
use domain::services::{PlugRegistry, TelemetryStore};
use metrics::counter;
use shared::time::{truncate_to_second, TimeWindow};
use tracing::{debug, error, info, warn};

use super::scheduler::Job;

/// Collapses each plug's most recent closed window of raw measurements into
/// one summary and deletes the raw rows it covered.
///
/// Raw rows are deleted only after the summary insert has succeeded.
pub struct CreateSummaryJob {
    registry: Arc<dyn PlugRegistry>,
    store: Arc<dyn TelemetryStore>,
    window: Duration,
}

impl CreateSummaryJob {
    pub fn new(registry: Arc<dyn PlugRegistry>, store: Arc<dyn TelemetryStore>, window: Duration) -> Self {
        Self {
            registry,
            store,
            window,
        }
    }

    /// Summarize the window ending at `now` for every plug.
    ///
    /// Returns the number of summaries written.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<usize, String> {
        let plugs = self
            .registry
            .list_plugs()
            .await
            .map_err(|e| format!("Failed to list plugs: {}", e))?;

        let window = TimeWindow::ending_at_second(now, self.window);
        let created_at = truncate_to_second(now);

        let mut created = 0;
        for plug in &plugs {
            if self.summarize_plug(plug, &window, created_at).await {
                created += 1;
            }
        }
        Ok(created)
    }

    async fn summarize_plug(&self, plug: &Plug, window: &TimeWindow, created_at: DateTime<Utc>) -> bool {
        let measurements = match self.store.find_measurements(plug.id, window).await {
            Ok(measurements) => measurements,
            Err(e) => {
                error!(plug_id = plug.id, plug_name = %plug.name, error = %e, "Failed to read measurements");
                return false;
            }
        };

        let Some(summary) = NewSummary::from_measurements(&measurements, created_at) else {
            warn!(
                plug_id = plug.id,
                plug_name = %plug.name,
                window_start = %window.start,
                "No measurements in window, skipping summary"
            );
            return false;
        };

        let stored = match self.store.insert_summary(plug.id, &summary).await {
            Ok(stored) => stored,
            Err(e) => {
                error!(
                    plug_id = plug.id,
                    plug_name = %plug.name,
                    error = %e,
                    "Failed to insert summary, keeping raw measurements"
                );
                return false;
            }
        };
        counter!("plug_summaries_created_total").increment(1);
        info!(
            plug_id = plug.id,
            summary_id = stored.id,
            count = stored.count_measurements,
            power_avg = stored.power_avg,
            "Summary created"
        );

        match self.store.delete_measurements(plug.id, window).await {
            Ok(deleted) => debug!(plug_id = plug.id, deleted, "Raw measurements compacted"),
            Err(e) => warn!(plug_id = plug.id, error = %e, "Failed to delete summarized measurements"),
        }
        true
    }
}

#[async_trait::async_trait]
impl Job for CreateSummaryJob {
    async fn execute(&self) -> Result<(), String> {
        let created = self.run_at(Utc::now()).await?;
        debug!(created, "Summary run finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::NewMeasurement;
    use domain::services::{InMemoryStore, StoreOp};

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn measurement(created_at: DateTime<Utc>, power: f64) -> NewMeasurement {
        NewMeasurement {
            power,
            voltage: 230.0,
            current: 0.5,
            temp_c: 25.0,
            temp_f: 77.0,
            created_at,
        }
    }

    async fn seed(store: &InMemoryStore, plug_id: i64, rows: &[(&str, f64)]) {
        for (ts, power) in rows {
            store
                .insert_measurement(plug_id, &measurement(at(ts), *power))
                .await
                .unwrap();
        }
    }

    fn job(store: &Arc<InMemoryStore>) -> CreateSummaryJob {
        CreateSummaryJob::new(store.clone(), store.clone(), Duration::seconds(60))
    }

    #[tokio::test]
    async fn test_summarizes_closed_window_and_compacts() {
        let store = Arc::new(InMemoryStore::new());
        let plug = store.add_plug("Desk", "http://desk", true, None);
        seed(
            &store,
            plug.id,
            &[
                ("2024-06-01T10:00:00Z", 1.0),
                ("2024-06-01T10:00:20Z", 2.0),
                ("2024-06-01T10:00:59Z", 6.0),
                // Outside the window: belongs to the next minute.
                ("2024-06-01T10:01:00Z", 9.0),
            ],
        )
        .await;

        let created = job(&store).run_at(at("2024-06-01T10:01:00.400Z")).await.unwrap();

        assert_eq!(created, 1);
        let summaries = store.summaries(plug.id);
        assert_eq!(summaries.len(), 1);
        let summary = &summaries[0];
        assert_eq!(summary.count_measurements, 3);
        assert_eq!(summary.power_sum, 9.0);
        assert_eq!(summary.power_avg, 3.0);
        assert_eq!(summary.start_at, at("2024-06-01T10:00:00Z"));
        assert_eq!(summary.end_at, at("2024-06-01T10:00:59Z"));
        assert_eq!(summary.created_at, at("2024-06-01T10:01:00Z"));

        let remaining = store.measurements(plug.id);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].power, 9.0);
    }

    #[tokio::test]
    async fn test_empty_window_writes_nothing_and_deletes_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let plug = store.add_plug("Idle", "http://idle", false, None);
        seed(&store, plug.id, &[("2024-06-01T09:00:00Z", 1.0)]).await;

        let created = job(&store).run_at(at("2024-06-01T10:01:00Z")).await.unwrap();

        assert_eq!(created, 0);
        assert!(store.summaries(plug.id).is_empty());
        assert_eq!(store.call_count(StoreOp::InsertSummary), 0);
        assert_eq!(store.call_count(StoreOp::DeleteMeasurements), 0);
        assert_eq!(store.measurements(plug.id).len(), 1);
    }

    #[tokio::test]
    async fn test_failed_summary_insert_keeps_raw_measurements() {
        let store = Arc::new(InMemoryStore::new());
        let plug = store.add_plug("Desk", "http://desk", true, None);
        seed(
            &store,
            plug.id,
            &[("2024-06-01T10:00:10Z", 4.0), ("2024-06-01T10:00:11Z", 5.0)],
        )
        .await;
        store.fail(StoreOp::InsertSummary);

        let created = job(&store).run_at(at("2024-06-01T10:01:00Z")).await.unwrap();

        assert_eq!(created, 0);
        assert_eq!(store.call_count(StoreOp::InsertSummary), 1);
        assert_eq!(store.call_count(StoreOp::DeleteMeasurements), 0);
        assert_eq!(store.measurements(plug.id).len(), 2);
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_summary() {
        let store = Arc::new(InMemoryStore::new());
        let plug = store.add_plug("Desk", "http://desk", true, None);
        seed(&store, plug.id, &[("2024-06-01T10:00:10Z", 4.0)]).await;
        store.fail(StoreOp::DeleteMeasurements);

        let created = job(&store).run_at(at("2024-06-01T10:01:00Z")).await.unwrap();

        assert_eq!(created, 1);
        assert_eq!(store.summaries(plug.id).len(), 1);
        assert_eq!(store.measurements(plug.id).len(), 1);
    }

    #[tokio::test]
    async fn test_one_plug_failing_does_not_stop_others() {
        let store = Arc::new(InMemoryStore::new());
        let broken = store.add_plug("Broken", "http://broken", true, None);
        let healthy = store.add_plug("Healthy", "http://healthy", true, None);
        seed(&store, broken.id, &[("2024-06-01T10:00:10Z", 1.0)]).await;
        seed(&store, healthy.id, &[("2024-06-01T10:00:10Z", 2.0)]).await;
        store.fail_for_plug(StoreOp::FindMeasurements, broken.id);

        let created = job(&store).run_at(at("2024-06-01T10:01:00Z")).await.unwrap();

        assert_eq!(created, 1);
        assert!(store.summaries(broken.id).is_empty());
        assert_eq!(store.summaries(healthy.id).len(), 1);
    }

    #[tokio::test]
    async fn test_consecutive_runs_produce_contiguous_summaries() {
        let store = Arc::new(InMemoryStore::new());
        let plug = store.add_plug("Desk", "http://desk", true, None);
        seed(
            &store,
            plug.id,
            &[
                ("2024-06-01T10:00:00Z", 1.0),
                ("2024-06-01T10:00:59Z", 1.0),
                ("2024-06-01T10:01:00Z", 3.0),
                ("2024-06-01T10:01:59Z", 3.0),
            ],
        )
        .await;

        let job = job(&store);
        job.run_at(at("2024-06-01T10:01:00Z")).await.unwrap();
        job.run_at(at("2024-06-01T10:02:00Z")).await.unwrap();

        let summaries = store.summaries(plug.id);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].power_avg, 1.0);
        assert_eq!(summaries[1].power_avg, 3.0);
        assert!(summaries[0].end_at < summaries[1].start_at);
        assert!(store.measurements(plug.id).is_empty());
    }
}
