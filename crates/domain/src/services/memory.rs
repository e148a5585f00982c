//! In-memory storage for development and testing.
//!
//! Mirrors the window and uniqueness semantics of the SQL schema and can
//! inject failures per operation, optionally scoped to one plug.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{NaiveDate, Utc};
use shared::time::TimeWindow;

use super::store::{PlugRegistry, StoreError, TelemetryStore};
use crate::models::{
    Measurement, NewMeasurement, NewReport, NewSummary, Plug, Report, Summary, UpsertPlugRequest,
};

/// Storage operations that can be counted and failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    ListPlugs,
    FindPlug,
    UpsertPlug,
    SetPlugState,
    InsertMeasurement,
    FindMeasurements,
    DeleteMeasurements,
    InsertSummary,
    FindSummaries,
    InsertReport,
    FindReport,
}

#[derive(Debug, Default)]
struct MemoryState {
    plugs: Vec<Plug>,
    measurements: Vec<Measurement>,
    summaries: Vec<Summary>,
    reports: Vec<Report>,
    next_id: i64,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory implementation of [`PlugRegistry`] and [`TelemetryStore`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
    faults: Mutex<HashSet<(StoreOp, Option<i64>)>>,
    calls: Mutex<HashMap<StoreOp, usize>>,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plug directly, bypassing upsert semantics.
    pub fn add_plug(
        &self,
        name: &str,
        url: &str,
        is_on: bool,
        auto_shutdown_threshold: Option<f64>,
    ) -> Plug {
        let mut state = lock(&self.state);
        let now = Utc::now();
        let plug = Plug {
            id: state.next_id(),
            name: name.to_string(),
            url: url.to_string(),
            protected: false,
            is_on,
            auto_shutdown_threshold,
            created_at: now,
            updated_at: now,
        };
        state.plugs.push(plug.clone());
        plug
    }

    /// Mark a plug as protected against user toggles.
    pub fn protect_plug(&self, plug_id: i64) {
        if let Some(plug) = lock(&self.state).plugs.iter_mut().find(|p| p.id == plug_id) {
            plug.protected = true;
        }
    }

    /// Store a summary as if the aggregator had produced it.
    pub fn seed_summary(&self, plug_id: i64, summary: &NewSummary) -> Summary {
        let mut state = lock(&self.state);
        let stored = summary_row(state.next_id(), plug_id, summary);
        state.summaries.push(stored.clone());
        stored
    }

    /// Fail every call of `op`.
    pub fn fail(&self, op: StoreOp) {
        lock(&self.faults).insert((op, None));
    }

    /// Fail calls of `op` for one plug only.
    pub fn fail_for_plug(&self, op: StoreOp, plug_id: i64) {
        lock(&self.faults).insert((op, Some(plug_id)));
    }

    /// Remove all injected failures.
    pub fn heal(&self) {
        lock(&self.faults).clear();
    }

    /// Number of times `op` has been called, failed calls included.
    pub fn call_count(&self, op: StoreOp) -> usize {
        lock(&self.calls).get(&op).copied().unwrap_or(0)
    }

    pub fn plug(&self, plug_id: i64) -> Option<Plug> {
        lock(&self.state).plugs.iter().find(|p| p.id == plug_id).cloned()
    }

    pub fn measurements(&self, plug_id: i64) -> Vec<Measurement> {
        let mut rows: Vec<_> = lock(&self.state)
            .measurements
            .iter()
            .filter(|m| m.plug_id == plug_id)
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.created_at);
        rows
    }

    pub fn summaries(&self, plug_id: i64) -> Vec<Summary> {
        let mut rows: Vec<_> = lock(&self.state)
            .summaries
            .iter()
            .filter(|s| s.plug_id == plug_id)
            .cloned()
            .collect();
        rows.sort_by_key(|s| s.start_at);
        rows
    }

    pub fn reports(&self, plug_id: i64) -> Vec<Report> {
        lock(&self.state)
            .reports
            .iter()
            .filter(|r| r.plug_id == plug_id)
            .cloned()
            .collect()
    }

    fn enter(&self, op: StoreOp, plug_id: Option<i64>) -> Result<(), StoreError> {
        *lock(&self.calls).entry(op).or_insert(0) += 1;

        let faults = lock(&self.faults);
        let scoped = plug_id.is_some_and(|id| faults.contains(&(op, Some(id))));
        if faults.contains(&(op, None)) || scoped {
            return Err(StoreError::Unavailable(format!("injected failure in {:?}", op)));
        }
        Ok(())
    }
}

fn summary_row(id: i64, plug_id: i64, s: &NewSummary) -> Summary {
    Summary {
        id,
        plug_id,
        start_at: s.start_at,
        end_at: s.end_at,
        count_measurements: s.count_measurements,
        power_sum: s.power_sum,
        power_avg: s.power_avg,
        voltage_avg: s.voltage_avg,
        current_avg: s.current_avg,
        temp_c_avg: s.temp_c_avg,
        temp_f_avg: s.temp_f_avg,
        created_at: s.created_at,
    }
}

#[async_trait::async_trait]
impl PlugRegistry for InMemoryStore {
    async fn list_plugs(&self) -> Result<Vec<Plug>, StoreError> {
        self.enter(StoreOp::ListPlugs, None)?;
        let mut plugs = lock(&self.state).plugs.clone();
        plugs.sort_by_key(|p| p.id);
        Ok(plugs)
    }

    async fn find_plug(&self, plug_id: i64) -> Result<Option<Plug>, StoreError> {
        self.enter(StoreOp::FindPlug, Some(plug_id))?;
        Ok(self.plug(plug_id))
    }

    async fn upsert_plug(&self, request: &UpsertPlugRequest) -> Result<Plug, StoreError> {
        self.enter(StoreOp::UpsertPlug, None)?;
        let mut state = lock(&self.state);
        let now = Utc::now();

        if let Some(existing) = state.plugs.iter_mut().find(|p| p.url == request.url) {
            existing.name = request.name.clone();
            existing.protected = request.protected;
            existing.auto_shutdown_threshold = request.auto_shutdown_threshold;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let plug = Plug {
            id: state.next_id(),
            name: request.name.clone(),
            url: request.url.clone(),
            protected: request.protected,
            is_on: false,
            auto_shutdown_threshold: request.auto_shutdown_threshold,
            created_at: now,
            updated_at: now,
        };
        state.plugs.push(plug.clone());
        Ok(plug)
    }

    async fn set_plug_state(&self, plug_id: i64, is_on: bool) -> Result<u64, StoreError> {
        self.enter(StoreOp::SetPlugState, Some(plug_id))?;
        let mut state = lock(&self.state);
        match state.plugs.iter_mut().find(|p| p.id == plug_id) {
            Some(plug) => {
                plug.is_on = is_on;
                plug.updated_at = Utc::now();
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

#[async_trait::async_trait]
impl TelemetryStore for InMemoryStore {
    async fn insert_measurement(
        &self,
        plug_id: i64,
        measurement: &NewMeasurement,
    ) -> Result<bool, StoreError> {
        self.enter(StoreOp::InsertMeasurement, Some(plug_id))?;
        let mut state = lock(&self.state);

        let duplicate = state
            .measurements
            .iter()
            .any(|m| m.plug_id == plug_id && m.created_at == measurement.created_at);
        if duplicate {
            return Ok(false);
        }

        let id = state.next_id();
        state.measurements.push(Measurement {
            id,
            plug_id,
            power: measurement.power,
            voltage: measurement.voltage,
            current: measurement.current,
            temp_c: measurement.temp_c,
            temp_f: measurement.temp_f,
            created_at: measurement.created_at,
        });
        Ok(true)
    }

    async fn find_measurements(
        &self,
        plug_id: i64,
        window: &TimeWindow,
    ) -> Result<Vec<Measurement>, StoreError> {
        self.enter(StoreOp::FindMeasurements, Some(plug_id))?;
        Ok(self
            .measurements(plug_id)
            .into_iter()
            .filter(|m| window.contains(m.created_at))
            .collect())
    }

    async fn delete_measurements(
        &self,
        plug_id: i64,
        window: &TimeWindow,
    ) -> Result<u64, StoreError> {
        self.enter(StoreOp::DeleteMeasurements, Some(plug_id))?;
        let mut state = lock(&self.state);
        let before = state.measurements.len();
        state
            .measurements
            .retain(|m| !(m.plug_id == plug_id && window.contains(m.created_at)));
        Ok((before - state.measurements.len()) as u64)
    }

    async fn insert_summary(
        &self,
        plug_id: i64,
        summary: &NewSummary,
    ) -> Result<Summary, StoreError> {
        self.enter(StoreOp::InsertSummary, Some(plug_id))?;
        Ok(self.seed_summary(plug_id, summary))
    }

    async fn find_summaries(
        &self,
        plug_id: i64,
        window: &TimeWindow,
    ) -> Result<Vec<Summary>, StoreError> {
        self.enter(StoreOp::FindSummaries, Some(plug_id))?;
        Ok(self
            .summaries(plug_id)
            .into_iter()
            .filter(|s| window.contains(s.start_at))
            .collect())
    }

    async fn insert_report(
        &self,
        plug_id: i64,
        report: &NewReport,
    ) -> Result<Option<Report>, StoreError> {
        self.enter(StoreOp::InsertReport, Some(plug_id))?;
        let mut state = lock(&self.state);

        let exists = state
            .reports
            .iter()
            .any(|r| r.plug_id == plug_id && r.report_date == report.report_date);
        if exists {
            return Ok(None);
        }

        let stored = Report {
            id: state.next_id(),
            plug_id,
            report_date: report.report_date,
            summaries: report.summaries.clone(),
            created_at: report.created_at,
        };
        state.reports.push(stored.clone());
        Ok(Some(stored))
    }

    async fn find_report(
        &self,
        plug_id: i64,
        report_date: NaiveDate,
    ) -> Result<Option<Report>, StoreError> {
        self.enter(StoreOp::FindReport, Some(plug_id))?;
        Ok(self
            .reports(plug_id)
            .into_iter()
            .find(|r| r.report_date == report_date))
    }
}
