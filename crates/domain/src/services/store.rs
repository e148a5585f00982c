//! Storage gateway contracts.

use chrono::NaiveDate;
use shared::time::TimeWindow;
use thiserror::Error;

use crate::models::{
    Measurement, NewMeasurement, NewReport, NewSummary, Plug, Report, Summary, UpsertPlugRequest,
};

/// Errors returned by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Access to the registry of known plugs.
#[async_trait::async_trait]
pub trait PlugRegistry: Send + Sync {
    /// All known plugs, ordered by id.
    async fn list_plugs(&self) -> Result<Vec<Plug>, StoreError>;

    async fn find_plug(&self, plug_id: i64) -> Result<Option<Plug>, StoreError>;

    /// Insert a plug or update the one registered under the same URL.
    async fn upsert_plug(&self, request: &UpsertPlugRequest) -> Result<Plug, StoreError>;

    /// Record the last commanded on/off state. Returns the affected row count.
    async fn set_plug_state(&self, plug_id: i64, is_on: bool) -> Result<u64, StoreError>;
}

/// Storage of measurements, summaries and reports.
///
/// Measurement windows are half-open on `created_at`; summary windows are
/// half-open on `start_at`. Reads return rows in ascending time order.
#[async_trait::async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Append a measurement. Returns `false` when a row with the same
    /// `(plug, created_at)` already exists.
    async fn insert_measurement(
        &self,
        plug_id: i64,
        measurement: &NewMeasurement,
    ) -> Result<bool, StoreError>;

    async fn find_measurements(
        &self,
        plug_id: i64,
        window: &TimeWindow,
    ) -> Result<Vec<Measurement>, StoreError>;

    /// Delete the measurements of a window. Returns the deleted row count.
    async fn delete_measurements(&self, plug_id: i64, window: &TimeWindow)
        -> Result<u64, StoreError>;

    async fn insert_summary(&self, plug_id: i64, summary: &NewSummary)
        -> Result<Summary, StoreError>;

    async fn find_summaries(
        &self,
        plug_id: i64,
        window: &TimeWindow,
    ) -> Result<Vec<Summary>, StoreError>;

    /// Insert a report. Returns `None` when the plug already has a report
    /// for that date; the existing one is left untouched.
    async fn insert_report(
        &self,
        plug_id: i64,
        report: &NewReport,
    ) -> Result<Option<Report>, StoreError>;

    async fn find_report(
        &self,
        plug_id: i64,
        report_date: NaiveDate,
    ) -> Result<Option<Report>, StoreError>;
}
