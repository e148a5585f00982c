//! PostgreSQL implementation of the domain storage contracts.

use chrono::NaiveDate;
use domain::models::{
    Measurement, NewMeasurement, NewReport, NewSummary, Plug, Report, Summary, UpsertPlugRequest,
};
use domain::services::{PlugRegistry, StoreError, TelemetryStore};
use shared::time::TimeWindow;
use sqlx::PgPool;

use crate::repositories::{
    MeasurementInput, MeasurementRepository, PlugRepository, ReportRepository, SummaryRepository,
};

/// Storage gateway backed by PostgreSQL repositories.
#[derive(Clone)]
pub struct PgStore {
    plugs: PlugRepository,
    measurements: MeasurementRepository,
    summaries: SummaryRepository,
    reports: ReportRepository,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            plugs: PlugRepository::new(pool.clone()),
            measurements: MeasurementRepository::new(pool.clone()),
            summaries: SummaryRepository::new(pool.clone()),
            reports: ReportRepository::new(pool),
        }
    }
}

#[async_trait::async_trait]
impl PlugRegistry for PgStore {
    async fn list_plugs(&self) -> Result<Vec<Plug>, StoreError> {
        let rows = self.plugs.find_all().await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_plug(&self, plug_id: i64) -> Result<Option<Plug>, StoreError> {
        Ok(self.plugs.find_by_id(plug_id).await?.map(Into::into))
    }

    async fn upsert_plug(&self, request: &UpsertPlugRequest) -> Result<Plug, StoreError> {
        let row = self
            .plugs
            .upsert(
                &request.name,
                &request.url,
                request.protected,
                request.auto_shutdown_threshold,
            )
            .await?;
        Ok(row.into())
    }

    async fn set_plug_state(&self, plug_id: i64, is_on: bool) -> Result<u64, StoreError> {
        Ok(self.plugs.update_state(plug_id, is_on).await?)
    }
}

#[async_trait::async_trait]
impl TelemetryStore for PgStore {
    async fn insert_measurement(
        &self,
        plug_id: i64,
        measurement: &NewMeasurement,
    ) -> Result<bool, StoreError> {
        let input = MeasurementInput {
            plug_id,
            power: measurement.power,
            voltage: measurement.voltage,
            current: measurement.current,
            temp_c: measurement.temp_c,
            temp_f: measurement.temp_f,
            created_at: measurement.created_at,
        };
        Ok(self.measurements.insert(&input).await?)
    }

    async fn find_measurements(
        &self,
        plug_id: i64,
        window: &TimeWindow,
    ) -> Result<Vec<Measurement>, StoreError> {
        let rows = self
            .measurements
            .find_in_window(plug_id, window.start, window.end)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete_measurements(
        &self,
        plug_id: i64,
        window: &TimeWindow,
    ) -> Result<u64, StoreError> {
        Ok(self
            .measurements
            .delete_in_window(plug_id, window.start, window.end)
            .await?)
    }

    async fn insert_summary(
        &self,
        plug_id: i64,
        summary: &NewSummary,
    ) -> Result<Summary, StoreError> {
        Ok(self.summaries.insert(plug_id, summary).await?.into())
    }

    async fn find_summaries(
        &self,
        plug_id: i64,
        window: &TimeWindow,
    ) -> Result<Vec<Summary>, StoreError> {
        let rows = self
            .summaries
            .find_in_window(plug_id, window.start, window.end)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_report(
        &self,
        plug_id: i64,
        report: &NewReport,
    ) -> Result<Option<Report>, StoreError> {
        Ok(self.reports.insert(plug_id, report).await?.map(Into::into))
    }

    async fn find_report(
        &self,
        plug_id: i64,
        report_date: NaiveDate,
    ) -> Result<Option<Report>, StoreError> {
        Ok(self
            .reports
            .find_by_date(plug_id, report_date)
            .await?
            .map(Into::into))
    }
}
