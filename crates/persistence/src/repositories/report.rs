//! Report repository for database operations.

use chrono::NaiveDate;
use domain::models::NewReport;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::entities::ReportEntity;
use crate::metrics::QueryTimer;

/// Repository for daily report database operations.
#[derive(Clone)]
pub struct ReportRepository {
    pool: PgPool,
}

impl ReportRepository {
    /// Creates a new ReportRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a report unless the plug already has one for that date.
    ///
    /// Returns `None` when the existing report was kept.
    pub async fn insert(
        &self,
        plug_id: i64,
        report: &NewReport,
    ) -> Result<Option<ReportEntity>, sqlx::Error> {
        let timer = QueryTimer::new("insert_plug_report");

        let result = sqlx::query_as::<_, ReportEntity>(
            r#"
            INSERT INTO plug_reports (plug_id, report_date, summaries, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (plug_id, report_date) DO NOTHING
            RETURNING id, plug_id, report_date, summaries, created_at
            "#,
        )
        .bind(plug_id)
        .bind(report.report_date)
        .bind(Json(&report.summaries))
        .bind(report.created_at)
        .fetch_optional(&self.pool)
        .await;

        timer.record();
        result
    }

    /// Find the report of a plug for one day.
    pub async fn find_by_date(
        &self,
        plug_id: i64,
        report_date: NaiveDate,
    ) -> Result<Option<ReportEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_plug_report_by_date");

        let result = sqlx::query_as::<_, ReportEntity>(
            r#"
            SELECT id, plug_id, report_date, summaries, created_at
            FROM plug_reports
            WHERE plug_id = $1 AND report_date = $2
            "#,
        )
        .bind(plug_id)
        .bind(report_date)
        .fetch_optional(&self.pool)
        .await;

        timer.record();
        result
    }
}
