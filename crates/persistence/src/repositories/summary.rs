//! Summary repository for database operations.

use chrono::{DateTime, Utc};
use domain::models::NewSummary;
use sqlx::PgPool;

use crate::entities::SummaryEntity;
use crate::metrics::QueryTimer;

/// Repository for summary database operations.
///
/// Window reads are half-open on `start_at`.
#[derive(Clone)]
pub struct SummaryRepository {
    pool: PgPool,
}

impl SummaryRepository {
    /// Creates a new SummaryRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a summary and return the stored row.
    pub async fn insert(
        &self,
        plug_id: i64,
        summary: &NewSummary,
    ) -> Result<SummaryEntity, sqlx::Error> {
        let timer = QueryTimer::new("insert_plug_summary");

        let result = sqlx::query_as::<_, SummaryEntity>(
            r#"
            INSERT INTO plug_summaries (
                plug_id, start_at, end_at, count_measurements, power_sum, power_avg,
                voltage_avg, current_avg, temp_c_avg, temp_f_avg, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING
                id, plug_id, start_at, end_at, count_measurements, power_sum, power_avg,
                voltage_avg, current_avg, temp_c_avg, temp_f_avg, created_at
            "#,
        )
        .bind(plug_id)
        .bind(summary.start_at)
        .bind(summary.end_at)
        .bind(summary.count_measurements)
        .bind(summary.power_sum)
        .bind(summary.power_avg)
        .bind(summary.voltage_avg)
        .bind(summary.current_avg)
        .bind(summary.temp_c_avg)
        .bind(summary.temp_f_avg)
        .bind(summary.created_at)
        .fetch_one(&self.pool)
        .await;

        timer.record();
        result
    }

    /// Get a plug's summaries starting in `[from, to)`, oldest first.
    pub async fn find_in_window(
        &self,
        plug_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SummaryEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_plug_summaries_in_window");

        let result = sqlx::query_as::<_, SummaryEntity>(
            r#"
            SELECT
                id, plug_id, start_at, end_at, count_measurements, power_sum, power_avg,
                voltage_avg, current_avg, temp_c_avg, temp_f_avg, created_at
            FROM plug_summaries
            WHERE plug_id = $1 AND start_at >= $2 AND start_at < $3
            ORDER BY start_at ASC
            "#,
        )
        .bind(plug_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await;

        timer.record();
        result
    }
}
