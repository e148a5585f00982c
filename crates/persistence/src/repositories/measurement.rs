//! Raw measurement repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::entities::MeasurementEntity;
use crate::metrics::QueryTimer;

/// Input data for inserting a measurement record.
#[derive(Debug, Clone)]
pub struct MeasurementInput {
    pub plug_id: i64,
    pub power: f64,
    pub voltage: f64,
    pub current: f64,
    pub temp_c: f64,
    pub temp_f: f64,
    /// Whole-second timestamp; `(plug_id, created_at)` is unique.
    pub created_at: DateTime<Utc>,
}

/// Repository for raw measurement database operations.
///
/// Window reads and deletes are half-open on `created_at`.
#[derive(Clone)]
pub struct MeasurementRepository {
    pool: PgPool,
}

impl MeasurementRepository {
    /// Creates a new MeasurementRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a measurement unless one exists for the same plug and second.
    ///
    /// Returns `true` if a row was written.
    pub async fn insert(&self, input: &MeasurementInput) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("insert_plug_measurement");

        let result = sqlx::query(
            r#"
            INSERT INTO plug_measurements (
                plug_id, power, voltage, current, temp_c, temp_f, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (plug_id, created_at) DO NOTHING
            "#,
        )
        .bind(input.plug_id)
        .bind(input.power)
        .bind(input.voltage)
        .bind(input.current)
        .bind(input.temp_c)
        .bind(input.temp_f)
        .bind(input.created_at)
        .execute(&self.pool)
        .await;

        timer.record();
        Ok(result?.rows_affected() == 1)
    }

    /// Get a plug's measurements in `[from, to)`, oldest first.
    pub async fn find_in_window(
        &self,
        plug_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MeasurementEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_plug_measurements_in_window");

        let result = sqlx::query_as::<_, MeasurementEntity>(
            r#"
            SELECT id, plug_id, power, voltage, current, temp_c, temp_f, created_at
            FROM plug_measurements
            WHERE plug_id = $1 AND created_at >= $2 AND created_at < $3
            ORDER BY created_at ASC
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

    /// Delete a plug's measurements in `[from, to)`.
    /// Returns the number of rows deleted.
    pub async fn delete_in_window(
        &self,
        plug_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("delete_plug_measurements_in_window");

        let result = sqlx::query(
            r#"
            DELETE FROM plug_measurements
            WHERE plug_id = $1 AND created_at >= $2 AND created_at < $3
            "#,
        )
        .bind(plug_id)
        .bind(from)
        .bind(to)
        .execute(&self.pool)
        .await;

        timer.record();
        Ok(result?.rows_affected())
    }
}
