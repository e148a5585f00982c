//! Plug repository for database operations.

use sqlx::PgPool;

use crate::entities::PlugEntity;
use crate::metrics::QueryTimer;

/// Repository for plug registry database operations.
#[derive(Clone)]
pub struct PlugRepository {
    pool: PgPool,
}

impl PlugRepository {
    /// Creates a new PlugRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find all plugs, ordered by id.
    pub async fn find_all(&self) -> Result<Vec<PlugEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_all_plugs");

        let result = sqlx::query_as::<_, PlugEntity>(
            r#"
            SELECT id, name, url, protected, is_on, auto_shutdown_threshold,
                   created_at, updated_at
            FROM plugs
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await;

        timer.record();
        result
    }

    /// Find a plug by id.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<PlugEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_plug_by_id");

        let result = sqlx::query_as::<_, PlugEntity>(
            r#"
            SELECT id, name, url, protected, is_on, auto_shutdown_threshold,
                   created_at, updated_at
            FROM plugs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;

        timer.record();
        result
    }

    /// Insert a plug, or update name, protection and threshold of the plug
    /// registered under the same URL. The on/off state is left untouched.
    pub async fn upsert(
        &self,
        name: &str,
        url: &str,
        protected: bool,
        auto_shutdown_threshold: Option<f64>,
    ) -> Result<PlugEntity, sqlx::Error> {
        let timer = QueryTimer::new("upsert_plug");

        let result = sqlx::query_as::<_, PlugEntity>(
            r#"
            INSERT INTO plugs (name, url, protected, auto_shutdown_threshold)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (url) DO UPDATE SET
                name = EXCLUDED.name,
                protected = EXCLUDED.protected,
                auto_shutdown_threshold = EXCLUDED.auto_shutdown_threshold,
                updated_at = NOW()
            RETURNING id, name, url, protected, is_on, auto_shutdown_threshold,
                      created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(url)
        .bind(protected)
        .bind(auto_shutdown_threshold)
        .fetch_one(&self.pool)
        .await;

        timer.record();
        result
    }

    /// Record the last commanded on/off state.
    /// Returns the number of rows affected (0 if the plug does not exist).
    pub async fn update_state(&self, id: i64, is_on: bool) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("update_plug_state");

        let result = sqlx::query(
            r#"
            UPDATE plugs
            SET is_on = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(is_on)
        .execute(&self.pool)
        .await;

        timer.record();
        Ok(result?.rows_affected())
    }
}
