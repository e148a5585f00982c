//! Plug entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database row mapping for the plugs table.
#[derive(Debug, Clone, FromRow)]
pub struct PlugEntity {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub protected: bool,
    pub is_on: bool,
    pub auto_shutdown_threshold: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PlugEntity> for domain::models::Plug {
    fn from(entity: PlugEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            url: entity.url,
            protected: entity.protected,
            is_on: entity.is_on,
            auto_shutdown_threshold: entity.auto_shutdown_threshold,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
