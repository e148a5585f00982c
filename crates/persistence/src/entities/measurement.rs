//! Measurement entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database row mapping for the plug_measurements table.
#[derive(Debug, Clone, FromRow)]
pub struct MeasurementEntity {
    pub id: i64,
    pub plug_id: i64,
    pub power: f64,
    pub voltage: f64,
    pub current: f64,
    pub temp_c: f64,
    pub temp_f: f64,
    pub created_at: DateTime<Utc>,
}

impl From<MeasurementEntity> for domain::models::Measurement {
    fn from(entity: MeasurementEntity) -> Self {
        Self {
            id: entity.id,
            plug_id: entity.plug_id,
            power: entity.power,
            voltage: entity.voltage,
            current: entity.current,
            temp_c: entity.temp_c,
            temp_f: entity.temp_f,
            created_at: entity.created_at,
        }
    }
}
