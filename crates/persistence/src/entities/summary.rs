//! Summary entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database row mapping for the plug_summaries table.
#[derive(Debug, Clone, FromRow)]
pub struct SummaryEntity {
    pub id: i64,
    pub plug_id: i64,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub count_measurements: i64,
    pub power_sum: f64,
    pub power_avg: f64,
    pub voltage_avg: f64,
    pub current_avg: f64,
    pub temp_c_avg: f64,
    pub temp_f_avg: f64,
    pub created_at: DateTime<Utc>,
}

impl From<SummaryEntity> for domain::models::Summary {
    fn from(entity: SummaryEntity) -> Self {
        Self {
            id: entity.id,
            plug_id: entity.plug_id,
            start_at: entity.start_at,
            end_at: entity.end_at,
            count_measurements: entity.count_measurements,
            power_sum: entity.power_sum,
            power_avg: entity.power_avg,
            voltage_avg: entity.voltage_avg,
            current_avg: entity.current_avg,
            temp_c_avg: entity.temp_c_avg,
            temp_f_avg: entity.temp_f_avg,
            created_at: entity.created_at,
        }
    }
}
