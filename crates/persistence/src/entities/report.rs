//! Report entity (database row mapping).

use chrono::{DateTime, NaiveDate, Utc};
use domain::models::Summary;
use sqlx::types::Json;
use sqlx::FromRow;

/// Database row mapping for the plug_reports table.
///
/// The day's summaries are embedded verbatim as a JSONB array.
#[derive(Debug, Clone, FromRow)]
pub struct ReportEntity {
    pub id: i64,
    pub plug_id: i64,
    pub report_date: NaiveDate,
    pub summaries: Json<Vec<Summary>>,
    pub created_at: DateTime<Utc>,
}

impl From<ReportEntity> for domain::models::Report {
    fn from(entity: ReportEntity) -> Self {
        Self {
            id: entity.id,
            plug_id: entity.plug_id,
            report_date: entity.report_date,
            summaries: entity.summaries.0,
            created_at: entity.created_at,
        }
    }
}
