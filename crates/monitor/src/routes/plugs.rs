//! Plug management, control, and telemetry read endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use domain::models::{Plug, Report, Summary, UpsertPlugRequest};
use serde::{Deserialize, Serialize};
use shared::time::TimeWindow;
use tracing::info;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::services::ToggleOrigin;

#[derive(Debug, Serialize)]
pub struct ListPlugsResponse {
    pub plugs: Vec<Plug>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleResponse {
    pub plug_id: i64,
    pub was_on_before_toggle: bool,
    pub is_on: bool,
}

/// Half-open window `[from, to)` over summary start times.
#[derive(Debug, Deserialize)]
pub struct SummariesQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ListSummariesResponse {
    pub window: TimeWindow,
    pub summaries: Vec<Summary>,
}

async fn require_plug(state: &AppState, plug_id: i64) -> Result<Plug, ApiError> {
    state
        .registry
        .find_plug(plug_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Plug {} not found", plug_id)))
}

/// GET /api/v1/plugs
pub async fn list_plugs(State(state): State<AppState>) -> Result<Json<ListPlugsResponse>, ApiError> {
    let plugs = state.registry.list_plugs().await?;
    Ok(Json(ListPlugsResponse { plugs }))
}

/// Register a plug, or update the one with the same URL.
///
/// PUT /api/v1/plugs
pub async fn upsert_plug(
    State(state): State<AppState>,
    Json(request): Json<UpsertPlugRequest>,
) -> Result<Json<Plug>, ApiError> {
    request.validate()?;

    let plug = state.registry.upsert_plug(&request).await?;
    info!(
        plug_id = plug.id,
        plug_name = %plug.name,
        protected = plug.protected,
        threshold = ?plug.auto_shutdown_threshold,
        "Plug upserted"
    );
    Ok(Json(plug))
}

/// POST /api/v1/plugs/:plug_id/toggle
pub async fn toggle_plug(
    State(state): State<AppState>,
    Path(plug_id): Path<i64>,
) -> Result<Json<ToggleResponse>, ApiError> {
    let plug = require_plug(&state, plug_id).await?;
    let outcome = state.control.toggle(&plug, ToggleOrigin::User).await?;

    Ok(Json(ToggleResponse {
        plug_id,
        was_on_before_toggle: outcome.was_on_before_toggle,
        is_on: outcome.is_on_now(),
    }))
}

/// GET /api/v1/plugs/:plug_id/summaries?from=<rfc3339>&to=<rfc3339>
pub async fn list_summaries(
    State(state): State<AppState>,
    Path(plug_id): Path<i64>,
    Query(query): Query<SummariesQuery>,
) -> Result<Json<ListSummariesResponse>, ApiError> {
    let window = TimeWindow::new(query.from, query.to)
        .map_err(|e| ApiError::Validation(e.to_string(), Vec::new()))?;
    require_plug(&state, plug_id).await?;

    let summaries = state.store.find_summaries(plug_id, &window).await?;
    Ok(Json(ListSummariesResponse { window, summaries }))
}

/// GET /api/v1/plugs/:plug_id/reports/:date
pub async fn get_report(
    State(state): State<AppState>,
    Path((plug_id, date)): Path<(i64, NaiveDate)>,
) -> Result<Json<Report>, ApiError> {
    require_plug(&state, plug_id).await?;

    state
        .store
        .find_report(plug_id, date)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No report for plug {} on {}", plug_id, date)))
}
