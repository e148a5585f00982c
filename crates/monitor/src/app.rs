use axum::{
    routing::{get, post},
    Router,
};
use domain::services::{PlugRegistry, TelemetryStore};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::routes::{health, plugs};
use crate::services::PlugControlService;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<dyn PlugRegistry>,
    pub store: Arc<dyn TelemetryStore>,
    pub control: Arc<PlugControlService>,
    /// Absent when no Prometheus recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

pub fn create_app(state: AppState, server: &ServerConfig) -> Router {
    let cors = if server.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = server
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(health::metrics));

    let plug_routes = Router::new()
        .route("/api/v1/plugs", get(plugs::list_plugs).put(plugs::upsert_plug))
        .route("/api/v1/plugs/:plug_id/toggle", post(plugs::toggle_plug))
        .route("/api/v1/plugs/:plug_id/summaries", get(plugs::list_summaries))
        .route("/api/v1/plugs/:plug_id/reports/:date", get(plugs::get_report));

    Router::new()
        .merge(public_routes)
        .merge(plug_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(
            server.request_timeout_secs,
        )))
        .layer(cors)
        .with_state(state)
}
