use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

use domain::services::{PlugRegistry, TelemetryClient, TelemetryStore};
use persistence::PgStore;
use plug_monitor::app::{create_app, AppState};
use plug_monitor::config::Config;
use plug_monitor::jobs::{
    AutoShutdownJob, CreateReportJob, CreateSummaryJob, FetchMeasurementJob, JobScheduler,
    PoolMetricsJob,
};
use plug_monitor::logging;
use plug_monitor::services::{PlugControlService, ShellyClient};

/// Upper bound on waiting for in-flight jobs at exit.
const JOB_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;
    logging::init_logging(&config.logging)?;

    info!("Starting Plug Monitor v{}", env!("CARGO_PKG_VERSION"));

    let metrics = PrometheusBuilder::new()
        .set_buckets(&[0.001, 0.005, 0.01, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0])?
        .install_recorder()?;

    let pool = persistence::db::create_pool(&config.database.pool_config()).await?;

    info!("Running database migrations...");
    persistence::db::run_migrations(&pool).await?;
    info!("Migrations completed");

    // One instance of each collaborator for the whole process.
    let store = Arc::new(PgStore::new(pool.clone()));
    let registry: Arc<dyn PlugRegistry> = store.clone();
    let telemetry_store: Arc<dyn TelemetryStore> = store;
    let client: Arc<dyn TelemetryClient> = Arc::new(ShellyClient::new(config.telemetry.timeout())?);
    let control = Arc::new(PlugControlService::new(registry.clone(), client.clone()));

    let schedule = &config.schedule;
    let aggregation = &config.aggregation;
    let mut scheduler = JobScheduler::new();
    scheduler.register(
        "fetch_measurement",
        &schedule.fetch_measurement,
        FetchMeasurementJob::new(registry.clone(), telemetry_store.clone(), client),
    )?;
    scheduler.register(
        "create_summary",
        &schedule.create_summary,
        CreateSummaryJob::new(
            registry.clone(),
            telemetry_store.clone(),
            aggregation.summary_window(),
        ),
    )?;
    scheduler.register(
        "create_report",
        &schedule.create_report,
        CreateReportJob::new(registry.clone(), telemetry_store.clone()),
    )?;
    scheduler.register(
        "auto_shutdown",
        &schedule.auto_shutdown,
        AutoShutdownJob::new(
            registry.clone(),
            telemetry_store.clone(),
            control.clone(),
            aggregation.auto_shutdown_window(),
        ),
    )?;
    scheduler.register(
        "pool_metrics",
        &schedule.pool_metrics,
        PoolMetricsJob::new(pool.clone()),
    )?;
    scheduler.start();

    let state = AppState {
        registry,
        store: telemetry_store,
        control,
        metrics: Some(metrics),
    };
    let app = create_app(state, &config.server);

    let addr = config.socket_addr()?;
    info!("Server listening on {}", addr);

    let mut sigterm = signal(SignalKind::terminate())?;
    let shutdown = async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
        info!("Shutdown signal received");
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    scheduler.shutdown();
    scheduler.wait_for_shutdown(JOB_SHUTDOWN_TIMEOUT).await;
    pool.close().await;

    info!("Shutdown complete");
    Ok(())
}
