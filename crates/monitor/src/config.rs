use serde::Deserialize;
use std::net::{AddrParseError, SocketAddr};
use std::time::Duration;

use crate::jobs::scheduler::parse_schedule;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub telemetry: TelemetryConfig,
    pub schedule: ScheduleConfig,
    pub aggregation: AggregationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Allowed CORS origins; empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn pool_config(&self) -> persistence::db::DatabaseConfig {
        persistence::db::DatabaseConfig {
            url: self.url.clone(),
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            connect_timeout_secs: self.connect_timeout_secs,
            idle_timeout_secs: self.idle_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Plug firmware client settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Per-request timeout for plug calls in milliseconds
    #[serde(default = "default_telemetry_timeout_ms")]
    pub timeout_ms: u64,
}

impl TelemetryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Six-field cron expressions (seconds first), evaluated in local time.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_fetch_measurement_cron")]
    pub fetch_measurement: String,

    #[serde(default = "default_create_summary_cron")]
    pub create_summary: String,

    #[serde(default = "default_create_report_cron")]
    pub create_report: String,

    #[serde(default = "default_auto_shutdown_cron")]
    pub auto_shutdown: String,

    #[serde(default = "default_pool_metrics_cron")]
    pub pool_metrics: String,
}

impl ScheduleConfig {
    /// Job name and expression pairs, in registration order.
    pub fn entries(&self) -> [(&'static str, &str); 5] {
        [
            ("fetch_measurement", self.fetch_measurement.as_str()),
            ("create_summary", self.create_summary.as_str()),
            ("create_report", self.create_report.as_str()),
            ("auto_shutdown", self.auto_shutdown.as_str()),
            ("pool_metrics", self.pool_metrics.as_str()),
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregationConfig {
    /// Width of one summary window in seconds
    #[serde(default = "default_summary_window_secs")]
    pub summary_window_secs: i64,

    /// Trailing window evaluated by auto-shutdown, in minutes
    #[serde(default = "default_auto_shutdown_window_minutes")]
    pub auto_shutdown_window_minutes: i64,
}

impl AggregationConfig {
    pub fn summary_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.summary_window_secs)
    }

    pub fn auto_shutdown_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.auto_shutdown_window_minutes)
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    5
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_telemetry_timeout_ms() -> u64 {
    2000
}
fn default_fetch_measurement_cron() -> String {
    "* * * * * *".to_string()
}
fn default_create_summary_cron() -> String {
    "0 * * * * *".to_string()
}
fn default_create_report_cron() -> String {
    "0 5 0 * * *".to_string()
}
fn default_auto_shutdown_cron() -> String {
    "30 * * * * *".to_string()
}
fn default_pool_metrics_cron() -> String {
    "*/10 * * * * *".to_string()
}
fn default_summary_window_secs() -> i64 {
    60
}
fn default_auto_shutdown_window_minutes() -> i64 {
    15
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with PM__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("PM").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// Builds the config from embedded defaults so tests do not depend on
    /// the working directory.
    #[cfg(test)]
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [server]
            host = "0.0.0.0"
            port = 8080
            request_timeout_secs = 30

            [database]
            url = ""
            max_connections = 20
            min_connections = 5
            connect_timeout_secs = 10
            idle_timeout_secs = 600

            [logging]
            level = "info"
            format = "json"

            [telemetry]
            timeout_ms = 2000

            [schedule]
            fetch_measurement = "* * * * * *"
            create_summary = "0 * * * * *"
            create_report = "0 5 0 * * *"
            auto_shutdown = "30 * * * * *"
            pool_metrics = "*/10 * * * * *"

            [aggregation]
            summary_window_secs = 60
            auto_shutdown_window_minutes = 15
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        // Skip validation in tests to allow partial configs
        Ok(cfg)
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<(), ConfigValidationError> {
        // Database URL is required
        if self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "PM__DATABASE__URL environment variable must be set".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        if self.telemetry.timeout_ms == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "telemetry.timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.aggregation.summary_window_secs <= 0 {
            return Err(ConfigValidationError::InvalidValue(
                "aggregation.summary_window_secs must be positive".to_string(),
            ));
        }

        if self.aggregation.auto_shutdown_window_minutes <= 0 {
            return Err(ConfigValidationError::InvalidValue(
                "aggregation.auto_shutdown_window_minutes must be positive".to_string(),
            ));
        }

        for (job, expression) in self.schedule.entries() {
            parse_schedule(job, expression)
                .map_err(|e| ConfigValidationError::InvalidValue(e.to_string()))?;
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }
}
