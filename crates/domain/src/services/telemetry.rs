//! Device telemetry client contract.
//!
//! Provides the abstraction the pipeline uses to read and toggle plugs.

use std::collections::HashMap;
use std::sync::Mutex;

use thiserror::Error;

use crate::models::TelemetryReading;

/// Errors reported by a device telemetry client.
///
/// Every variant means "no reading this cycle"; none is fatal.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TelemetryError {
    #[error("Device request timed out")]
    Timeout,

    #[error("Device unreachable: {0}")]
    Unreachable(String),

    #[error("Device responded with HTTP {0}")]
    Status(u16),

    #[error("Invalid device response: {0}")]
    InvalidResponse(String),
}

/// Result of a toggle command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub was_on_before_toggle: bool,
}

impl ToggleOutcome {
    /// The state the device is in after the toggle.
    pub fn is_on_now(&self) -> bool {
        !self.was_on_before_toggle
    }
}

/// Client for reading telemetry from and toggling a plug.
#[async_trait::async_trait]
pub trait TelemetryClient: Send + Sync {
    /// Read current telemetry from the plug at `url`.
    async fn get_status(&self, url: &str) -> Result<TelemetryReading, TelemetryError>;

    /// Flip the relay of the plug at `url`.
    async fn toggle(&self, url: &str) -> Result<ToggleOutcome, TelemetryError>;
}

/// Scripted telemetry client for development and testing.
///
/// Unscripted URLs are unreachable for status reads. Unscripted toggles
/// report a plug that was on.
#[derive(Debug, Default)]
pub struct MockTelemetryClient {
    readings: Mutex<HashMap<String, Result<TelemetryReading, TelemetryError>>>,
    toggles: Mutex<HashMap<String, Result<ToggleOutcome, TelemetryError>>>,
    status_calls: Mutex<Vec<String>>,
    toggle_calls: Mutex<Vec<String>>,
}

impl MockTelemetryClient {
    /// Create a new mock client with nothing scripted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the status response for `url`.
    pub fn with_reading(self, url: &str, reading: TelemetryReading) -> Self {
        self.set_status(url, Ok(reading));
        self
    }

    /// Script a status failure for `url`.
    pub fn with_status_error(self, url: &str, error: TelemetryError) -> Self {
        self.set_status(url, Err(error));
        self
    }

    /// Script the toggle response for `url`.
    pub fn with_toggle(self, url: &str, outcome: Result<ToggleOutcome, TelemetryError>) -> Self {
        lock(&self.toggles).insert(url.to_string(), outcome);
        self
    }

    pub fn set_status(&self, url: &str, response: Result<TelemetryReading, TelemetryError>) {
        lock(&self.readings).insert(url.to_string(), response);
    }

    /// URLs passed to `get_status`, in call order.
    pub fn status_calls(&self) -> Vec<String> {
        lock(&self.status_calls).clone()
    }

    /// URLs passed to `toggle`, in call order.
    pub fn toggle_calls(&self) -> Vec<String> {
        lock(&self.toggle_calls).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait::async_trait]
impl TelemetryClient for MockTelemetryClient {
    async fn get_status(&self, url: &str) -> Result<TelemetryReading, TelemetryError> {
        lock(&self.status_calls).push(url.to_string());
        lock(&self.readings)
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(TelemetryError::Unreachable(url.to_string())))
    }

    async fn toggle(&self, url: &str) -> Result<ToggleOutcome, TelemetryError> {
        lock(&self.toggle_calls).push(url.to_string());
        let outcome = lock(&self.toggles).get(url).cloned().unwrap_or(Ok(ToggleOutcome {
            was_on_before_toggle: true,
        }));
        tracing::debug!(url = %url, outcome = ?outcome, "Mock: toggled plug");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(power: f64) -> TelemetryReading {
        TelemetryReading {
            on: true,
            power,
            voltage: 230.0,
            current: 0.1,
            temp_c: 25.0,
            temp_f: 77.0,
        }
    }

    #[test]
    fn test_toggle_outcome_state() {
        assert!(!ToggleOutcome { was_on_before_toggle: true }.is_on_now());
        assert!(ToggleOutcome { was_on_before_toggle: false }.is_on_now());
    }

    #[tokio::test]
    async fn test_mock_scripted_status() {
        let client = MockTelemetryClient::new()
            .with_reading("http://a", reading(5.0))
            .with_status_error("http://b", TelemetryError::Timeout);

        assert_eq!(client.get_status("http://a").await, Ok(reading(5.0)));
        assert_eq!(client.get_status("http://b").await, Err(TelemetryError::Timeout));
        assert!(matches!(
            client.get_status("http://c").await,
            Err(TelemetryError::Unreachable(_))
        ));
        assert_eq!(client.status_calls(), vec!["http://a", "http://b", "http://c"]);
    }

    #[tokio::test]
    async fn test_mock_toggle_defaults_to_was_on() {
        let client = MockTelemetryClient::new().with_toggle(
            "http://b",
            Ok(ToggleOutcome {
                was_on_before_toggle: false,
            }),
        );

        let a = client.toggle("http://a").await.unwrap();
        assert!(a.was_on_before_toggle);
        let b = client.toggle("http://b").await.unwrap();
        assert!(!b.was_on_before_toggle);
        assert_eq!(client.toggle_calls(), vec!["http://a", "http://b"]);
    }
}
