//! Shelly Gen2 RPC telemetry client.
//!
//! Talks to the `Switch` component (id 0) of a plug over plain HTTP:
//! `Switch.GetStatus` for telemetry and `Switch.Toggle` for control.

use std::time::Duration;

use domain::models::TelemetryReading;
use domain::services::{TelemetryClient, TelemetryError, ToggleOutcome};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

/// `Switch.GetStatus` response; fields not used by the monitor are ignored.
#[derive(Debug, Deserialize)]
struct SwitchStatus {
    output: bool,
    apower: f64,
    voltage: f64,
    current: f64,
    temperature: SwitchTemperature,
}

#[derive(Debug, Deserialize)]
struct SwitchTemperature {
    #[serde(rename = "tC")]
    t_c: f64,
    #[serde(rename = "tF")]
    t_f: f64,
}

/// `Switch.Toggle` response.
#[derive(Debug, Deserialize)]
struct SwitchToggle {
    was_on: bool,
}

impl From<SwitchStatus> for TelemetryReading {
    fn from(status: SwitchStatus) -> Self {
        Self {
            on: status.output,
            power: status.apower,
            voltage: status.voltage,
            current: status.current,
            temp_c: status.temperature.t_c,
            temp_f: status.temperature.t_f,
        }
    }
}

/// HTTP client for Shelly Gen2 plugs.
#[derive(Debug, Clone)]
pub struct ShellyClient {
    client: Client,
}

impl ShellyClient {
    /// Create a client whose every request is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    fn endpoint(base_url: &str, method: &str) -> String {
        format!("{}/rpc/{}?id=0", base_url.trim_end_matches('/'), method)
    }

    async fn call<T: DeserializeOwned>(&self, url: &str) -> Result<T, TelemetryError> {
        debug!(url = %url, "Calling plug RPC");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                TelemetryError::Timeout
            } else {
                TelemetryError::Unreachable(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelemetryError::Status(status.as_u16()));
        }

        response.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                TelemetryError::Timeout
            } else {
                TelemetryError::InvalidResponse(e.to_string())
            }
        })
    }
}

#[async_trait::async_trait]
impl TelemetryClient for ShellyClient {
    async fn get_status(&self, url: &str) -> Result<TelemetryReading, TelemetryError> {
        let status: SwitchStatus = self
            .call(&Self::endpoint(url, "Switch.GetStatus"))
            .await?;
        Ok(status.into())
    }

    async fn toggle(&self, url: &str) -> Result<ToggleOutcome, TelemetryError> {
        let toggle: SwitchToggle = self.call(&Self::endpoint(url, "Switch.Toggle")).await?;
        Ok(ToggleOutcome {
            was_on_before_toggle: toggle.was_on,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Json, Router};
    use serde_json::json;

    async fn serve_fake_plug() -> String {
        let app = Router::new()
            .route(
                "/ok/rpc/Switch.GetStatus",
                get(|| async {
                    Json(json!({
                        "id": 0,
                        "source": "init",
                        "output": true,
                        "apower": 8.5,
                        "voltage": 229.5,
                        "current": 0.25,
                        "aenergy": { "total": 11.679 },
                        "temperature": { "tC": 36.5, "tF": 97.7 }
                    }))
                }),
            )
            .route(
                "/ok/rpc/Switch.Toggle",
                get(|| async { Json(json!({ "was_on": true })) }),
            )
            .route(
                "/broken/rpc/Switch.GetStatus",
                get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
            )
            .route(
                "/garbled/rpc/Switch.GetStatus",
                get(|| async { Json(json!({ "output": "maybe" })) }),
            )
            .route(
                "/slow/rpc/Switch.GetStatus",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    Json(json!({}))
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client() -> ShellyClient {
        ShellyClient::new(Duration::from_millis(300)).unwrap()
    }

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        assert_eq!(
            ShellyClient::endpoint("http://10.0.0.7/", "Switch.Toggle"),
            "http://10.0.0.7/rpc/Switch.Toggle?id=0"
        );
    }

    #[tokio::test]
    async fn test_get_status_maps_fields() {
        let base = serve_fake_plug().await;
        let reading = client().get_status(&format!("{}/ok", base)).await.unwrap();

        assert_eq!(
            reading,
            TelemetryReading {
                on: true,
                power: 8.5,
                voltage: 229.5,
                current: 0.25,
                temp_c: 36.5,
                temp_f: 97.7,
            }
        );
    }

    #[tokio::test]
    async fn test_toggle_reports_previous_state() {
        let base = serve_fake_plug().await;
        let outcome = client().toggle(&format!("{}/ok", base)).await.unwrap();
        assert!(outcome.was_on_before_toggle);
        assert!(!outcome.is_on_now());
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let base = serve_fake_plug().await;
        let err = client()
            .get_status(&format!("{}/broken", base))
            .await
            .unwrap_err();
        assert_eq!(err, TelemetryError::Status(500));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let base = serve_fake_plug().await;
        let err = client()
            .get_status(&format!("{}/garbled", base))
            .await
            .unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_timeout() {
        let base = serve_fake_plug().await;
        let err = client()
            .get_status(&format!("{}/slow", base))
            .await
            .unwrap_err();
        assert_eq!(err, TelemetryError::Timeout);
    }

    #[tokio::test]
    async fn test_unreachable_plug() {
        let err = client()
            .get_status("http://127.0.0.1:1")
            .await
            .unwrap_err();
        assert!(matches!(err, TelemetryError::Unreachable(_)));
    }
}
