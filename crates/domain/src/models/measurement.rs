//! Raw telemetry measurement model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::time::truncate_to_second;

/// Normalized telemetry read from a plug's firmware.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryReading {
    pub on: bool,
    pub power: f64,
    pub voltage: f64,
    pub current: f64,
    pub temp_c: f64,
    pub temp_f: f64,
}

/// A stored raw measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub id: i64,
    pub plug_id: i64,
    pub power: f64,
    pub voltage: f64,
    pub current: f64,
    pub temp_c: f64,
    pub temp_f: f64,
    pub created_at: DateTime<Utc>,
}

/// A measurement ready to be appended.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMeasurement {
    pub power: f64,
    pub voltage: f64,
    pub current: f64,
    pub temp_c: f64,
    pub temp_f: f64,
    /// Always a whole second; `(plug, created_at)` is the write key.
    pub created_at: DateTime<Utc>,
}

impl NewMeasurement {
    /// Build a measurement from a reading observed at `observed_at`.
    pub fn from_reading(reading: &TelemetryReading, observed_at: DateTime<Utc>) -> Self {
        Self {
            power: reading.power,
            voltage: reading.voltage,
            current: reading.current,
            temp_c: reading.temp_c,
            temp_f: reading.temp_f,
            created_at: truncate_to_second(observed_at),
        }
    }
}
