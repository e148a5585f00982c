//! Domain layer for the plug monitor.
//!
//! This crate contains:
//! - Domain models (Plug, Measurement, Summary, Report)
//! - Aggregation rules shared by the pipeline jobs
//! - Contracts for the storage gateway and the device telemetry client

pub mod models;
pub mod services;
