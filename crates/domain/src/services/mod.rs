//! Collaborator contracts for the plug monitor.
//!
//! The pipeline reaches storage and devices only through these traits.

pub mod memory;
pub mod store;
pub mod telemetry;

pub use memory::{InMemoryStore, StoreOp};
pub use store::{PlugRegistry, StoreError, TelemetryStore};
pub use telemetry::{MockTelemetryClient, TelemetryClient, TelemetryError, ToggleOutcome};
