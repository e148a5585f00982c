//! Plug firmware integration and plug control.

pub mod plug_control;
pub mod shelly;

pub use plug_control::{ControlError, PlugControlService, ToggleOrigin};
pub use shelly::ShellyClient;
