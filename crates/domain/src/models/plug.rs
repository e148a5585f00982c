//! Plug domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A network-attached smart plug known to the monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plug {
    pub id: i64,
    pub name: String,
    /// Base URL of the plug's control endpoint.
    pub url: String,
    /// When set, user-initiated remote toggles are refused.
    pub protected: bool,
    /// Last commanded on/off state.
    pub is_on: bool,
    /// Trailing average power (watts) at or below which the plug is switched off.
    pub auto_shutdown_threshold: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Plug {
    /// The threshold to evaluate, if this plug takes part in auto-shutdown right now.
    ///
    /// Plugs that are off or have no threshold configured are not evaluated.
    pub fn auto_shutdown_threshold_if_on(&self) -> Option<f64> {
        if self.is_on {
            self.auto_shutdown_threshold
        } else {
            None
        }
    }
}

/// Request payload for registering or updating a plug, keyed by URL.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpsertPlugRequest {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Name must be between 1 and 100 characters"
    ))]
    pub name: String,

    #[validate(custom(function = "shared::validation::validate_plug_url"))]
    pub url: String,

    #[serde(default)]
    pub protected: bool,

    #[validate(range(min = 0.0, message = "Threshold must be non-negative"))]
    pub auto_shutdown_threshold: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plug(is_on: bool, threshold: Option<f64>) -> Plug {
        Plug {
            id: 1,
            name: "Desk".to_string(),
            url: "http://10.0.0.2".to_string(),
            protected: false,
            is_on,
            auto_shutdown_threshold: threshold,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_threshold_only_when_on() {
        assert_eq!(plug(true, Some(5.0)).auto_shutdown_threshold_if_on(), Some(5.0));
        assert_eq!(plug(false, Some(5.0)).auto_shutdown_threshold_if_on(), None);
        assert_eq!(plug(true, None).auto_shutdown_threshold_if_on(), None);
    }

    #[test]
    fn test_upsert_request_validation() {
        let valid: UpsertPlugRequest = serde_json::from_value(serde_json::json!({
            "name": "Fridge",
            "url": "http://192.168.1.40",
            "autoShutdownThreshold": 3.5
        }))
        .unwrap();
        assert!(valid.validate().is_ok());
        assert!(!valid.protected);

        let bad_threshold = UpsertPlugRequest {
            auto_shutdown_threshold: Some(-1.0),
            ..valid.clone()
        };
        assert!(bad_threshold.validate().is_err());

        let bad_url = UpsertPlugRequest {
            url: "fridge".to_string(),
            ..valid.clone()
        };
        assert!(bad_url.validate().is_err());

        let bad_name = UpsertPlugRequest {
            name: String::new(),
            ..valid
        };
        assert!(bad_name.validate().is_err());
    }

    #[test]
    fn test_plug_serializes_camel_case() {
        let json = serde_json::to_value(plug(true, None)).unwrap();
        assert_eq!(json["isOn"], true);
        assert!(json["autoShutdownThreshold"].is_null());
    }
}
