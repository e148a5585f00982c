use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::services::StoreError;
use serde::Serialize;
use thiserror::Error;

use crate::services::ControlError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String, Vec<ValidationDetail>),

    /// The plug itself failed to answer.
    #[error("Bad gateway: {0}")]
    BadGateway(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<ValidationDetail>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationDetail {
    pub field: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Validation(msg, details) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                msg,
                (!details.is_empty()).then_some(details),
            ),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "bad_gateway", msg, None),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(format!("Storage error: {}", err))
    }
}

impl From<ControlError> for ApiError {
    fn from(err: ControlError) -> Self {
        match err {
            ControlError::Protected(id) => {
                ApiError::Forbidden(format!("Plug {} is protected against remote toggling", id))
            }
            ControlError::Telemetry(e) => ApiError::BadGateway(e.to_string()),
            ControlError::Store(e) => e.into(),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details: Vec<ValidationDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| ValidationDetail {
                    field: field.to_string(),
                    message: e
                        .message
                        .clone()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();

        let message = if details.len() == 1 {
            details[0].message.clone()
        } else {
            format!("{} validation errors", details.len())
        };

        ApiError::Validation(message, details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::services::TelemetryError;
    use validator::Validate;

    #[test]
    fn test_api_error_forbidden() {
        let response = ApiError::Forbidden("protected".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_api_error_not_found() {
        let response = ApiError::NotFound("no report".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_api_error_internal() {
        let response = ApiError::Internal("db down".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_from_control_error() {
        let forbidden: ApiError = ControlError::Protected(3).into();
        assert!(matches!(forbidden, ApiError::Forbidden(_)));

        let gateway: ApiError = ControlError::Telemetry(TelemetryError::Timeout).into();
        assert!(matches!(gateway, ApiError::BadGateway(_)));
        assert_eq!(gateway.into_response().status(), StatusCode::BAD_GATEWAY);

        let internal: ApiError =
            ControlError::Store(StoreError::Unavailable("gone".to_string())).into();
        assert!(matches!(internal, ApiError::Internal(_)));
    }

    #[test]
    fn test_from_validation_errors() {
        let request = domain::models::UpsertPlugRequest {
            name: String::new(),
            url: "http://plug.local".to_string(),
            protected: false,
            auto_shutdown_threshold: None,
        };
        let error: ApiError = request.validate().unwrap_err().into();
        match error {
            ApiError::Validation(msg, details) => {
                assert_eq!(msg, "Name must be between 1 and 100 characters");
                assert_eq!(details.len(), 1);
                assert_eq!(details[0].field, "name");
            }
            other => panic!("Expected Validation error, got {:?}", other),
        }
    }
}
