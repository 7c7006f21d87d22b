//! Response types for the payroll engine API.
//!
//! This module defines the error response structures and the mapping from
//! [`EngineError`] to HTTP status codes.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, ErrorKind};

/// API error response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional details about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Creates a new API error with details.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: Some(details.into()),
        }
    }

    /// Creates a validation error response.
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    /// Creates a malformed JSON error response.
    pub fn malformed_json(message: impl Into<String>) -> Self {
        Self::new("MALFORMED_JSON", message)
    }

    /// Creates an error for a pay period path segment that is not `YYYY-MM`.
    pub fn invalid_pay_period(value: &str) -> Self {
        Self::with_details(
            "INVALID_PAY_PERIOD",
            format!("Invalid pay period: {}", value),
            "Pay periods are written as YYYY-MM",
        )
    }

    /// Creates an error for an advance id that is not a UUID.
    pub fn invalid_advance_id(value: &str) -> Self {
        Self::new("INVALID_ADVANCE_ID", format!("Invalid advance id: {}", value))
    }
}

/// API error with HTTP status code.
pub struct ApiErrorResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The error body.
    pub error: ApiError,
}

impl ApiErrorResponse {
    /// A 400 response for an unreadable request.
    pub fn bad_request(error: ApiError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error,
        }
    }

    /// A 422 response for a well-formed but unacceptable request.
    pub fn unprocessable(error: ApiError) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            error,
        }
    }

    /// A 404 response.
    pub fn not_found(error: ApiError) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error,
        }
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}

impl From<EngineError> for ApiErrorResponse {
    fn from(error: EngineError) -> Self {
        let status = match (&error, error.kind()) {
            (EngineError::EmployeeNotFound { .. } | EngineError::AdvanceNotFound { .. }, _) => {
                StatusCode::NOT_FOUND
            }
            (_, ErrorKind::Validation) => StatusCode::UNPROCESSABLE_ENTITY,
            (_, ErrorKind::Concurrency) => StatusCode::CONFLICT,
            (
                _,
                ErrorKind::Computation | ErrorKind::Persistence | ErrorKind::Configuration,
            ) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let error = match error.kind() {
            ErrorKind::Computation => ApiError::with_details(
                error.reason_code(),
                "Calculation failed",
                error.to_string(),
            ),
            ErrorKind::Configuration => ApiError::with_details(
                error.reason_code(),
                "Configuration error",
                error.to_string(),
            ),
            _ => ApiError::new(error.reason_code(), error.to_string()),
        };

        ApiErrorResponse { status, error }
    }
}
