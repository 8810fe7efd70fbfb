//! API response structures

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error};

use crate::error::Error;

/// Envelope wrapping every JSON response
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    /// Create a success response carrying `data`
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }
}

impl ApiResponse<()> {
    /// Create an error response
    pub fn error(code: &str, message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorBody {
                code: code.to_string(),
                message,
            }),
            timestamp: Utc::now(),
        }
    }
}

/// Service error rendered as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::RoomNotFound(_) | Error::TimerNotFound { .. } | Error::MessageNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            Error::CapacityExceeded { .. } => StatusCode::CONFLICT,
            Error::InvalidStateTransition { .. }
            | Error::MissingArgument(_)
            | Error::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Error::Store(_) | Error::RoomIdGeneration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if self.0.is_internal() {
            error!("Request failed: {}", self.0);
            "An unexpected error occurred".to_string()
        } else {
            debug!("Request rejected: {}", self.0);
            self.0.to_string()
        };

        (status, Json(ApiResponse::error(self.0.reason_code(), message))).into_response()
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub uptime: String,
    pub running_timers: usize,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok(uptime: String, running_timers: usize) -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime,
            running_timers,
        }
    }
}
