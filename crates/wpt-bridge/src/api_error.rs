//! HTTP error responses.
//!
//! Clients only ever see a fixed message per status code. The underlying
//! cause is logged here and never echoed back.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::scan::ScanError;
use crate::status::StatusUnavailable;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(&'static str),

    /// A control request failed validation or could not be published.
    #[error("request rejected: {0}")]
    Rejected(#[from] GatewayError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    /// The attack engine has not published a status yet.
    #[error(transparent)]
    Unavailable(#[from] StatusUnavailable),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Rejected(_) | ApiError::Scan(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not found",
            ApiError::Unavailable(_) => "status unavailable",
            ApiError::Rejected(_) | ApiError::Scan(_) | ApiError::Internal(_) => {
                "internal server error"
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            ApiError::NotFound(_) => tracing::debug!(error = %self, "request failed"),
            _ => tracing::warn!(error = %self, status = status.as_u16(), "request failed"),
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}
