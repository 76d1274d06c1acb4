use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use super::state::ApiState;
use crate::api_error::ApiError;
use crate::gateway::{CommandError, GatewayError};
use crate::status::StatusBody;

pub const RUN_ATTACK_ACK: &str = "Attack request received successfully";

/// HEAD /reset
pub(crate) async fn reset(State(state): State<Arc<ApiState>>) -> Result<StatusCode, ApiError> {
    state.gateway.reset().await?;
    Ok(StatusCode::OK)
}

/// POST /run-attack
///
/// Returns as soon as the request is queued for the engine. The body is
/// read up to the gateway's limit; anything longer is an allocation
/// failure, answered like every other rejected command.
pub(crate) async fn run_attack(
    State(state): State<Arc<ApiState>>,
    body: Body,
) -> Result<impl IntoResponse, ApiError> {
    let limit = state.gateway.max_body_bytes();
    let body = axum::body::to_bytes(body, limit).await.map_err(|e| {
        tracing::debug!(error = %e, limit, "run-attack body not buffered");
        GatewayError::from(CommandError::Allocation { limit })
    })?;
    state.gateway.submit_command(&body).await?;
    Ok(([(header::CONTENT_TYPE, "text/plain")], RUN_ATTACK_ACK))
}

/// GET /status
pub(crate) async fn get_status(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    Ok(match state.reporter.render()? {
        StatusBody::Binary(bytes) => {
            ([(header::CONTENT_TYPE, "application/octet-stream")], bytes).into_response()
        }
        StatusBody::Json(value) => Json(value).into_response(),
    })
}
