use std::sync::Arc;

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};

use super::state::ApiState;
use crate::api_error::ApiError;

const OCTET_STREAM: &str = "application/octet-stream";

/// GET /
pub(crate) async fn index(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    let page = state
        .index_page
        .clone()
        .ok_or(ApiError::NotFound("index page"))?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/html"),
            (header::CONTENT_ENCODING, "gzip"),
        ],
        page,
    )
        .into_response())
}

/// GET /capture.pcap
pub(crate) async fn capture_pcap(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, OCTET_STREAM)], state.captures.pcap().await)
}

/// GET /capture.hccapx
pub(crate) async fn capture_hccapx(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, OCTET_STREAM)], state.captures.hccapx().await)
}
