use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use futures_util::StreamExt;
use tokio::sync::oneshot;

use super::state::ApiState;
use crate::api_error::ApiError;
use crate::scan::to_json_array;

/// Fires its channel when dropped. Held by the response body, so the
/// signal goes out once the server is done writing it.
struct NotifyOnDrop(Option<oneshot::Sender<()>>);

impl Drop for NotifyOnDrop {
    fn drop(&mut self) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(());
        }
    }
}

/// GET /ap-list
///
/// Scans, answers with the JSON array, then mirrors the same records over
/// the secondary radio after the body has been handed off.
pub(crate) async fn list_access_points(
    State(state): State<Arc<ApiState>>,
) -> Result<Response, ApiError> {
    let records = state.pipeline.trigger_scan().await?;
    let body = serde_json::to_vec(&to_json_array(&records))
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let (flushed_tx, flushed_rx) = oneshot::channel();
    state.pipeline.spawn_relay(records, flushed_rx);

    let guard = NotifyOnDrop(Some(flushed_tx));
    let stream = futures_util::stream::once(async move { Ok::<_, Infallible>(Bytes::from(body)) })
        .map(move |chunk| {
            let _held = &guard;
            chunk
        });

    Ok((
        [(header::CONTENT_TYPE, "application/json")],
        Body::from_stream(stream),
    )
        .into_response())
}
