// ---------------------------------------------------------------------------
// HTTP API
// ---------------------------------------------------------------------------
//
// Handler modules are grouped by concern; this file owns the router.

mod ap_list;
mod assets;
mod attack;
pub mod state;

pub use attack::RUN_ATTACK_ACK;
pub use state::ApiState;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, head, post},
    Router,
};
use tower_http::trace::TraceLayer;
use wpt_telemetry::tracing_setup::request_id_middleware;

/// Build the control-plane router.
pub fn api_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(assets::index))
        .route("/reset", head(attack::reset))
        .route("/ap-list", get(ap_list::list_access_points))
        .route("/run-attack", post(attack::run_attack))
        .route("/status", get(attack::get_status))
        .route("/capture.pcap", get(assets::capture_pcap))
        .route("/capture.hccapx", get(assets::capture_hccapx))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
