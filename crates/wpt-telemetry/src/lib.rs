//! Logging and request tracing for the control plane.
//!
//! - **Logging**: human-readable and JSON output via `tracing-subscriber`
//! - **Tracing**: axum middleware that tags every request with an `x-request-id`

pub mod logging;
pub mod tracing_setup;
