//! Control plane and telemetry relay between clients, the attack engine
//! and the secondary radio link.
//!
//! Key modules:
//! - [`event_bus`]: bounded pub/sub carrying attack requests and resets
//! - [`gateway`]: validates control requests and publishes them
//! - [`status`]: engine-owned status board and its read-only projections
//! - [`scan`]: access point scan plus the paced secondary-radio relay
//! - [`listener`]: receive loop for remotely triggered commands
//! - [`http_api`]: Axum router exposing all of the above

pub mod api_error;
pub mod capture;
pub mod event_bus;
pub mod gateway;
pub mod http_api;
pub mod listener;
pub mod protocol;
pub mod scan;
pub mod shutdown;
pub mod status;
pub mod transport;
