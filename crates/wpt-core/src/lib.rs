//! Core domain types and configuration for the Wi-Fi pentest control plane.
//!
//! Everything here is runtime-agnostic: the attack command and status
//! model shared by the HTTP gateway, the attack engine and the secondary
//! radio relay, plus the TOML configuration loaded by the daemon.

pub mod config;
pub mod types;
