use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::ApRecord;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "WPT_CONFIG";

/// Smallest frame the relay can fit a full access point record into.
pub const MIN_FRAME_MTU: usize = 64;

/// Top-level configuration loaded from `wpt.toml`.
///
/// Every section falls back to its defaults, so an empty file is a valid
/// configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub listener: ListenerConfig,
    #[serde(default)]
    pub radio: RadioConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load config from `$WPT_CONFIG`, else `./wpt.toml`, falling back to
    /// defaults when neither exists.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::load_from(path);
        }
        let path = Path::new("wpt.toml");
        if path.exists() {
            Self::load_from(path)
        } else {
            tracing::info!("no wpt.toml found, using defaults");
            let cfg = Config::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let cfg: Config = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Semantic validation for settings that are not fully expressible via type checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.max_body_bytes == 0 {
            return Err(ConfigError::Validation(
                "http.max_body_bytes must be greater than zero".into(),
            ));
        }
        if self.bus.capacity == 0 {
            return Err(ConfigError::Validation(
                "bus.capacity must be greater than zero".into(),
            ));
        }
        if self.relay.frame_mtu < MIN_FRAME_MTU {
            return Err(ConfigError::Validation(format!(
                "relay.frame_mtu must be at least {MIN_FRAME_MTU}, got {}",
                self.relay.frame_mtu
            )));
        }
        if self.relay.pacing_ms == 0 {
            return Err(ConfigError::Validation(
                "relay.pacing_ms must be greater than zero".into(),
            ));
        }
        if self.listener.idle_ms == 0 {
            return Err(ConfigError::Validation(
                "listener.idle_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
    #[error("validation: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Section structs
// ---------------------------------------------------------------------------

/// Wire form served on `/status`. One per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StatusFormat {
    #[default]
    Binary,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
    /// Largest `/run-attack` body accepted before it is rejected.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default)]
    pub status_format: StatusFormat,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_http_host(),
            port: default_http_port(),
            max_body_bytes: default_max_body_bytes(),
            status_format: StatusFormat::default(),
        }
    }
}

fn default_http_host() -> String {
    "0.0.0.0".into()
}
fn default_http_port() -> u16 {
    80
}
fn default_max_body_bytes() -> usize {
    2048
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Per-subscriber queue depth.
    #[serde(default = "default_bus_capacity")]
    pub capacity: usize,
    /// How long a publisher waits on a full queue before giving up.
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,
}

impl BusConfig {
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: default_bus_capacity(),
            publish_timeout_ms: default_publish_timeout_ms(),
        }
    }
}

fn default_bus_capacity() -> usize {
    16
}
fn default_publish_timeout_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_frame_mtu")]
    pub frame_mtu: usize,
    /// Airtime gap between consecutive relay frames.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
    /// Endpoint named in the announcement frame.
    #[serde(default = "default_relay_endpoint")]
    pub endpoint: String,
}

impl RelayConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            frame_mtu: default_frame_mtu(),
            pacing_ms: default_pacing_ms(),
            endpoint: default_relay_endpoint(),
        }
    }
}

fn default_frame_mtu() -> usize {
    255
}
fn default_pacing_ms() -> u64 {
    100
}
fn default_relay_endpoint() -> String {
    "/ap-list".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    #[serde(default = "default_detected_settle_secs")]
    pub detected_settle_secs: u64,
    #[serde(default = "default_ap_list_settle_secs")]
    pub ap_list_settle_secs: u64,
    #[serde(default = "default_idle_ms")]
    pub idle_ms: u64,
}

impl ListenerConfig {
    pub fn detected_settle(&self) -> Duration {
        Duration::from_secs(self.detected_settle_secs)
    }

    pub fn ap_list_settle(&self) -> Duration {
        Duration::from_secs(self.ap_list_settle_secs)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_millis(self.idle_ms)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            detected_settle_secs: default_detected_settle_secs(),
            ap_list_settle_secs: default_ap_list_settle_secs(),
            idle_ms: default_idle_ms(),
        }
    }
}

fn default_detected_settle_secs() -> u64 {
    30
}
fn default_ap_list_settle_secs() -> u64 {
    15
}
fn default_idle_ms() -> u64 {
    100
}

/// UDP endpoints standing in for the secondary radio link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadioConfig {
    #[serde(default = "default_radio_bind")]
    pub bind: SocketAddr,
    #[serde(default = "default_radio_peer")]
    pub peer: SocketAddr,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            bind: default_radio_bind(),
            peer: default_radio_peer(),
        }
    }
}

fn default_radio_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 7447))
}
fn default_radio_peer() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 7448))
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AssetsConfig {
    /// Pre-gzipped index page served on `/`.
    #[serde(default)]
    pub index_page_gz: Option<PathBuf>,
    #[serde(default)]
    pub pcap_path: Option<PathBuf>,
    #[serde(default)]
    pub hccapx_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Simulated scan duration.
    #[serde(default = "default_scan_latency_ms")]
    pub latency_ms: u64,
    #[serde(default)]
    pub fixtures: Vec<ApRecord>,
}

impl ScannerConfig {
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            latency_ms: default_scan_latency_ms(),
            fixtures: Vec::new(),
        }
    }
}

fn default_scan_latency_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
