//! Collaborators that let the daemon run without Wi-Fi hardware.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use wpt_bridge::capture::CaptureSource;
use wpt_bridge::scan::{ApScanner, ScanError};
use wpt_core::config::{AssetsConfig, ScannerConfig};
use wpt_core::types::ApRecord;

/// Returns the configured access points after the configured delay.
#[derive(Debug, Clone)]
pub struct FixtureScanner {
    records: Vec<ApRecord>,
    latency: Duration,
}

impl FixtureScanner {
    pub fn new(records: Vec<ApRecord>, latency: Duration) -> Self {
        Self { records, latency }
    }

    pub fn from_config(config: &ScannerConfig) -> Self {
        Self::new(config.fixtures.clone(), config.latency())
    }
}

#[async_trait]
impl ApScanner for FixtureScanner {
    async fn scan(&self) -> Result<Vec<ApRecord>, ScanError> {
        tokio::time::sleep(self.latency).await;
        Ok(self.records.clone())
    }
}

/// Capture files read from disk on every request. A missing or unreadable
/// file is served as an empty body.
#[derive(Debug, Clone, Default)]
pub struct FileCaptures {
    pcap: Option<PathBuf>,
    hccapx: Option<PathBuf>,
}

impl FileCaptures {
    pub fn from_config(config: &AssetsConfig) -> Self {
        Self {
            pcap: config.pcap_path.clone(),
            hccapx: config.hccapx_path.clone(),
        }
    }
}

async fn read_or_empty(path: Option<&Path>) -> Vec<u8> {
    let Some(path) = path else {
        return Vec::new();
    };
    match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "capture not available");
            Vec::new()
        }
    }
}

#[async_trait]
impl CaptureSource for FileCaptures {
    async fn pcap(&self) -> Vec<u8> {
        read_or_empty(self.pcap.as_deref()).await
    }

    async fn hccapx(&self) -> Vec<u8> {
        read_or_empty(self.hccapx.as_deref()).await
    }
}
