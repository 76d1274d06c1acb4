//! Scan Relay Pipeline.
//!
//! A scan result is delivered twice: as the JSON body of the `/ap-list`
//! response, and afterwards as a paced frame sequence over the secondary
//! radio. The radio half runs on its own task and never holds up the HTTP
//! response.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use wpt_core::config::RelayConfig;
use wpt_core::types::ApRecord;

use crate::protocol::RelayMessage;
use crate::transport::SecondaryRadio;

// ---------------------------------------------------------------------------
// Scanner seam
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    #[error("scan failed: {0}")]
    Failed(String),

    #[error("radio busy")]
    Busy,
}

/// The primary radio's access point scan. May take several seconds.
#[async_trait]
pub trait ApScanner: Send + Sync + 'static {
    async fn scan(&self) -> Result<Vec<ApRecord>, ScanError>;
}

// ---------------------------------------------------------------------------
// JSON projection
// ---------------------------------------------------------------------------

pub fn record_to_json(record: &ApRecord) -> Value {
    json!({
        "ssid": record.ssid,
        "bssid": record.bssid.to_string(),
        "rssi": record.rssi,
        "auth_mode": record.auth_mode.name(),
        "hidden": record.is_hidden(),
    })
}

/// One object per record, in scan order.
pub fn to_json_array(records: &[ApRecord]) -> Value {
    Value::Array(records.iter().map(record_to_json).collect())
}

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySettings {
    pub frame_mtu: usize,
    /// Minimum gap between consecutive frames.
    pub pacing: Duration,
    /// Named in the announcement frame.
    pub endpoint: String,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self::from(&RelayConfig::default())
    }
}

impl From<&RelayConfig> for RelaySettings {
    fn from(config: &RelayConfig) -> Self {
        Self {
            frame_mtu: config.frame_mtu,
            pacing: config.pacing(),
            endpoint: config.endpoint.clone(),
        }
    }
}

/// Outcome of one relay run. Send failures are counted, not raised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub frames_sent: usize,
    pub frames_failed: usize,
    pub records_relayed: usize,
}

/// Clones share the radio and its airtime slot: relay runs from any clone
/// go out one after another, paced across run boundaries too.
#[derive(Clone)]
pub struct ScanRelayPipeline {
    scanner: Arc<dyn ApScanner>,
    radio: Arc<dyn SecondaryRadio>,
    settings: Arc<RelaySettings>,
    /// Held for a whole relay run; records when the last frame went out.
    airtime: Arc<Mutex<Option<Instant>>>,
}

impl ScanRelayPipeline {
    pub fn new(
        scanner: Arc<dyn ApScanner>,
        radio: Arc<dyn SecondaryRadio>,
        settings: RelaySettings,
    ) -> Self {
        Self {
            scanner,
            radio,
            settings: Arc::new(settings),
            airtime: Arc::new(Mutex::new(None)),
        }
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    pub async fn trigger_scan(&self) -> Result<Vec<ApRecord>, ScanError> {
        let started = tokio::time::Instant::now();
        let records = self.scanner.scan().await?;
        tracing::info!(
            records = records.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "access point scan complete"
        );
        Ok(records)
    }

    /// Send announcement, count, one frame per record and the completion
    /// sentinel, in that order, waiting `pacing` between frames.
    ///
    /// A run that starts while another is in progress waits for it to
    /// finish, so sequences never interleave on the radio.
    pub async fn relay_over_secondary_channel(&self, records: &[ApRecord]) -> RelayReport {
        let mut last_frame = self.airtime.lock().await;
        let total = records.len();
        let messages = std::iter::once(RelayMessage::Endpoint(&self.settings.endpoint))
            .chain(std::iter::once(RelayMessage::Count(total)))
            .chain(records.iter().map(RelayMessage::Record))
            .chain(std::iter::once(RelayMessage::Done(total)));

        let mut report = RelayReport::default();
        for (index, message) in messages.enumerate() {
            if let Some(previous) = *last_frame {
                tokio::time::sleep_until(previous + self.settings.pacing).await;
            }
            let sent = match message.encode(self.settings.frame_mtu) {
                Ok(frame) => self.radio.send(&frame).await,
                Err(e) => Err(e),
            };
            match sent {
                Ok(()) => {
                    report.frames_sent += 1;
                    if matches!(message, RelayMessage::Record(_)) {
                        report.records_relayed += 1;
                    }
                }
                Err(e) => {
                    report.frames_failed += 1;
                    tracing::warn!(frame = index, error = %e, "relay frame dropped");
                }
            }
            *last_frame = Some(Instant::now());
        }

        tracing::info!(
            radio = %self.radio.kind(),
            records = total,
            sent = report.frames_sent,
            failed = report.frames_failed,
            "secondary relay finished"
        );
        report
    }

    /// Relay `records` on a background task once `flushed` fires (or its
    /// sender is dropped).
    pub fn spawn_relay(
        &self,
        records: Vec<ApRecord>,
        flushed: oneshot::Receiver<()>,
    ) -> JoinHandle<RelayReport> {
        let pipeline = self.clone();
        tokio::spawn(async move {
            let _ = flushed.await;
            pipeline.relay_over_secondary_channel(&records).await
        })
    }

    /// Scan and relay with no HTTP response in between. Used for remote
    /// `["ap-list"]` requests.
    pub async fn list_and_relay(&self) -> Result<RelayReport, ScanError> {
        let records = self.trigger_scan().await?;
        Ok(self.relay_over_secondary_channel(&records).await)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
