//! Remote Trigger Listener: a receive loop on the secondary radio that turns
//! inbound envelopes back into local commands.
//!
//! Each accepted envelope is handled on its own task, so the settle delay
//! and the downstream call never stall reception of the next frame.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use wpt_core::config::ListenerConfig;
use wpt_core::types::Command;

use crate::gateway::CommandGateway;
use crate::protocol::RemoteEnvelope;
use crate::scan::ScanRelayPipeline;
use crate::shutdown::ShutdownListener;
use crate::status::StatusReporter;
use crate::transport::{RelayFrame, SecondaryRadio};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerSettings {
    /// Wait before acting on `["detected", ...]`.
    pub detected_settle: Duration,
    /// Wait before acting on `["ap-list"]`.
    pub ap_list_settle: Duration,
    /// Sleep when no frame is pending.
    pub idle: Duration,
}

impl Default for ListenerSettings {
    fn default() -> Self {
        Self::from(&ListenerConfig::default())
    }
}

impl From<&ListenerConfig> for ListenerSettings {
    fn from(config: &ListenerConfig) -> Self {
        Self {
            detected_settle: config.detected_settle(),
            ap_list_settle: config.ap_list_settle(),
            idle: config.idle(),
        }
    }
}

#[derive(Clone)]
pub struct RemoteTriggerListener {
    radio: Arc<dyn SecondaryRadio>,
    gateway: CommandGateway,
    reporter: StatusReporter,
    pipeline: ScanRelayPipeline,
    settings: ListenerSettings,
}

impl RemoteTriggerListener {
    pub fn new(
        radio: Arc<dyn SecondaryRadio>,
        gateway: CommandGateway,
        reporter: StatusReporter,
        pipeline: ScanRelayPipeline,
        settings: ListenerSettings,
    ) -> Self {
        Self {
            radio,
            gateway,
            reporter,
            pipeline,
            settings,
        }
    }

    pub fn spawn(self, shutdown: ShutdownListener) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Receive until `shutdown` fires.
    pub async fn run(self, mut shutdown: ShutdownListener) {
        tracing::info!(radio = %self.radio.kind(), "remote trigger listener started");
        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                _ = self.receive_once() => {}
            }
        }
        tracing::info!("remote trigger listener stopped");
    }

    async fn receive_once(&self) {
        if let Err(e) = self.radio.start_receive().await {
            tracing::debug!(error = %e, "could not enter receive mode");
            tokio::time::sleep(self.settings.idle).await;
            return;
        }
        match self.radio.poll_frame().await {
            Ok(Some(frame)) => {
                self.handle_frame(&frame);
            }
            Ok(None) => tokio::time::sleep(self.settings.idle).await,
            Err(e) => {
                tracing::debug!(error = %e, "radio receive failed");
                tokio::time::sleep(self.settings.idle).await;
            }
        }
    }

    /// Decode one frame and, if it is a valid envelope, start handling it
    /// in the background. Invalid frames are dropped.
    pub fn handle_frame(&self, frame: &RelayFrame) -> Option<JoinHandle<()>> {
        let envelope = match RemoteEnvelope::decode(frame.payload()) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(error = %e, bytes = frame.len(), "dropping inbound frame");
                return None;
            }
        };

        let this = self.clone();
        Some(match envelope {
            RemoteEnvelope::Detected(command) => {
                tracing::info!(ssid = %command.ssid, "remote detection received");
                tokio::spawn(async move { this.on_detected(command).await })
            }
            RemoteEnvelope::ApListRequest => {
                tracing::info!("remote ap-list request received");
                tokio::spawn(async move { this.on_ap_list().await })
            }
        })
    }

    async fn on_detected(&self, command: Command) {
        tokio::time::sleep(self.settings.detected_settle).await;
        if let Err(e) = self.gateway.submit(command).await {
            tracing::warn!(error = %e, "remote attack request not delivered");
            return;
        }
        match self.reporter.get_status() {
            Ok(status) => tracing::info!(
                state = ?status.state(),
                content_size = status.content_size(),
                "status after remote request"
            ),
            Err(e) => tracing::debug!(error = %e, "status after remote request"),
        }
    }

    async fn on_ap_list(&self) {
        tokio::time::sleep(self.settings.ap_list_settle).await;
        match self.pipeline.list_and_relay().await {
            Ok(report) => {
                tracing::debug!(records = report.records_relayed, "remote ap-list served")
            }
            Err(e) => tracing::warn!(error = %e, "remote ap-list scan failed"),
        }
    }
}
