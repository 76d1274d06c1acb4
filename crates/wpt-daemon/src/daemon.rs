use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use tracing::{debug, error, info, warn};
use wpt_bridge::capture::CaptureSource;
use wpt_bridge::event_bus::EventBus;
use wpt_bridge::gateway::CommandGateway;
use wpt_bridge::http_api::{api_router, ApiState};
use wpt_bridge::listener::{ListenerSettings, RemoteTriggerListener};
use wpt_bridge::scan::{ApScanner, RelaySettings, ScanRelayPipeline};
use wpt_bridge::shutdown::ShutdownSignal;
use wpt_bridge::status::{status_channel, StatusReporter};
use wpt_bridge::transport::{SecondaryRadio, UdpRadio};
use wpt_core::config::Config;

use crate::engine::SimulatedEngine;
use crate::fixtures::{FileCaptures, FixtureScanner};

/// How long `run` waits for the engine and listener after the HTTP server
/// has stopped.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Background tasks that confirm drain on shutdown: engine and listener.
const SUPERVISED_TASKS: usize = 2;

/// The bridge process: HTTP control plane, attack engine, and the
/// secondary-radio trigger listener, all stopped by one `ShutdownSignal`.
pub struct Daemon {
    config: Config,
    shutdown: ShutdownSignal,
    event_bus: EventBus,
    radio: Arc<dyn SecondaryRadio>,
    scanner: Arc<dyn ApScanner>,
    captures: Arc<dyn CaptureSource>,
}

impl Daemon {
    /// Build a daemon with the stand-in collaborators described by `config`:
    /// a UDP secondary radio, the fixture scanner and file-backed captures.
    pub async fn new(config: Config) -> Result<Self> {
        let radio = UdpRadio::bind(config.radio.bind, config.radio.peer, config.relay.frame_mtu)
            .await
            .context("failed to bind secondary radio socket")?;
        let scanner = FixtureScanner::from_config(&config.scanner);
        let captures = FileCaptures::from_config(&config.assets);
        Ok(Self::with_collaborators(
            config,
            Arc::new(radio),
            Arc::new(scanner),
            Arc::new(captures),
        ))
    }

    pub fn with_collaborators(
        config: Config,
        radio: Arc<dyn SecondaryRadio>,
        scanner: Arc<dyn ApScanner>,
        captures: Arc<dyn CaptureSource>,
    ) -> Self {
        let event_bus = EventBus::with_limits(config.bus.capacity, config.bus.publish_timeout());
        Self {
            config,
            shutdown: ShutdownSignal::new(),
            event_bus,
            radio,
            scanner,
            captures,
        }
    }

    /// Returns a handle that can be used to trigger shutdown from another task.
    pub fn shutdown_handle(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start the engine and the listener, and return the router serving
    /// them.
    async fn launch(&self) -> Router {
        let (writer, reader) = status_channel();
        let engine = SimulatedEngine::new(&self.event_bus, writer);
        self.supervise("engine", engine.run(self.shutdown.subscribe()));

        let gateway = CommandGateway::new(self.event_bus.clone(), self.config.http.max_body_bytes);
        let reporter = StatusReporter::new(reader, self.config.http.status_format);
        let pipeline = ScanRelayPipeline::new(
            self.scanner.clone(),
            self.radio.clone(),
            RelaySettings::from(&self.config.relay),
        );

        let listener = RemoteTriggerListener::new(
            self.radio.clone(),
            gateway.clone(),
            reporter.clone(),
            pipeline.clone(),
            ListenerSettings::from(&self.config.listener),
        );
        self.supervise("listener", listener.run(self.shutdown.subscribe()));

        let mut state =
            ApiState::new(gateway, reporter, pipeline).with_captures(self.captures.clone());
        if let Some(page) = self.load_index_page().await {
            state = state.with_index_page(page);
        }
        api_router(Arc::new(state))
    }

    fn supervise(&self, name: &'static str, task: impl Future<Output = ()> + Send + 'static) {
        let guard = self.shutdown.drain_guard();
        tokio::spawn(async move {
            task.await;
            debug!(task = name, "task drained");
            drop(guard);
        });
    }

    async fn load_index_page(&self) -> Option<Vec<u8>> {
        let path = self.config.assets.index_page_gz.as_ref()?;
        match tokio::fs::read(path).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "index page unreadable, `/` will 404");
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Embedded mode
    // ------------------------------------------------------------------

    /// Start everything on `127.0.0.1:0` and return the bound address
    /// without blocking. Call [`Daemon::shutdown`] to stop.
    pub async fn start_embedded(&self) -> Result<SocketAddr> {
        let router = self.launch().await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let mut stop = self.shutdown.subscribe();
        tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move { stop.wait().await })
                .await;
            if let Err(e) = served {
                error!(error = %e, "API server error");
            }
        });
        info!(%addr, "embedded control plane listening");
        Ok(addr)
    }

    // ------------------------------------------------------------------
    // Standalone mode
    // ------------------------------------------------------------------

    /// Serve on a pre-bound listener until shutdown, then wait for the
    /// background tasks to drain.
    pub async fn run_with_listener(&self, listener: tokio::net::TcpListener) -> Result<()> {
        let router = self.launch().await;
        let bind_addr = listener.local_addr()?;
        info!(
            %bind_addr,
            radio = %self.radio.kind(),
            status_format = ?self.config.http.status_format,
            "control plane listening"
        );

        let mut stop = self.shutdown.subscribe();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { stop.wait().await })
            .await
            .context("API server failed")?;

        // The server can also stop on its own; make sure the tasks follow.
        if !self.shutdown.is_shutting_down() {
            self.shutdown.trigger();
        }
        let drained = self
            .shutdown
            .wait_for_drain(SUPERVISED_TASKS, DRAIN_TIMEOUT)
            .await;
        if !drained.is_complete() {
            warn!(?drained, "daemon stopped before all tasks drained");
        }
        info!("daemon stopped");
        Ok(())
    }

    /// Bind `http.host:http.port` and run until shutdown.
    pub async fn run(&self) -> Result<()> {
        let bind_addr = format!("{}:{}", self.config.http.host, self.config.http.port);
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("failed to bind {bind_addr}"))?;
        self.run_with_listener(listener).await
    }
}
