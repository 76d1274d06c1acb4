use std::sync::Arc;

use axum::body::Bytes;

use crate::capture::{CaptureSource, NoCaptures};
use crate::gateway::CommandGateway;
use crate::scan::ScanRelayPipeline;
use crate::status::StatusReporter;

/// Shared state for all HTTP handlers.
pub struct ApiState {
    pub gateway: CommandGateway,
    pub reporter: StatusReporter,
    pub pipeline: ScanRelayPipeline,
    pub captures: Arc<dyn CaptureSource>,
    /// Pre-gzipped index page; `/` answers 404 without one.
    pub index_page: Option<Bytes>,
}

impl ApiState {
    pub fn new(
        gateway: CommandGateway,
        reporter: StatusReporter,
        pipeline: ScanRelayPipeline,
    ) -> Self {
        Self {
            gateway,
            reporter,
            pipeline,
            captures: Arc::new(NoCaptures),
            index_page: None,
        }
    }

    pub fn with_captures(mut self, captures: Arc<dyn CaptureSource>) -> Self {
        self.captures = captures;
        self
    }

    pub fn with_index_page(mut self, gzipped: impl Into<Bytes>) -> Self {
        self.index_page = Some(gzipped.into());
        self
    }
}
