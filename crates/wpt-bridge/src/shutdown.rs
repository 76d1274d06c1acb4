use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// ShutdownSignal
// ---------------------------------------------------------------------------

/// Cooperative shutdown for the long-running bridge tasks (HTTP server,
/// trigger listener, engine).
///
/// Backed by a `watch` channel rather than a broadcast so a task that
/// subscribes after `trigger()` still observes the shutdown.
///
/// ```ignore
/// let shutdown = ShutdownSignal::new();
/// let mut stop = shutdown.subscribe();
///
/// tokio::select! {
///     _ = stop.wait() => { /* exit the loop */ }
///     _ = poll_once() => {}
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    flag: Arc<watch::Sender<bool>>,
    drained: Arc<watch::Sender<usize>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        let (drained, _) = watch::channel(0);
        Self {
            flag: Arc::new(flag),
            drained: Arc::new(drained),
        }
    }

    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.flag.subscribe(),
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.flag.borrow()
    }

    /// Ask every listener to stop. Repeated calls are no-ops.
    pub fn trigger(&self) {
        let first = self.flag.send_if_modified(|stopping| {
            let was = *stopping;
            *stopping = true;
            !was
        });
        if first {
            info!("shutdown signal triggered");
        } else {
            warn!("shutdown already triggered");
        }
    }

    /// Number of live listeners.
    pub fn subscriber_count(&self) -> usize {
        self.flag.receiver_count()
    }

    /// A guard that counts as one drained component when dropped.
    pub fn drain_guard(&self) -> DrainGuard {
        DrainGuard {
            drained: self.drained.clone(),
        }
    }

    /// Wait until `expected` guards have been dropped, or `timeout` passes.
    pub async fn wait_for_drain(&self, expected: usize, timeout: Duration) -> DrainResult {
        let mut rx = self.drained.subscribe();
        let outcome = tokio::time::timeout(timeout, rx.wait_for(|n| *n >= expected))
            .await
            .map(|waited| waited.map(|count| *count));
        match outcome {
            Ok(Ok(count)) => {
                info!(count, "all components drained");
                DrainResult::Complete(count)
            }
            // The sender lives in `self`, so this arm is unreachable in practice.
            Ok(Err(_)) => DrainResult::Complete(*rx.borrow()),
            Err(_) => {
                let confirmed = *rx.borrow();
                warn!(confirmed, expected, "drain timed out");
                DrainResult::Timeout {
                    confirmed,
                    expected,
                }
            }
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of a [`ShutdownSignal`].
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl ShutdownListener {
    /// Resolve once shutdown has been triggered, immediately if it already
    /// was. Also resolves if every [`ShutdownSignal`] handle is dropped.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|stopping| *stopping).await;
    }
}

// ---------------------------------------------------------------------------
// Drain accounting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainResult {
    Complete(usize),
    Timeout { confirmed: usize, expected: usize },
}

impl DrainResult {
    pub fn is_complete(&self) -> bool {
        matches!(self, DrainResult::Complete(_))
    }
}

#[derive(Debug)]
pub struct DrainGuard {
    drained: Arc<watch::Sender<usize>>,
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        self.drained.send_modify(|count| *count += 1);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
