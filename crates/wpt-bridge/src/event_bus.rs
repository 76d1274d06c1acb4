use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use wpt_core::types::Command;

/// Default per-subscriber queue depth.
pub const DEFAULT_CAPACITY: usize = 16;

/// Default bound on how long `publish` waits for room in a full queue.
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    AttackReset,
    AttackRequest,
}

/// Events consumed by the attack engine. The command is carried by value so
/// the consumer never shares memory with the producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    AttackReset,
    AttackRequest(Command),
}

impl BusEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            BusEvent::AttackReset => EventKind::AttackReset,
            BusEvent::AttackRequest(_) => EventKind::AttackRequest,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    /// `delivered` counts the subscribers that did get the event.
    #[error("subscriber queue still full after {waited_ms}ms ({delivered} delivered)")]
    Saturated { waited_ms: u64, delivered: usize },
}

struct Subscriber {
    kinds: Vec<EventKind>,
    tx: flume::Sender<BusEvent>,
}

/// A multi-producer, multi-consumer event bus built on bounded flume
/// channels.
///
/// Each subscription owns a FIFO queue, so events from one publisher reach
/// a given consumer in publish order. Nothing is persisted. When a queue is
/// full, `publish` waits up to the configured timeout instead of dropping
/// the event. The bus can be cloned cheaply; clones share subscribers.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<Vec<Subscriber>>>,
    capacity: usize,
    publish_timeout: Duration,
}

impl EventBus {
    /// Create a bus with the default queue depth and publish timeout.
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_CAPACITY, DEFAULT_PUBLISH_TIMEOUT)
    }

    pub fn with_limits(capacity: usize, publish_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
            capacity: capacity.max(1),
            publish_timeout,
        }
    }

    /// Register a subscriber for the given event kinds and return its
    /// receiving end. Only events published after this call are delivered.
    pub fn subscribe(&self, kinds: &[EventKind]) -> flume::Receiver<BusEvent> {
        let (tx, rx) = flume::bounded(self.capacity);
        let mut subscribers = self.inner.lock().expect("EventBus lock poisoned");
        subscribers.push(Subscriber {
            kinds: kinds.to_vec(),
            tx,
        });
        rx
    }

    /// Subscribe to one event kind and run `handler` for each event on a
    /// dedicated task. Events are handled one at a time, in delivery order.
    pub fn subscribe_with<F, Fut>(&self, kind: EventKind, mut handler: F) -> JoinHandle<()>
    where
        F: FnMut(BusEvent) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let rx = self.subscribe(&[kind]);
        tokio::spawn(async move {
            while let Ok(event) = rx.recv_async().await {
                handler(event).await;
            }
        })
    }

    /// Deliver `event` to every subscriber interested in its kind.
    ///
    /// Returns once the event is queued (not handled) for each of them,
    /// with the number of subscribers it was queued for. Disconnected
    /// subscribers are pruned.
    ///
    /// Delivery is per subscriber, not all-or-nothing: every queue with
    /// room gets the event first, then full queues share one bounded wait.
    /// If any of them is still full at the deadline the result is
    /// [`BusError::Saturated`], whose `delivered` says how many subscribers
    /// did receive the event.
    pub async fn publish(&self, event: BusEvent) -> Result<usize, BusError> {
        let kind = event.kind();
        let targets: Vec<flume::Sender<BusEvent>> = {
            let mut subscribers = self.inner.lock().expect("EventBus lock poisoned");
            subscribers.retain(|s| !s.tx.is_disconnected());
            subscribers
                .iter()
                .filter(|s| s.kinds.contains(&kind))
                .map(|s| s.tx.clone())
                .collect()
        };

        let mut delivered = 0;
        let mut full = Vec::new();
        for tx in targets {
            match tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(flume::TrySendError::Full(_)) => full.push(tx),
                // Receiver went away between the snapshot and the send.
                Err(flume::TrySendError::Disconnected(_)) => {}
            }
        }

        let deadline = tokio::time::Instant::now() + self.publish_timeout;
        let mut saturated = 0;
        for tx in full {
            match tokio::time::timeout_at(deadline, tx.send_async(event.clone())).await {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(_)) => {}
                Err(_) => saturated += 1,
            }
        }
        if saturated > 0 {
            tracing::error!(?kind, saturated, delivered, "event bus subscriber saturated");
            return Err(BusError::Saturated {
                waited_ms: self.publish_timeout.as_millis() as u64,
                delivered,
            });
        }

        tracing::debug!(?kind, delivered, "event published");
        Ok(delivered)
    }

    /// Return the number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        let subscribers = self.inner.lock().expect("EventBus lock poisoned");
        subscribers.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wpt_core::types::{AttackMethod, AttackType};

    fn command(ssid: &str) -> Command {
        Command {
            ap_record_id: None,
            ssid: ssid.into(),
            bssid: None,
            attack_type: AttackType::Handshake,
            attack_method: AttackMethod(0),
            timeout_seconds: 10,
        }
    }

    #[tokio::test]
    async fn delivers_only_subscribed_kinds() {
        let bus = EventBus::new();
        let resets = bus.subscribe(&[EventKind::AttackReset]);
        let requests = bus.subscribe(&[EventKind::AttackRequest]);

        assert_eq!(bus.publish(BusEvent::AttackReset).await, Ok(1));

        assert_eq!(resets.try_recv().unwrap(), BusEvent::AttackReset);
        assert!(requests.try_recv().is_err());
    }

    #[tokio::test]
    async fn preserves_publish_order() {
        let bus = EventBus::new();
        let rx = bus.subscribe(&[EventKind::AttackReset, EventKind::AttackRequest]);

        bus.publish(BusEvent::AttackRequest(command("a"))).await.unwrap();
        bus.publish(BusEvent::AttackReset).await.unwrap();
        bus.publish(BusEvent::AttackRequest(command("b"))).await.unwrap();

        assert_eq!(rx.try_recv().unwrap(), BusEvent::AttackRequest(command("a")));
        assert_eq!(rx.try_recv().unwrap(), BusEvent::AttackReset);
        assert_eq!(rx.try_recv().unwrap(), BusEvent::AttackRequest(command("b")));
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_blocks_then_reports_saturation() {
        let bus = EventBus::with_limits(1, Duration::from_millis(50));
        let _rx = bus.subscribe(&[EventKind::AttackReset]);

        bus.publish(BusEvent::AttackReset).await.unwrap();
        let started = tokio::time::Instant::now();
        let err = bus.publish(BusEvent::AttackReset).await.unwrap_err();

        assert_eq!(
            err,
            BusError::Saturated {
                waited_ms: 50,
                delivered: 0
            }
        );
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn saturated_subscriber_does_not_starve_the_others() {
        let bus = EventBus::with_limits(1, Duration::from_millis(50));
        // Registered first, never drained.
        let _stalled = bus.subscribe(&[EventKind::AttackReset]);
        let engine = bus.subscribe(&[EventKind::AttackReset]);

        bus.publish(BusEvent::AttackReset).await.unwrap();
        assert_eq!(engine.try_recv().unwrap(), BusEvent::AttackReset);

        let err = bus.publish(BusEvent::AttackReset).await.unwrap_err();
        assert_eq!(
            err,
            BusError::Saturated {
                waited_ms: 50,
                delivered: 1
            }
        );
        assert_eq!(engine.try_recv().unwrap(), BusEvent::AttackReset);
    }

    #[tokio::test]
    async fn full_queue_drains_before_timeout() {
        let bus = EventBus::with_limits(1, Duration::from_secs(5));
        let rx = bus.subscribe(&[EventKind::AttackReset]);

        bus.publish(BusEvent::AttackReset).await.unwrap();
        let consumer = tokio::spawn(async move {
            let mut seen = 0;
            while seen < 2 {
                rx.recv_async().await.unwrap();
                seen += 1;
            }
            seen
        });
        bus.publish(BusEvent::AttackReset).await.unwrap();

        assert_eq!(consumer.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn dropped_receiver_is_pruned() {
        let bus = EventBus::new();
        let rx = bus.subscribe(&[EventKind::AttackReset]);
        assert_eq!(bus.subscriber_count(), 1);

        drop(rx);
        assert_eq!(bus.publish(BusEvent::AttackReset).await, Ok(0));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn handler_subscription_runs_each_event() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let (done_tx, done_rx) = flume::unbounded();

        let counter = seen.clone();
        let _task = bus.subscribe_with(EventKind::AttackReset, move |event| {
            let counter = counter.clone();
            let done_tx = done_tx.clone();
            async move {
                assert_eq!(event, BusEvent::AttackReset);
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = done_tx.send(());
            }
        });

        for _ in 0..3 {
            bus.publish(BusEvent::AttackReset).await.unwrap();
        }
        for _ in 0..3 {
            done_rx.recv_async().await.unwrap();
        }
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }
}
