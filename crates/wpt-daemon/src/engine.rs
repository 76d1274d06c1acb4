//! Stand-in attack engine.
//!
//! Consumes the bus and owns the status board the way the real engine
//! does, without touching a radio: a request moves the board to RUNNING,
//! and it times out after the requested number of seconds unless a reset
//! arrives first.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};
use wpt_bridge::event_bus::{BusEvent, EventBus, EventKind};
use wpt_bridge::shutdown::ShutdownListener;
use wpt_bridge::status::StatusWriter;
use wpt_core::types::{AttackState, AttackType, Command, Status};

pub struct SimulatedEngine {
    writer: StatusWriter,
    events: flume::Receiver<BusEvent>,
    state: AttackState,
    deadline: Option<(Instant, AttackType)>,
}

impl SimulatedEngine {
    /// Subscribe to both event kinds and publish READY. Events published
    /// after this returns are seen by [`SimulatedEngine::run`].
    pub fn new(bus: &EventBus, writer: StatusWriter) -> Self {
        let events = bus.subscribe(&[EventKind::AttackReset, EventKind::AttackRequest]);
        writer.publish(Status::ready());
        Self {
            writer,
            events,
            state: AttackState::Ready,
            deadline: None,
        }
    }

    pub async fn run(mut self, mut shutdown: ShutdownListener) {
        info!("simulated attack engine started");
        let events = self.events.clone();
        loop {
            let timeout = sleep_until_deadline(self.deadline.map(|(at, _)| at));
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                event = events.recv_async() => match event {
                    Ok(event) => self.handle(event),
                    Err(_) => break,
                },
                _ = timeout => self.expire(),
            }
        }
        info!("simulated attack engine stopped");
    }

    fn handle(&mut self, event: BusEvent) {
        match event {
            BusEvent::AttackReset => self.reset(),
            BusEvent::AttackRequest(command) => self.start(command),
        }
    }

    fn start(&mut self, command: Command) {
        if self.state == AttackState::Running {
            warn!(ssid = %command.ssid, "attack already running, request rejected");
            return;
        }
        info!(
            ssid = %command.ssid,
            attack_type = command.attack_type.code(),
            timeout = command.timeout_seconds,
            "attack started"
        );
        let at = Instant::now() + Duration::from_secs(u64::from(command.timeout_seconds));
        self.deadline = Some((at, command.attack_type));
        self.set(Status::running(command.attack_type));
    }

    fn reset(&mut self) {
        self.deadline = None;
        self.set(Status::ready());
    }

    fn expire(&mut self) {
        if let Some((_, attack_type)) = self.deadline.take() {
            info!("attack timed out");
            self.set(Status::timed_out(attack_type));
        }
    }

    fn set(&mut self, status: Status) {
        self.state = status.state();
        self.writer.publish(status);
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
