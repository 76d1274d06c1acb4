use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::UdpSocket;

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("radio closed")]
    Closed,

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    #[error("frame of {size} bytes exceeds the {mtu} byte MTU")]
    FrameTooLarge { size: usize, mtu: usize },
}

pub type Result<T> = std::result::Result<T, TransportError>;

// ---------------------------------------------------------------------------
// RelayFrame
// ---------------------------------------------------------------------------

/// One unit of secondary-radio transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayFrame {
    payload: Vec<u8>,
}

impl RelayFrame {
    /// Build an outbound frame, refusing payloads larger than `mtu`.
    pub fn new(payload: Vec<u8>, mtu: usize) -> Result<Self> {
        if payload.len() > mtu {
            return Err(TransportError::FrameTooLarge {
                size: payload.len(),
                mtu,
            });
        }
        Ok(Self { payload })
    }

    /// Wrap bytes received off the air. The sender already bounded them.
    pub fn from_wire(payload: Vec<u8>) -> Self {
        Self { payload }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

// ---------------------------------------------------------------------------
// RadioKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RadioKind {
    InProcess,
    Udp,
}

impl std::fmt::Display for RadioKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RadioKind::InProcess => write!(f, "in-process"),
            RadioKind::Udp => write!(f, "udp"),
        }
    }
}

// ---------------------------------------------------------------------------
// SecondaryRadio trait
// ---------------------------------------------------------------------------

/// The bandwidth-constrained side link used to mirror telemetry and to
/// receive remote triggers.
///
/// The relay pipeline and the trigger listener share one radio from
/// different tasks, so every method takes `&self`. Pacing is the caller's
/// job; implementations send as soon as they are asked to.
#[async_trait]
pub trait SecondaryRadio: Send + Sync + 'static {
    fn kind(&self) -> RadioKind;

    /// Transmit one frame.
    async fn send(&self, frame: &RelayFrame) -> Result<()>;

    /// Put the radio back into receive mode.
    async fn start_receive(&self) -> Result<()>;

    /// Return a pending inbound frame, or `None` when nothing has arrived.
    /// Never waits for one.
    async fn poll_frame(&self) -> Result<Option<RelayFrame>>;
}

// ---------------------------------------------------------------------------
// InProcessRadio: paired in-memory link
// ---------------------------------------------------------------------------

/// A radio backed by flume channels; [`InProcessRadio::pair`] returns two
/// ends that hear each other.
pub struct InProcessRadio {
    tx: flume::Sender<RelayFrame>,
    rx: flume::Receiver<RelayFrame>,
}

impl InProcessRadio {
    /// Create a pair of connected in-process radios.
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_b) = flume::unbounded();
        let (tx_b, rx_a) = flume::unbounded();
        (Self { tx: tx_a, rx: rx_a }, Self { tx: tx_b, rx: rx_b })
    }

    /// Wait for the next frame from the peer.
    pub async fn next_frame(&self) -> Result<RelayFrame> {
        self.rx
            .recv_async()
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// Frames received and not yet consumed.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

#[async_trait]
impl SecondaryRadio for InProcessRadio {
    fn kind(&self) -> RadioKind {
        RadioKind::InProcess
    }

    async fn send(&self, frame: &RelayFrame) -> Result<()> {
        self.tx
            .send_async(frame.clone())
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn start_receive(&self) -> Result<()> {
        Ok(())
    }

    async fn poll_frame(&self) -> Result<Option<RelayFrame>> {
        match self.rx.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(flume::TryRecvError::Empty) => Ok(None),
            Err(flume::TryRecvError::Disconnected) => Err(TransportError::Closed),
        }
    }
}

// ---------------------------------------------------------------------------
// UdpRadio: datagram link standing in for the radio modem
// ---------------------------------------------------------------------------

/// Sends each frame as one datagram to a fixed peer and accepts frames from
/// anyone. Datagrams longer than `mtu` are truncated on receive.
pub struct UdpRadio {
    socket: UdpSocket,
    peer: SocketAddr,
    mtu: usize,
}

impl UdpRadio {
    pub async fn bind(bind: SocketAddr, peer: SocketAddr, mtu: usize) -> Result<Self> {
        let socket = UdpSocket::bind(bind)
            .await
            .map_err(|e| TransportError::ReceiveFailed(format!("bind {bind}: {e}")))?;
        tracing::info!(%bind, %peer, mtu, "udp radio ready");
        Ok(Self { socket, peer, mtu })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket
            .local_addr()
            .map_err(|e| TransportError::ReceiveFailed(e.to_string()))
    }
}

#[async_trait]
impl SecondaryRadio for UdpRadio {
    fn kind(&self) -> RadioKind {
        RadioKind::Udp
    }

    async fn send(&self, frame: &RelayFrame) -> Result<()> {
        if frame.len() > self.mtu {
            return Err(TransportError::FrameTooLarge {
                size: frame.len(),
                mtu: self.mtu,
            });
        }
        self.socket
            .send_to(frame.payload(), self.peer)
            .await
            .map(|_| ())
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn start_receive(&self) -> Result<()> {
        Ok(())
    }

    async fn poll_frame(&self) -> Result<Option<RelayFrame>> {
        let mut buf = vec![0u8; self.mtu];
        match self.socket.try_recv_from(&mut buf) {
            Ok((n, from)) => {
                tracing::trace!(%from, bytes = n, "udp frame received");
                buf.truncate(n);
                Ok(Some(RelayFrame::from_wire(buf)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(TransportError::ReceiveFailed(e.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
