//! Transport Adapter Contracts
//!
//! The platform's point-to-point messaging is reached only through these
//! traits. Link establishment, NAT handling and delivery all live below them.
//!
//! Platform callbacks usually fire on a different thread than the one that
//! ticks the session, so received data goes through an [`InboundBuffer`]:
//! the callback side holds a cloneable [`InboundHandle`] and pushes, the tick
//! side drains synchronously.

use thiserror::Error;
use tokio::sync::mpsc;

use crate::core::id::PeerId;

/// A send or receive primitive failed. The message is lost; there is no retry.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// No link to that peer.
    #[error("no link to peer {0}")]
    UnknownPeer(PeerId),

    /// Transport has been shut down.
    #[error("transport closed")]
    Closed,

    /// Platform refused the operation.
    #[error("platform rejected send: {0}")]
    Rejected(String),
}

/// Something the transport observed since the last poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Raw payload from a peer.
    Datagram {
        /// Link-level sender.
        from: PeerId,
        /// Undecoded bytes.
        bytes: Vec<u8>,
    },
    /// Peer connected below the application layer.
    PeerConnected(PeerId),
    /// Peer's link dropped.
    PeerDisconnected(PeerId),
}

/// Host-side transport.
pub trait HostTransport: Send {
    /// Send to every connected client.
    fn send_to_all_clients(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Send to one client.
    fn send_to_client(&mut self, peer: PeerId, bytes: &[u8]) -> Result<(), TransportError>;

    /// Take everything received since the last poll.
    fn poll_inbound(&mut self) -> Vec<InboundEvent>;

    /// Tear down the platform session with a peer.
    fn release_session(&mut self, peer: PeerId) -> Result<(), TransportError>;
}

/// Client-side transport.
pub trait ClientTransport: Send {
    /// Send to the host.
    fn send_to_host(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Take everything received since the last poll.
    fn poll_inbound(&mut self) -> Vec<InboundEvent>;
}

// =============================================================================
// INBOUND HANDOFF BUFFER
// =============================================================================

/// Receiving end of the handoff buffer, owned by a transport adapter.
#[derive(Debug)]
pub struct InboundBuffer {
    rx: mpsc::UnboundedReceiver<InboundEvent>,
    tx: mpsc::UnboundedSender<InboundEvent>,
}

/// Pushing end of the handoff buffer. Safe to use from any thread.
#[derive(Debug, Clone)]
pub struct InboundHandle {
    tx: mpsc::UnboundedSender<InboundEvent>,
}

impl InboundBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { rx, tx }
    }

    /// Get a pushing handle for a platform callback.
    pub fn handle(&self) -> InboundHandle {
        InboundHandle { tx: self.tx.clone() }
    }

    /// Take everything pushed so far. Never blocks.
    pub fn drain(&mut self) -> Vec<InboundEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Default for InboundBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl InboundHandle {
    /// Push a received payload. Returns `false` once the buffer is gone.
    pub fn push_datagram(&self, from: PeerId, bytes: Vec<u8>) -> bool {
        self.push(InboundEvent::Datagram { from, bytes })
    }

    /// Push a link-level connect notification.
    pub fn push_connected(&self, peer: PeerId) -> bool {
        self.push(InboundEvent::PeerConnected(peer))
    }

    /// Push a link-level disconnect notification.
    pub fn push_disconnected(&self, peer: PeerId) -> bool {
        self.push(InboundEvent::PeerDisconnected(peer))
    }

    /// Push any event.
    pub fn push(&self, event: InboundEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}
