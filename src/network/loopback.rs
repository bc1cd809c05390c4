//! In-Memory Loopback Transport
//!
//! A process-local stand-in for the platform transport: one host and any
//! number of clients exchanging bytes through shared inbound buffers. Used by
//! the demo binary and the tests; it also records every delivered send so
//! assertions can inspect exactly what reached the wire.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::core::id::PeerId;
use crate::network::transport::{
    ClientTransport, HostTransport, InboundBuffer, InboundEvent, InboundHandle, TransportError,
};

/// One delivered send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRecord {
    /// Sending endpoint.
    pub from: PeerId,
    /// Receiving endpoint.
    pub to: PeerId,
    /// Bytes as handed to the transport.
    pub bytes: Vec<u8>,
}

#[derive(Default)]
struct Hub {
    host: Option<PeerId>,
    endpoints: BTreeMap<PeerId, InboundHandle>,
    sent: Vec<SentRecord>,
    released: Vec<PeerId>,
}

impl Hub {
    fn deliver(&mut self, from: PeerId, to: PeerId, bytes: &[u8]) -> Result<(), TransportError> {
        let handle = self.endpoints.get(&to).ok_or(TransportError::UnknownPeer(to))?;
        if !handle.push_datagram(from, bytes.to_vec()) {
            return Err(TransportError::Closed);
        }
        self.sent.push(SentRecord { from, to, bytes: bytes.to_vec() });
        Ok(())
    }

    fn notify_host(&self, event: InboundEvent) {
        if let Some(handle) = self.host.and_then(|h| self.endpoints.get(&h)) {
            handle.push(event);
        }
    }
}

/// Shared in-memory network. Clones refer to the same network.
#[derive(Clone, Default)]
pub struct LoopbackNetwork {
    hub: Arc<Mutex<Hub>>,
}

impl LoopbackNetwork {
    /// Empty network.
    pub fn new() -> Self {
        Self::default()
    }

    fn hub(&self) -> MutexGuard<'_, Hub> {
        self.hub.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register the host endpoint.
    pub fn host(&self, id: PeerId) -> LoopbackHost {
        let inbox = InboundBuffer::new();
        let mut hub = self.hub();
        hub.host = Some(id);
        hub.endpoints.insert(id, inbox.handle());
        LoopbackHost { id, inbox, network: self.clone() }
    }

    /// Register a client endpoint. The host sees a link-level connect.
    pub fn client(&self, id: PeerId, host: PeerId) -> LoopbackClient {
        let inbox = InboundBuffer::new();
        let mut hub = self.hub();
        hub.endpoints.insert(id, inbox.handle());
        hub.notify_host(InboundEvent::PeerConnected(id));
        LoopbackClient { id, host, inbox, network: self.clone() }
    }

    /// Drop a peer's link. The host sees a link-level disconnect.
    pub fn disconnect(&self, peer: PeerId) {
        let mut hub = self.hub();
        hub.endpoints.remove(&peer);
        hub.notify_host(InboundEvent::PeerDisconnected(peer));
    }

    /// Push raw bytes into a peer's inbox, bypassing the sender's session.
    pub fn inject(&self, to: PeerId, from: PeerId, bytes: Vec<u8>) -> bool {
        self.hub()
            .endpoints
            .get(&to)
            .map(|h| h.push_datagram(from, bytes))
            .unwrap_or(false)
    }

    /// Every delivered send so far.
    pub fn sent_log(&self) -> Vec<SentRecord> {
        self.hub().sent.clone()
    }

    /// Take and clear the send log.
    pub fn take_sent_log(&self) -> Vec<SentRecord> {
        std::mem::take(&mut self.hub().sent)
    }

    /// Peers whose sessions the host released.
    pub fn released(&self) -> Vec<PeerId> {
        self.hub().released.clone()
    }

    /// Whether a peer currently has an endpoint.
    pub fn is_linked(&self, peer: PeerId) -> bool {
        self.hub().endpoints.contains_key(&peer)
    }
}

/// Host side of a [`LoopbackNetwork`].
pub struct LoopbackHost {
    id: PeerId,
    inbox: InboundBuffer,
    network: LoopbackNetwork,
}

impl LoopbackHost {
    /// Handle for pushing events into this endpoint's inbox.
    pub fn inbox_handle(&self) -> InboundHandle {
        self.inbox.handle()
    }
}

impl HostTransport for LoopbackHost {
    fn send_to_all_clients(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut hub = self.network.hub();
        let clients: Vec<PeerId> = hub.endpoints.keys().copied().filter(|p| *p != self.id).collect();
        // Every reachable client gets the bytes; the first failure is reported.
        let mut result = Ok(());
        for client in clients {
            if let Err(e) = hub.deliver(self.id, client, bytes) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    fn send_to_client(&mut self, peer: PeerId, bytes: &[u8]) -> Result<(), TransportError> {
        self.network.hub().deliver(self.id, peer, bytes)
    }

    fn poll_inbound(&mut self) -> Vec<InboundEvent> {
        self.inbox.drain()
    }

    fn release_session(&mut self, peer: PeerId) -> Result<(), TransportError> {
        let mut hub = self.network.hub();
        if hub.endpoints.remove(&peer).is_none() {
            return Err(TransportError::UnknownPeer(peer));
        }
        debug!(peer = %peer, "Loopback session released");
        hub.released.push(peer);
        Ok(())
    }
}

/// Client side of a [`LoopbackNetwork`].
pub struct LoopbackClient {
    id: PeerId,
    host: PeerId,
    inbox: InboundBuffer,
    network: LoopbackNetwork,
}

impl LoopbackClient {
    /// Handle for pushing events into this endpoint's inbox.
    pub fn inbox_handle(&self) -> InboundHandle {
        self.inbox.handle()
    }
}

impl ClientTransport for LoopbackClient {
    fn send_to_host(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.network.hub().deliver(self.id, self.host, bytes)
    }

    fn poll_inbound(&mut self) -> Vec<InboundEvent> {
        self.inbox.drain()
    }
}
