//! Connection Registry
//!
//! Per-peer records of everyone the session knows about. Pure data: the
//! registry never talks to the transport and never fires hooks.
//!
//! Records are only ever handed out as copies ([`RegistrySnapshot`]), so a
//! caller can never observe a record half-way through a tick's mutations.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::core::id::PeerId;
use crate::core::vec2::Vec2;

/// Everything the session knows about one peer.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerRecord {
    /// Peer id.
    pub id: PeerId,
    /// Display name (empty until the peer's Join arrives).
    pub display_name: String,
    /// Last known position.
    pub position: Vec2,
    /// Clock time of the last attributable packet.
    pub last_update: Duration,
    /// Link is considered alive. Cleared when a send to the peer fails,
    /// set again by any attributable packet from it.
    pub connected: bool,
    /// Created by a link-level connect; no application Join seen yet.
    pub provisional: bool,
}

/// Partial update applied by [`ConnectionRegistry::upsert`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeerUpdate {
    /// New display name.
    pub display_name: Option<String>,
    /// New position.
    pub position: Option<Vec2>,
    /// New provisional flag.
    pub provisional: Option<bool>,
}

impl PeerUpdate {
    /// Update carrying nothing but a timestamp refresh.
    pub fn touch() -> Self {
        Self::default()
    }

    /// Record from an application Join.
    pub fn joined(display_name: impl Into<String>, position: Vec2) -> Self {
        Self {
            display_name: Some(display_name.into()),
            position: Some(position),
            provisional: Some(false),
        }
    }

    /// Record from a link-level connect.
    pub fn provisional() -> Self {
        Self {
            provisional: Some(true),
            ..Self::default()
        }
    }

    /// Set the position.
    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = Some(position);
        self
    }
}

/// Outcome of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// Peer was new.
    Inserted,
    /// Peer already existed.
    Updated,
}

/// Immutable copy of the registry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrySnapshot {
    peers: Vec<PeerRecord>,
}

impl RegistrySnapshot {
    /// All records in id order.
    pub fn peers(&self) -> &[PeerRecord] {
        &self.peers
    }

    /// Look up one peer.
    pub fn get(&self, id: PeerId) -> Option<&PeerRecord> {
        self.peers.iter().find(|p| p.id == id)
    }

    /// Whether a peer is present.
    pub fn contains(&self, id: PeerId) -> bool {
        self.get(id).is_some()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

/// Per-peer connection records.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    peers: BTreeMap<PeerId, PeerRecord>,
}

impl ConnectionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh a peer. Always stamps `last_update` and marks the
    /// peer connected.
    pub fn upsert(&mut self, id: PeerId, update: PeerUpdate, now: Duration) -> Upsert {
        match self.peers.get_mut(&id) {
            Some(record) => {
                if let Some(name) = update.display_name {
                    record.display_name = name;
                }
                if let Some(position) = update.position {
                    record.position = position;
                }
                if let Some(provisional) = update.provisional {
                    record.provisional = provisional;
                }
                record.last_update = now;
                record.connected = true;
                Upsert::Updated
            }
            None => {
                self.peers.insert(id, PeerRecord {
                    id,
                    display_name: update.display_name.unwrap_or_default(),
                    position: update.position.unwrap_or_default(),
                    last_update: now,
                    connected: true,
                    provisional: update.provisional.unwrap_or(false),
                });
                Upsert::Inserted
            }
        }
    }

    /// Refresh an existing peer's timestamp. Returns `false` for unknown peers.
    pub fn touch(&mut self, id: PeerId, now: Duration) -> bool {
        match self.peers.get_mut(&id) {
            Some(record) => {
                record.last_update = now;
                record.connected = true;
                true
            }
            None => false,
        }
    }

    /// Flag a peer's link as dead. It stays registered until it times out
    /// or speaks again. Returns `false` for unknown peers.
    pub fn mark_disconnected(&mut self, id: PeerId) -> bool {
        match self.peers.get_mut(&id) {
            Some(record) => {
                record.connected = false;
                true
            }
            None => false,
        }
    }

    /// Copy of one record.
    pub fn get(&self, id: PeerId) -> Option<PeerRecord> {
        self.peers.get(&id).cloned()
    }

    /// Remove a peer.
    pub fn remove(&mut self, id: PeerId) -> Option<PeerRecord> {
        self.peers.remove(&id)
    }

    /// Copy of every record.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            peers: self.peers.values().cloned().collect(),
        }
    }

    /// Peers silent for strictly longer than `window`, excluding `exempt`.
    pub fn expired(&self, now: Duration, window: Duration, exempt: PeerId) -> Vec<PeerId> {
        self.peers
            .values()
            .filter(|p| p.id != exempt)
            .filter(|p| now.saturating_sub(p.last_update) > window)
            .map(|p| p.id)
            .collect()
    }

    /// Ids of connected peers other than `except`.
    pub fn connected_ids_except(&self, except: &[PeerId]) -> Vec<PeerId> {
        self.peers
            .values()
            .filter(|p| p.connected && !except.contains(&p.id))
            .map(|p| p.id)
            .collect()
    }

    /// Whether a peer is present.
    pub fn contains(&self, id: PeerId) -> bool {
        self.peers.contains_key(&id)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.peers.clear();
    }
}
