//! Packet Envelope
//!
//! Every message on the wire is a [`Packet`]: a type tag, the sender, an
//! optional target and an opaque payload. The payload is decoded into a typed
//! [`Message`](crate::network::protocol::Message) only at dispatch time.

use serde::{Serialize, Deserialize};

use crate::core::id::PeerId;
use crate::network::codec::CodecError;

/// Wire format version. Bumped on any incompatible envelope change.
pub const PROTOCOL_VERSION: u8 = 1;

// =============================================================================
// PACKET TYPE
// =============================================================================

/// Closed set of packet type tags.
///
/// Discriminants are the on-wire tag values and must never be reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PacketType {
    /// Peer announces itself to the host.
    PlayerJoin = 1,
    /// Peer leaves the session.
    PlayerLeave = 2,
    /// Peer's own position.
    PlayerPosition = 3,
    /// Client asks the host to fire a shot.
    PlayerShootRequest = 4,
    /// Enemy appeared.
    EnemySpawn = 5,
    /// Enemy position refresh.
    EnemyPosition = 6,
    /// Enemy path changed.
    EnemyPathUpdate = 7,
    /// Enemy fired.
    EnemyShooting = 8,
    /// Authoritative projectile.
    ProjectileSpawn = 9,
    /// Room has no enemies left.
    RoomCleared = 10,
    /// Liveness signal.
    HeartBeat = 11,
    /// Full roster sent to a joining peer.
    InitialStateSync = 12,
    /// Host acknowledges a join.
    PlayerJoinConfirm = 13,
    /// Map layout sent to a freshly connected peer.
    MapSync = 14,
    /// Item appeared.
    ItemSpawn = 15,
    /// Item was picked up.
    ItemPickup = 16,
}

impl PacketType {
    /// Every packet type, in tag order.
    pub const ALL: [PacketType; 16] = [
        PacketType::PlayerJoin,
        PacketType::PlayerLeave,
        PacketType::PlayerPosition,
        PacketType::PlayerShootRequest,
        PacketType::EnemySpawn,
        PacketType::EnemyPosition,
        PacketType::EnemyPathUpdate,
        PacketType::EnemyShooting,
        PacketType::ProjectileSpawn,
        PacketType::RoomCleared,
        PacketType::HeartBeat,
        PacketType::InitialStateSync,
        PacketType::PlayerJoinConfirm,
        PacketType::MapSync,
        PacketType::ItemSpawn,
        PacketType::ItemPickup,
    ];

    /// On-wire tag.
    #[inline]
    pub const fn tag(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for PacketType {
    type Error = CodecError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        PacketType::ALL
            .iter()
            .copied()
            .find(|t| t.tag() == tag)
            .ok_or(CodecError::UnknownPacketType(tag))
    }
}

// =============================================================================
// PACKET
// =============================================================================

/// Typed envelope around an application payload.
///
/// Fields are private: a packet is immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    packet_type: PacketType,
    sender: PeerId,
    target: Option<PeerId>,
    payload: Vec<u8>,
}

impl Packet {
    /// Build a packet. A zero target is normalized to broadcast.
    pub fn new(
        packet_type: PacketType,
        sender: PeerId,
        target: Option<PeerId>,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            packet_type,
            sender,
            target: target.filter(|t| !t.is_none()),
            payload,
        }
    }

    /// Build a broadcast packet.
    pub fn broadcast(packet_type: PacketType, sender: PeerId, payload: Vec<u8>) -> Self {
        Self::new(packet_type, sender, None, payload)
    }

    /// Build a packet addressed to one peer.
    pub fn to_peer(
        packet_type: PacketType,
        sender: PeerId,
        target: PeerId,
        payload: Vec<u8>,
    ) -> Self {
        Self::new(packet_type, sender, Some(target), payload)
    }

    /// Type tag.
    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    /// Originating peer.
    pub fn sender(&self) -> PeerId {
        self.sender
    }

    /// Target peer, `None` for broadcast.
    pub fn target(&self) -> Option<PeerId> {
        self.target
    }

    /// Whether this packet is addressed to everyone.
    pub fn is_broadcast(&self) -> bool {
        self.target.is_none()
    }

    /// Raw payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

// =============================================================================
// WIRE ENVELOPE
// =============================================================================

/// Flat on-wire form of a [`Packet`].
///
/// Kept separate from `Packet` so that an unknown tag or a wrong version can
/// be reported as a decode error instead of failing inside serde.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEnvelope {
    /// Protocol version.
    pub version: u8,
    /// Packet type tag.
    pub tag: u8,
    /// Sender id.
    pub sender: u64,
    /// Target id, 0 = broadcast.
    pub target: u64,
    /// Payload bytes.
    pub payload: Vec<u8>,
}

impl From<&Packet> for WireEnvelope {
    fn from(packet: &Packet) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            tag: packet.packet_type.tag(),
            sender: packet.sender.raw(),
            target: packet.target.map(PeerId::raw).unwrap_or(0),
            payload: packet.payload.clone(),
        }
    }
}

impl TryFrom<WireEnvelope> for Packet {
    type Error = CodecError;

    fn try_from(env: WireEnvelope) -> Result<Self, Self::Error> {
        if env.version != PROTOCOL_VERSION {
            return Err(CodecError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                found: env.version,
            });
        }
        let packet_type = PacketType::try_from(env.tag)?;
        Ok(Packet::new(
            packet_type,
            PeerId::new(env.sender),
            Some(PeerId::new(env.target)),
            env.payload,
        ))
    }
}
