//! Protocol Messages
//!
//! Typed payloads for every packet type, and the [`Message`] sum type that
//! ties a payload to its tag. Decoding is a static tag → decode-function
//! table; there is no runtime type lookup.

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

use crate::core::id::{PeerId, SessionId};
use crate::core::vec2::Vec2;
use crate::network::codec::{Codec, CodecError};
use crate::network::packet::PacketType;

// =============================================================================
// PEER-AUTHORITATIVE PAYLOADS
// =============================================================================

/// A peer announcing itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRequest {
    /// Name shown to other players.
    pub display_name: String,
    /// Spawn position.
    pub position: Vec2,
}

/// A peer's own movement state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate {
    /// Current position.
    pub position: Vec2,
    /// Current velocity.
    pub velocity: Vec2,
}

// =============================================================================
// REQUEST PAYLOADS
// =============================================================================

/// Client asks the host to fire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShootRequest {
    /// Muzzle position.
    pub origin: Vec2,
    /// Aim direction (need not be normalized).
    pub direction: Vec2,
}

// =============================================================================
// HOST-AUTHORITATIVE PAYLOADS
// =============================================================================

/// Enemy appeared.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnemySpawn {
    /// Host-assigned enemy id.
    pub enemy_id: u32,
    /// Game-defined enemy kind.
    pub kind: u16,
    /// Spawn position.
    pub position: Vec2,
    /// Starting health.
    pub health: u32,
}

/// Enemy movement state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnemyPosition {
    /// Enemy id.
    pub enemy_id: u32,
    /// Current position.
    pub position: Vec2,
    /// Current velocity.
    pub velocity: Vec2,
}

/// Enemy path changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyPathUpdate {
    /// Enemy id.
    pub enemy_id: u32,
    /// Remaining waypoints, nearest first.
    pub waypoints: Vec<Vec2>,
}

/// Enemy fired.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnemyShooting {
    /// Enemy id.
    pub enemy_id: u32,
    /// Player being shot at, if any.
    pub target: Option<PeerId>,
    /// Muzzle position.
    pub origin: Vec2,
    /// Aim direction.
    pub direction: Vec2,
}

/// Authoritative projectile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectileSpawn {
    /// Host-assigned projectile id.
    pub projectile_id: u32,
    /// Peer that fired.
    pub owner: PeerId,
    /// Start position.
    pub origin: Vec2,
    /// Unit direction.
    pub direction: Vec2,
    /// Speed in world units per second.
    pub speed: f32,
}

/// Room has been cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomCleared {
    /// Room id.
    pub room_id: u32,
}

/// Item appeared.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemSpawn {
    /// Host-assigned item id.
    pub item_id: u32,
    /// Game-defined item kind.
    pub kind: u16,
    /// Position.
    pub position: Vec2,
}

/// Item was picked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPickup {
    /// Item id.
    pub item_id: u32,
    /// Who picked it up.
    pub picked_by: PeerId,
}

// =============================================================================
// HOST CONTROL PAYLOADS
// =============================================================================

/// One roster entry in an initial state sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerSnapshot {
    /// Peer id.
    pub id: PeerId,
    /// Display name (empty for provisional peers).
    pub display_name: String,
    /// Last known position.
    pub position: Vec2,
}

/// Full roster sent to a joining peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialStateSync {
    /// Session being joined.
    pub session_id: SessionId,
    /// Host peer.
    pub host_id: PeerId,
    /// Every known peer, host included.
    pub peers: Vec<PeerSnapshot>,
}

/// Host acknowledges a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinConfirm {
    /// Session joined.
    pub session_id: SessionId,
    /// Peer whose join is confirmed.
    pub peer_id: PeerId,
}

/// Map layout for a freshly connected peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapSync {
    /// Generator seed.
    pub seed: u64,
    /// Opaque, game-defined layout bytes.
    pub layout: Vec<u8>,
    /// SHA-256 over seed and layout.
    pub checksum: [u8; 32],
}

impl MapSync {
    /// Build a map sync with its checksum.
    pub fn new(seed: u64, layout: Vec<u8>) -> Self {
        let checksum = Self::compute_checksum(seed, &layout);
        Self { seed, layout, checksum }
    }

    fn compute_checksum(seed: u64, layout: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"hostlink-map:");
        hasher.update(seed.to_le_bytes());
        hasher.update(layout);
        let hash = hasher.finalize();

        let mut checksum = [0u8; 32];
        checksum.copy_from_slice(&hash);
        checksum
    }

    /// Check the checksum against seed and layout.
    pub fn verify(&self) -> Result<(), CodecError> {
        if Self::compute_checksum(self.seed, &self.layout) == self.checksum {
            Ok(())
        } else {
            Err(CodecError::ChecksumMismatch)
        }
    }
}

impl Default for MapSync {
    fn default() -> Self {
        Self::new(0, Vec::new())
    }
}

// =============================================================================
// MESSAGE
// =============================================================================

/// Decoded payload, one variant per packet type.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Peer joins.
    PlayerJoin(JoinRequest),
    /// Peer leaves. Empty payload.
    PlayerLeave,
    /// Peer position.
    PlayerPosition(PositionUpdate),
    /// Shot request.
    PlayerShootRequest(ShootRequest),
    /// Enemy spawned.
    EnemySpawn(EnemySpawn),
    /// Enemy moved.
    EnemyPosition(EnemyPosition),
    /// Enemy path.
    EnemyPathUpdate(EnemyPathUpdate),
    /// Enemy fired.
    EnemyShooting(EnemyShooting),
    /// Projectile spawned.
    ProjectileSpawn(ProjectileSpawn),
    /// Room cleared.
    RoomCleared(RoomCleared),
    /// Liveness. Empty payload.
    HeartBeat,
    /// Roster sync.
    InitialStateSync(InitialStateSync),
    /// Join acknowledged.
    PlayerJoinConfirm(JoinConfirm),
    /// Map layout.
    MapSync(MapSync),
    /// Item spawned.
    ItemSpawn(ItemSpawn),
    /// Item picked up.
    ItemPickup(ItemPickup),
}

impl Message {
    /// Tag this message travels under.
    pub fn packet_type(&self) -> PacketType {
        match self {
            Message::PlayerJoin(_) => PacketType::PlayerJoin,
            Message::PlayerLeave => PacketType::PlayerLeave,
            Message::PlayerPosition(_) => PacketType::PlayerPosition,
            Message::PlayerShootRequest(_) => PacketType::PlayerShootRequest,
            Message::EnemySpawn(_) => PacketType::EnemySpawn,
            Message::EnemyPosition(_) => PacketType::EnemyPosition,
            Message::EnemyPathUpdate(_) => PacketType::EnemyPathUpdate,
            Message::EnemyShooting(_) => PacketType::EnemyShooting,
            Message::ProjectileSpawn(_) => PacketType::ProjectileSpawn,
            Message::RoomCleared(_) => PacketType::RoomCleared,
            Message::HeartBeat => PacketType::HeartBeat,
            Message::InitialStateSync(_) => PacketType::InitialStateSync,
            Message::PlayerJoinConfirm(_) => PacketType::PlayerJoinConfirm,
            Message::MapSync(_) => PacketType::MapSync,
            Message::ItemSpawn(_) => PacketType::ItemSpawn,
            Message::ItemPickup(_) => PacketType::ItemPickup,
        }
    }

    /// Encode the payload bytes.
    pub fn encode<C: Codec>(&self, codec: &C) -> Result<Vec<u8>, CodecError> {
        match self {
            Message::PlayerLeave | Message::HeartBeat => Ok(Vec::new()),
            Message::PlayerJoin(p) => codec.serialize_object(p),
            Message::PlayerPosition(p) => codec.serialize_object(p),
            Message::PlayerShootRequest(p) => codec.serialize_object(p),
            Message::EnemySpawn(p) => codec.serialize_object(p),
            Message::EnemyPosition(p) => codec.serialize_object(p),
            Message::EnemyPathUpdate(p) => codec.serialize_object(p),
            Message::EnemyShooting(p) => codec.serialize_object(p),
            Message::ProjectileSpawn(p) => codec.serialize_object(p),
            Message::RoomCleared(p) => codec.serialize_object(p),
            Message::InitialStateSync(p) => codec.serialize_object(p),
            Message::PlayerJoinConfirm(p) => codec.serialize_object(p),
            Message::MapSync(p) => codec.serialize_object(p),
            Message::ItemSpawn(p) => codec.serialize_object(p),
            Message::ItemPickup(p) => codec.serialize_object(p),
        }
    }

    /// Decode a payload according to its tag.
    pub fn decode<C: Codec>(
        packet_type: PacketType,
        payload: &[u8],
        codec: &C,
    ) -> Result<Self, CodecError> {
        Ok(match packet_type {
            PacketType::PlayerLeave => Message::PlayerLeave,
            PacketType::HeartBeat => Message::HeartBeat,
            PacketType::PlayerJoin => Message::PlayerJoin(codec.deserialize_object(payload)?),
            PacketType::PlayerPosition => Message::PlayerPosition(codec.deserialize_object(payload)?),
            PacketType::PlayerShootRequest => {
                Message::PlayerShootRequest(codec.deserialize_object(payload)?)
            }
            PacketType::EnemySpawn => Message::EnemySpawn(codec.deserialize_object(payload)?),
            PacketType::EnemyPosition => Message::EnemyPosition(codec.deserialize_object(payload)?),
            PacketType::EnemyPathUpdate => {
                Message::EnemyPathUpdate(codec.deserialize_object(payload)?)
            }
            PacketType::EnemyShooting => Message::EnemyShooting(codec.deserialize_object(payload)?),
            PacketType::ProjectileSpawn => {
                Message::ProjectileSpawn(codec.deserialize_object(payload)?)
            }
            PacketType::RoomCleared => Message::RoomCleared(codec.deserialize_object(payload)?),
            PacketType::InitialStateSync => {
                Message::InitialStateSync(codec.deserialize_object(payload)?)
            }
            PacketType::PlayerJoinConfirm => {
                Message::PlayerJoinConfirm(codec.deserialize_object(payload)?)
            }
            PacketType::MapSync => {
                let map: MapSync = codec.deserialize_object(payload)?;
                map.verify()?;
                Message::MapSync(map)
            }
            PacketType::ItemSpawn => Message::ItemSpawn(codec.deserialize_object(payload)?),
            PacketType::ItemPickup => Message::ItemPickup(codec.deserialize_object(payload)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::codec::{BincodeCodec, JsonCodec};

    fn sample_messages() -> Vec<Message> {
        vec![
            Message::PlayerJoin(JoinRequest {
                display_name: "A".to_string(),
                position: Vec2::ZERO,
            }),
            Message::PlayerLeave,
            Message::PlayerPosition(PositionUpdate {
                position: Vec2::new(1.5, -2.0),
                velocity: Vec2::RIGHT,
            }),
            Message::PlayerShootRequest(ShootRequest {
                origin: Vec2::new(3.0, 3.0),
                direction: Vec2::UP,
            }),
            Message::EnemySpawn(EnemySpawn {
                enemy_id: 7,
                kind: 2,
                position: Vec2::new(10.0, 0.0),
                health: 40,
            }),
            Message::EnemyPathUpdate(EnemyPathUpdate {
                enemy_id: 7,
                waypoints: vec![Vec2::new(1.0, 1.0), Vec2::new(2.0, 2.0)],
            }),
            Message::EnemyShooting(EnemyShooting {
                enemy_id: 7,
                target: Some(PeerId::new(5)),
                origin: Vec2::ZERO,
                direction: Vec2::RIGHT,
            }),
            Message::RoomCleared(RoomCleared { room_id: 3 }),
            Message::HeartBeat,
            Message::InitialStateSync(InitialStateSync {
                session_id: SessionId::new([4; 16]),
                host_id: PeerId::new(1),
                peers: vec![PeerSnapshot {
                    id: PeerId::new(1),
                    display_name: "host".to_string(),
                    position: Vec2::ZERO,
                }],
            }),
            Message::MapSync(MapSync::new(42, vec![1, 2, 3, 4])),
            Message::ItemPickup(ItemPickup {
                item_id: 11,
                picked_by: PeerId::new(5),
            }),
        ]
    }

    #[test]
    fn test_message_roundtrip_bincode() {
        let codec = BincodeCodec::new();
        for msg in sample_messages() {
            let bytes = msg.encode(&codec).unwrap();
            let back = Message::decode(msg.packet_type(), &bytes, &codec).unwrap();
            assert_eq!(back, msg);
        }
    }

    #[test]
    fn test_message_roundtrip_json() {
        let codec = JsonCodec;
        for msg in sample_messages() {
            let bytes = msg.encode(&codec).unwrap();
            let back = Message::decode(msg.packet_type(), &bytes, &codec).unwrap();
            assert_eq!(back, msg);
        }
    }

    #[test]
    fn test_empty_payload_messages() {
        let codec = BincodeCodec::new();
        assert!(Message::HeartBeat.encode(&codec).unwrap().is_empty());
        assert!(Message::PlayerLeave.encode(&codec).unwrap().is_empty());
        assert_eq!(
            Message::decode(PacketType::HeartBeat, &[], &codec).unwrap(),
            Message::HeartBeat
        );
    }

    #[test]
    fn test_wrong_payload_for_tag() {
        let codec = BincodeCodec::new();
        let bytes = Message::RoomCleared(RoomCleared { room_id: 1 }).encode(&codec).unwrap();
        assert!(Message::decode(PacketType::PlayerJoin, &bytes, &codec).is_err());
    }

    #[test]
    fn test_map_sync_checksum() {
        let map = MapSync::new(9, vec![5; 32]);
        assert!(map.verify().is_ok());

        let mut tampered = map.clone();
        tampered.layout[0] = 6;
        assert!(matches!(tampered.verify(), Err(CodecError::ChecksumMismatch)));

        let codec = BincodeCodec::new();
        let bytes = codec.serialize_object(&tampered).unwrap();
        assert!(matches!(
            Message::decode(PacketType::MapSync, &bytes, &codec),
            Err(CodecError::ChecksumMismatch)
        ));
    }
}
