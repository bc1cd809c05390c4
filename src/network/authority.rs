//! Host Authority
//!
//! Which role may originate which packet type, and validation of shot
//! requests before the host turns them into authoritative projectiles.

use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;

use crate::core::id::PeerId;
use crate::network::packet::PacketType;
use crate::network::protocol::ShootRequest;

/// Role of the local session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Owns shared simulation state.
    Host,
    /// Mirrors the host.
    Client,
}

/// Which roles may originate a packet type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityClass {
    /// Only the host.
    HostAuthoritative,
    /// The peer the packet describes, whatever its role.
    PeerAuthoritative,
    /// Only clients, addressed to the host.
    Request,
}

impl PacketType {
    /// Authority class of this packet type.
    pub const fn authority(self) -> AuthorityClass {
        match self {
            PacketType::PlayerJoin
            | PacketType::PlayerLeave
            | PacketType::PlayerPosition
            | PacketType::HeartBeat => AuthorityClass::PeerAuthoritative,

            PacketType::PlayerShootRequest => AuthorityClass::Request,

            PacketType::EnemySpawn
            | PacketType::EnemyPosition
            | PacketType::EnemyPathUpdate
            | PacketType::EnemyShooting
            | PacketType::ProjectileSpawn
            | PacketType::RoomCleared
            | PacketType::InitialStateSync
            | PacketType::PlayerJoinConfirm
            | PacketType::MapSync
            | PacketType::ItemSpawn
            | PacketType::ItemPickup => AuthorityClass::HostAuthoritative,
        }
    }

    /// Whether a host relays this type from one client to the others.
    pub const fn is_relayed(self) -> bool {
        matches!(self.authority(), AuthorityClass::PeerAuthoritative)
    }
}

/// Whether a session in `role` may originate `packet_type`.
pub fn may_originate(role: Role, packet_type: PacketType) -> bool {
    match (packet_type.authority(), role) {
        (AuthorityClass::PeerAuthoritative, _) => true,
        (AuthorityClass::HostAuthoritative, Role::Host) => true,
        (AuthorityClass::Request, Role::Client) => true,
        _ => false,
    }
}

/// A packet illegal for its sender's role or context. Dropped and logged;
/// the sender stays connected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolViolation {
    /// Host-only packet from, or emitted by, a non-host.
    #[error("{packet_type:?} may only originate from the host (sender {sender})")]
    HostOnly {
        /// Offending type.
        packet_type: PacketType,
        /// Offending sender.
        sender: PeerId,
    },

    /// Client-only packet from, or emitted by, the host.
    #[error("{packet_type:?} may only originate from a client (sender {sender})")]
    ClientOnly {
        /// Offending type.
        packet_type: PacketType,
        /// Offending sender.
        sender: PeerId,
    },

    /// Envelope sender differs from the link-level sender.
    #[error("envelope sender {claimed} does not match link sender {link}")]
    SenderMismatch {
        /// Sender written in the envelope.
        claimed: PeerId,
        /// Sender reported by the transport.
        link: PeerId,
    },

    /// Client received traffic over a link other than the host's.
    #[error("client received traffic from {link}, which is not the host")]
    UnexpectedLink {
        /// Link-level sender.
        link: PeerId,
    },

    /// Request reached a peer that does not serve it.
    #[error("{packet_type:?} from {sender} reached a peer that does not serve requests")]
    MisdirectedRequest {
        /// Offending type.
        packet_type: PacketType,
        /// Offending sender.
        sender: PeerId,
    },

    /// Client tried to publish its position before its join was confirmed.
    #[error("{packet_type:?} before join confirmation")]
    NotJoined {
        /// Offending type.
        packet_type: PacketType,
    },

    /// Shot request failed validation.
    #[error("shot from {requester} rejected: {reason}")]
    InvalidShot {
        /// Requesting peer.
        requester: PeerId,
        /// Why it was rejected.
        reason: ShotRejection,
    },
}

/// Why a shot request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ShotRejection {
    /// Requester id is zero.
    #[error("zero requester id")]
    ZeroRequester,
    /// Origin has NaN or infinite components.
    #[error("non-finite origin")]
    NonFiniteOrigin,
    /// Direction has NaN or infinite components.
    #[error("non-finite direction")]
    NonFiniteDirection,
    /// Direction has zero length.
    #[error("zero direction")]
    ZeroDirection,
    /// Requester fired again too soon.
    #[error("rate limited")]
    RateLimited,
}

/// Validates shot requests on the host.
///
/// Checks run cheapest first; the rate limit only counts accepted shots.
#[derive(Debug, Default)]
pub struct ShotValidator {
    min_interval: Duration,
    last_accepted: BTreeMap<PeerId, Duration>,
}

impl ShotValidator {
    /// Validator with a per-peer minimum interval. Zero disables rate limiting.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_accepted: BTreeMap::new(),
        }
    }

    /// Validate a request. On success the request counts against the
    /// requester's rate limit.
    pub fn validate(
        &mut self,
        requester: PeerId,
        request: &ShootRequest,
        now: Duration,
    ) -> Result<(), ShotRejection> {
        if requester.is_none() {
            return Err(ShotRejection::ZeroRequester);
        }
        if !request.origin.is_finite() {
            return Err(ShotRejection::NonFiniteOrigin);
        }
        if !request.direction.is_finite() {
            return Err(ShotRejection::NonFiniteDirection);
        }
        if request.direction.normalized().is_none() {
            return Err(ShotRejection::ZeroDirection);
        }
        if !self.min_interval.is_zero() {
            if let Some(last) = self.last_accepted.get(&requester) {
                if now.saturating_sub(*last) < self.min_interval {
                    return Err(ShotRejection::RateLimited);
                }
            }
        }
        self.last_accepted.insert(requester, now);
        Ok(())
    }

    /// Forget a peer's rate-limit state.
    pub fn forget(&mut self, peer: PeerId) {
        self.last_accepted.remove(&peer);
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.last_accepted.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vec2::Vec2;

    fn shot(origin: Vec2, direction: Vec2) -> ShootRequest {
        ShootRequest { origin, direction }
    }

    #[test]
    fn test_authority_matrix() {
        for t in PacketType::ALL {
            match t.authority() {
                AuthorityClass::HostAuthoritative => {
                    assert!(may_originate(Role::Host, t));
                    assert!(!may_originate(Role::Client, t));
                }
                AuthorityClass::PeerAuthoritative => {
                    assert!(may_originate(Role::Host, t));
                    assert!(may_originate(Role::Client, t));
                }
                AuthorityClass::Request => {
                    assert!(!may_originate(Role::Host, t));
                    assert!(may_originate(Role::Client, t));
                }
            }
        }
        assert_eq!(PacketType::ProjectileSpawn.authority(), AuthorityClass::HostAuthoritative);
        assert_eq!(PacketType::HeartBeat.authority(), AuthorityClass::PeerAuthoritative);
        assert!(PacketType::PlayerPosition.is_relayed());
        assert!(!PacketType::EnemyPosition.is_relayed());
    }

    #[test]
    fn test_valid_shot() {
        let mut v = ShotValidator::new(Duration::ZERO);
        assert!(v.validate(PeerId::new(2), &shot(Vec2::ZERO, Vec2::RIGHT), Duration::ZERO).is_ok());
    }

    #[test]
    fn test_rejections() {
        let mut v = ShotValidator::new(Duration::ZERO);
        let now = Duration::ZERO;
        assert_eq!(
            v.validate(PeerId::NONE, &shot(Vec2::ZERO, Vec2::RIGHT), now),
            Err(ShotRejection::ZeroRequester)
        );
        assert_eq!(
            v.validate(PeerId::new(2), &shot(Vec2::new(f32::NAN, 0.0), Vec2::RIGHT), now),
            Err(ShotRejection::NonFiniteOrigin)
        );
        assert_eq!(
            v.validate(PeerId::new(2), &shot(Vec2::ZERO, Vec2::new(0.0, f32::INFINITY)), now),
            Err(ShotRejection::NonFiniteDirection)
        );
        assert_eq!(
            v.validate(PeerId::new(2), &shot(Vec2::ZERO, Vec2::ZERO), now),
            Err(ShotRejection::ZeroDirection)
        );
    }

    #[test]
    fn test_rate_limit_per_peer() {
        let mut v = ShotValidator::new(Duration::from_millis(100));
        let req = shot(Vec2::ZERO, Vec2::UP);

        assert!(v.validate(PeerId::new(2), &req, Duration::from_millis(0)).is_ok());
        assert_eq!(
            v.validate(PeerId::new(2), &req, Duration::from_millis(50)),
            Err(ShotRejection::RateLimited)
        );
        // Another peer is unaffected.
        assert!(v.validate(PeerId::new(3), &req, Duration::from_millis(50)).is_ok());
        assert!(v.validate(PeerId::new(2), &req, Duration::from_millis(100)).is_ok());

        v.forget(PeerId::new(2));
        assert!(v.validate(PeerId::new(2), &req, Duration::from_millis(101)).is_ok());
    }
}
