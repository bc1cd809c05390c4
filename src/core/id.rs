//! Identifiers
//!
//! Peer and session identifiers shared by every layer.

use std::fmt;
use serde::{Serialize, Deserialize};

// =============================================================================
// PEER ID
// =============================================================================

/// Stable 64-bit platform account identifier of a session participant.
///
/// Zero is reserved: on the wire it means "no target" (broadcast), and it is
/// never a valid sender.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Default)]
pub struct PeerId(pub u64);

impl PeerId {
    /// The reserved "nobody" id.
    pub const NONE: Self = Self(0);

    /// Create from a raw platform id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw platform id.
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Whether this is the reserved zero id.
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Short hex form for logs.
    pub fn short(self) -> String {
        hex::encode(&self.0.to_be_bytes()[4..])
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl From<u64> for PeerId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

// =============================================================================
// SESSION ID
// =============================================================================

/// Platform session (lobby) identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub [u8; 16]);

impl SessionId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh random id.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().into_bytes())
    }

    /// Parse from a UUID string.
    pub fn from_uuid_str(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s)
            .ok()
            .map(|u| Self(*u.as_bytes()))
    }

    /// Convert to a UUID string.
    pub fn to_uuid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.0).to_string()
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uuid_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_id_none() {
        assert!(PeerId::NONE.is_none());
        assert!(PeerId::default().is_none());
        assert!(!PeerId::new(7).is_none());
    }

    #[test]
    fn test_peer_id_display() {
        assert_eq!(PeerId::new(0xAB).to_string(), "00000000000000ab");
        assert_eq!(PeerId::new(0x1122_3344_5566_7788).short(), "55667788");
    }

    #[test]
    fn test_session_id_uuid_roundtrip() {
        let id = SessionId::random();
        let s = id.to_uuid_string();
        assert_eq!(SessionId::from_uuid_str(&s), Some(id));
        assert_eq!(SessionId::from_uuid_str("not-a-uuid"), None);
    }
}
