//! Codec Boundary
//!
//! The session never serializes anything itself. Packets and payload objects
//! go through a [`Codec`], so the wire encoding can be swapped without
//! touching the protocol logic.
//!
//! Two codecs ship with the crate:
//! - [`BincodeCodec`]: compact fixed-int binary with a hard size limit
//!   (production default).
//! - [`JsonCodec`]: human-readable, for debugging captures.

use bincode::Options;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::network::packet::{Packet, WireEnvelope};

/// Default upper bound on an encoded packet, in bytes.
pub const DEFAULT_MAX_PACKET_BYTES: u64 = 64 * 1024;

/// Encoding or decoding failure.
///
/// Never fatal: the offending message is dropped and the session continues.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Value could not be encoded.
    #[error("encode failed: {0}")]
    Encode(String),

    /// Bytes did not match the expected schema.
    #[error("decode failed: {0}")]
    Decode(String),

    /// Packet type tag is not part of this protocol version.
    #[error("unknown packet type tag {0}")]
    UnknownPacketType(u8),

    /// Envelope was produced by an incompatible protocol version.
    #[error("protocol version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Our version.
        expected: u8,
        /// Version carried by the envelope.
        found: u8,
    },

    /// Payload integrity check failed.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// Encoded size exceeds the codec limit.
    #[error("payload exceeds {limit} bytes")]
    PayloadTooLarge {
        /// Configured limit.
        limit: u64,
    },
}

/// Pluggable serialization for packets and payload objects.
pub trait Codec {
    /// Serialize an arbitrary payload object.
    fn serialize_object<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    /// Deserialize a payload object; errors on schema mismatch.
    fn deserialize_object<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError>;

    /// Serialize a full packet envelope.
    fn serialize_packet(&self, packet: &Packet) -> Result<Vec<u8>, CodecError> {
        self.serialize_object(&WireEnvelope::from(packet))
    }

    /// Deserialize a full packet envelope.
    fn deserialize_packet(&self, bytes: &[u8]) -> Result<Packet, CodecError> {
        let envelope: WireEnvelope = self.deserialize_object(bytes)?;
        Packet::try_from(envelope)
    }
}

// =============================================================================
// BINCODE
// =============================================================================

/// Fixed-int bincode with a byte limit. Trailing bytes are rejected.
#[derive(Debug, Clone, Copy)]
pub struct BincodeCodec {
    limit: u64,
}

impl BincodeCodec {
    /// Codec with the default size limit.
    pub fn new() -> Self {
        Self { limit: DEFAULT_MAX_PACKET_BYTES }
    }

    /// Codec with a custom size limit.
    pub fn with_limit(limit: u64) -> Self {
        Self { limit }
    }

    /// Configured size limit.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    fn options(&self) -> impl Options {
        bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .with_limit(self.limit)
            .reject_trailing_bytes()
    }

    fn map_err(&self, err: bincode::Error, encoding: bool) -> CodecError {
        match *err {
            bincode::ErrorKind::SizeLimit => CodecError::PayloadTooLarge { limit: self.limit },
            other if encoding => CodecError::Encode(other.to_string()),
            other => CodecError::Decode(other.to_string()),
        }
    }
}

impl Default for BincodeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for BincodeCodec {
    fn serialize_object<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        self.options()
            .serialize(value)
            .map_err(|e| self.map_err(e, true))
    }

    fn deserialize_object<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        self.options()
            .deserialize(bytes)
            .map_err(|e| self.map_err(e, false))
    }
}

// =============================================================================
// JSON
// =============================================================================

/// JSON codec for debugging and captures.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn serialize_object<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn deserialize_object<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}
