//! Core primitives.
//!
//! Identifiers, vector math and the time source. Nothing in here knows about
//! packets or sessions.

pub mod id;
pub mod vec2;
pub mod clock;

// Re-export core types
pub use id::{PeerId, SessionId};
pub use vec2::Vec2;
pub use clock::{Clock, ManualClock, MonotonicClock};
