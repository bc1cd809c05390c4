//! # Hostlink
//!
//! Host-authoritative session protocol for small real-time multiplayer games
//! running over a platform's point-to-point messaging.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         HOSTLINK                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Primitives                                │
//! │  ├── id.rs       - Peer and session identifiers              │
//! │  ├── vec2.rs     - 2D float vector                           │
//! │  └── clock.rs    - Monotonic and manual time sources         │
//! │                                                              │
//! │  network/        - Session protocol                          │
//! │  ├── packet.rs   - Packet types and envelope                 │
//! │  ├── codec.rs    - Bincode / JSON serialization              │
//! │  ├── protocol.rs - Typed payloads                            │
//! │  ├── transport.rs- Host and client transport contracts       │
//! │  ├── loopback.rs - In-memory transport                       │
//! │  ├── registry.rs - Connection registry                       │
//! │  ├── authority.rs- Authority rules, shot validation          │
//! │  ├── hooks.rs    - Game notifications                        │
//! │  ├── session.rs  - Tick orchestrator                         │
//! │  └── driver.rs   - Fixed-rate tick loop                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Authority
//!
//! The host owns enemies, projectiles, items, rooms and the map. Each peer
//! owns its own position and presence. A client that wants to shoot asks the
//! host, which validates the request and broadcasts the projectile.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod network;

// Re-export commonly used types
pub use core::clock::{Clock, ManualClock, MonotonicClock};
pub use core::id::{PeerId, SessionId};
pub use core::vec2::Vec2;
pub use network::hooks::GameHooks;
pub use network::packet::{Packet, PacketType};
pub use network::session::{Session, SessionConfig, SessionError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
