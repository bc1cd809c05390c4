//! Network Layer
//!
//! Packet model, codecs, transport contracts and the session that ties them
//! together. Nothing here knows what the game draws; game state reaches the
//! session only through [`GameHooks`].

pub mod authority;
pub mod codec;
pub mod driver;
pub mod hooks;
pub mod loopback;
pub mod packet;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod transport;

pub use authority::{AuthorityClass, ProtocolViolation, Role, ShotRejection, ShotValidator};
pub use codec::{BincodeCodec, Codec, CodecError, JsonCodec};
pub use driver::run_tick_loop;
pub use hooks::{GameHooks, NullHooks};
pub use loopback::{LoopbackClient, LoopbackHost, LoopbackNetwork};
pub use packet::{Packet, PacketType, PROTOCOL_VERSION};
pub use protocol::Message;
pub use registry::{ConnectionRegistry, PeerRecord, PeerUpdate, RegistrySnapshot};
pub use session::{Session, SessionConfig, SessionError, SessionStats, TickReport};
pub use transport::{ClientTransport, HostTransport, InboundBuffer, InboundEvent, InboundHandle, TransportError};
