//! Session Orchestrator
//!
//! Owns the registry, the inbound and outbound queues and the role of the
//! local peer, and drives everything from a single [`Session::tick`] call.
//!
//! ## Tick order
//!
//! 1. Drain the transport inbox into the inbound queue.
//! 2. Dispatch every inbound event (registry updates, hooks, replies).
//! 3. Flush the outbound queue to the transport.
//! 4. Emit a heartbeat if the heartbeat interval elapsed.
//! 5. Emit periodic state: enemy positions (host) and the local position.
//! 6. Evict peers silent for longer than the timeout window.
//!
//! Inbound runs before outbound so a reply triggered by an inbound packet
//! (join → initial sync) ships in the same tick. The sweep runs last so
//! traffic received this tick is never contradicted by a stale check.
//! Packets queued in steps 4 and 5 ship at the next tick's flush.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::core::clock::{Clock, MonotonicClock};
use crate::core::id::{PeerId, SessionId};
use crate::core::vec2::Vec2;
use crate::network::authority::{
    may_originate, AuthorityClass, ProtocolViolation, Role, ShotValidator,
};
use crate::network::codec::{BincodeCodec, Codec, CodecError};
use crate::network::hooks::GameHooks;
use crate::network::packet::{Packet, PacketType};
use crate::network::protocol::{
    InitialStateSync, JoinConfirm, JoinRequest, Message, PeerSnapshot, PositionUpdate,
    ProjectileSpawn, ShootRequest,
};
use crate::network::registry::{ConnectionRegistry, PeerUpdate, RegistrySnapshot};
use crate::network::transport::{ClientTransport, HostTransport, InboundEvent, TransportError};

/// Default heartbeat interval.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

/// Default timeout window as a multiple of the heartbeat interval.
///
/// Must stay well above worst-case jitter on the platform transport.
pub const DEFAULT_TIMEOUT_MULTIPLIER: u32 = 12;

/// Longest display name kept from a Join, in characters.
pub const MAX_DISPLAY_NAME_CHARS: usize = 32;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Session tuning.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Interval between heartbeat broadcasts.
    pub heartbeat_interval: Duration,
    /// Timeout window = `heartbeat_interval * timeout_multiplier`.
    pub timeout_multiplier: u32,
    /// Interval between host enemy-state broadcasts.
    pub host_sync_interval: Duration,
    /// Interval between local position broadcasts.
    pub position_interval: Duration,
    /// Minimum time between accepted shots per peer (zero disables).
    pub min_shot_interval: Duration,
    /// Speed assigned to authoritative projectiles.
    pub projectile_speed: f32,
    /// Name sent in our Join.
    pub display_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            timeout_multiplier: DEFAULT_TIMEOUT_MULTIPLIER,
            host_sync_interval: Duration::from_millis(100),
            position_interval: Duration::from_millis(50),
            min_shot_interval: Duration::from_millis(100),
            projectile_speed: 12.0,
            display_name: "player".to_string(),
        }
    }
}

impl SessionConfig {
    /// Defaults overridden by `HOSTLINK_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            heartbeat_interval: env_millis("HOSTLINK_HEARTBEAT_MS")
                .filter(|d| !d.is_zero())
                .unwrap_or(defaults.heartbeat_interval),
            timeout_multiplier: std::env::var("HOSTLINK_TIMEOUT_MULTIPLIER")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|m| *m > 0)
                .unwrap_or(defaults.timeout_multiplier),
            host_sync_interval: env_millis("HOSTLINK_HOST_SYNC_MS")
                .unwrap_or(defaults.host_sync_interval),
            position_interval: env_millis("HOSTLINK_POSITION_MS")
                .unwrap_or(defaults.position_interval),
            min_shot_interval: env_millis("HOSTLINK_MIN_SHOT_MS")
                .unwrap_or(defaults.min_shot_interval),
            projectile_speed: defaults.projectile_speed,
            display_name: std::env::var("HOSTLINK_DISPLAY_NAME")
                .unwrap_or(defaults.display_name),
        }
    }

    /// Silence after which a peer is evicted.
    pub fn timeout_window(&self) -> Duration {
        self.heartbeat_interval * self.timeout_multiplier
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
}

// =============================================================================
// ERRORS & DIAGNOSTICS
// =============================================================================

/// Initialization errors. Nothing else in the session is surfaced as an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Already initialized with the other role.
    #[error("session already initialized as {current:?}, cannot become {requested:?}")]
    RoleConflict {
        /// Current role.
        current: Role,
        /// Requested role.
        requested: Role,
    },

    /// Same role, but a different session or host.
    #[error("session already initialized for a different session or host")]
    AlreadyInitialized,

    /// Zero id, or a client pointing at itself as host.
    #[error("invalid peer id {0}")]
    InvalidPeerId(PeerId),
}

/// Lifetime counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Datagrams taken from the transport.
    pub packets_received: u64,
    /// Sends the transport accepted.
    pub packets_sent: u64,
    /// Inbound packets dropped as undecodable.
    pub decode_errors: u64,
    /// Outbound packets that failed to encode.
    pub encode_errors: u64,
    /// Packets dropped for breaking authority rules.
    pub protocol_violations: u64,
    /// Failed sends and releases.
    pub transport_errors: u64,
    /// Peers evicted by timeout.
    pub evictions: u64,
    /// Shot requests that failed validation.
    pub shots_rejected: u64,
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Events drained from the transport.
    pub received: usize,
    /// Packets accepted and dispatched.
    pub dispatched: usize,
    /// Sends the transport accepted.
    pub sent: usize,
    /// Packets dropped as undecodable or illegal.
    pub dropped: u64,
    /// Peers evicted.
    pub evicted: usize,
}

// =============================================================================
// INTERNAL STATE
// =============================================================================

enum Link {
    Host {
        session_id: SessionId,
        transport: Box<dyn HostTransport>,
    },
    Client {
        host_id: PeerId,
        transport: Box<dyn ClientTransport>,
        session_id: Option<SessionId>,
        join_confirmed: bool,
    },
}

struct Outbound {
    packet: Packet,
    /// Relay: broadcast to everyone except this peer.
    exclude: Option<PeerId>,
}

struct Active {
    link: Link,
    registry: ConnectionRegistry,
    inbound: VecDeque<InboundEvent>,
    outbound: VecDeque<Outbound>,
    last_heartbeat: Duration,
    last_host_sync: Duration,
    last_position: Duration,
    local_position: Vec2,
    local_velocity: Vec2,
    shots: ShotValidator,
    next_projectile_id: u32,
}

/// Borrowed session context handed to the per-tick steps.
struct Ctx<'a, C: Codec> {
    local_id: PeerId,
    now: Duration,
    config: &'a SessionConfig,
    codec: &'a C,
    hooks: &'a mut dyn GameHooks,
    stats: &'a mut SessionStats,
}

impl<C: Codec> Ctx<'_, C> {
    fn violation(&mut self, violation: ProtocolViolation) {
        self.stats.protocol_violations += 1;
        warn!("Protocol violation: {}", violation);
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// One multiplayer session, as seen by the local peer.
pub struct Session<C: Codec = BincodeCodec> {
    local_id: PeerId,
    config: SessionConfig,
    codec: C,
    clock: Arc<dyn Clock>,
    hooks: Box<dyn GameHooks>,
    active: Option<Active>,
    stats: SessionStats,
}

impl Session<BincodeCodec> {
    /// Session with the bincode codec and a monotonic clock.
    pub fn new(local_id: PeerId, config: SessionConfig, hooks: impl GameHooks + 'static) -> Self {
        Self::with_parts(
            local_id,
            config,
            BincodeCodec::new(),
            Arc::new(MonotonicClock::new()),
            hooks,
        )
    }
}

impl<C: Codec> Session<C> {
    /// Session with an explicit codec and clock.
    pub fn with_parts(
        local_id: PeerId,
        config: SessionConfig,
        codec: C,
        clock: Arc<dyn Clock>,
        hooks: impl GameHooks + 'static,
    ) -> Self {
        Self {
            local_id,
            config,
            codec,
            clock,
            hooks: Box::new(hooks),
            active: None,
            stats: SessionStats::default(),
        }
    }

    fn parts(&mut self) -> Option<(&mut Active, Ctx<'_, C>)> {
        let now = self.clock.now();
        let active = self.active.as_mut()?;
        let ctx = Ctx {
            local_id: self.local_id,
            now,
            config: &self.config,
            codec: &self.codec,
            hooks: self.hooks.as_mut(),
            stats: &mut self.stats,
        };
        Some((active, ctx))
    }

    fn activate(&mut self, link: Link) {
        let now = self.clock.now();
        let mut registry = ConnectionRegistry::new();
        registry.upsert(
            self.local_id,
            PeerUpdate::joined(self.config.display_name.clone(), Vec2::ZERO),
            now,
        );
        if let Link::Client { host_id, .. } = &link {
            registry.upsert(*host_id, PeerUpdate::provisional(), now);
        }

        self.active = Some(Active {
            link,
            registry,
            inbound: VecDeque::new(),
            outbound: VecDeque::new(),
            last_heartbeat: now,
            last_host_sync: now,
            last_position: now,
            local_position: Vec2::ZERO,
            local_velocity: Vec2::ZERO,
            shots: ShotValidator::new(self.config.min_shot_interval),
            next_projectile_id: 1,
        });
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Become the host of `session_id`.
    ///
    /// Repeating the call with the same session id is a no-op (the new
    /// transport is dropped).
    #[instrument(skip(self, transport), fields(local = %self.local_id))]
    pub fn initialize_as_host(
        &mut self,
        session_id: SessionId,
        transport: impl HostTransport + 'static,
    ) -> Result<(), SessionError> {
        if self.local_id.is_none() {
            return Err(SessionError::InvalidPeerId(self.local_id));
        }
        if let Some(active) = &self.active {
            return match &active.link {
                Link::Host { session_id: current, .. } if *current == session_id => {
                    debug!("Already hosting {}", session_id);
                    Ok(())
                }
                Link::Host { .. } => Err(SessionError::AlreadyInitialized),
                Link::Client { .. } => Err(SessionError::RoleConflict {
                    current: Role::Client,
                    requested: Role::Host,
                }),
            };
        }

        self.activate(Link::Host {
            session_id,
            transport: Box::new(transport),
        });
        info!("Hosting session {}", session_id);
        Ok(())
    }

    /// Join the session hosted by `host_id`.
    ///
    /// Repeating the call with the same host is a no-op. The application Join
    /// is sent separately with [`Session::request_join`].
    #[instrument(skip(self, transport), fields(local = %self.local_id))]
    pub fn initialize_as_client(
        &mut self,
        host_id: PeerId,
        transport: impl ClientTransport + 'static,
    ) -> Result<(), SessionError> {
        if self.local_id.is_none() {
            return Err(SessionError::InvalidPeerId(self.local_id));
        }
        if host_id.is_none() || host_id == self.local_id {
            return Err(SessionError::InvalidPeerId(host_id));
        }
        if let Some(active) = &self.active {
            return match &active.link {
                Link::Client { host_id: current, .. } if *current == host_id => {
                    debug!("Already a client of {}", host_id);
                    Ok(())
                }
                Link::Client { .. } => Err(SessionError::AlreadyInitialized),
                Link::Host { .. } => Err(SessionError::RoleConflict {
                    current: Role::Host,
                    requested: Role::Client,
                }),
            };
        }

        self.activate(Link::Client {
            host_id,
            transport: Box::new(transport),
            session_id: None,
            join_confirmed: false,
        });
        info!("Client of host {}", host_id);
        Ok(())
    }

    /// Drop all session state: queues, pending transport input and the
    /// registry. Safe to call at any time, including when uninitialized.
    pub fn shutdown(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };

        let discarded = active.drain_transport() + active.inbound.len() + active.outbound.len();
        active.inbound.clear();
        active.outbound.clear();
        active.registry.clear();
        active.shots.clear();
        self.stats = SessionStats::default();

        info!("Session shut down ({} queued items discarded)", discarded);
    }

    // -------------------------------------------------------------------------
    // Tick
    // -------------------------------------------------------------------------

    /// Run one processing step. Does nothing when uninitialized.
    pub fn tick(&mut self) -> TickReport {
        let before = self.stats;
        let Some((active, mut ctx)) = self.parts() else {
            return TickReport::default();
        };

        let received = active.drain_transport();
        let dispatched = active.dispatch_all(&mut ctx);
        let sent = active.flush(&mut ctx);
        active.emit_heartbeat(&mut ctx);
        active.emit_periodic(&mut ctx);
        let evicted = active.sweep(&mut ctx);

        let after = self.stats;
        TickReport {
            received,
            dispatched,
            sent,
            dropped: (after.decode_errors + after.protocol_violations)
                - (before.decode_errors + before.protocol_violations),
            evicted,
        }
    }

    // -------------------------------------------------------------------------
    // Sending
    // -------------------------------------------------------------------------

    /// Queue a broadcast. Returns `false` if nothing was queued.
    pub fn send_to_all(&mut self, packet_type: PacketType, payload: Vec<u8>) -> bool {
        match self.parts() {
            Some((active, mut ctx)) => active.enqueue(&mut ctx, packet_type, None, payload),
            None => false,
        }
    }

    /// Queue a packet for one peer. Returns `false` if nothing was queued.
    pub fn send_to_peer(&mut self, target: PeerId, packet_type: PacketType, payload: Vec<u8>) -> bool {
        match self.parts() {
            Some((active, mut ctx)) => active.enqueue(&mut ctx, packet_type, Some(target), payload),
            None => false,
        }
    }

    /// Encode and queue a broadcast.
    pub fn broadcast_message(&mut self, message: &Message) -> bool {
        match self.parts() {
            Some((active, mut ctx)) => active.enqueue_message(&mut ctx, None, message),
            None => false,
        }
    }

    /// Encode and queue a packet for one peer.
    pub fn send_message_to(&mut self, target: PeerId, message: &Message) -> bool {
        match self.parts() {
            Some((active, mut ctx)) => active.enqueue_message(&mut ctx, Some(target), message),
            None => false,
        }
    }

    /// Client only: announce ourselves to the host with our configured name
    /// and current position.
    pub fn request_join(&mut self) -> bool {
        let display_name = self.config.display_name.clone();
        match self.parts() {
            Some((active, mut ctx)) if active.role() == Role::Client => {
                let join = Message::PlayerJoin(JoinRequest {
                    display_name,
                    position: active.local_position,
                });
                active.enqueue_message(&mut ctx, None, &join)
            }
            _ => false,
        }
    }

    /// Update the local player's position, published periodically.
    pub fn set_local_position(&mut self, position: Vec2, velocity: Vec2) {
        if let Some((active, ctx)) = self.parts() {
            active.local_position = position;
            active.local_velocity = velocity;
            active.registry.upsert(
                ctx.local_id,
                PeerUpdate::touch().with_position(position),
                ctx.now,
            );
        }
    }

    /// Fire a shot. A client sends a request to the host; the host validates
    /// its own shot and broadcasts the projectile directly.
    pub fn request_shot(&mut self, origin: Vec2, direction: Vec2) -> bool {
        let Some((active, mut ctx)) = self.parts() else {
            return false;
        };
        let request = ShootRequest { origin, direction };
        match active.role() {
            Role::Host => {
                let requester = ctx.local_id;
                active.handle_shot(&mut ctx, requester, request)
            }
            Role::Client => {
                let host_id = active.host_peer(ctx.local_id);
                active.enqueue_message(&mut ctx, Some(host_id), &Message::PlayerShootRequest(request))
            }
        }
    }

    /// Announce that we are leaving. Tick once more to ship it, then
    /// [`Session::shutdown`].
    pub fn leave(&mut self) -> bool {
        match self.parts() {
            Some((active, mut ctx)) => active.enqueue_message(&mut ctx, None, &Message::PlayerLeave),
            None => false,
        }
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    /// Local peer id.
    pub fn local_id(&self) -> PeerId {
        self.local_id
    }

    /// Whether a role has been assumed.
    pub fn is_initialized(&self) -> bool {
        self.active.is_some()
    }

    /// Current role.
    pub fn role(&self) -> Option<Role> {
        self.active.as_ref().map(Active::role)
    }

    /// Session id (known to a client once the host has confirmed or synced).
    pub fn session_id(&self) -> Option<SessionId> {
        self.active.as_ref().and_then(Active::session_id)
    }

    /// Host peer id.
    pub fn host_id(&self) -> Option<PeerId> {
        self.active.as_ref().map(|a| a.host_peer(self.local_id))
    }

    /// Host: always true. Client: true once PlayerJoinConfirm arrived.
    pub fn is_join_confirmed(&self) -> bool {
        self.active.as_ref().map(Active::join_confirmed).unwrap_or(false)
    }

    /// Copy of the registry.
    pub fn registry_snapshot(&self) -> RegistrySnapshot {
        self.active
            .as_ref()
            .map(|a| a.registry.snapshot())
            .unwrap_or_default()
    }

    /// Copies of packets queued but not yet flushed.
    pub fn pending_outbound(&self) -> Vec<Packet> {
        self.active
            .as_ref()
            .map(|a| a.outbound.iter().map(|o| o.packet.clone()).collect())
            .unwrap_or_default()
    }

    /// Lifetime counters.
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

// =============================================================================
// ACTIVE SESSION STEPS
// =============================================================================

impl Active {
    fn role(&self) -> Role {
        match self.link {
            Link::Host { .. } => Role::Host,
            Link::Client { .. } => Role::Client,
        }
    }

    fn host_peer(&self, local_id: PeerId) -> PeerId {
        match &self.link {
            Link::Host { .. } => local_id,
            Link::Client { host_id, .. } => *host_id,
        }
    }

    fn session_id(&self) -> Option<SessionId> {
        match &self.link {
            Link::Host { session_id, .. } => Some(*session_id),
            Link::Client { session_id, .. } => *session_id,
        }
    }

    fn join_confirmed(&self) -> bool {
        match &self.link {
            Link::Host { .. } => true,
            Link::Client { join_confirmed, .. } => *join_confirmed,
        }
    }

    // ---- outbound -----------------------------------------------------------

    fn enqueue<C: Codec>(
        &mut self,
        ctx: &mut Ctx<'_, C>,
        packet_type: PacketType,
        target: Option<PeerId>,
        payload: Vec<u8>,
    ) -> bool {
        let role = self.role();
        if !may_originate(role, packet_type) {
            let sender = ctx.local_id;
            ctx.violation(match role {
                Role::Client => ProtocolViolation::HostOnly { packet_type, sender },
                Role::Host => ProtocolViolation::ClientOnly { packet_type, sender },
            });
            return false;
        }
        if packet_type == PacketType::PlayerPosition && !self.join_confirmed() {
            ctx.violation(ProtocolViolation::NotJoined { packet_type });
            return false;
        }

        self.outbound.push_back(Outbound {
            packet: Packet::new(packet_type, ctx.local_id, target, payload),
            exclude: None,
        });
        true
    }

    fn enqueue_message<C: Codec>(
        &mut self,
        ctx: &mut Ctx<'_, C>,
        target: Option<PeerId>,
        message: &Message,
    ) -> bool {
        match message.encode(ctx.codec) {
            Ok(payload) => self.enqueue(ctx, message.packet_type(), target, payload),
            Err(e) => {
                ctx.stats.encode_errors += 1;
                warn!("Failed to encode {:?}: {}", message.packet_type(), e);
                false
            }
        }
    }

    fn flush<C: Codec>(&mut self, ctx: &mut Ctx<'_, C>) -> usize {
        let mut sent = 0;
        while let Some(Outbound { packet, exclude }) = self.outbound.pop_front() {
            let packet_type = packet.packet_type();
            let bytes = match ctx.codec.serialize_packet(&packet) {
                Ok(bytes) => bytes,
                Err(e) => {
                    ctx.stats.encode_errors += 1;
                    warn!("Failed to encode {:?} packet: {}", packet_type, e);
                    continue;
                }
            };

            // Per-peer sends carry the peer so a dead link can be marked.
            let results: Vec<(Option<PeerId>, Result<(), TransportError>)> = match &mut self.link {
                Link::Host { transport, .. } => match (packet.target(), exclude) {
                    (Some(target), _) if target == ctx.local_id => {
                        debug!("Dropping {:?} addressed to ourselves", packet_type);
                        Vec::new()
                    }
                    (Some(target), _) => {
                        vec![(Some(target), transport.send_to_client(target, &bytes))]
                    }
                    (None, None) => vec![(None, transport.send_to_all_clients(&bytes))],
                    (None, Some(origin)) => self
                        .registry
                        .connected_ids_except(&[ctx.local_id, origin])
                        .into_iter()
                        .map(|peer| (Some(peer), transport.send_to_client(peer, &bytes)))
                        .collect(),
                },
                Link::Client { transport, .. } => {
                    if packet_type.authority() == AuthorityClass::HostAuthoritative {
                        let sender = packet.sender();
                        ctx.violation(ProtocolViolation::HostOnly { packet_type, sender });
                        continue;
                    }
                    vec![(None, transport.send_to_host(&bytes))]
                }
            };

            for (peer, result) in results {
                match result {
                    Ok(()) => {
                        sent += 1;
                        ctx.stats.packets_sent += 1;
                    }
                    Err(e) => {
                        ctx.stats.transport_errors += 1;
                        warn!("Send of {:?} failed: {}", packet_type, e);
                        if let Some(peer) = peer {
                            self.registry.mark_disconnected(peer);
                        }
                    }
                }
            }
        }
        sent
    }

    fn emit_heartbeat<C: Codec>(&mut self, ctx: &mut Ctx<'_, C>) {
        if ctx.now.saturating_sub(self.last_heartbeat) < ctx.config.heartbeat_interval {
            return;
        }
        self.last_heartbeat = ctx.now;
        self.registry.touch(ctx.local_id, ctx.now);
        self.enqueue_message(ctx, None, &Message::HeartBeat);
    }

    fn emit_periodic<C: Codec>(&mut self, ctx: &mut Ctx<'_, C>) {
        if self.role() == Role::Host
            && ctx.now.saturating_sub(self.last_host_sync) >= ctx.config.host_sync_interval
        {
            self.last_host_sync = ctx.now;
            for enemy in ctx.hooks.enemy_snapshot() {
                self.enqueue_message(ctx, None, &Message::EnemyPosition(enemy));
            }
        }

        if self.join_confirmed()
            && ctx.now.saturating_sub(self.last_position) >= ctx.config.position_interval
        {
            self.last_position = ctx.now;
            let update = PositionUpdate {
                position: self.local_position,
                velocity: self.local_velocity,
            };
            self.enqueue_message(ctx, None, &Message::PlayerPosition(update));
        }
    }

    // ---- inbound ------------------------------------------------------------

    fn drain_transport(&mut self) -> usize {
        let events = match &mut self.link {
            Link::Host { transport, .. } => transport.poll_inbound(),
            Link::Client { transport, .. } => transport.poll_inbound(),
        };
        let count = events.len();
        self.inbound.extend(events);
        count
    }

    fn dispatch_all<C: Codec>(&mut self, ctx: &mut Ctx<'_, C>) -> usize {
        let mut dispatched = 0;
        while let Some(event) = self.inbound.pop_front() {
            match event {
                InboundEvent::Datagram { from, bytes } => {
                    ctx.stats.packets_received += 1;
                    if self.receive(ctx, from, &bytes) {
                        dispatched += 1;
                    }
                }
                InboundEvent::PeerConnected(peer) => self.on_link_connected(ctx, peer),
                InboundEvent::PeerDisconnected(peer) => self.on_link_disconnected(ctx, peer),
            }
        }
        dispatched
    }

    /// Decode, check and dispatch one datagram. Returns whether it was
    /// accepted.
    fn receive<C: Codec>(&mut self, ctx: &mut Ctx<'_, C>, from: PeerId, bytes: &[u8]) -> bool {
        let packet = match ctx.codec.deserialize_packet(bytes) {
            Ok(packet) => packet,
            Err(CodecError::UnknownPacketType(tag)) => {
                ctx.stats.decode_errors += 1;
                debug!("Dropping packet with unknown type tag {} from {}", tag, from);
                return false;
            }
            Err(e) => {
                ctx.stats.decode_errors += 1;
                warn!("Dropping malformed packet from {}: {}", from, e);
                return false;
            }
        };

        let sender = packet.sender();
        let packet_type = packet.packet_type();

        #[cfg(feature = "debug-tracing")]
        tracing::trace!(
            "Inbound {:?} from {} via {} ({} bytes)",
            packet_type,
            sender,
            from,
            packet.payload().len()
        );

        if let Err(violation) = self.check_origin(ctx.local_id, from, &packet) {
            ctx.violation(violation);
            return false;
        }
        if sender == ctx.local_id {
            debug!("Ignoring our own {:?} echoed by {}", packet_type, from);
            return false;
        }

        if let Some(target) = packet.target() {
            if target != ctx.local_id {
                if self.role() == Role::Host && self.registry.contains(target) {
                    self.touch_sender(ctx.now, from, sender);
                    self.outbound.push_back(Outbound { packet, exclude: None });
                    return true;
                }
                debug!("Dropping {:?} addressed to {}", packet_type, target);
                return false;
            }
        }

        let message = match Message::decode(packet_type, packet.payload(), ctx.codec) {
            Ok(message) => message,
            Err(e) => {
                ctx.stats.decode_errors += 1;
                warn!("Dropping {:?} from {} with bad payload: {}", packet_type, sender, e);
                return false;
            }
        };

        self.touch_sender(ctx.now, from, sender);
        if !self.dispatch(ctx, sender, message) {
            return false;
        }

        if self.role() == Role::Host && packet.is_broadcast() && packet_type.is_relayed() {
            self.outbound.push_back(Outbound {
                packet,
                exclude: Some(sender),
            });
        }
        true
    }

    /// Authority and attribution rules for an inbound packet.
    fn check_origin(&self, local_id: PeerId, from: PeerId, packet: &Packet) -> Result<(), ProtocolViolation> {
        let sender = packet.sender();
        let packet_type = packet.packet_type();

        match &self.link {
            Link::Host { .. } => {
                if sender != from || sender.is_none() {
                    return Err(ProtocolViolation::SenderMismatch { claimed: sender, link: from });
                }
                match packet_type.authority() {
                    AuthorityClass::HostAuthoritative => {
                        Err(ProtocolViolation::HostOnly { packet_type, sender })
                    }
                    AuthorityClass::Request if packet.target().is_some_and(|t| t != local_id) => {
                        Err(ProtocolViolation::MisdirectedRequest { packet_type, sender })
                    }
                    _ => Ok(()),
                }
            }
            Link::Client { host_id, .. } => {
                if from != *host_id {
                    return Err(ProtocolViolation::UnexpectedLink { link: from });
                }
                if sender.is_none() {
                    return Err(ProtocolViolation::SenderMismatch { claimed: sender, link: from });
                }
                match packet_type.authority() {
                    AuthorityClass::HostAuthoritative if sender != *host_id => {
                        Err(ProtocolViolation::HostOnly { packet_type, sender })
                    }
                    AuthorityClass::Request => {
                        Err(ProtocolViolation::MisdirectedRequest { packet_type, sender })
                    }
                    _ => Ok(()),
                }
            }
        }
    }

    fn touch_sender(&mut self, now: Duration, from: PeerId, sender: PeerId) {
        // Anything over the host link proves the host is back.
        if let Link::Client { host_id, .. } = &self.link {
            let host_id = *host_id;
            if !self.registry.contains(host_id) {
                self.registry.upsert(host_id, PeerUpdate::provisional(), now);
                info!("Host {} is reachable again", host_id);
            }
        }
        self.registry.touch(sender, now);
        if from != sender {
            self.registry.touch(from, now);
        }
    }

    /// Apply a decoded message. Returns `false` if it was discarded.
    fn dispatch<C: Codec>(&mut self, ctx: &mut Ctx<'_, C>, sender: PeerId, message: Message) -> bool {
        match message {
            Message::PlayerJoin(join) => self.handle_join(ctx, sender, join),
            Message::PlayerLeave => {
                let release = self.role() == Role::Host;
                if self.remove_peer(ctx, sender, release) {
                    info!("Player {} left", sender);
                }
            }
            Message::PlayerPosition(update) => return self.handle_position(ctx, sender, update),
            Message::PlayerShootRequest(request) => {
                self.handle_shot(ctx, sender, request);
            }
            Message::EnemySpawn(spawn) => ctx.hooks.on_enemy_spawn(&spawn),
            Message::EnemyPosition(update) => ctx.hooks.on_enemy_position(&update),
            Message::EnemyPathUpdate(update) => ctx.hooks.on_enemy_path(&update),
            Message::EnemyShooting(shot) => ctx.hooks.on_enemy_shooting(&shot),
            Message::ProjectileSpawn(projectile) => ctx.hooks.on_projectile_spawn(&projectile),
            Message::RoomCleared(room) => ctx.hooks.on_room_cleared(&room),
            Message::ItemSpawn(item) => ctx.hooks.on_item_spawn(&item),
            Message::ItemPickup(pickup) => ctx.hooks.on_item_pickup(&pickup),
            Message::HeartBeat => {}
            Message::InitialStateSync(sync) => self.handle_initial_sync(ctx, sync),
            Message::PlayerJoinConfirm(confirm) => self.handle_join_confirm(ctx, confirm),
            Message::MapSync(map) => ctx.hooks.on_map_sync_received(&map),
        }
        true
    }

    // ---- handlers -----------------------------------------------------------

    fn handle_join<C: Codec>(&mut self, ctx: &mut Ctx<'_, C>, sender: PeerId, join: JoinRequest) {
        let display_name: String = join.display_name.chars().take(MAX_DISPLAY_NAME_CHARS).collect();
        let position = if join.position.is_finite() { join.position } else { Vec2::ZERO };

        self.registry.upsert(sender, PeerUpdate::joined(display_name.clone(), position), ctx.now);
        info!("Player {} joined as {:?}", sender, display_name);
        if let Some(record) = self.registry.get(sender) {
            ctx.hooks.on_player_joined(&record);
        }

        let Link::Host { session_id, .. } = &self.link else {
            return;
        };
        let session_id = *session_id;

        let peers = self
            .registry
            .snapshot()
            .peers()
            .iter()
            .filter(|p| !p.provisional)
            .map(|p| PeerSnapshot {
                id: p.id,
                display_name: p.display_name.clone(),
                position: p.position,
            })
            .collect();
        let sync = Message::InitialStateSync(InitialStateSync {
            session_id,
            host_id: ctx.local_id,
            peers,
        });
        let confirm = Message::PlayerJoinConfirm(JoinConfirm {
            session_id,
            peer_id: sender,
        });
        self.enqueue_message(ctx, Some(sender), &sync);
        self.enqueue_message(ctx, Some(sender), &confirm);
    }

    fn handle_position<C: Codec>(
        &mut self,
        ctx: &mut Ctx<'_, C>,
        sender: PeerId,
        update: PositionUpdate,
    ) -> bool {
        if !self.registry.contains(sender) || !update.position.is_finite() {
            debug!("Discarding position from {} ({:?})", sender, update.position);
            return false;
        }
        self.registry.upsert(sender, PeerUpdate::touch().with_position(update.position), ctx.now);
        ctx.hooks.on_player_position_received(sender, update.position, update.velocity);
        true
    }

    fn handle_initial_sync<C: Codec>(&mut self, ctx: &mut Ctx<'_, C>, sync: InitialStateSync) {
        for peer in &sync.peers {
            if peer.id == ctx.local_id || peer.id.is_none() {
                continue;
            }
            self.registry.upsert(
                peer.id,
                PeerUpdate::joined(peer.display_name.clone(), peer.position),
                ctx.now,
            );
        }
        if let Link::Client { session_id, .. } = &mut self.link {
            *session_id = Some(sync.session_id);
        }
        debug!("Initial state sync: {} peers", sync.peers.len());
        ctx.hooks.on_initial_state_sync(&sync);
    }

    fn handle_join_confirm<C: Codec>(&mut self, ctx: &mut Ctx<'_, C>, confirm: JoinConfirm) {
        if confirm.peer_id != ctx.local_id {
            debug!("Ignoring join confirmation for {}", confirm.peer_id);
            return;
        }
        if let Link::Client { session_id, join_confirmed, .. } = &mut self.link {
            if !*join_confirmed {
                info!("Join confirmed for session {}", confirm.session_id);
            }
            *join_confirmed = true;
            *session_id = Some(confirm.session_id);
        }
    }

    /// Validate a shot and, if valid, broadcast the authoritative projectile.
    fn handle_shot<C: Codec>(
        &mut self,
        ctx: &mut Ctx<'_, C>,
        requester: PeerId,
        request: ShootRequest,
    ) -> bool {
        if let Err(reason) = self.shots.validate(requester, &request, ctx.now) {
            ctx.stats.shots_rejected += 1;
            warn!("{}", ProtocolViolation::InvalidShot { requester, reason });
            return false;
        }
        let Some(direction) = request.direction.normalized() else {
            return false;
        };

        let projectile = ProjectileSpawn {
            projectile_id: self.next_projectile_id,
            owner: requester,
            origin: request.origin,
            direction,
            speed: ctx.config.projectile_speed,
        };
        self.next_projectile_id = self.next_projectile_id.wrapping_add(1).max(1);

        ctx.hooks.on_projectile_spawn(&projectile);
        self.enqueue_message(ctx, None, &Message::ProjectileSpawn(projectile))
    }

    fn on_link_connected<C: Codec>(&mut self, ctx: &mut Ctx<'_, C>, peer: PeerId) {
        if peer == ctx.local_id || peer.is_none() {
            return;
        }
        if !self.registry.touch(peer, ctx.now) {
            self.registry.upsert(peer, PeerUpdate::provisional(), ctx.now);
            info!("Peer {} connected", peer);
        }
        if self.role() == Role::Host {
            let map = ctx.hooks.map_snapshot();
            self.enqueue_message(ctx, Some(peer), &Message::MapSync(map));
        }
    }

    fn on_link_disconnected<C: Codec>(&mut self, ctx: &mut Ctx<'_, C>, peer: PeerId) {
        if peer == ctx.local_id {
            return;
        }
        if self.remove_peer(ctx, peer, false) {
            info!("Peer {} link dropped", peer);
            self.announce_departure(peer);
        }
    }

    /// Host only: tell the remaining clients that `peer` is gone, as if it
    /// had sent its own PlayerLeave.
    fn announce_departure(&mut self, peer: PeerId) {
        if self.role() != Role::Host {
            return;
        }
        self.outbound.push_back(Outbound {
            packet: Packet::broadcast(PacketType::PlayerLeave, peer, Vec::new()),
            exclude: Some(peer),
        });
    }

    /// Remove a peer and notify the game. Returns `false` if it was unknown.
    fn remove_peer<C: Codec>(&mut self, ctx: &mut Ctx<'_, C>, peer: PeerId, release: bool) -> bool {
        if self.registry.remove(peer).is_none() {
            return false;
        }
        self.shots.forget(peer);
        ctx.hooks.on_player_left(peer);

        if let Link::Client { host_id, join_confirmed, .. } = &mut self.link {
            if *host_id == peer && *join_confirmed {
                *join_confirmed = false;
                self.outbound
                    .retain(|o| o.packet.packet_type() != PacketType::PlayerPosition);
                warn!("Lost host {}; join must be repeated", peer);
            }
        }

        if release {
            if let Link::Host { transport, .. } = &mut self.link {
                if let Err(e) = transport.release_session(peer) {
                    ctx.stats.transport_errors += 1;
                    warn!("Failed to release session for {}: {}", peer, e);
                }
            }
        }
        true
    }

    fn sweep<C: Codec>(&mut self, ctx: &mut Ctx<'_, C>) -> usize {
        let window = ctx.config.timeout_window();
        let release = self.role() == Role::Host;
        let mut evicted = 0;

        for peer in self.registry.expired(ctx.now, window, ctx.local_id) {
            if self.remove_peer(ctx, peer, release) {
                warn!("Peer {} timed out after {:?} of silence", peer, window);
                self.announce_departure(peer);
                ctx.stats.evictions += 1;
                evicted += 1;
            }
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::network::hooks::NullHooks;
    use crate::network::loopback::LoopbackNetwork;
    use crate::network::protocol::{EnemyPosition, RoomCleared};
    use std::sync::Mutex;

    const HOST: PeerId = PeerId::new(100);
    const ALICE: PeerId = PeerId::new(200);
    const BOB: PeerId = PeerId::new(300);

    #[derive(Clone, Default)]
    struct Recorder {
        joined: Arc<Mutex<Vec<PeerId>>>,
        left: Arc<Mutex<Vec<PeerId>>>,
        projectiles: Arc<Mutex<Vec<ProjectileSpawn>>>,
        rooms: Arc<Mutex<Vec<u32>>>,
    }

    impl GameHooks for Recorder {
        fn on_player_joined(&mut self, peer: &crate::network::registry::PeerRecord) {
            self.joined.lock().unwrap().push(peer.id);
        }
        fn on_player_left(&mut self, peer: PeerId) {
            self.left.lock().unwrap().push(peer);
        }
        fn on_projectile_spawn(&mut self, projectile: &ProjectileSpawn) {
            self.projectiles.lock().unwrap().push(*projectile);
        }
        fn on_room_cleared(&mut self, room: &RoomCleared) {
            self.rooms.lock().unwrap().push(room.room_id);
        }
        fn enemy_snapshot(&mut self) -> Vec<EnemyPosition> {
            vec![EnemyPosition { enemy_id: 1, position: Vec2::ZERO, velocity: Vec2::ZERO }]
        }
    }

    fn session(id: PeerId, clock: &ManualClock, hooks: impl GameHooks + 'static) -> Session {
        Session::with_parts(
            id,
            SessionConfig::default(),
            BincodeCodec::new(),
            Arc::new(clock.clone()),
            hooks,
        )
    }

    fn host_session(net: &LoopbackNetwork, clock: &ManualClock, hooks: impl GameHooks + 'static) -> Session {
        let mut s = session(HOST, clock, hooks);
        s.initialize_as_host(SessionId::new([1; 16]), net.host(HOST)).unwrap();
        s
    }

    fn client_session(net: &LoopbackNetwork, id: PeerId, clock: &ManualClock) -> Session {
        let mut s = session(id, clock, NullHooks);
        s.initialize_as_client(HOST, net.client(id, HOST)).unwrap();
        s
    }

    #[test]
    fn test_uninitialized_is_noop() {
        let clock = ManualClock::new();
        let mut s = session(HOST, &clock, NullHooks);

        assert!(!s.is_initialized());
        assert!(!s.send_to_all(PacketType::HeartBeat, vec![]));
        assert!(!s.request_join());
        assert_eq!(s.tick(), TickReport::default());
        s.shutdown();
        assert!(s.registry_snapshot().is_empty());
    }

    #[test]
    fn test_idempotent_host_init() {
        let net = LoopbackNetwork::new();
        let clock = ManualClock::new();
        let mut s = session(HOST, &clock, NullHooks);
        let sid = SessionId::new([7; 16]);

        s.initialize_as_host(sid, net.host(HOST)).unwrap();
        s.initialize_as_host(sid, net.host(HOST)).unwrap();

        assert_eq!(s.role(), Some(Role::Host));
        assert_eq!(s.registry_snapshot().len(), 1);
        assert!(s.registry_snapshot().contains(HOST));
    }

    #[test]
    fn test_conflicting_init() {
        let net = LoopbackNetwork::new();
        let clock = ManualClock::new();
        let mut s = session(HOST, &clock, NullHooks);
        s.initialize_as_host(SessionId::new([1; 16]), net.host(HOST)).unwrap();

        assert_eq!(
            s.initialize_as_client(ALICE, net.client(HOST, ALICE)),
            Err(SessionError::RoleConflict { current: Role::Host, requested: Role::Client })
        );
        assert_eq!(
            s.initialize_as_host(SessionId::new([2; 16]), net.host(HOST)),
            Err(SessionError::AlreadyInitialized)
        );
    }

    #[test]
    fn test_invalid_ids() {
        let net = LoopbackNetwork::new();
        let clock = ManualClock::new();

        let mut zero = session(PeerId::NONE, &clock, NullHooks);
        assert!(matches!(
            zero.initialize_as_host(SessionId::new([1; 16]), net.host(PeerId::NONE)),
            Err(SessionError::InvalidPeerId(_))
        ));

        let mut selfish = session(ALICE, &clock, NullHooks);
        assert!(matches!(
            selfish.initialize_as_client(ALICE, net.client(ALICE, ALICE)),
            Err(SessionError::InvalidPeerId(_))
        ));
    }

    #[test]
    fn test_client_cannot_enqueue_host_authoritative() {
        let net = LoopbackNetwork::new();
        let clock = ManualClock::new();
        let _host = host_session(&net, &clock, NullHooks);
        let mut client = client_session(&net, ALICE, &clock);

        let room = Message::RoomCleared(RoomCleared { room_id: 1 });
        assert!(!client.broadcast_message(&room));
        assert!(!client.send_to_all(PacketType::EnemySpawn, vec![]));
        assert!(client.pending_outbound().is_empty());
        assert_eq!(client.stats().protocol_violations, 2);
    }

    #[test]
    fn test_host_cannot_enqueue_shoot_request() {
        let net = LoopbackNetwork::new();
        let clock = ManualClock::new();
        let mut host = host_session(&net, &clock, NullHooks);
        assert!(!host.send_to_all(PacketType::PlayerShootRequest, vec![]));
    }

    #[test]
    fn test_position_gated_until_confirm() {
        let net = LoopbackNetwork::new();
        let clock = ManualClock::new();
        let mut host = host_session(&net, &clock, NullHooks);
        let mut client = client_session(&net, ALICE, &clock);

        client.set_local_position(Vec2::new(1.0, 1.0), Vec2::ZERO);
        clock.advance(Duration::from_millis(200));
        client.tick();
        assert!(!client
            .pending_outbound()
            .iter()
            .any(|p| p.packet_type() == PacketType::PlayerPosition));

        client.request_join();
        client.tick();
        host.tick();
        client.tick();
        assert!(client.is_join_confirmed());

        clock.advance(Duration::from_millis(200));
        client.tick();
        assert!(client
            .pending_outbound()
            .iter()
            .any(|p| p.packet_type() == PacketType::PlayerPosition));
    }

    #[test]
    fn test_host_shot_spawns_projectile_locally() {
        let net = LoopbackNetwork::new();
        let clock = ManualClock::new();
        let hooks = Recorder::default();
        let mut host = host_session(&net, &clock, hooks.clone());

        assert!(host.request_shot(Vec2::ZERO, Vec2::new(0.0, 2.0)));
        let projectiles = hooks.projectiles.lock().unwrap().clone();
        assert_eq!(projectiles.len(), 1);
        assert_eq!(projectiles[0].owner, HOST);
        assert_eq!(projectiles[0].direction, Vec2::UP);

        // Rate limited.
        assert!(!host.request_shot(Vec2::ZERO, Vec2::UP));
        assert_eq!(host.stats().shots_rejected, 1);
    }

    #[test]
    fn test_host_emits_enemy_state_periodically() {
        let net = LoopbackNetwork::new();
        let clock = ManualClock::new();
        let mut host = host_session(&net, &clock, Recorder::default());

        host.tick();
        assert!(host.pending_outbound().is_empty());

        clock.advance(Duration::from_millis(150));
        host.tick();
        assert!(host
            .pending_outbound()
            .iter()
            .any(|p| p.packet_type() == PacketType::EnemyPosition));
    }

    #[test]
    fn test_unknown_tag_dropped() {
        let net = LoopbackNetwork::new();
        let clock = ManualClock::new();
        let mut host = host_session(&net, &clock, NullHooks);
        let _client = net.client(ALICE, HOST);

        let env = crate::network::packet::WireEnvelope {
            version: crate::network::packet::PROTOCOL_VERSION,
            tag: 250,
            sender: ALICE.raw(),
            target: 0,
            payload: vec![1, 2, 3],
        };
        let bytes = BincodeCodec::new().serialize_object(&env).unwrap();
        net.inject(HOST, ALICE, bytes);

        let report = host.tick();
        assert_eq!(report.dispatched, 0);
        assert_eq!(report.dropped, 1);
        assert_eq!(host.stats().decode_errors, 1);
    }

    #[test]
    fn test_link_connect_sends_map_sync() {
        let net = LoopbackNetwork::new();
        let clock = ManualClock::new();
        let mut host = host_session(&net, &clock, NullHooks);
        let _client = net.client(BOB, HOST);

        host.tick();
        let snap = host.registry_snapshot();
        assert!(snap.get(BOB).unwrap().provisional);

        let codec = BincodeCodec::new();
        let map_syncs: Vec<_> = net
            .sent_log()
            .into_iter()
            .filter(|r| r.to == BOB)
            .map(|r| codec.deserialize_packet(&r.bytes).unwrap())
            .filter(|p| p.packet_type() == PacketType::MapSync)
            .collect();
        assert_eq!(map_syncs.len(), 1);
    }

    #[test]
    fn test_explicit_leave_removes_and_releases() {
        let net = LoopbackNetwork::new();
        let clock = ManualClock::new();
        let hooks = Recorder::default();
        let mut host = host_session(&net, &clock, hooks.clone());
        let mut client = client_session(&net, ALICE, &clock);

        client.request_join();
        client.tick();
        host.tick();
        assert!(host.registry_snapshot().contains(ALICE));

        client.leave();
        client.tick();
        host.tick();
        assert!(!host.registry_snapshot().contains(ALICE));
        assert_eq!(*hooks.left.lock().unwrap(), vec![ALICE]);
        assert_eq!(net.released(), vec![ALICE]);
    }

    #[test]
    fn test_shutdown_clears_everything() {
        let net = LoopbackNetwork::new();
        let clock = ManualClock::new();
        let mut host = host_session(&net, &clock, NullHooks);
        let _client = net.client(ALICE, HOST);
        host.send_to_all(PacketType::HeartBeat, vec![]);

        host.shutdown();
        assert!(!host.is_initialized());
        assert!(host.pending_outbound().is_empty());
        assert!(host.registry_snapshot().is_empty());
        assert_eq!(host.stats(), SessionStats::default());

        // Can start over afterwards.
        host.initialize_as_host(SessionId::new([3; 16]), net.host(HOST)).unwrap();
        assert!(host.is_initialized());
    }

    #[test]
    fn test_shutdown_while_pushers_run() {
        let net = LoopbackNetwork::new();
        let clock = ManualClock::new();
        let transport = net.host(HOST);
        let handle = transport.inbox_handle();
        let mut host = session(HOST, &clock, NullHooks);
        host.initialize_as_host(SessionId::new([1; 16]), transport).unwrap();

        let pushers: Vec<_> = (0..4u64)
            .map(|i| {
                let handle = handle.clone();
                std::thread::spawn(move || {
                    for n in 0..500u32 {
                        handle.push_datagram(PeerId::new(1_000 + i), n.to_le_bytes().to_vec());
                        std::thread::yield_now();
                    }
                })
            })
            .collect();

        host.tick();
        host.shutdown();
        for pusher in pushers {
            pusher.join().unwrap();
        }

        assert!(!host.is_initialized());
        assert!(host.registry_snapshot().is_empty());
        assert!(host.pending_outbound().is_empty());
        assert!(!handle.push_datagram(ALICE, vec![1]));
        assert_eq!(host.tick(), TickReport::default());
    }

    #[test]
    fn test_failed_send_marks_link_dead() {
        let net = LoopbackNetwork::new();
        let clock = ManualClock::new();
        let mut host = host_session(&net, &clock, NullHooks);
        let alice = net.client(ALICE, HOST);
        let bob = net.client(BOB, HOST);
        host.tick();
        drop(bob);

        assert!(host.send_to_peer(BOB, PacketType::HeartBeat, vec![]));
        host.tick();

        let snap = host.registry_snapshot();
        assert!(!snap.get(BOB).unwrap().connected);
        assert!(snap.get(ALICE).unwrap().connected);
        assert_eq!(host.stats().transport_errors, 1);
        drop(alice);
    }

    #[test]
    fn test_config_from_env() {
        std::env::set_var("HOSTLINK_HEARTBEAT_MS", "0");
        std::env::set_var("HOSTLINK_TIMEOUT_MULTIPLIER", "0");
        let config = SessionConfig::from_env();
        assert_eq!(config.heartbeat_interval, DEFAULT_HEARTBEAT_INTERVAL);
        assert_eq!(config.timeout_multiplier, DEFAULT_TIMEOUT_MULTIPLIER);
        assert!(!config.timeout_window().is_zero());

        std::env::set_var("HOSTLINK_HEARTBEAT_MS", "250");
        std::env::set_var("HOSTLINK_TIMEOUT_MULTIPLIER", "4");
        std::env::set_var("HOSTLINK_DISPLAY_NAME", "tester");
        let config = SessionConfig::from_env();
        assert_eq!(config.heartbeat_interval, Duration::from_millis(250));
        assert_eq!(config.timeout_window(), Duration::from_secs(1));
        assert_eq!(config.display_name, "tester");

        std::env::set_var("HOSTLINK_HEARTBEAT_MS", "soon");
        assert_eq!(SessionConfig::from_env().heartbeat_interval, DEFAULT_HEARTBEAT_INTERVAL);

        for key in ["HOSTLINK_HEARTBEAT_MS", "HOSTLINK_TIMEOUT_MULTIPLIER", "HOSTLINK_DISPLAY_NAME"] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_config_window() {
        let config = SessionConfig {
            heartbeat_interval: Duration::from_secs(1),
            timeout_multiplier: 30,
            ..Default::default()
        };
        assert_eq!(config.timeout_window(), Duration::from_secs(30));
        assert_eq!(SessionConfig::default().timeout_window(), Duration::from_secs(12));
    }
}
