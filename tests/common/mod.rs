//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use hostlink::network::codec::{BincodeCodec, Codec};
use hostlink::network::hooks::GameHooks;
use hostlink::network::loopback::LoopbackNetwork;
use hostlink::network::protocol::{
    EnemyPosition, EnemySpawn, InitialStateSync, MapSync, ProjectileSpawn, RoomCleared,
};
use hostlink::network::registry::PeerRecord;
use hostlink::{ManualClock, Packet, PeerId, Session, SessionConfig, SessionId, Vec2};

pub const HOST: PeerId = PeerId::new(10);
pub const ALICE: PeerId = PeerId::new(20);
pub const BOB: PeerId = PeerId::new(30);

/// Hook invocation as seen by the game.
#[derive(Debug, Clone, PartialEq)]
pub enum HookCall {
    Joined(PeerId, String),
    Left(PeerId),
    Position(PeerId, Vec2),
    EnemySpawn(u32),
    Projectile(ProjectileSpawn),
    RoomCleared(u32),
    MapSync(u64),
    InitialSync(Vec<PeerId>),
}

/// Hooks that record every call into a shared log.
#[derive(Clone, Default)]
pub struct RecordingHooks {
    calls: Arc<Mutex<Vec<HookCall>>>,
}

impl RecordingHooks {
    pub fn calls(&self) -> Vec<HookCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn count(&self, pred: impl Fn(&HookCall) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    fn push(&self, call: HookCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl GameHooks for RecordingHooks {
    fn on_player_joined(&mut self, peer: &PeerRecord) {
        self.push(HookCall::Joined(peer.id, peer.display_name.clone()));
    }

    fn on_player_left(&mut self, peer: PeerId) {
        self.push(HookCall::Left(peer));
    }

    fn on_player_position_received(&mut self, peer: PeerId, position: Vec2, _velocity: Vec2) {
        self.push(HookCall::Position(peer, position));
    }

    fn on_enemy_spawn(&mut self, spawn: &EnemySpawn) {
        self.push(HookCall::EnemySpawn(spawn.enemy_id));
    }

    fn on_projectile_spawn(&mut self, projectile: &ProjectileSpawn) {
        self.push(HookCall::Projectile(*projectile));
    }

    fn on_room_cleared(&mut self, room: &RoomCleared) {
        self.push(HookCall::RoomCleared(room.room_id));
    }

    fn on_map_sync_received(&mut self, map: &MapSync) {
        self.push(HookCall::MapSync(map.seed));
    }

    fn on_initial_state_sync(&mut self, sync: &InitialStateSync) {
        self.push(HookCall::InitialSync(sync.peers.iter().map(|p| p.id).collect()));
    }

    fn enemy_snapshot(&mut self) -> Vec<EnemyPosition> {
        Vec::new()
    }

    fn map_snapshot(&mut self) -> MapSync {
        MapSync::new(42, vec![1, 2, 3])
    }
}

/// A session plus the hooks it reports to.
pub struct Peer {
    pub session: Session,
    pub hooks: RecordingHooks,
}

/// In-memory network with a shared manual clock.
pub struct Harness {
    pub net: LoopbackNetwork,
    pub clock: ManualClock,
    pub config: SessionConfig,
    pub session_id: SessionId,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            net: LoopbackNetwork::new(),
            clock: ManualClock::new(),
            config,
            session_id: SessionId::new([9; 16]),
        }
    }

    fn session(&self, id: PeerId, name: &str, hooks: RecordingHooks) -> Session {
        Session::with_parts(
            id,
            SessionConfig { display_name: name.to_string(), ..self.config.clone() },
            BincodeCodec::new(),
            Arc::new(self.clock.clone()),
            hooks,
        )
    }

    pub fn host(&self) -> Peer {
        let hooks = RecordingHooks::default();
        let mut session = self.session(HOST, "host", hooks.clone());
        session.initialize_as_host(self.session_id, self.net.host(HOST)).unwrap();
        Peer { session, hooks }
    }

    pub fn client(&self, id: PeerId, name: &str) -> Peer {
        let hooks = RecordingHooks::default();
        let mut session = self.session(id, name, hooks.clone());
        session.initialize_as_client(HOST, self.net.client(id, HOST)).unwrap();
        Peer { session, hooks }
    }

    pub fn at(&self, secs: f64) {
        self.clock.set_secs_f64(secs);
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    /// Packets delivered to `to`, decoded.
    pub fn delivered_to(&self, to: PeerId) -> Vec<Packet> {
        let codec = BincodeCodec::new();
        self.net
            .sent_log()
            .into_iter()
            .filter(|r| r.to == to)
            .map(|r| codec.deserialize_packet(&r.bytes).unwrap())
            .collect()
    }

    /// Packets sent by `from`, decoded.
    pub fn sent_by(&self, from: PeerId) -> Vec<Packet> {
        let codec = BincodeCodec::new();
        self.net
            .sent_log()
            .into_iter()
            .filter(|r| r.from == from)
            .map(|r| codec.deserialize_packet(&r.bytes).unwrap())
            .collect()
    }
}

/// Client joins and the round trip completes.
pub fn join(host: &mut Peer, client: &mut Peer) {
    client.session.request_join();
    client.session.tick();
    host.session.tick();
    client.session.tick();
}

/// Encode a raw packet as a client would put it on the wire.
pub fn raw_packet(packet: &Packet) -> Vec<u8> {
    BincodeCodec::new().serialize_packet(packet).unwrap()
}
