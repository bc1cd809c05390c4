//! Hostlink Demo
//!
//! One host and two clients on an in-memory network: join, move, shoot,
//! then one client goes silent and is evicted.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use hostlink::network::codec::BincodeCodec;
use hostlink::network::hooks::GameHooks;
use hostlink::network::loopback::LoopbackNetwork;
use hostlink::network::protocol::{EnemyPosition, ProjectileSpawn};
use hostlink::network::registry::PeerRecord;
use hostlink::{ManualClock, PeerId, Session, SessionConfig, SessionId, Vec2, VERSION};

/// Logs what each peer's game would react to.
struct DemoHooks {
    name: &'static str,
    enemy_x: f32,
}

impl DemoHooks {
    fn new(name: &'static str) -> Self {
        Self { name, enemy_x: 0.0 }
    }
}

impl GameHooks for DemoHooks {
    fn on_player_joined(&mut self, peer: &PeerRecord) {
        info!("[{}] {} joined as {:?}", self.name, peer.id, peer.display_name);
    }

    fn on_player_left(&mut self, peer: PeerId) {
        info!("[{}] {} left", self.name, peer);
    }

    fn on_projectile_spawn(&mut self, projectile: &ProjectileSpawn) {
        info!(
            "[{}] projectile #{} from {} heading {:?}",
            self.name, projectile.projectile_id, projectile.owner, projectile.direction
        );
    }

    fn enemy_snapshot(&mut self) -> Vec<EnemyPosition> {
        self.enemy_x += 0.5;
        vec![EnemyPosition {
            enemy_id: 1,
            position: Vec2::new(self.enemy_x, 4.0),
            velocity: Vec2::RIGHT,
        }]
    }
}

fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    info!("Hostlink demo v{}", VERSION);

    let config = SessionConfig::from_env();
    info!(
        "Heartbeat {:?}, timeout window {:?}",
        config.heartbeat_interval,
        config.timeout_window()
    );

    let net = LoopbackNetwork::new();
    let clock = ManualClock::new();
    let session_id = SessionId::random();
    let host_id = PeerId::new(1001);
    let alice_id = PeerId::new(2002);
    let bob_id = PeerId::new(3003);

    let peer = |id: PeerId, name: &'static str| {
        Session::with_parts(
            id,
            SessionConfig { display_name: name.to_string(), ..config.clone() },
            BincodeCodec::new(),
            Arc::new(clock.clone()),
            DemoHooks::new(name),
        )
    };

    let mut host = peer(host_id, "host");
    host.initialize_as_host(session_id, net.host(host_id))?;
    let mut alice = peer(alice_id, "alice");
    alice.initialize_as_client(host_id, net.client(alice_id, host_id))?;
    let mut bob = peer(bob_id, "bob");
    bob.initialize_as_client(host_id, net.client(bob_id, host_id))?;

    info!("Session {}", session_id);

    alice.request_join();
    bob.request_join();

    let step = Duration::from_millis(50);
    for frame in 0..40u32 {
        clock.advance(step);
        let t = frame as f32 * 0.05;
        alice.set_local_position(Vec2::new(t, 0.0), Vec2::RIGHT);
        bob.set_local_position(Vec2::new(0.0, t), Vec2::UP);
        if frame == 20 {
            alice.request_shot(Vec2::new(t, 0.0), Vec2::new(1.0, 1.0));
        }

        alice.tick();
        bob.tick();
        host.tick();
    }

    info!(
        "alice confirmed: {}, bob confirmed: {}",
        alice.is_join_confirmed(),
        bob.is_join_confirmed()
    );

    // Bob stops ticking; the host evicts him once the window passes.
    let window = host.config().timeout_window();
    let mut elapsed = Duration::ZERO;
    while elapsed <= window + host.config().heartbeat_interval {
        clock.advance(step * 4);
        elapsed += step * 4;
        alice.tick();
        host.tick();
    }

    for record in host.registry_snapshot().peers() {
        info!("host sees {} ({:?}) at {:?}", record.id, record.display_name, record.position);
    }

    let stats = host.stats();
    info!(
        "host stats: {} received, {} sent, {} evictions, {} violations",
        stats.packets_received, stats.packets_sent, stats.evictions, stats.protocol_violations
    );

    alice.leave();
    alice.tick();
    host.tick();
    alice.shutdown();
    host.shutdown();
    bob.shutdown();

    Ok(())
}
