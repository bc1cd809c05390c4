//! Game Hooks
//!
//! One-way notifications from the session into the game. Every method has a
//! no-op default, so a game only implements what it renders or simulates.
//! Hooks must not call back into the session.

use crate::core::id::PeerId;
use crate::core::vec2::Vec2;
use crate::network::protocol::{
    EnemyPathUpdate, EnemyPosition, EnemyShooting, EnemySpawn, InitialStateSync, ItemPickup,
    ItemSpawn, MapSync, ProjectileSpawn, RoomCleared,
};
use crate::network::registry::PeerRecord;

/// Game-side collaborator driven by session dispatch.
#[allow(unused_variables)]
pub trait GameHooks: Send {
    /// A peer joined (or re-joined).
    fn on_player_joined(&mut self, peer: &PeerRecord) {}

    /// A peer left, explicitly or by timeout.
    fn on_player_left(&mut self, peer: PeerId) {}

    /// A peer reported its position.
    fn on_player_position_received(&mut self, peer: PeerId, position: Vec2, velocity: Vec2) {}

    /// Host spawned an enemy.
    fn on_enemy_spawn(&mut self, spawn: &EnemySpawn) {}

    /// Host moved an enemy.
    fn on_enemy_position(&mut self, update: &EnemyPosition) {}

    /// Host changed an enemy's path.
    fn on_enemy_path(&mut self, update: &EnemyPathUpdate) {}

    /// An enemy fired.
    fn on_enemy_shooting(&mut self, shot: &EnemyShooting) {}

    /// Host spawned a projectile.
    fn on_projectile_spawn(&mut self, projectile: &ProjectileSpawn) {}

    /// Host spawned an item.
    fn on_item_spawn(&mut self, item: &ItemSpawn) {}

    /// An item was picked up.
    fn on_item_pickup(&mut self, pickup: &ItemPickup) {}

    /// A room was cleared.
    fn on_room_cleared(&mut self, room: &RoomCleared) {}

    /// Map layout arrived from the host.
    fn on_map_sync_received(&mut self, map: &MapSync) {}

    /// Full roster arrived from the host.
    fn on_initial_state_sync(&mut self, sync: &InitialStateSync) {}

    /// Host only: current enemy states for the periodic broadcast.
    fn enemy_snapshot(&mut self) -> Vec<EnemyPosition> {
        Vec::new()
    }

    /// Host only: map layout for a newly connected peer.
    fn map_snapshot(&mut self) -> MapSync {
        MapSync::default()
    }
}

/// Hooks that ignore everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHooks;

impl GameHooks for NullHooks {}
