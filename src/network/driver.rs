//! Tick Driver
//!
//! Calls [`Session::tick`] at a fixed rate until told to stop. Games with
//! their own frame loop call `tick` directly and never need this.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::network::codec::Codec;
use crate::network::session::Session;

/// Default driver rate (Hz).
pub const DEFAULT_TICK_RATE: u32 = 60;

/// Tick `session` at `tick_rate` Hz until `shutdown` fires (or its sender is
/// dropped), then shut the session down. Returns the number of ticks run.
pub async fn run_tick_loop<C: Codec>(
    session: &mut Session<C>,
    tick_rate: u32,
    mut shutdown: broadcast::Receiver<()>,
) -> u64 {
    let tick_duration = Duration::from_secs(1) / tick_rate.max(1);
    let mut ticker = interval(tick_duration);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut ticks = 0u64;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = session.tick();
                ticks += 1;
                if report.evicted > 0 || report.dropped > 0 {
                    debug!(
                        "Tick {}: {} evicted, {} dropped",
                        ticks, report.evicted, report.dropped
                    );
                }
            }
            _ = shutdown.recv() => {
                break;
            }
        }
    }

    session.shutdown();
    info!("Tick loop stopped after {} ticks", ticks);
    ticks
}
