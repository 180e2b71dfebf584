//! Server time: a monotonic millisecond clock shared by all three workers.
//!
//! Unlike a discrete-event simulation clock, this clock does not advance by
//! popping scheduled events — ticks are driven by real wall-clock timers
//! (`tokio::time::interval`) and this clock just answers "what time is it".

use std::time::Instant;

use bevy_ecs::prelude::Resource;

/// One second in milliseconds.
pub const ONE_SEC_MS: u64 = 1000;

/// Default director tick cadence (§2): 500-1000 ms, implementations pick a point
/// in that range. 750 ms splits the difference.
pub const DEFAULT_DIRECTOR_TICK_MS: u64 = 750;
/// Obstacle-detection tick cadence: fixed at 100 ms (§2, §4.7).
pub const OBSTACLE_TICK_MS: u64 = 100;
/// Auto-moderation tick cadence: fixed at 1 Hz (§2, §4.10).
pub const AUTOMOD_TICK_MS: u64 = ONE_SEC_MS;

/// Monotonic server clock, in milliseconds since the clock was created.
#[derive(Debug, Clone, Resource)]
pub struct ServerClock {
    epoch: Instant,
}

impl Default for ServerClock {
    fn default() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl ServerClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Milliseconds elapsed since this clock was created.
    pub fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}
