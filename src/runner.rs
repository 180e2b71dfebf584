//! Ties the three periodic ticks to real wall-clock timers (§5, §10.1).
//!
//! There is no single shared `Schedule` stepped by a discrete-event clock
//! here: the director, obstacle-detection, and auto-moderation ticks run on
//! independent `tokio::time::interval`s and only briefly hold the world lock each time
//! they fire. `bevy_ecs::World` cannot be soundly partitioned across threads
//! without unsafe code, so the three workers share one `World` behind a
//! `tokio::sync::Mutex` rather than racing on disjoint fields — the same
//! mutex-protects-the-shared-state approach §5 calls for around overbooking,
//! generalized to the whole tick for simplicity.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bevy_ecs::prelude::World;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::clock::{AUTOMOD_TICK_MS, OBSTACLE_TICK_MS};
use crate::config::AiDirectorConfig;
use crate::ecs::EntryCar;
use crate::error::TickError;
use crate::external::{EntryCarManager, SessionManager, WeatherManager};
use crate::systems;

pub type SharedWorld = Arc<Mutex<World>>;

/// Handles to the three background workers; `shutdown` joins all of them.
pub struct Workers {
    stop: Arc<Notify>,
    stopped: Arc<AtomicBool>,
    director: JoinHandle<()>,
    obstacle: JoinHandle<()>,
    automod: JoinHandle<()>,
}

impl Workers {
    /// Spawns the director, obstacle-detection, and auto-moderation workers.
    /// The director's cadence comes from `config.ai_behavior_update_interval_ms`
    /// (§2: 500-1000ms); the other two are fixed (§2, §4.7, §4.10).
    pub fn spawn(
        world: SharedWorld,
        traffic: Arc<dyn EntryCarManager>,
        sessions: Arc<dyn SessionManager>,
        weather: Arc<dyn WeatherManager>,
    ) -> Self {
        let stop = Arc::new(Notify::new());
        let stopped = Arc::new(AtomicBool::new(false));

        // Best-effort: falls back to the default cadence if the lock is
        // momentarily held; this only affects the very first tick's timing.
        let director_interval_ms = initial_director_interval_ms(&world);

        let director = tokio::spawn(director_worker(
            world.clone(),
            stop.clone(),
            stopped.clone(),
            director_interval_ms,
        ));
        let obstacle = tokio::spawn(obstacle_worker(
            world.clone(),
            stop.clone(),
            stopped.clone(),
            traffic.clone(),
        ));
        let automod = tokio::spawn(automod_worker(world, stop.clone(), stopped.clone(), traffic, sessions, weather));

        Self {
            stop,
            stopped,
            director,
            obstacle,
            automod,
        }
    }

    /// Signals every worker to stop after its current tick and waits for them.
    pub async fn shutdown(self) {
        self.stopped.store(true, Ordering::Relaxed);
        self.stop.notify_waiters();
        let _ = tokio::join!(self.director, self.obstacle, self.automod);
    }
}

/// Reads the configured director cadence without blocking the async runtime;
/// falls back to the default if the lock cannot be acquired immediately.
fn initial_director_interval_ms(world: &SharedWorld) -> u64 {
    world
        .try_lock()
        .map(|w| w.resource::<AiDirectorConfig>().ai_behavior_update_interval_ms)
        .unwrap_or(crate::clock::DEFAULT_DIRECTOR_TICK_MS)
}

async fn director_worker(world: SharedWorld, stop: Arc<Notify>, stopped: Arc<AtomicBool>, interval_ms: u64) {
    let mut interval = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut rng = StdRng::from_entropy();

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = stop.notified() => break,
        }
        if stopped.load(Ordering::Relaxed) {
            break;
        }
        let mut world = world.lock().await;
        if let Err(error) = run_director_tick(&mut world, &mut rng) {
            tracing::warn!(%error, "director tick failed");
        }
    }
}

async fn obstacle_worker(world: SharedWorld, stop: Arc<Notify>, stopped: Arc<AtomicBool>, traffic: Arc<dyn EntryCarManager>) {
    let mut interval = tokio::time::interval(Duration::from_millis(OBSTACLE_TICK_MS));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = stop.notified() => break,
        }
        if stopped.load(Ordering::Relaxed) {
            break;
        }
        let mut world = world.lock().await;
        systems::obstacle::run(&mut world, traffic.as_ref());
    }
}

async fn automod_worker(
    world: SharedWorld,
    stop: Arc<Notify>,
    stopped: Arc<AtomicBool>,
    traffic: Arc<dyn EntryCarManager>,
    sessions: Arc<dyn SessionManager>,
    weather: Arc<dyn WeatherManager>,
) {
    let mut interval = tokio::time::interval(Duration::from_millis(AUTOMOD_TICK_MS));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = stop.notified() => break,
        }
        if stopped.load(Ordering::Relaxed) {
            break;
        }
        let mut world = world.lock().await;
        systems::automod::run(&mut world, traffic.as_ref(), sessions.as_ref(), weather.as_ref());
    }
}

/// One full director tick: categorize, measure, despawn, spawn (§4.1-§4.5).
/// Caught and logged by the background worker; never propagates past a tick (§7).
pub fn run_director_tick(world: &mut World, rng: &mut StdRng) -> Result<(), TickError> {
    let has_players = systems::categorize::run(world);
    if !has_players {
        despawn_all_initialized(world);
        return Ok(());
    }

    let distance = systems::distance::run(world);
    systems::spawn::remove_unsafe_states(world, &distance);
    systems::spawn::spawn_missing(world, &distance, rng)
}

/// The empty-world rule (§4.1): with no eligible players, every AI identity
/// is despawned rather than left to drive around alone.
fn despawn_all_initialized(world: &mut World) {
    let mut query = world.query::<&mut EntryCar>();
    for mut car in query.iter_mut(world) {
        for state in car.ai_states.iter_mut() {
            state.despawn();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use glam::Vec3;

    #[test]
    fn director_tick_despawns_everyone_when_no_players() {
        let mut world = test_world_with_spline(straight_spline(5));
        let slot = spawn_ai_slot(&mut world, 1, crate::ecs::AiMode::Auto, 1);
        {
            let mut car = world.get_mut::<EntryCar>(slot).unwrap();
            car.ai_states[0].teleport(0, Vec3::ZERO, Vec3::X, 10.0, 0, 0);
        }
        let mut rng = StdRng::seed_from_u64(1);
        run_director_tick(&mut world, &mut rng).unwrap();

        let car = world.get::<EntryCar>(slot).unwrap();
        assert!(!car.ai_states[0].initialized);
    }

    #[test]
    fn director_tick_with_players_and_no_ai_slots_leaves_nothing_to_spawn() {
        let mut world = test_world_with_spline(straight_spline(5));
        spawn_player_car(&mut world, 1, Vec3::ZERO, Vec3::X);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(run_director_tick(&mut world, &mut rng).is_ok());
    }
}
