//! Shared fixtures for unit and integration tests (§10.5).
//!
//! Kept as a plain `pub` module (not `#[cfg(test)]`) so integration tests
//! under `tests/` can reach it too; nothing here does network or filesystem
//! I/O so the extra compile weight in release builds is negligible.

use bevy_ecs::prelude::World;
use glam::Vec3;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::clock::ServerClock;
use crate::config::{AiDirectorConfig, AutoModerationConfig};
use crate::ecs::{AiMode, ClientHandle, DirectorWorkingSet, EntryCar, VehicleStatus};
use crate::spline::{AiSpline, SplinePoint, NO_POINT};

/// A straight line of `n` points, 10m apart, pointing down +X. Point `i`'s
/// lane siblings are empty; no junctions.
pub fn straight_spline(n: usize) -> AiSpline {
    let points = (0..n)
        .map(|i| SplinePoint {
            position: Vec3::new(i as f32 * 10.0, 0.0, 0.0),
            forward: Vec3::X,
            length_m: 10.0,
            next_id: if i + 1 < n { (i + 1) as i32 } else { NO_POINT },
            previous_id: if i > 0 { (i - 1) as i32 } else { NO_POINT },
            junction_branches: Vec::new(),
            lane_ids: Vec::new(),
        })
        .collect();
    AiSpline::new(points)
}

/// Two parallel straight lanes, `lane_width_m` apart, each `n` points long,
/// pointing down +X. Point `i` in lane 0 has lane id `n + i` (lane 1) and
/// vice versa, for lane-selection tests (§4.6).
pub fn two_lane_spline(n: usize, lane_width_m: f32) -> AiSpline {
    let mut points = Vec::with_capacity(n * 2);
    for i in 0..n {
        points.push(SplinePoint {
            position: Vec3::new(i as f32 * 10.0, 0.0, 0.0),
            forward: Vec3::X,
            length_m: 10.0,
            next_id: if i + 1 < n { (i + 1) as i32 } else { NO_POINT },
            previous_id: if i > 0 { (i - 1) as i32 } else { NO_POINT },
            junction_branches: Vec::new(),
            lane_ids: vec![(n + i) as i32],
        });
    }
    for i in 0..n {
        let id = n + i;
        points.push(SplinePoint {
            position: Vec3::new(i as f32 * 10.0, 0.0, lane_width_m),
            forward: Vec3::X,
            length_m: 10.0,
            next_id: if i + 1 < n { (id + 1) as i32 } else { NO_POINT },
            previous_id: if i > 0 { (id - 1) as i32 } else { NO_POINT },
            junction_branches: Vec::new(),
            lane_ids: vec![i as i32],
        });
    }
    AiSpline::new(points)
}

/// A world with the standard resource set a director tick expects: config,
/// auto-moderation config, clock, the given spline, and an empty working set.
pub fn test_world_with_spline(spline: AiSpline) -> World {
    let mut world = World::new();
    world.insert_resource(AiDirectorConfig::default());
    world.insert_resource(AutoModerationConfig::default());
    world.insert_resource(ServerClock::new());
    world.insert_resource(DirectorWorkingSet::default());
    world.insert_resource(spline);
    world
}

/// Spawns a slot occupied by a live human player.
pub fn spawn_player_car(world: &mut World, session_id: u8, position: Vec3, velocity: Vec3) -> bevy_ecs::entity::Entity {
    let now_ms = world.resource::<ServerClock>().now_ms();
    let mut car = EntryCar::new(session_id, AiMode::None);
    car.ai_controlled = false;
    car.client = Some(ClientHandle {
        has_sent_first_update: true,
        is_administrator: false,
    });
    car.status = VehicleStatus {
        position,
        velocity,
        flags: Default::default(),
        last_active_ms: now_ms,
    };
    world.spawn(car).id()
}

/// Spawns an empty AI-eligible slot with `pool_size` uninitialized states.
pub fn spawn_ai_slot(world: &mut World, session_id: u8, ai_mode: AiMode, pool_size: usize) -> bevy_ecs::entity::Entity {
    let mut car = EntryCar::new(session_id, ai_mode);
    car.resize_pool(pool_size);
    world.spawn(car).id()
}

pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}
