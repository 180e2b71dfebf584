//! Obstacle-detection tick, 100ms cadence (§4.7, §5 "Obstacle tick"). Cheap
//! on purpose: scans every initialized AI identity against every other
//! vehicle, updates target speed and telemetry, and optionally emits debug
//! packets. Best-effort — failures here are logged and swallowed, never
//! propagated past the tick boundary (§7).

use bevy_ecs::prelude::World;
use glam::Vec3;

use crate::clock::ServerClock;
use crate::config::AiDirectorConfig;
use crate::ecs::EntryCar;
use crate::external::{EntryCarManager, OutboundPacket};
use crate::packets::{self, AiDebugEntry, AiDebugPacket};
use crate::spline::AiSpline;

/// Distance at which an AI identity starts braking for whatever is ahead of it.
const OBSTACLE_BRAKE_DISTANCE_M: f32 = 30.0;

struct OtherVehicle {
    position: Vec3,
}

pub fn run(world: &mut World, traffic: &dyn EntryCarManager) {
    let config = *world.resource::<AiDirectorConfig>();
    let lane_radius_squared = config.lane_radius_squared();
    let now_ms = world.resource::<ServerClock>().now_ms();

    let others: Vec<OtherVehicle> = {
        let mut query = world.query::<&EntryCar>();
        let mut out = Vec::new();
        for car in query.iter(world) {
            if car.is_player_live() {
                out.push(OtherVehicle { position: car.status.position });
            }
            for state in car.initialized_states() {
                out.push(OtherVehicle { position: state.position });
            }
        }
        out
    };

    let spline = world.resource::<AiSpline>().clone();
    let mut debug_entries = Vec::new();

    let mut query = world.query::<&mut EntryCar>();
    for mut car in query.iter_mut(world) {
        let session_id = car.session_id;
        for state in car.ai_states.iter_mut().filter(|s| s.initialized) {
            let forward = if state.spline_point_id >= 0 {
                spline.forward(state.spline_point_id)
            } else {
                state.velocity.normalize_or_zero()
            };

            let nearest = others
                .iter()
                .filter(|other| other.position.distance_squared(state.position) > 1e-6)
                .filter(|other| (other.position - state.position).dot(forward) > 0.0)
                .filter(|other| {
                    let offset = other.position - state.position;
                    let longitudinal = offset.dot(forward);
                    let lateral_squared = offset.length_squared() - longitudinal * longitudinal;
                    lateral_squared <= lane_radius_squared
                })
                .map(|other| other.position.distance(state.position))
                .fold(f32::INFINITY, f32::min);

            state.closest_ai_obstacle_distance_cm = packets::obstacle_distance_to_cm(nearest);

            state.target_speed_ms = if state.is_in_collision_recovery(now_ms) {
                0.0
            } else if nearest < OBSTACLE_BRAKE_DISTANCE_M {
                let scale = (nearest / OBSTACLE_BRAKE_DISTANCE_M).clamp(0.0, 1.0);
                state.max_speed_ms * scale
            } else {
                state.max_speed_ms
            };

            if config.debug {
                debug_entries.push(AiDebugEntry::from((session_id, &*state)));
            }
        }
    }

    if config.debug && !debug_entries.is_empty() {
        for packet in AiDebugPacket::chunk(&debug_entries) {
            traffic.broadcast_packet(OutboundPacket::AiDebug(packet));
        }
    }
}
