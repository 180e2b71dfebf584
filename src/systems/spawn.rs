//! Director tick, phases 4-5 (§4.3, §4.5): evict AI identities that are no
//! longer safe to keep, then fill uninitialized slots with safely-placed new
//! ones.

use std::collections::HashMap;

use bevy_ecs::prelude::World;
use glam::Vec3;
use rand::Rng;

use crate::clock::ServerClock;
use crate::config::AiDirectorConfig;
use crate::ecs::{AiRef, DirectorWorkingSet, EntryCar};
use crate::error::TickError;
use crate::spline::{AiSpline, JunctionEvaluator, NO_POINT};
use crate::systems::distance::DistanceSummary;
use crate::systems::lane;

/// Placeholder speed an identity spawns at; the obstacle tick (§4.7)
/// retargets it on the very next 100ms pass.
const DEFAULT_SPAWN_SPEED_MS: f32 = 20.0;

/// How far along the graph to look, in either direction, for a headway-gating
/// neighbor before giving up (§4.3 step 3, "≤50 m").
const NEIGHBOR_SEARCH_DISTANCE_M: f32 = 50.0;

/// Minimum graph distance a candidate spawn point must keep from its nearest
/// indexed neighbor (§4.3 step 4 "minimum headway").
const MIN_SPAWN_HEADWAY_M: f32 = 20.0;

/// Maximum `max_speed_ms` difference tolerated between a spawning identity
/// and its nearest neighbor (§4.3 step 4 "compatible speed class").
const SPEED_CLASS_TOLERANCE_MS: f32 = 8.0;

/// Minimum squared distance a spawn point must keep from every other
/// initialized AI identity (§4.5 "any AI slot rejects the point via its own
/// safety predicate").
const AI_SPAWN_VETO_DISTANCE_SQUARED_M2: f32 = 15.0 * 15.0;

/// Graph points a safety-loop retraversal advances per attempt (§4.5 step 7).
const SAFETY_STEP_POINTS: i32 = 5;

/// Demote initialized AI states that are unsafe to keep: still farther than
/// `player_radius` from every connected player, and past their spawn
/// protection window (§4.3 "remove_unsafe_states"). Returns the number
/// despawned.
pub fn remove_unsafe_states(world: &mut World, distance: &DistanceSummary) -> usize {
    let now_ms = world.resource::<ServerClock>().now_ms();
    let config = *world.resource::<AiDirectorConfig>();
    let mut despawned = 0;

    for candidate in &distance.ai_by_distance_desc {
        if candidate.nearest_player_distance_squared <= config.player_radius_squared_m2 {
            continue;
        }
        let Some(mut car) = world.get_mut::<EntryCar>(candidate.ai.slot) else {
            continue;
        };
        let state = &mut car.ai_states[candidate.ai.state_index];
        if state.is_spawn_protected(now_ms) {
            continue;
        }
        state.despawn();
        despawned += 1;
    }

    despawned
}

fn sign_with_tie_to_positive(x: f32) -> i32 {
    if x < 0.0 {
        -1
    } else {
        1
    }
}

/// Walks the graph from `point_id` looking for the nearest point carrying a
/// `slowest_ai_state` entry, up to `max_distance_m` of travel (§2, §4.3
/// step 3). Returns the occupant and the graph distance traveled to reach it.
fn find_neighbor_ai(
    spline: &AiSpline,
    point_id: i32,
    forward: bool,
    max_distance_m: f32,
    slowest_ai_state: &HashMap<i32, AiRef>,
) -> Option<(AiRef, f32)> {
    let mut current = point_id;
    let mut traveled = 0.0;
    loop {
        let next = if forward { spline.next(current) } else { spline.previous(current) };
        if next == NO_POINT {
            return None;
        }
        traveled += spline.length(current);
        if traveled > max_distance_m {
            return None;
        }
        if let Some(ai_ref) = slowest_ai_state.get(&next) {
            return Some((*ai_ref, traveled));
        }
        current = next;
    }
}

/// Headway + speed-class gate (§4.3 step 4): a spawn point is rejected if
/// either indexed neighbor is closer than the minimum headway, or has an
/// incompatible `max_speed_ms` relative to the speed a newly spawned
/// identity starts at.
fn can_spawn(world: &World, candidate_speed_ms: f32, previous: Option<(AiRef, f32)>, next: Option<(AiRef, f32)>) -> bool {
    for (ai_ref, distance_m) in [previous, next].into_iter().flatten() {
        if distance_m < MIN_SPAWN_HEADWAY_M {
            return false;
        }
        let Some(car) = world.get::<EntryCar>(ai_ref.slot) else {
            continue;
        };
        let neighbor = car.ai_states[ai_ref.state_index];
        if (neighbor.max_speed_ms - candidate_speed_ms).abs() > SPEED_CLASS_TOLERANCE_MS {
            return false;
        }
    }
    true
}

/// A spawn point is safe only when every connected player and every other
/// initialized AI identity individually accepts it (§4.5, §10.6 "per-slot
/// veto composition").
fn is_position_safe(
    position: Vec3,
    connected_player_positions: &[Vec3],
    initialized_ai_positions: &[Vec3],
    config: &AiDirectorConfig,
) -> bool {
    connected_player_positions
        .iter()
        .all(|p| p.distance_squared(position) >= config.spawn_safety_distance_to_player_squared_m2)
        && initialized_ai_positions
            .iter()
            .all(|p| p.distance_squared(position) >= AI_SPAWN_VETO_DISTANCE_SQUARED_M2)
}

/// Anchors on the player's graph position, traverses a random distance in the
/// direction of travel, picks a lane, then widens the search along that
/// direction until a safe point turns up or the travel budget runs out
/// (§4.5 steps 1-8). Returns `(point_id, position, forward, anchor_point_id)`.
fn compute_spawn_point(
    spline: &AiSpline,
    config: &AiDirectorConfig,
    player_position: Vec3,
    player_velocity: Vec3,
    junctions: &mut JunctionEvaluator,
    rng: &mut impl Rng,
    is_safe: impl Fn(Vec3) -> bool,
) -> Option<(i32, Vec3, Vec3, i32)> {
    let (anchor_id, dist_sq) = spline.world_to_spline(player_position)?;
    if anchor_id < 0 || spline.next(anchor_id) == NO_POINT {
        return None;
    }
    if dist_sq > config.max_player_distance_to_ai_spline_squared_m2 {
        return None;
    }

    let direction = sign_with_tie_to_positive(spline.forward(anchor_id).dot(player_velocity));
    let spread = config.max_spawn_distance_points.saturating_sub(config.min_spawn_distance_points);
    let spawn_distance_points =
        config.min_spawn_distance_points + if spread == 0 { 0 } else { rng.gen_range(0..=spread) };

    let mut candidate = spline.traverse(anchor_id, spawn_distance_points as i32 * direction, junctions, rng);
    if candidate == NO_POINT {
        return None;
    }
    candidate = lane::select_lane_for_player(spline, candidate, anchor_id, config, rng);

    let travel_budget_points = config.max_spawn_distance_points.saturating_sub(spawn_distance_points);
    let mut traveled_points: u32 = 0;
    while !is_safe(spline.position(candidate)) {
        if traveled_points >= travel_budget_points {
            return None;
        }
        let next = spline.traverse(candidate, SAFETY_STEP_POINTS * direction, junctions, rng);
        if next == NO_POINT {
            return None;
        }
        candidate = next;
        traveled_points += SAFETY_STEP_POINTS as u32;
    }

    candidate = lane::select_lane_for_player(spline, candidate, anchor_id, config, rng);
    Some((candidate, spline.position(candidate), spline.forward(candidate), anchor_id))
}

/// Fill uninitialized AI slots, repeatedly picking the neediest remaining
/// player (§4.4's triangular weighting) and searching for a safe, headway-
/// gated spawn point accepted by the first compatible pooled identity
/// (§4.3/§4.5). A player whose search fails is not retried with a different
/// player this tick; a slot is only placed once per tick.
pub fn spawn_missing(world: &mut World, distance: &DistanceSummary, rng: &mut impl Rng) -> Result<(), TickError> {
    if distance.players_by_distance_desc.is_empty() {
        return Ok(());
    }

    let mut uninitialized: Vec<AiRef> = world.resource::<DirectorWorkingSet>().uninitialized_ai.clone();
    if uninitialized.is_empty() {
        return Ok(());
    }

    let config = *world.resource::<AiDirectorConfig>();
    let now_ms = world.resource::<ServerClock>().now_ms();
    let spline = world.resource::<AiSpline>().clone();
    let eligible_players = world.resource::<DirectorWorkingSet>().eligible_players.clone();

    let (connected_player_positions, initialized_ai_positions): (Vec<Vec3>, Vec<Vec3>) = {
        let mut query = world.query::<&EntryCar>();
        let mut players = Vec::new();
        let mut ai = Vec::new();
        for car in query.iter(world) {
            if car.is_player_live() {
                players.push(car.status.position);
            }
            ai.extend(car.initialized_states().map(|s| s.position));
        }
        (players, ai)
    };

    let mut player_pool: Vec<usize> = (0..distance.players_by_distance_desc.len()).collect();
    let mut any_placed = false;

    while !player_pool.is_empty() && !uninitialized.is_empty() {
        let Some(pick) = crate::selection::pick_triangular_weighted(player_pool.len(), rng) else {
            break;
        };
        let player_slot = player_pool.remove(pick);
        let player_summary = &distance.players_by_distance_desc[player_slot];
        let player = &eligible_players[player_summary.player_index];

        let mut junctions = JunctionEvaluator::new();
        let spawn_point = compute_spawn_point(
            &spline,
            &config,
            player.position,
            player.velocity,
            &mut junctions,
            rng,
            |candidate_position| {
                is_position_safe(candidate_position, &connected_player_positions, &initialized_ai_positions, &config)
            },
        );

        let Some((lane_id, position, forward, _anchor_id)) = spawn_point else {
            continue;
        };

        let previous_ai = find_neighbor_ai(&spline, lane_id, false, NEIGHBOR_SEARCH_DISTANCE_M, &distance.slowest_ai_state);
        let next_ai = find_neighbor_ai(&spline, lane_id, true, NEIGHBOR_SEARCH_DISTANCE_M, &distance.slowest_ai_state);

        if !can_spawn(world, DEFAULT_SPAWN_SPEED_MS, previous_ai, next_ai) {
            continue;
        }

        let target = uninitialized.remove(uninitialized.len() - 1);

        let mut car = world.get_mut::<EntryCar>(target.slot).unwrap();
        let spawn_protection_ms = config.ai_behavior_update_interval_ms * 2;
        car.ai_states[target.state_index].teleport(
            lane_id,
            position,
            forward,
            DEFAULT_SPAWN_SPEED_MS,
            now_ms,
            spawn_protection_ms,
        );
        any_placed = true;
    }

    if !any_placed {
        return Err(TickError::SpawnSearchExhausted);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::{categorize, distance as distance_system};
    use crate::test_helpers::*;

    #[test]
    fn remove_unsafe_states_skips_spawn_protected_identity() {
        let mut world = test_world_with_spline(straight_spline(60));
        spawn_player_car(&mut world, 1, Vec3::ZERO, Vec3::ZERO);
        let slot = spawn_ai_slot(&mut world, 2, crate::ecs::AiMode::Auto, 1);
        {
            let mut car = world.get_mut::<EntryCar>(slot).unwrap();
            car.ai_states[0].teleport(50, Vec3::new(500.0, 0.0, 0.0), Vec3::X, 10.0, 0, 1_000_000);
        }
        categorize::run(&mut world);
        let summary = distance_system::run(&mut world);

        let despawned = remove_unsafe_states(&mut world, &summary);
        assert_eq!(despawned, 0);
        assert!(world.get::<EntryCar>(slot).unwrap().ai_states[0].initialized);
    }

    #[test]
    fn remove_unsafe_states_despawns_an_identity_beyond_player_radius() {
        let mut world = test_world_with_spline(straight_spline(60));
        spawn_player_car(&mut world, 1, Vec3::ZERO, Vec3::ZERO);
        let slot = spawn_ai_slot(&mut world, 2, crate::ecs::AiMode::Auto, 1);
        {
            let mut car = world.get_mut::<EntryCar>(slot).unwrap();
            car.ai_states[0].teleport(50, Vec3::new(500.0, 0.0, 0.0), Vec3::X, 10.0, 0, 0);
        }
        categorize::run(&mut world);
        let summary = distance_system::run(&mut world);

        let despawned = remove_unsafe_states(&mut world, &summary);
        assert_eq!(despawned, 1);
        assert!(!world.get::<EntryCar>(slot).unwrap().ai_states[0].initialized);
    }

    #[test]
    fn remove_unsafe_states_keeps_an_identity_within_player_radius() {
        let mut world = test_world_with_spline(straight_spline(20));
        spawn_player_car(&mut world, 1, Vec3::ZERO, Vec3::ZERO);
        let slot = spawn_ai_slot(&mut world, 2, crate::ecs::AiMode::Auto, 1);
        {
            let mut car = world.get_mut::<EntryCar>(slot).unwrap();
            car.ai_states[0].teleport(5, Vec3::new(50.0, 0.0, 0.0), Vec3::X, 10.0, 0, 0);
        }
        categorize::run(&mut world);
        let summary = distance_system::run(&mut world);

        let despawned = remove_unsafe_states(&mut world, &summary);
        assert_eq!(despawned, 0);
        assert!(world.get::<EntryCar>(slot).unwrap().ai_states[0].initialized);
    }

    #[test]
    fn spawn_missing_places_at_least_one_identity_far_from_players() {
        let mut world = test_world_with_spline(straight_spline(200));
        spawn_player_car(&mut world, 1, Vec3::ZERO, Vec3::X);
        spawn_ai_slot(&mut world, 2, crate::ecs::AiMode::Auto, 1);
        categorize::run(&mut world);
        let summary = distance_system::run(&mut world);

        let mut rng = seeded_rng(11);
        spawn_missing(&mut world, &summary, &mut rng).unwrap();

        let mut found_initialized = false;
        let mut query = world.query::<&EntryCar>();
        for car in query.iter(&world) {
            if car.ai_states.iter().any(|s| s.initialized) {
                found_initialized = true;
            }
        }
        assert!(found_initialized);
    }

    #[test]
    fn spawn_missing_respects_minimum_headway_from_an_existing_identity() {
        let mut world = test_world_with_spline(straight_spline(300));
        spawn_player_car(&mut world, 1, Vec3::ZERO, Vec3::X);
        {
            let mut config = *world.resource::<AiDirectorConfig>();
            config.min_spawn_distance_points = 50;
            config.max_spawn_distance_points = 50;
            config.spawn_safety_distance_to_player_squared_m2 = 0.0;
            world.insert_resource(config);
        }
        // Sits one point (10m of graph distance) past the forced spawn
        // candidate, and far enough in raw position to clear the AI-veto
        // distance on its own -- isolating the headway check specifically.
        let occupied = spawn_ai_slot(&mut world, 2, crate::ecs::AiMode::Auto, 1);
        {
            let mut car = world.get_mut::<EntryCar>(occupied).unwrap();
            car.ai_states[0].teleport(51, Vec3::new(520.0, 0.0, 0.0), Vec3::X, 15.0, 0, 0);
        }
        let empty = spawn_ai_slot(&mut world, 3, crate::ecs::AiMode::Auto, 1);

        categorize::run(&mut world);
        let summary = distance_system::run(&mut world);
        let mut rng = seeded_rng(3);
        spawn_missing(&mut world, &summary, &mut rng).unwrap_err();

        assert!(!world.get::<EntryCar>(empty).unwrap().ai_states[0].initialized);
    }

    #[test]
    fn spawn_missing_accepts_once_headway_clears() {
        let mut world = test_world_with_spline(straight_spline(300));
        spawn_player_car(&mut world, 1, Vec3::ZERO, Vec3::X);
        {
            let mut config = *world.resource::<AiDirectorConfig>();
            config.min_spawn_distance_points = 50;
            config.max_spawn_distance_points = 50;
            config.spawn_safety_distance_to_player_squared_m2 = 0.0;
            world.insert_resource(config);
        }
        let occupied = spawn_ai_slot(&mut world, 2, crate::ecs::AiMode::Auto, 1);
        {
            let mut car = world.get_mut::<EntryCar>(occupied).unwrap();
            car.ai_states[0].teleport(52, Vec3::new(700.0, 0.0, 0.0), Vec3::X, 15.0, 0, 0);
        }
        let empty = spawn_ai_slot(&mut world, 3, crate::ecs::AiMode::Auto, 1);

        categorize::run(&mut world);
        let summary = distance_system::run(&mut world);
        let mut rng = seeded_rng(3);
        spawn_missing(&mut world, &summary, &mut rng).unwrap();

        assert!(world.get::<EntryCar>(empty).unwrap().ai_states[0].initialized);
    }
}
