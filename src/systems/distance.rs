//! Director tick, phase 3 (§4.2): reduce the |AI| × |players| squared
//! distance matrix to two descending-sorted vectors — which AI identity is
//! farthest from any player (a despawn candidate) and which player is
//! farthest from any AI (a spawn candidate) — without ever materializing the
//! full matrix. Also builds `slowest_ai_state` (§2), the per-point index the
//! spawn search uses for its headway gate.

use std::collections::HashMap;

use bevy_ecs::prelude::World;

use crate::ecs::{AiRef, DirectorWorkingSet, EntryCar};

/// One AI identity's squared distance to its nearest eligible player.
#[derive(Debug, Clone, Copy)]
pub struct AiDistance {
    pub ai: AiRef,
    pub nearest_player_distance_squared: f32,
}

/// One eligible player's squared distance to its nearest AI identity, by
/// index into [`DirectorWorkingSet::eligible_players`].
#[derive(Debug, Clone, Copy)]
pub struct PlayerDistance {
    pub player_index: usize,
    pub nearest_ai_distance_squared: f32,
}

#[derive(Debug, Default)]
pub struct DistanceSummary {
    /// Farthest-from-any-player first: best despawn candidates lead.
    pub ai_by_distance_desc: Vec<AiDistance>,
    /// Farthest-from-any-AI first: best spawn candidates lead.
    pub players_by_distance_desc: Vec<PlayerDistance>,
    /// The lowest-`current_speed_ms` initialized AI state occupying each
    /// spline point this tick (§2). The spawn search's headway gate walks
    /// this instead of re-scanning every AI state per candidate point.
    pub slowest_ai_state: HashMap<i32, AiRef>,
}

pub fn run(world: &mut World) -> DistanceSummary {
    let working = world.resource::<DirectorWorkingSet>();
    let eligible_players = working.eligible_players.clone();
    let initialized_ai = working.initialized_ai.clone();

    let mut ai_positions = Vec::with_capacity(initialized_ai.len());
    let mut slowest_ai_state: HashMap<i32, (AiRef, f32)> = HashMap::new();
    for ai in &initialized_ai {
        let Some(car) = world.get::<EntryCar>(ai.slot) else {
            continue;
        };
        let state = car.ai_states[ai.state_index];
        ai_positions.push((*ai, state.position));
        if state.spline_point_id >= 0 {
            slowest_ai_state
                .entry(state.spline_point_id)
                .and_modify(|(slot, speed)| {
                    if state.current_speed_ms < *speed {
                        *slot = *ai;
                        *speed = state.current_speed_ms;
                    }
                })
                .or_insert((*ai, state.current_speed_ms));
        }
    }
    let slowest_ai_state: HashMap<i32, AiRef> = slowest_ai_state
        .into_iter()
        .map(|(point, (ai, _))| (point, ai))
        .collect();

    let mut ai_by_distance_desc: Vec<AiDistance> = ai_positions
        .iter()
        .map(|(ai, position)| {
            let nearest = eligible_players
                .iter()
                .map(|p| p.offset_position.distance_squared(*position))
                .fold(f32::INFINITY, f32::min);
            AiDistance {
                ai: *ai,
                nearest_player_distance_squared: nearest,
            }
        })
        .collect();
    ai_by_distance_desc.sort_by(|a, b| {
        b.nearest_player_distance_squared
            .partial_cmp(&a.nearest_player_distance_squared)
            .unwrap()
    });

    let mut players_by_distance_desc: Vec<PlayerDistance> = eligible_players
        .iter()
        .enumerate()
        .map(|(index, player)| {
            let nearest = ai_positions
                .iter()
                .map(|(_, position)| player.offset_position.distance_squared(*position))
                .fold(f32::INFINITY, f32::min);
            PlayerDistance {
                player_index: index,
                nearest_ai_distance_squared: nearest,
            }
        })
        .collect();
    players_by_distance_desc.sort_by(|a, b| {
        b.nearest_ai_distance_squared
            .partial_cmp(&a.nearest_ai_distance_squared)
            .unwrap()
    });

    DistanceSummary {
        ai_by_distance_desc,
        players_by_distance_desc,
        slowest_ai_state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::categorize;
    use crate::test_helpers::*;
    use glam::Vec3;

    #[test]
    fn farthest_ai_leads_the_despawn_list() {
        let mut world = test_world_with_spline(straight_spline(10));
        spawn_player_car(&mut world, 1, Vec3::new(0.0, 0.0, 0.0), Vec3::ZERO);
        let near = spawn_ai_slot(&mut world, 2, crate::ecs::AiMode::Auto, 1);
        let far = spawn_ai_slot(&mut world, 3, crate::ecs::AiMode::Auto, 1);
        {
            let mut car = world.get_mut::<EntryCar>(near).unwrap();
            car.ai_states[0].initialized = true;
            car.ai_states[0].position = Vec3::new(5.0, 0.0, 0.0);
        }
        {
            let mut car = world.get_mut::<EntryCar>(far).unwrap();
            car.ai_states[0].initialized = true;
            car.ai_states[0].position = Vec3::new(500.0, 0.0, 0.0);
        }

        categorize::run(&mut world);
        let summary = run(&mut world);
        assert_eq!(summary.ai_by_distance_desc.len(), 2);
        assert_eq!(summary.ai_by_distance_desc[0].ai.slot, far);
        assert_eq!(summary.ai_by_distance_desc[1].ai.slot, near);
    }

    #[test]
    fn slowest_ai_state_keeps_the_lowest_speed_occupant_per_point() {
        let mut world = test_world_with_spline(straight_spline(10));
        spawn_player_car(&mut world, 1, Vec3::ZERO, Vec3::ZERO);
        let fast = spawn_ai_slot(&mut world, 2, crate::ecs::AiMode::Auto, 1);
        let slow = spawn_ai_slot(&mut world, 3, crate::ecs::AiMode::Auto, 1);
        {
            let mut car = world.get_mut::<EntryCar>(fast).unwrap();
            car.ai_states[0].teleport(4, Vec3::new(40.0, 0.0, 0.0), Vec3::X, 25.0, 0, 0);
        }
        {
            let mut car = world.get_mut::<EntryCar>(slow).unwrap();
            car.ai_states[0].teleport(4, Vec3::new(40.0, 0.0, 0.0), Vec3::X, 5.0, 0, 0);
        }

        categorize::run(&mut world);
        let summary = run(&mut world);
        let occupant = summary.slowest_ai_state.get(&4).expect("point 4 is occupied");
        assert_eq!(occupant.slot, slow);
    }

    #[test]
    fn no_ai_yields_infinite_player_distance() {
        let mut world = test_world_with_spline(straight_spline(10));
        spawn_player_car(&mut world, 1, Vec3::ZERO, Vec3::ZERO);
        categorize::run(&mut world);
        let summary = run(&mut world);
        assert_eq!(summary.players_by_distance_desc.len(), 1);
        assert!(summary.players_by_distance_desc[0]
            .nearest_ai_distance_squared
            .is_infinite());
    }
}
