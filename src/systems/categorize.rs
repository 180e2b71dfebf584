//! Director tick, phase 1-2 (§4.1): classify every slot as an eligible
//! player, an AI slot (contributing states to the working pools), or
//! neither.

use bevy_ecs::prelude::World;

use crate::clock::ServerClock;
use crate::config::AiDirectorConfig;
use crate::ecs::{AiRef, DirectorWorkingSet, EligiblePlayer, EntryCar};
use crate::spline::AiSpline;

/// Rebuilds [`DirectorWorkingSet`] for this tick. Returns `true` if at least
/// one eligible player was found (the "empty world" rule, §4.1, hinges on
/// this).
pub fn run(world: &mut World) -> bool {
    let now_ms = world.resource::<ServerClock>().now_ms();
    let config = *world.resource::<AiDirectorConfig>();

    let mut eligible_players = Vec::new();
    let mut initialized_ai = Vec::new();
    let mut uninitialized_ai = Vec::new();

    {
        let spline = world.resource::<AiSpline>();
        let mut query = world.query::<(bevy_ecs::entity::Entity, &EntryCar)>();
        for (entity, car) in query.iter(world) {
            if car.is_player_live() {
                let age_ms = now_ms.saturating_sub(car.status.last_active_ms);
                if age_ms < config.player_afk_timeout_ms {
                    let driving_right_way = spline
                        .world_to_spline(car.status.position)
                        .map(|(point_id, _)| {
                            spline.forward(point_id).dot(car.status.velocity) > 0.0
                        })
                        .unwrap_or(false);
                    if config.two_way_traffic || config.wrong_way_traffic || driving_right_way {
                        let offset_position = car.status.position
                            + car.status.velocity.normalize_or_zero()
                                * config.player_position_offset_m;
                        eligible_players.push(EligiblePlayer {
                            slot: entity,
                            position: car.status.position,
                            velocity: car.status.velocity,
                            offset_position,
                        });
                    }
                }
            }

            if car.ai_controlled {
                for (index, state) in car.ai_states.iter().enumerate() {
                    let reference = AiRef {
                        slot: entity,
                        state_index: index,
                    };
                    if state.initialized {
                        initialized_ai.push(reference);
                    } else {
                        uninitialized_ai.push(reference);
                    }
                }
            }
        }
    }

    let has_players = !eligible_players.is_empty();

    let mut working = world.resource_mut::<DirectorWorkingSet>();
    working.eligible_players = eligible_players;
    working.initialized_ai = initialized_ai;
    working.uninitialized_ai = uninitialized_ai;

    has_players
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;

    #[test]
    fn fresh_player_is_eligible() {
        let mut world = test_world_with_spline(straight_spline(5));
        spawn_player_car(&mut world, 1, glam::Vec3::ZERO, glam::Vec3::X);
        assert!(run(&mut world));
        let working = world.resource::<DirectorWorkingSet>();
        assert_eq!(working.eligible_players.len(), 1);
    }

    #[test]
    fn afk_player_is_excluded() {
        let mut world = test_world_with_spline(straight_spline(5));
        let entity = spawn_player_car(&mut world, 1, glam::Vec3::ZERO, glam::Vec3::X);
        {
            let mut car = world.get_mut::<EntryCar>(entity).unwrap();
            car.status.last_active_ms = 0;
        }
        world.resource_mut::<AiDirectorConfig>().player_afk_timeout_ms = 0;

        assert!(!run(&mut world));
    }

    #[test]
    fn empty_world_yields_no_eligible_players() {
        let mut world = test_world_with_spline(straight_spline(5));
        assert!(!run(&mut world));
        let working = world.resource::<DirectorWorkingSet>();
        assert!(working.eligible_players.is_empty());
    }

    #[test]
    fn ai_slots_are_split_by_initialization() {
        let mut world = test_world_with_spline(straight_spline(5));
        let entity = spawn_ai_slot(&mut world, 2, crate::ecs::AiMode::Auto, 2);
        {
            let mut car = world.get_mut::<EntryCar>(entity).unwrap();
            car.ai_states[0].initialized = true;
        }
        run(&mut world);
        let working = world.resource::<DirectorWorkingSet>();
        assert_eq!(working.initialized_ai.len(), 1);
        assert_eq!(working.uninitialized_ai.len(), 1);
    }
}
