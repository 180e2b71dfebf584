//! Connection and collision event handlers (§4.8). These are not tick-driven
//! — the hosting server calls them directly as checksum-passed, disconnect,
//! and collision notifications arrive — but they still only ever touch the
//! ECS world, never the network layer directly.

use bevy_ecs::entity::Entity;
use bevy_ecs::prelude::World;
use rand::Rng;

use crate::clock::ServerClock;
use crate::config::AiDirectorConfig;
use crate::ecs::{AiMode, AutoModInstance, ClientHandle, EntryCar};
use crate::overbooking;

/// Minimum/maximum randomized standstill after a collision (§4.8).
const COLLISION_RECOVERY_MIN_MS: u64 = 500;
const COLLISION_RECOVERY_MAX_MS: u64 = 2000;

fn find_slot(world: &mut World, session_id: u8) -> Option<Entity> {
    let mut query = world.query::<(Entity, &EntryCar)>();
    query
        .iter(world)
        .find(|(_, car)| car.session_id == session_id)
        .map(|(entity, _)| entity)
}

/// A client's network checksum passed: the slot converts from AI-hosted to
/// player-hosted (§8 invariant 1, slot occupancy exclusivity).
pub fn on_checksum_passed(world: &mut World, session_id: u8, is_administrator: bool) {
    let Some(entity) = find_slot(world, session_id) else {
        return;
    };

    {
        let mut car = world.get_mut::<EntryCar>(entity).unwrap();
        car.client = Some(ClientHandle {
            has_sent_first_update: false,
            is_administrator,
        });
        car.ai_controlled = false;
        for state in car.ai_states.iter_mut() {
            state.despawn();
        }
        car.resize_pool(0);
    }
    if let Some(mut automod) = world.get_mut::<AutoModInstance>(entity) {
        *automod = AutoModInstance::new();
    }

    retune_overbooking(world);
}

/// A client disconnected: the slot reverts to AI-eligible, if it is one.
pub fn on_disconnected(world: &mut World, session_id: u8) {
    let Some(entity) = find_slot(world, session_id) else {
        return;
    };
    {
        let mut car = world.get_mut::<EntryCar>(entity).unwrap();
        car.client = None;
        if car.ai_mode != AiMode::None {
            car.ai_controlled = true;
        }
    }
    retune_overbooking(world);
}

/// A collision was reported for `session_id`: any AI identity currently
/// visible on that slot enters a randomized standstill before the obstacle
/// tick resumes giving it a target speed (§4.8).
pub fn on_collision(world: &mut World, session_id: u8, rng: &mut impl Rng) {
    let Some(entity) = find_slot(world, session_id) else {
        return;
    };
    let now_ms = world.resource::<ServerClock>().now_ms();
    let delay_ms = rng.gen_range(COLLISION_RECOVERY_MIN_MS..=COLLISION_RECOVERY_MAX_MS);

    let mut car = world.get_mut::<EntryCar>(entity).unwrap();
    if !car.ai_controlled {
        return;
    }
    for state in car.ai_states.iter_mut().filter(|s| s.initialized) {
        state.reaction_delay_ends_ms = now_ms.saturating_add(delay_ms);
    }
}

/// Recompute the AI identity target from the current live-player count and
/// redistribute it across `Auto` slots (§4.9). Called after any connect,
/// disconnect, or config change.
pub fn retune_overbooking(world: &mut World) {
    let config = *world.resource::<AiDirectorConfig>();

    let live_player_count = {
        let mut query = world.query::<&EntryCar>();
        query.iter(world).filter(|car| car.is_player_live()).count()
    };

    let auto_slots: Vec<Entity> = {
        let mut query = world.query::<(Entity, &EntryCar)>();
        query
            .iter(world)
            .filter(|(_, car)| car.ai_mode == AiMode::Auto && car.ai_controlled)
            .map(|(entity, _)| entity)
            .collect()
    };

    let total_target = overbooking::target_ai_count(&config, live_player_count, auto_slots.len());
    let per_slot_targets = overbooking::distribute(total_target, auto_slots.len());
    for (entity, target) in auto_slots.into_iter().zip(per_slot_targets) {
        if let Some(mut car) = world.get_mut::<EntryCar>(entity) {
            car.resize_pool(target);
        }
    }
}
