//! Entity Component System: components for entry-car slots, AI driving
//! identities, and auto-moderation state.
//!
//! One ECS entity is created per EntryCar slot at startup and lives for the
//! lifetime of the server; slots are never spawned or despawned at runtime,
//! only their components' contents change. This matches §3's "EntryCar
//! (slot)" model: a fixed-size indexed array, not a dynamic entity set.

use bevy_ecs::prelude::{Component, Resource};
use bitflags::bitflags;
use glam::Vec3;

bitflags! {
    /// Per-vehicle status bits carried on the wire. Only `LIGHTS_ON` is used
    /// by the core; the rest of the bitfield belongs to the network layer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusFlags: u16 {
        const LIGHTS_ON = 1 << 0;
    }
}

/// Whether a slot may host AI identities, and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AiMode {
    /// The slot never hosts AI, even when no client is connected.
    #[default]
    None,
    /// The slot hosts a fixed AI identity regardless of overbooking.
    Fixed,
    /// The slot participates in overbooking like any other AI slot.
    Auto,
}

/// A connected human client. Network transport is an external collaborator
/// (§1); this is the minimal handle the director needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientHandle {
    /// Gates whether the slot is considered player-live (§4.1).
    pub has_sent_first_update: bool,
    /// Administrators are exempt from every auto-moderation predicate (§4.10).
    pub is_administrator: bool,
}

/// Position, velocity, status flags and last-active timestamp for a slot.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VehicleStatus {
    pub position: Vec3,
    pub velocity: Vec3,
    pub flags: StatusFlags,
    pub last_active_ms: u64,
}

impl Default for StatusFlags {
    fn default() -> Self {
        StatusFlags::empty()
    }
}

/// One AI driving identity multiplexed onto a slot (§3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AiState {
    pub initialized: bool,
    pub position: Vec3,
    pub velocity: Vec3,
    pub current_speed_ms: f32,
    pub target_speed_ms: f32,
    pub max_speed_ms: f32,
    /// Current graph position, or -1 when not on the spline.
    pub spline_point_id: i32,
    /// Monotonic ms; immune to despawn while `now < spawn_protection_ends_ms`.
    pub spawn_protection_ends_ms: u64,
    /// Latest obstacle telemetry, in centimetres.
    pub closest_ai_obstacle_distance_cm: i16,
    /// Monotonic ms; while `now < reaction_delay_ends_ms` the obstacle tick
    /// holds this identity at a standstill instead of its usual target speed
    /// (§4.8 "randomized collision-reaction delay").
    pub reaction_delay_ends_ms: u64,
}

impl Default for AiState {
    fn default() -> Self {
        Self {
            initialized: false,
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            current_speed_ms: 0.0,
            target_speed_ms: 0.0,
            max_speed_ms: 0.0,
            spline_point_id: -1,
            spawn_protection_ends_ms: 0,
            closest_ai_obstacle_distance_cm: i16::MAX,
            reaction_delay_ends_ms: 0,
        }
    }
}

impl AiState {
    /// Teleport this (uninitialized) state to a spawn point and mark it visible.
    pub fn teleport(
        &mut self,
        point_id: i32,
        position: Vec3,
        forward: Vec3,
        speed_ms: f32,
        now_ms: u64,
        spawn_protection_ms: u64,
    ) {
        self.initialized = true;
        self.position = position;
        self.velocity = forward.normalize_or_zero() * speed_ms;
        self.current_speed_ms = speed_ms;
        self.target_speed_ms = speed_ms;
        self.max_speed_ms = speed_ms;
        self.spline_point_id = point_id;
        self.spawn_protection_ends_ms = now_ms.saturating_add(spawn_protection_ms);
        self.reaction_delay_ends_ms = 0;
    }

    /// Demote this state back to the uninitialized pool. Never destroyed, only hidden.
    pub fn despawn(&mut self) {
        self.initialized = false;
        self.spline_point_id = -1;
        self.reaction_delay_ends_ms = 0;
    }

    pub fn is_in_collision_recovery(&self, now_ms: u64) -> bool {
        now_ms < self.reaction_delay_ends_ms
    }

    pub fn is_spawn_protected(&self, now_ms: u64) -> bool {
        now_ms < self.spawn_protection_ends_ms
    }
}

/// A fixed identity on the server: the EntryCar slot (§3).
#[derive(Debug, Clone, Component)]
pub struct EntryCar {
    pub session_id: u8,
    pub ai_mode: AiMode,
    pub ai_controlled: bool,
    pub client: Option<ClientHandle>,
    pub status: VehicleStatus,
    /// Pooled AI identities; length tracks the slot's overbooking target (§4.9).
    pub ai_states: Vec<AiState>,
    /// Per-slot wall-clock offset used in session-update packets (§4.10).
    pub time_offset_ms: i64,
}

impl EntryCar {
    pub fn new(session_id: u8, ai_mode: AiMode) -> Self {
        let ai_controlled = ai_mode != AiMode::None;
        Self {
            session_id,
            ai_mode,
            ai_controlled,
            client: None,
            status: VehicleStatus::default(),
            ai_states: Vec::new(),
            time_offset_ms: 0,
        }
    }

    /// Slot occupancy exclusivity (§8 invariant 1): exactly one of `client` or
    /// `ai_controlled` holds at any instant.
    pub fn is_player_live(&self) -> bool {
        !self.ai_controlled
            && self
                .client
                .map(|c| c.has_sent_first_update)
                .unwrap_or(false)
    }

    /// Grow or shrink the AI pool toward `target`, never discarding an
    /// initialized state (§3: AI states are pooled, never destroyed).
    pub fn resize_pool(&mut self, target: usize) {
        if self.ai_states.len() < target {
            self.ai_states
                .resize(target, AiState::default());
            return;
        }
        while self.ai_states.len() > target {
            let can_drop = self
                .ai_states
                .last()
                .map(|s| !s.initialized)
                .unwrap_or(false);
            if !can_drop {
                break;
            }
            self.ai_states.pop();
        }
    }

    pub fn initialized_states(&self) -> impl Iterator<Item = &AiState> {
        self.ai_states.iter().filter(|s| s.initialized)
    }

    pub fn uninitialized_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.ai_states
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.initialized)
            .map(|(i, _)| i)
    }
}

/// Auto-moderation state machine bookkeeping, one per EntryCar (§3, §4.10).
#[derive(Debug, Clone, Copy, Default, Component)]
pub struct AutoModInstance {
    pub no_light_seconds: u32,
    pub wrong_way_seconds: u32,
    pub blocking_road_seconds: u32,
    pub no_light_pit_count: u32,
    pub wrong_way_pit_count: u32,
    pub blocking_road_pit_count: u32,
    pub no_light_warning_sent: bool,
    pub wrong_way_warning_sent: bool,
    pub blocking_road_warning_sent: bool,
    pub current_flags: crate::packets::AutoModerationFlags,
    pub current_spline_point_id: i32,
    pub current_spline_point_distance_squared: f32,
}

impl AutoModInstance {
    pub fn new() -> Self {
        Self {
            current_spline_point_id: -1,
            current_flags: crate::packets::AutoModerationFlags::empty(),
            ..Default::default()
        }
    }
}

/// Working collections the director rebuilds every tick (§4.1). Cleared and
/// repopulated at the start of each tick rather than recreated, to avoid churn.
#[derive(Debug, Default, Resource)]
pub struct DirectorWorkingSet {
    pub eligible_players: Vec<EligiblePlayer>,
    pub initialized_ai: Vec<AiRef>,
    pub uninitialized_ai: Vec<AiRef>,
}

/// A reference to one AI state by (slot entity index, state index within the slot).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AiRef {
    pub slot: bevy_ecs::entity::Entity,
    pub state_index: usize,
}

/// A player slot categorized as eligible this tick (§4.1), with its offset
/// position already computed (§4.2) so later phases never recompute it.
#[derive(Debug, Clone, Copy)]
pub struct EligiblePlayer {
    pub slot: bevy_ecs::entity::Entity,
    pub position: Vec3,
    pub velocity: Vec3,
    pub offset_position: Vec3,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_pool_grows_with_uninitialized_states() {
        let mut car = EntryCar::new(1, AiMode::Auto);
        car.resize_pool(3);
        assert_eq!(car.ai_states.len(), 3);
        assert!(car.ai_states.iter().all(|s| !s.initialized));
    }

    #[test]
    fn resize_pool_never_drops_initialized_states() {
        let mut car = EntryCar::new(1, AiMode::Auto);
        car.resize_pool(2);
        car.ai_states[0].initialized = true;
        car.resize_pool(0);
        assert_eq!(car.ai_states.len(), 1);
        assert!(car.ai_states[0].initialized);
    }

    #[test]
    fn is_player_live_requires_first_update_and_not_ai_controlled() {
        let mut car = EntryCar::new(1, AiMode::None);
        assert!(!car.is_player_live());
        car.ai_controlled = false;
        car.client = Some(ClientHandle {
            has_sent_first_update: false,
            is_administrator: false,
        });
        assert!(!car.is_player_live());
        car.client = Some(ClientHandle {
            has_sent_first_update: true,
            is_administrator: false,
        });
        assert!(car.is_player_live());
    }
}
