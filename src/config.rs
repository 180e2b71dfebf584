//! Configuration surface (§6, §10.2).
//!
//! These are plain, `serde`-deserializable structs with `Default` impls; the
//! core does not parse config files itself (file parsing is an external
//! collaborator, §1) but owns the typed shape and the one fatal validation
//! path in the whole subsystem.

use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Tuning knobs for the AI traffic director (§6 "Configuration surface: AI").
#[derive(Debug, Clone, Copy, PartialEq, Resource, Serialize, Deserialize)]
#[serde(default)]
pub struct AiDirectorConfig {
    pub ai_per_player_target: f32,
    pub traffic_density: f32,
    pub max_ai_target: usize,
    pub ai_behavior_update_interval_ms: u64,
    pub min_spawn_distance_points: u32,
    pub max_spawn_distance_points: u32,
    pub player_radius_squared_m2: f32,
    pub player_position_offset_m: f32,
    pub max_player_distance_to_ai_spline_squared_m2: f32,
    pub spawn_safety_distance_to_player_squared_m2: f32,
    pub player_afk_timeout_ms: u64,
    pub two_way_traffic: bool,
    pub wrong_way_traffic: bool,
    pub prioritize_player_traffic: bool,
    pub same_direction_traffic_probability: f32,
    pub lane_width_m: f32,
    pub debug: bool,
}

impl Default for AiDirectorConfig {
    fn default() -> Self {
        Self {
            ai_per_player_target: 3.0,
            traffic_density: 1.0,
            max_ai_target: 50,
            ai_behavior_update_interval_ms: crate::clock::DEFAULT_DIRECTOR_TICK_MS,
            min_spawn_distance_points: 40,
            max_spawn_distance_points: 150,
            player_radius_squared_m2: 200.0 * 200.0,
            player_position_offset_m: 30.0,
            max_player_distance_to_ai_spline_squared_m2: 7.0 * 7.0,
            spawn_safety_distance_to_player_squared_m2: 150.0 * 150.0,
            player_afk_timeout_ms: 10 * crate::clock::ONE_SEC_MS,
            two_way_traffic: true,
            wrong_way_traffic: false,
            prioritize_player_traffic: true,
            same_direction_traffic_probability: 0.8,
            lane_width_m: 3.0,
            debug: false,
        }
    }
}

impl AiDirectorConfig {
    /// `lane_radius² = (lane_width_m / 2 · 1.25)²` (§4.10), shared with
    /// auto-moderation so both use the same notion of "on the road".
    pub fn lane_radius_squared(&self) -> f32 {
        let r = self.lane_width_m / 2.0 * 1.25;
        r * r
    }
}

/// One violation's detection + escalation thresholds (§3, §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViolationConfig {
    pub enabled: bool,
    pub duration_seconds: u32,
    pub pits_before_kick: u32,
    /// For NoLights/WrongWay: minimum |velocity| for the predicate to apply.
    /// For BlockingRoad: maximum |velocity| for the predicate to apply.
    pub speed_threshold_ms: f32,
}

impl Default for ViolationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_seconds: 30,
            pits_before_kick: 3,
            speed_threshold_ms: 5.0,
        }
    }
}

/// Auto-moderation configuration (§6 "Configuration surface: AutoMod").
#[derive(Debug, Clone, Copy, PartialEq, Resource, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoModerationConfig {
    pub no_lights: ViolationConfig,
    pub wrong_way: ViolationConfig,
    pub blocking_road: ViolationConfig,
    pub enable_client_messages: bool,
}

impl Default for AutoModerationConfig {
    fn default() -> Self {
        Self {
            no_lights: ViolationConfig {
                speed_threshold_ms: 5.0,
                ..ViolationConfig::default()
            },
            wrong_way: ViolationConfig {
                speed_threshold_ms: 5.0,
                ..ViolationConfig::default()
            },
            blocking_road: ViolationConfig {
                duration_seconds: 60,
                speed_threshold_ms: 1.0,
                ..ViolationConfig::default()
            },
            enable_client_messages: true,
        }
    }
}

impl AutoModerationConfig {
    /// Startup validation (§4.10, §7): the one fatal error path in the
    /// subsystem. Must be called once, before any worker is spawned.
    pub fn validate(&self, has_ai_spline: bool, has_sun_position: bool) -> Result<(), ConfigurationError> {
        if self.wrong_way.enabled && !has_ai_spline {
            return Err(ConfigurationError::MissingSplineForKick {
                violation: "WrongWay",
            });
        }
        if self.blocking_road.enabled && !has_ai_spline {
            return Err(ConfigurationError::MissingSplineForKick {
                violation: "BlockingRoad",
            });
        }
        if self.no_lights.enabled && !has_sun_position {
            return Err(ConfigurationError::MissingSunPosition);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_wrong_way_without_spline() {
        let config = AutoModerationConfig::default();
        let err = config.validate(false, true).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::MissingSplineForKick { violation: "WrongWay" }
        );
    }

    #[test]
    fn validate_rejects_no_lights_without_sun() {
        let mut config = AutoModerationConfig::default();
        config.wrong_way.enabled = false;
        config.blocking_road.enabled = false;
        let err = config.validate(true, false).unwrap_err();
        assert_eq!(err, ConfigurationError::MissingSunPosition);
    }

    #[test]
    fn validate_passes_when_disabled_violations_skip_their_precondition() {
        let mut config = AutoModerationConfig::default();
        config.wrong_way.enabled = false;
        config.blocking_road.enabled = false;
        config.no_lights.enabled = false;
        assert!(config.validate(false, false).is_ok());
    }

    #[test]
    fn lane_radius_squared_matches_formula() {
        let config = AiDirectorConfig { lane_width_m: 4.0, ..AiDirectorConfig::default() };
        let expected: f32 = (4.0 / 2.0 * 1.25) * (4.0 / 2.0 * 1.25);
        assert!((config.lane_radius_squared() - expected).abs() < 1e-6);
    }
}
