//! Auto-moderation tick, 1s cadence (§4.10). Three independent violation
//! state machines — no lights at night, driving the wrong way, blocking the
//! road — each escalating warning → pit → kick, and resetting in full the
//! moment the player stops violating (§8 "AutoMod reset+escalation law").

use bevy_ecs::prelude::World;

use crate::config::{AutoModerationConfig, ViolationConfig};
use crate::ecs::{AutoModInstance, EntryCar, StatusFlags};
use crate::external::{EntryCarManager, OutboundPacket, SessionManager, WeatherManager};
use crate::packets::{AutoModerationFlags, ChatMessage, CurrentSessionUpdate};
use crate::spline::{AiSpline, NO_POINT};

/// Nautical twilight (§4.10): the no-lights check only applies once the sun
/// is more than 12 degrees below the horizon, not merely below it.
const NIGHT_SUN_ALTITUDE_DEG: f32 = -12.0;

pub fn run(
    world: &mut World,
    traffic: &dyn EntryCarManager,
    sessions: &dyn SessionManager,
    weather: &dyn WeatherManager,
) {
    let config = *world.resource::<AutoModerationConfig>();
    let lane_radius_squared = world.resource::<crate::config::AiDirectorConfig>().lane_radius_squared();
    let spline = world.resource::<AiSpline>().clone();
    let is_night = weather
        .current_sun_position()
        .map(|sun| sun.altitude_deg < NIGHT_SUN_ALTITUDE_DEG)
        .unwrap_or(false);
    let track_grip = weather.track_grip();

    let mut query = world.query::<(&EntryCar, &mut AutoModInstance)>();
    for (car, mut automod) in query.iter_mut(world) {
        let Some(client) = car.client else { continue };
        if !client.has_sent_first_update || car.ai_controlled {
            continue;
        }
        if client.is_administrator {
            continue;
        }

        let session_id = car.session_id;
        let speed = car.status.velocity.length();
        let lights_on = car.status.flags.contains(StatusFlags::LIGHTS_ON);

        let (point_id, distance_squared) = spline
            .world_to_spline(car.status.position)
            .unwrap_or((NO_POINT, f32::INFINITY));
        automod.current_spline_point_id = point_id;
        automod.current_spline_point_distance_squared = distance_squared;

        let session_info = sessions.current_session(session_id);
        let session_update = CurrentSessionUpdate {
            session_index: session_info.session_index,
            grid_position: session_info.grid_position_for,
            track_grip,
            start_time_ms: session_info.start_time_ms - car.time_offset_ms,
        };

        let no_lights_active = config.no_lights.enabled
            && is_night
            && speed >= config.no_lights.speed_threshold_ms
            && !lights_on;
        escalate(
            no_lights_active,
            &mut automod.no_light_seconds,
            &mut automod.no_light_pit_count,
            &mut automod.no_light_warning_sent,
            &config.no_lights,
            config.enable_client_messages,
            session_id,
            traffic,
            session_update,
            "Turn your headlights on.",
            "kicked for driving without lights at night",
        );

        let wrong_way_active = config.wrong_way.enabled
            && speed >= config.wrong_way.speed_threshold_ms
            && point_id != NO_POINT
            && distance_squared < lane_radius_squared
            && spline.forward(point_id).dot(car.status.velocity) < 0.0;
        escalate(
            wrong_way_active,
            &mut automod.wrong_way_seconds,
            &mut automod.wrong_way_pit_count,
            &mut automod.wrong_way_warning_sent,
            &config.wrong_way,
            config.enable_client_messages,
            session_id,
            traffic,
            session_update,
            "You are driving the wrong way.",
            "kicked for driving the wrong way",
        );

        let blocking_active = config.blocking_road.enabled
            && speed <= config.blocking_road.speed_threshold_ms
            && point_id != NO_POINT
            && distance_squared < lane_radius_squared;
        escalate(
            blocking_active,
            &mut automod.blocking_road_seconds,
            &mut automod.blocking_road_pit_count,
            &mut automod.blocking_road_warning_sent,
            &config.blocking_road,
            config.enable_client_messages,
            session_id,
            traffic,
            session_update,
            "You are blocking the road, please move along.",
            "kicked for blocking the road",
        );

        let mut new_flags = AutoModerationFlags::empty();
        new_flags.set(AutoModerationFlags::NO_LIGHTS, no_lights_active);
        new_flags.set(AutoModerationFlags::WRONG_WAY, wrong_way_active);
        new_flags.set(AutoModerationFlags::NO_PARKING, blocking_active);

        if new_flags != automod.current_flags {
            automod.current_flags = new_flags;
            traffic.send_packet(session_id, OutboundPacket::AutoModerationFlags(new_flags));
        }
    }
}

/// Two independent thresholds over one continuously-incrementing counter
/// (§4.10, §8 testable property 8): a warning fires once per violation spell
/// the first time `seconds` passes `duration/2`, and a pits teleport fires
/// every time `seconds` passes the next multiple of `duration` — neither
/// resets the counter, which only clears when the predicate goes false or a
/// kick ends the spell.
#[allow(clippy::too_many_arguments)]
fn escalate(
    active: bool,
    seconds: &mut u32,
    pit_count: &mut u32,
    warning_sent: &mut bool,
    violation: &ViolationConfig,
    enable_messages: bool,
    session_id: u8,
    traffic: &dyn EntryCarManager,
    session_update: CurrentSessionUpdate,
    warning_text: &str,
    kick_reason: &str,
) {
    if !violation.enabled || !active {
        *seconds = 0;
        *pit_count = 0;
        *warning_sent = false;
        return;
    }

    *seconds += 1;

    if !*warning_sent && *seconds > violation.duration_seconds / 2 {
        *warning_sent = true;
        if enable_messages {
            traffic.send_packet(
                session_id,
                OutboundPacket::ChatMessage(ChatMessage::from_server(warning_text)),
            );
        }
    }

    let next_pit_at = violation.duration_seconds.saturating_mul(*pit_count + 1);
    if *seconds > next_pit_at {
        *pit_count += 1;
        traffic.send_packet(session_id, OutboundPacket::CurrentSessionUpdate(session_update));

        if *pit_count >= violation.pits_before_kick {
            traffic.kick_async(session_id, kick_reason.to_string());
            *seconds = 0;
            *pit_count = 0;
            *warning_sent = false;
        }
    }
}
