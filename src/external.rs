//! Minimal interfaces consumed from external collaborators (§1, §6).
//!
//! Network transport, packet framing, the weather model, and config-file
//! loading are explicitly out of scope for this crate. These traits are the
//! only surface the core needs from them; production wiring supplies real
//! implementations, tests supply fakes (see `test_helpers`).

use crate::packets::{AiDebugPacket, AutoModerationFlags, ChatMessage, CurrentSessionUpdate};

/// Any packet the core can hand off to the network layer.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundPacket {
    CurrentSessionUpdate(CurrentSessionUpdate),
    ChatMessage(ChatMessage),
    AutoModerationFlags(AutoModerationFlags),
    AiDebug(AiDebugPacket),
}

/// Entry-car-array-adjacent operations the network layer owns (§6).
/// Slot state itself lives in the ECS world, not behind this trait.
pub trait EntryCarManager: Send + Sync {
    /// Fire-and-forget: may outlive the tick, may fail; the core never waits
    /// on it or inspects the result (§5, §7).
    fn kick_async(&self, session_id: u8, reason: String);
    /// Send to one connected client; ignored if that client is gone.
    fn send_packet(&self, session_id: u8, packet: OutboundPacket);
    /// Send to every connected client.
    fn broadcast_packet(&self, packet: OutboundPacket);
    /// Number of currently connected human clients (used by overbooking, §4.9).
    fn connected_client_count(&self) -> usize;
}

/// Session/grid data needed to rebuild a pits teleport (§4.10).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentSessionInfo {
    pub session_index: u8,
    pub grid_position_for: u16,
    pub start_time_ms: i64,
}

pub trait SessionManager: Send + Sync {
    fn server_time_ms(&self) -> u64;
    fn current_session(&self, session_id: u8) -> CurrentSessionInfo;
}

/// Sun position in degrees of altitude above the horizon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunPosition {
    pub altitude_deg: f32,
}

pub trait WeatherManager: Send + Sync {
    fn track_grip(&self) -> f32;
    /// `None` means the weather model has no sun (e.g. a track without a
    /// time-of-day cycle); NoLightsKick requires `Some` at startup (§4.10).
    fn current_sun_position(&self) -> Option<SunPosition>;
}

/// Registers client-side scripts with the game's scripting host (§6).
pub trait CspServerScriptProvider: Send + Sync {
    fn add_script(&self, source: &str, name: &str);
}

/// Registers the auto-moderation client script, and the debug telemetry
/// script when debug mode is enabled (§10.6: a startup-time action).
pub fn register_scripts(provider: &dyn CspServerScriptProvider, debug: bool) {
    provider.add_script(AUTOMODERATION_LUA, "automoderation.lua");
    if debug {
        provider.add_script(AI_DEBUG_LUA, "ai_debug.lua");
    }
}

const AUTOMODERATION_LUA: &str = include_str!("../scripts/automoderation.lua");
const AI_DEBUG_LUA: &str = include_str!("../scripts/ai_debug.lua");
