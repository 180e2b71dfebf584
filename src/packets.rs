//! Wire packets emitted by the core (§6). Framing and transport belong to the
//! network layer; these are the payload shapes the director/auto-moderation
//! workers hand off to it.

use bitflags::bitflags;

bitflags! {
    /// Auto-moderation violation bitfield, sent to the client only when it
    /// changes (§6, §8 invariant 9).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AutoModerationFlags: u8 {
        const NO_LIGHTS = 1;
        const WRONG_WAY = 2;
        const NO_PARKING = 4;
    }
}

/// Session id reserved for server-originated chat messages (§6).
pub const SERVER_SESSION_ID: u8 = 255;

/// Pad value for unused AiDebugPacket slots (§6, §4.7).
pub const DEBUG_PACKET_PAD_SESSION_ID: u8 = 0xFF;

/// Number of AI slots carried per AiDebugPacket chunk (§6: "`L` is a fixed
/// layout constant").
pub const DEBUG_PACKET_BATCH_SIZE: usize = 20;

/// Minimal shape of the session configuration needed to rebuild a pits
/// teleport (§4.10). Real session/grid/grip data lives in the external
/// `SessionManager`/`WeatherManager` collaborators (§6); this is just the
/// slice of it that rides along on the wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentSessionUpdate {
    pub session_index: u8,
    pub grid_position: u16,
    pub track_grip: f32,
    /// Recomputed as `current_session.start_time - slot.time_offset` (§4.10).
    pub start_time_ms: i64,
}

/// A chat message from the server (`session_id == 255`) to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub session_id: u8,
    pub message: String,
}

impl ChatMessage {
    pub fn from_server(message: impl Into<String>) -> Self {
        Self {
            session_id: SERVER_SESSION_ID,
            message: message.into(),
        }
    }
}

/// One entry in an [`AiDebugPacket`] chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AiDebugEntry {
    pub session_id: u8,
    pub closest_ai_obstacle_cm: i16,
    pub current_speed_kmh: u8,
    pub max_speed_kmh: u8,
    pub target_speed_kmh: u8,
}

impl AiDebugEntry {
    pub fn padding() -> Self {
        Self {
            session_id: DEBUG_PACKET_PAD_SESSION_ID,
            ..Default::default()
        }
    }
}

/// Debug telemetry side-channel (§6, §4.7): fixed-size batches of AI slot
/// kinematics, padded with `0xFF` session ids when a batch is not full.
#[derive(Debug, Clone, PartialEq)]
pub struct AiDebugPacket {
    pub entries: [AiDebugEntry; DEBUG_PACKET_BATCH_SIZE],
}

impl AiDebugPacket {
    /// Chunk `entries` into fixed-size, padded `AiDebugPacket`s.
    pub fn chunk(entries: &[AiDebugEntry]) -> Vec<AiDebugPacket> {
        entries
            .chunks(DEBUG_PACKET_BATCH_SIZE)
            .map(|chunk| {
                let mut packet = [AiDebugEntry::padding(); DEBUG_PACKET_BATCH_SIZE];
                packet[..chunk.len()].copy_from_slice(chunk);
                AiDebugPacket { entries: packet }
            })
            .collect()
    }
}

fn ms_to_kmh(speed_ms: f32) -> u8 {
    (speed_ms * 3.6).round().clamp(0.0, u8::MAX as f32) as u8
}

fn cm_clamped(distance_m: f32) -> i16 {
    if !distance_m.is_finite() {
        return i16::MAX;
    }
    (distance_m * 100.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

impl From<(u8, &crate::ecs::AiState)> for AiDebugEntry {
    fn from((session_id, state): (u8, &crate::ecs::AiState)) -> Self {
        Self {
            session_id,
            closest_ai_obstacle_cm: state.closest_ai_obstacle_distance_cm,
            current_speed_kmh: ms_to_kmh(state.current_speed_ms),
            max_speed_kmh: ms_to_kmh(state.max_speed_ms),
            target_speed_kmh: ms_to_kmh(state.target_speed_ms),
        }
    }
}

pub fn obstacle_distance_to_cm(distance_m: f32) -> i16 {
    cm_clamped(distance_m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_pads_last_batch_with_sentinel_session_id() {
        let entries = vec![
            AiDebugEntry { session_id: 1, ..Default::default() },
            AiDebugEntry { session_id: 2, ..Default::default() },
        ];
        let packets = AiDebugPacket::chunk(&entries);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].entries[0].session_id, 1);
        assert_eq!(packets[0].entries[1].session_id, 2);
        assert_eq!(packets[0].entries[2].session_id, DEBUG_PACKET_PAD_SESSION_ID);
    }

    #[test]
    fn chunk_splits_across_batch_boundary() {
        let entries: Vec<AiDebugEntry> = (0..(DEBUG_PACKET_BATCH_SIZE + 3))
            .map(|i| AiDebugEntry { session_id: i as u8, ..Default::default() })
            .collect();
        let packets = AiDebugPacket::chunk(&entries);
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[1].entries[3].session_id, DEBUG_PACKET_PAD_SESSION_ID);
    }
}
