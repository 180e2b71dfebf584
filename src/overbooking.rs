//! Overbooking arithmetic (§4.9): how many AI identities the server should
//! host right now, and how that total is spread across `Auto` slots.
//!
//! Kept separate from the director tick systems because it is pure and is
//! re-run from more than one trigger: a connect/disconnect event, a config
//! reload, or the regular director tick (§5).

use crate::config::AiDirectorConfig;

/// Overall AI identity target given how many players are currently eligible
/// for traffic (§4.9). The per-player rate is rounded and clamped to the
/// number of `Auto` slots actually available before being multiplied out, so
/// a high `ai_per_player_target` can never ask for more identities per
/// player than there are slots to hold them; the player-scaled total is then
/// clamped to `max_ai_target` (§8 invariant: overbooking conservation never
/// exceeds the configured ceiling).
pub fn target_ai_count(config: &AiDirectorConfig, eligible_player_count: usize, ai_slot_count: usize) -> usize {
    let per_player_raw = config.ai_per_player_target * config.traffic_density;
    let per_player_raw = if per_player_raw.is_finite() { per_player_raw.max(0.0) } else { 0.0 };
    let per_player = (per_player_raw.round() as usize).min(ai_slot_count);
    let target = eligible_player_count.saturating_mul(per_player);
    target.min(config.max_ai_target)
}

/// Spread `total_target` identities across `slot_count` `Auto` slots as
/// evenly as possible: every slot gets `total_target / slot_count`, and the
/// first `total_target % slot_count` slots get one extra. The sum of the
/// result always equals `total_target` exactly (§8 "overbooking
/// conservation").
pub fn distribute(total_target: usize, slot_count: usize) -> Vec<usize> {
    if slot_count == 0 {
        return Vec::new();
    }
    let base = total_target / slot_count;
    let rest = total_target % slot_count;
    (0..slot_count)
        .map(|i| base + usize::from(i < rest))
        .collect()
}
