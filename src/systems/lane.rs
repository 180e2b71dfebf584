//! Director tick, phase 4 helper (§4.6): choosing which lane at a spawn
//! point an AI identity should use.

use rand::Rng;

use crate::config::AiDirectorConfig;
use crate::spline::{AiSpline, NO_POINT};

/// Partitions `point_id` and its lane siblings into same-direction and
/// opposite-direction sets relative to the player's own graph position (not
/// the candidate point itself), then picks one lane weighted by
/// `same_direction_traffic_probability`. Falls back to an unweighted random
/// lane when traffic isn't prioritized around the player, the point has no
/// siblings, or the player has no graph position (§4.6 steps 1-6).
pub fn select_lane_for_player(
    spline: &AiSpline,
    point_id: i32,
    player_point_id: i32,
    config: &AiDirectorConfig,
    rng: &mut impl Rng,
) -> i32 {
    if point_id == NO_POINT {
        return NO_POINT;
    }
    if !(config.prioritize_player_traffic && config.two_way_traffic) {
        return spline.random_lane(point_id, rng);
    }

    let lanes = spline.lanes(point_id);
    if lanes.is_empty() || player_point_id == NO_POINT {
        return spline.random_lane(point_id, rng);
    }

    let mut same = Vec::new();
    let mut opposite = Vec::new();
    for &candidate in std::iter::once(&point_id).chain(lanes.iter()) {
        if spline.is_same_direction(player_point_id, candidate) {
            same.push(candidate);
        } else {
            opposite.push(candidate);
        }
    }

    match (same.is_empty(), opposite.is_empty()) {
        (false, false) => {
            let pool = if rng.gen::<f32>() < config.same_direction_traffic_probability {
                &same
            } else {
                &opposite
            };
            pool[rng.gen_range(0..pool.len())]
        }
        (false, true) => same[rng.gen_range(0..same.len())],
        (true, false) => opposite[rng.gen_range(0..opposite.len())],
        (true, true) => spline.random_lane(point_id, rng),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spline::SplinePoint;
    use crate::test_helpers::{seeded_rng, two_lane_spline};
    use glam::Vec3;

    /// A two-point, two-lane spline where lane 1 faces backward relative to
    /// lane 0, so partitioning by player direction is actually meaningful
    /// (unlike `two_lane_spline`, whose lanes all share one forward vector).
    fn two_lane_opposing_spline() -> AiSpline {
        let points = vec![
            SplinePoint {
                position: Vec3::new(0.0, 0.0, 0.0),
                forward: Vec3::X,
                length_m: 10.0,
                next_id: NO_POINT,
                previous_id: NO_POINT,
                junction_branches: Vec::new(),
                lane_ids: vec![1],
            },
            SplinePoint {
                position: Vec3::new(0.0, 0.0, 4.0),
                forward: -Vec3::X,
                length_m: 10.0,
                next_id: NO_POINT,
                previous_id: NO_POINT,
                junction_branches: Vec::new(),
                lane_ids: vec![0],
            },
        ];
        AiSpline::new(points)
    }

    #[test]
    fn no_point_passes_through() {
        let spline = two_lane_spline(4, 4.0);
        let config = AiDirectorConfig::default();
        let mut rng = seeded_rng(0);
        assert_eq!(
            select_lane_for_player(&spline, NO_POINT, 1, &config, &mut rng),
            NO_POINT
        );
    }

    #[test]
    fn two_way_disabled_never_picks_opposite_lane() {
        let spline = two_lane_spline(4, 4.0);
        let mut config = AiDirectorConfig::default();
        config.two_way_traffic = false;
        let mut rng = seeded_rng(3);
        for _ in 0..200 {
            let chosen = select_lane_for_player(&spline, 1, 1, &config, &mut rng);
            assert!(spline.is_same_direction(1, chosen));
        }
    }

    #[test]
    fn same_direction_probability_one_never_picks_opposite() {
        let spline = two_lane_spline(4, 4.0);
        let mut config = AiDirectorConfig::default();
        config.two_way_traffic = true;
        config.prioritize_player_traffic = true;
        config.same_direction_traffic_probability = 1.0;
        let mut rng = seeded_rng(5);
        for _ in 0..200 {
            let chosen = select_lane_for_player(&spline, 1, 1, &config, &mut rng);
            assert!(spline.is_same_direction(1, chosen));
        }
    }

    #[test]
    fn prioritize_player_traffic_disabled_ignores_same_direction_probability() {
        let spline = two_lane_spline(4, 4.0);
        let mut config = AiDirectorConfig::default();
        config.two_way_traffic = true;
        config.prioritize_player_traffic = false;
        config.same_direction_traffic_probability = 1.0;
        let mut rng = seeded_rng(9);
        let mut saw_opposite = false;
        for _ in 0..200 {
            let chosen = select_lane_for_player(&spline, 1, 1, &config, &mut rng);
            if !spline.is_same_direction(1, chosen) {
                saw_opposite = true;
            }
        }
        assert!(
            saw_opposite,
            "disabling prioritize_player_traffic should fall back to an unweighted random lane"
        );
    }

    #[test]
    fn partitions_relative_to_the_players_point_not_the_candidates_own() {
        let spline = two_lane_opposing_spline();
        let mut config = AiDirectorConfig::default();
        config.two_way_traffic = true;
        config.prioritize_player_traffic = true;
        config.same_direction_traffic_probability = 1.0;
        let mut rng = seeded_rng(4);

        // Candidate point 0 faces +X, the player sits on point 1 facing -X:
        // they're opposite-direction from each other. With same-direction
        // probability 1.0, the pick should move to point 1 (same direction
        // as the player), not stay on point 0 as partitioning against the
        // candidate's own forward vector would produce.
        for _ in 0..50 {
            let chosen = select_lane_for_player(&spline, 0, 1, &config, &mut rng);
            assert!(spline.is_same_direction(1, chosen));
        }
    }
}
