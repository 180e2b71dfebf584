//! The AI spline: an immutable directed graph of spatial points (§2, §3).
//!
//! AiState objects hold point ids, not pointers, because the graph is
//! immutable and ids are stable for the server's lifetime (§9 "Graph
//! identity and aliasing").

use std::collections::HashMap;

use bevy_ecs::prelude::Resource;
use glam::Vec3;
use rand::Rng;

/// Sentinel for "not on the graph".
pub const NO_POINT: i32 = -1;

/// One immutable point on the spline (§3).
#[derive(Debug, Clone)]
pub struct SplinePoint {
    pub position: Vec3,
    pub forward: Vec3,
    pub length_m: f32,
    pub next_id: i32,
    pub previous_id: i32,
    /// Extra successors at a junction, chosen between via [`JunctionEvaluator`].
    pub junction_branches: Vec<i32>,
    /// Sibling points at the same longitudinal position (other lanes).
    pub lane_ids: Vec<i32>,
}

impl SplinePoint {
    pub fn has_next(&self) -> bool {
        self.next_id != NO_POINT || !self.junction_branches.is_empty()
    }
}

/// The immutable directed graph AI identities traverse.
#[derive(Debug, Clone, Default, Resource)]
pub struct AiSpline {
    points: Vec<SplinePoint>,
}

impl AiSpline {
    pub fn new(points: Vec<SplinePoint>) -> Self {
        Self { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    fn point(&self, id: i32) -> Option<&SplinePoint> {
        if id < 0 {
            return None;
        }
        self.points.get(id as usize)
    }

    /// Nearest point to `pos` and its squared distance. `None` if the spline
    /// has no points. A real deployment would back this with a spatial grid;
    /// the core only depends on the (point_id, dist²) contract (§2).
    pub fn world_to_spline(&self, pos: Vec3) -> Option<(i32, f32)> {
        self.points
            .iter()
            .enumerate()
            .map(|(id, p)| (id as i32, p.position.distance_squared(pos)))
            .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
    }

    pub fn forward(&self, point_id: i32) -> Vec3 {
        self.point(point_id).map(|p| p.forward).unwrap_or(Vec3::ZERO)
    }

    pub fn position(&self, point_id: i32) -> Vec3 {
        self.point(point_id).map(|p| p.position).unwrap_or(Vec3::ZERO)
    }

    pub fn next(&self, point_id: i32) -> i32 {
        self.point(point_id).map(|p| p.next_id).unwrap_or(NO_POINT)
    }

    pub fn previous(&self, point_id: i32) -> i32 {
        self.point(point_id)
            .map(|p| p.previous_id)
            .unwrap_or(NO_POINT)
    }

    pub fn lanes(&self, point_id: i32) -> &[i32] {
        self.point(point_id)
            .map(|p| p.lane_ids.as_slice())
            .unwrap_or(&[])
    }

    /// Segment length in metres starting at `point_id` (§4.3 step 3's "≤50 m"
    /// neighbor search walks this).
    pub fn length(&self, point_id: i32) -> f32 {
        self.point(point_id).map(|p| p.length_m).unwrap_or(0.0)
    }

    /// Two points are "same direction" when their forward vectors point the
    /// same way (§4.6).
    pub fn is_same_direction(&self, a: i32, b: i32) -> bool {
        self.forward(a).dot(self.forward(b)) > 0.0
    }

    /// Uniform pick among `point_id` and its lane siblings (§4.6 fallback).
    pub fn random_lane(&self, point_id: i32, rng: &mut impl Rng) -> i32 {
        if point_id == NO_POINT {
            return NO_POINT;
        }
        let lanes = self.lanes(point_id);
        if lanes.is_empty() {
            return point_id;
        }
        let idx = rng.gen_range(0..=lanes.len());
        if idx == lanes.len() {
            point_id
        } else {
            lanes[idx]
        }
    }

    /// Step `point_id` by `signed_points` graph points, resolving junction
    /// branches via `junctions` (one evaluator per AI identity, §9). Returns
    /// `NO_POINT` if the graph runs out before the full distance is covered.
    pub fn traverse(
        &self,
        point_id: i32,
        signed_points: i32,
        junctions: &mut JunctionEvaluator,
        rng: &mut impl Rng,
    ) -> i32 {
        let mut current = point_id;
        let steps = signed_points.unsigned_abs();
        let forward = signed_points >= 0;
        for _ in 0..steps {
            current = if forward {
                self.step_next(current, junctions, rng)
            } else {
                self.previous(current)
            };
            if current == NO_POINT {
                return NO_POINT;
            }
        }
        current
    }

    fn step_next(&self, point_id: i32, junctions: &mut JunctionEvaluator, rng: &mut impl Rng) -> i32 {
        let Some(p) = self.point(point_id) else {
            return NO_POINT;
        };
        if p.junction_branches.is_empty() {
            return p.next_id;
        }
        junctions.resolve(point_id, &p.next_id, &p.junction_branches, rng)
    }
}

/// Resolves junction branches deterministically per AI identity by recording
/// the first choice made at each junction point and reusing it afterward
/// (§9 "JunctionEvaluator as iterator with memory").
#[derive(Debug, Default)]
pub struct JunctionEvaluator {
    chosen: HashMap<i32, i32>,
}

impl JunctionEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    fn resolve(
        &mut self,
        junction_point_id: i32,
        primary: &i32,
        branches: &[i32],
        rng: &mut impl Rng,
    ) -> i32 {
        if let Some(chosen) = self.chosen.get(&junction_point_id) {
            return *chosen;
        }
        let mut candidates: Vec<i32> = Vec::with_capacity(branches.len() + 1);
        if *primary != NO_POINT {
            candidates.push(*primary);
        }
        candidates.extend(branches.iter().copied().filter(|b| *b != NO_POINT));
        let chosen = if candidates.is_empty() {
            NO_POINT
        } else {
            candidates[rng.gen_range(0..candidates.len())]
        };
        self.chosen.insert(junction_point_id, chosen);
        chosen
    }
}
