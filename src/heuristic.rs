//! Cost-to-go estimates used to order the OPEN queue.

use crate::data_struct::Pose;
use crate::holonomic::HolonomicGoalMap;
use crate::nonholonomic::NonHolonomicTable;
use std::f64::consts::SQRT_2;
use std::sync::Arc;

/// Estimate of the remaining cost from a pose to a fixed goal.
///
/// Returns a non-negative value, possibly `+inf` when the goal is known
/// to be unreachable from the pose.
pub trait Heuristic {
    fn estimate(&self, pose: &Pose) -> f64;
}

/// Dijkstra-like search, used as an admissibility reference.
pub struct ZeroHeuristic;

impl Heuristic for ZeroHeuristic {
    fn estimate(&self, _pose: &Pose) -> f64 {
        0.0
    }
}

/// Straight-line distance to the edge of the goal disc.
pub struct EuclideanHeuristic {
    goal: Pose,
    goal_radius: f64,
}

impl EuclideanHeuristic {
    pub fn new(goal: Pose, goal_radius: f64) -> Self {
        EuclideanHeuristic { goal, goal_radius }
    }
}

impl Heuristic for EuclideanHeuristic {
    fn estimate(&self, pose: &Pose) -> f64 {
        (pose.distance(&self.goal) - self.goal_radius).max(0.0)
    }
}

/// `max(holonomic-with-obstacles, euclidean, non-holonomic)` minus the
/// goal radius.
pub struct CombinedHeuristic<'a> {
    goal: Pose,
    goal_radius: f64,
    holonomic: Arc<HolonomicGoalMap>,
    holonomic_scale: f64,
    table: Option<&'a NonHolonomicTable>,
}

impl<'a> CombinedHeuristic<'a> {
    pub fn new(
        goal: Pose,
        goal_radius: f64,
        holonomic: Arc<HolonomicGoalMap>,
        holonomic_scale: f64,
        table: Option<&'a NonHolonomicTable>,
    ) -> Self {
        CombinedHeuristic {
            goal,
            goal_radius,
            holonomic,
            holonomic_scale,
            table,
        }
    }

    /// Goal map distance corrected for cell quantization of both ends.
    fn holonomic(&self, pose: &Pose) -> f64 {
        let raw = self.holonomic.cost_at(pose.x, pose.z);
        if raw.is_infinite() {
            return raw;
        }
        (raw * self.holonomic_scale - SQRT_2).max(0.0)
    }
}

impl Heuristic for CombinedHeuristic<'_> {
    fn estimate(&self, pose: &Pose) -> f64 {
        let euclid = pose.distance(&self.goal);
        if euclid <= self.goal_radius {
            return 0.0;
        }

        let mut h = euclid.max(self.holonomic(pose));
        if let Some(steps) = self.table.and_then(|t| t.lookup(pose, &self.goal)) {
            h = h.max(steps);
        }
        (h - self.goal_radius).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost_map::{CostMap, LETHAL_COST};
    use crate::holonomic::{GoalKey, compute_goal_map};
    use approx::assert_relative_eq;

    fn goal_map(map: &CostMap, goal: &Pose) -> Arc<HolonomicGoalMap> {
        Arc::new(compute_goal_map(map, GoalKey::from_pose(goal), 1.0).unwrap())
    }

    #[test]
    fn test_zero_inside_goal_disc() {
        let map = CostMap::filled(40, 40, 0).unwrap();
        let goal = Pose::new(20.0, 20.0, 0.0);
        let h = CombinedHeuristic::new(goal, 5.0, goal_map(&map, &goal), 0.9238795, None);

        assert_eq!(h.estimate(&Pose::new(23.0, 21.0, 1.0)), 0.0);
        assert!(h.estimate(&Pose::new(30.0, 20.0, 0.0)) > 0.0);
    }

    #[test]
    fn test_free_map_estimate_never_exceeds_straight_line() {
        let map = CostMap::filled(60, 60, 0).unwrap();
        let goal = Pose::new(50.5, 40.5, 0.0);
        let h = CombinedHeuristic::new(goal, 5.0, goal_map(&map, &goal), 0.9238795, None);

        for &(x, z) in &[(5.2, 5.9), (10.0, 40.0), (49.0, 2.0), (30.7, 31.1)] {
            let pose = Pose::new(x, z, 0.0);
            let bound = pose.distance(&goal) - 5.0;
            assert_relative_eq!(h.estimate(&pose), bound, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_wall_raises_estimate_above_euclidean() {
        // wall between start and goal, open only near z = 55
        let map = CostMap::from_fn(60, 60, |x, z| if x == 30 && z < 50 { LETHAL_COST } else { 0 }).unwrap();
        let goal = Pose::new(45.0, 10.0, 0.0);
        let h = CombinedHeuristic::new(goal, 5.0, goal_map(&map, &goal), 0.9238795, None);
        let euclid = EuclideanHeuristic::new(goal, 5.0);

        let start = Pose::new(15.0, 10.0, 0.0);
        assert!(h.estimate(&start) > euclid.estimate(&start) + 40.0);
    }

    #[test]
    fn test_enclosed_goal_is_unreachable() {
        let map = CostMap::from_fn(40, 40, |x, z| {
            let ring = (x == 15 || x == 25) && (15..=25).contains(&z)
                || (z == 15 || z == 25) && (15..=25).contains(&x);
            if ring { LETHAL_COST } else { 0 }
        })
        .unwrap();
        let goal = Pose::new(20.0, 20.0, 0.0);
        let h = CombinedHeuristic::new(goal, 2.0, goal_map(&map, &goal), 0.9238795, None);
        assert!(h.estimate(&Pose::new(5.0, 5.0, 0.0)).is_infinite());
    }
}
