//! Entry point for planning calls.
//!
//! A [`Planner`] owns the read-only resources shared by every call: the
//! cost map, the holonomic goal map cache and the optional
//! non-holonomic table. Each call brings its own start, goal, speed and
//! risk overlay.

use crate::config::PlannerConfig;
use crate::cost_map::{CostMap, CostView, RiskOverlay};
use crate::data_struct::Pose;
use crate::error::{PlannerError, Result};
use crate::heuristic::CombinedHeuristic;
use crate::holonomic::{GoalKey, HolonomicCache};
use crate::hybrid_astar::{SearchOutcome, SearchSpace, Terrain, hybrid_astar_search};
use crate::motion::{Footprint, Kinematics};
use crate::nonholonomic::NonHolonomicTable;
use std::sync::Arc;
use tracing::debug;

/// One planning call.
#[derive(Debug, Clone, Copy)]
pub struct PlanRequest<'a> {
    pub start: Pose,
    pub goal: Pose,
    /// Desired speed [km/h], floored at the configured minimum
    pub target_speed_kmh: f64,
    pub allow_reverse: bool,
    pub overlay: Option<&'a RiskOverlay>,
}

impl<'a> PlanRequest<'a> {
    pub fn new(start: Pose, goal: Pose, target_speed_kmh: f64) -> Self {
        PlanRequest {
            start,
            goal,
            target_speed_kmh,
            allow_reverse: false,
            overlay: None,
        }
    }

    pub fn with_reverse(mut self, allow_reverse: bool) -> Self {
        self.allow_reverse = allow_reverse;
        self
    }

    pub fn with_overlay(mut self, overlay: &'a RiskOverlay) -> Self {
        self.overlay = Some(overlay);
        self
    }
}

pub struct Planner {
    config: PlannerConfig,
    map: Arc<CostMap>,
    holonomic: Arc<HolonomicCache>,
    table: Option<Arc<NonHolonomicTable>>,
    kinematics: Kinematics,
    footprint: Footprint,
}

impl Planner {
    /// Planner over `holonomic`'s cost map. Without a table only the
    /// holonomic and euclidean estimates are used.
    pub fn new(
        config: PlannerConfig,
        holonomic: Arc<HolonomicCache>,
        table: Option<Arc<NonHolonomicTable>>,
    ) -> Result<Self> {
        config.validate()?;
        let kinematics = Kinematics::new(&config);
        let footprint = Footprint::new(&config.vehicle, config.map.resolution);

        Ok(Planner {
            map: holonomic.cost_map().clone(),
            config,
            holonomic,
            table,
            kinematics,
            footprint,
        })
    }

    /// Planner with an empty goal map cache and no table.
    pub fn with_map(config: PlannerConfig, map: Arc<CostMap>) -> Result<Self> {
        let cache = Arc::new(HolonomicCache::new(map, config.costs.obstacle_weight));
        Self::new(config, cache, None)
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn map(&self) -> &Arc<CostMap> {
        &self.map
    }

    pub fn holonomic(&self) -> &Arc<HolonomicCache> {
        &self.holonomic
    }

    pub fn kinematics(&self) -> &Kinematics {
        &self.kinematics
    }

    pub fn footprint(&self) -> &Footprint {
        &self.footprint
    }

    /// Search for a path. "No path" is a successful outcome without a
    /// terminal node; errors are reserved for invalid requests.
    pub fn plan(
        &self,
        request: &PlanRequest<'_>,
        rec: Option<&rerun::RecordingStream>,
    ) -> Result<SearchOutcome> {
        let (start, goal) = (request.start, request.goal);
        if !self.map.contains(start.x, start.z) {
            return Err(PlannerError::OutOfBounds(format!(
                "start ({:.1}, {:.1}) outside map",
                start.x, start.z
            )));
        }
        if let Some(overlay) = request.overlay {
            if overlay.width() != self.map.width() || overlay.height() != self.map.height() {
                return Err(PlannerError::CostMap(format!(
                    "overlay is {}x{}, map is {}x{}",
                    overlay.width(),
                    overlay.height(),
                    self.map.width(),
                    self.map.height()
                )));
            }
        }

        let params = self.config.search_params(request.target_speed_kmh);
        let goal_map = self.holonomic.goal_map(GoalKey::from_pose(&goal))?;
        let heuristic = CombinedHeuristic::new(
            goal,
            params.goal_radius,
            goal_map,
            self.config.costs.holonomic_scale,
            self.table.as_deref(),
        );

        let space = SearchSpace {
            kinematics: &self.kinematics,
            params: &params,
            terrain: Terrain::Mapped {
                view: CostView::new(&self.map, request.overlay),
                footprint: &self.footprint,
                costs: &self.config.costs,
            },
            allow_reverse: request.allow_reverse,
        };

        let outcome = hybrid_astar_search(&space, start, goal, &heuristic, rec);
        debug!(
            "Plan at {:.1} km/h: found {}, {} nodes",
            request.target_speed_kmh,
            outcome.found(),
            outcome.tree.len()
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost_map::LETHAL_COST;

    fn planner(map: CostMap) -> Planner {
        Planner::with_map(PlannerConfig::default(), Arc::new(map)).unwrap()
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = PlannerConfig::default();
        config.map.resolution = 0.0;
        let map = Arc::new(CostMap::filled(10, 10, 0).unwrap());
        assert!(matches!(
            Planner::with_map(config, map),
            Err(PlannerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_goal_outside_map_is_error() {
        let p = planner(CostMap::filled(40, 40, 0).unwrap());
        let request = PlanRequest::new(Pose::new(10.0, 10.0, 0.0), Pose::new(55.0, 10.0, 0.0), 20.0);
        assert!(matches!(
            p.plan(&request, None),
            Err(PlannerError::OutOfBounds(_))
        ));
    }

    #[test]
    fn test_overlay_extent_must_match() {
        let p = planner(CostMap::filled(40, 40, 0).unwrap());
        let overlay = RiskOverlay::from_fn(20, 20, |_, _| 0);
        let request = PlanRequest::new(Pose::new(10.0, 10.0, 0.0), Pose::new(30.0, 10.0, 0.0), 20.0)
            .with_overlay(&overlay);
        assert!(p.plan(&request, None).is_err());
    }

    #[test]
    fn test_overlay_wall_blocks_only_its_call() {
        let p = planner(CostMap::filled(60, 30, 0).unwrap());
        let wall = RiskOverlay::from_fn(60, 30, |x, _| if x == 30 { LETHAL_COST } else { 0 });
        let request = PlanRequest::new(Pose::new(10.0, 15.0, 0.0), Pose::new(50.0, 15.0, 0.0), 5.0);

        assert!(p.plan(&request.with_overlay(&wall), None).unwrap().path().is_none());
        assert!(p.plan(&request, None).unwrap().path().is_some());
        assert_eq!(p.holonomic().computed_count(), 1);
    }
}
