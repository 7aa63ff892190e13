//! Planner configuration.
//!
//! All values are stored in physical units (meters, seconds, degrees) and
//! converted to grid units by [`SearchParams`] once the map resolution and
//! the current target speed are known.

use crate::error::{PlannerError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub map: MapConfig,
    pub vehicle: VehicleGeometry,
    pub search: SearchConfig,
    pub costs: CostConfig,
    pub table: TableConfig,
}

/// Cost map settings
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct MapConfig {
    /// Meters per cost map cell
    pub resolution: f64,
    /// Cost reported for queries outside the map
    pub out_of_bounds_cost: u8,
}

/// Vehicle footprint and axle layout, in meters.
///
/// The pose reference point sits `rear_axle_offset` ahead of the rear axle
/// and `front_axle_offset` behind the front axle.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct VehicleGeometry {
    pub length: f64,
    pub width: f64,
    pub rear_axle_offset: f64,
    pub front_axle_offset: f64,
    /// Extra length of the inflated footprint rectangle
    pub length_margin: f64,
    /// Extra width of the inflated footprint rectangle
    pub width_margin: f64,
}

/// Search settings
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Steering angles tried at every expansion [deg]
    pub steering_angles_deg: Vec<i32>,
    /// Position bucket size for OPEN/CLOSED keys [m]
    pub linear_discretization: f64,
    /// Heading bucket size for OPEN/CLOSED keys [rad]
    pub angular_discretization: f64,
    /// Goal acceptance radius [m]
    pub goal_radius: f64,
    /// CLOSED-set budget before the search gives up
    pub max_closed: usize,
    /// Duration of one control tick [s]
    pub control_interval: f64,
    /// Arc lengths are rounded up to a multiple of this [grid units]
    pub arc_granularity: f64,
    /// Arcs longer than this also get intermediate samples [grid units]
    pub intermediate_threshold: f64,
    /// Number of intermediate samples along a long arc
    pub intermediate_samples: usize,
    /// Target speeds below this are raised to it [km/h]
    pub min_speed_kmh: f64,
}

/// Step cost and heuristic weights
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct CostConfig {
    /// Multiplier of cell cost per unit of travelled length
    pub obstacle_weight: f64,
    /// Steering magnitude above which the steeper penalty applies [deg]
    pub steer_threshold_deg: f64,
    /// Penalty per degree of steering up to the threshold
    pub steer_cost_low: f64,
    /// Penalty per degree of steering past the threshold
    pub steer_cost_high: f64,
    /// Penalty per degree of change against the parent's steering angle
    pub steer_change_cost: f64,
    /// Additive penalty of every reverse step
    pub reverse_penalty: f64,
    /// Scale applied to the holonomic-with-obstacles distance
    pub holonomic_scale: f64,
}

/// Extents of the non-holonomic-without-obstacles table
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct TableConfig {
    /// Number of cells along x and z
    pub extent: usize,
    /// Size of one table cell [grid units]
    pub cell_size: f64,
    /// Number of heading buckets over a full turn
    pub headings: usize,
    /// Speed used to size the arc while building [m/s]
    pub build_speed: f64,
    /// CLOSED budget of each simplified search
    pub max_closed: usize,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            resolution: 1.0,
            out_of_bounds_cost: u8::MAX,
        }
    }
}

impl Default for VehicleGeometry {
    fn default() -> Self {
        Self {
            length: 4.25,
            width: 1.7,
            rear_axle_offset: 1.5218339,
            front_axle_offset: 1.092812,
            length_margin: 0.4,
            width_margin: 0.2,
        }
    }
}

impl VehicleGeometry {
    pub fn wheelbase(&self) -> f64 {
        self.rear_axle_offset + self.front_axle_offset
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            steering_angles_deg: vec![0, -5, 5, -10, 10, -15, 15, -20, 20, -25, 25, -30, 30, -35, 35],
            linear_discretization: 0.8,
            angular_discretization: 0.1,
            goal_radius: 5.0,
            max_closed: 400_000,
            control_interval: 1.0,
            arc_granularity: 2.0,
            intermediate_threshold: 2.0,
            intermediate_samples: 3,
            min_speed_kmh: 5.0,
        }
    }
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            obstacle_weight: 1.0,
            steer_threshold_deg: 30.0,
            steer_cost_low: 1.0 / 1200.0,
            steer_cost_high: 1.0 / 600.0,
            steer_change_cost: 1.0 / 120.0,
            reverse_penalty: 25.0,
            // octile distance overestimates euclidean length by up to 1/cos(pi/8)
            holonomic_scale: 0.923_879_5,
        }
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            extent: 400,
            cell_size: 1.0,
            headings: 72,
            build_speed: 1.05,
            max_closed: 20_000,
        }
    }
}

impl PlannerConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PlannerConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(PlannerError::InvalidConfig(msg.to_string()));

        if !(self.map.resolution > 0.0) {
            return invalid("map.resolution must be positive");
        }
        if self.search.steering_angles_deg.is_empty() {
            return invalid("search.steering_angles_deg must not be empty");
        }
        if self
            .search
            .steering_angles_deg
            .iter()
            .any(|a| a.unsigned_abs() >= 90)
        {
            return invalid("steering angles must lie strictly within (-90, 90) degrees");
        }
        if !(self.search.linear_discretization > 0.0) || !(self.search.angular_discretization > 0.0)
        {
            return invalid("search discretization must be positive");
        }
        if !(self.search.goal_radius > 0.0) {
            return invalid("search.goal_radius must be positive");
        }
        if self.search.max_closed == 0 {
            return invalid("search.max_closed must be at least 1");
        }
        if !(self.search.control_interval > 0.0) || !(self.search.arc_granularity > 0.0) {
            return invalid("control interval and arc granularity must be positive");
        }
        if !(self.vehicle.wheelbase() > 0.0) || !(self.vehicle.length > 0.0) || !(self.vehicle.width > 0.0)
        {
            return invalid("vehicle dimensions must be positive");
        }
        if self.table.extent == 0 || self.table.headings == 0 || !(self.table.cell_size > 0.0) {
            return invalid("table extents must be positive");
        }
        if self.table.extent > u16::MAX as usize {
            return invalid("table.extent must fit in 16 bits");
        }
        Ok(())
    }

    /// Derive grid-unit search parameters for a given target speed.
    pub fn search_params(&self, target_speed_kmh: f64) -> SearchParams {
        let speed = target_speed_kmh.max(self.search.min_speed_kmh) / 3.6;
        SearchParams::new(self, speed)
    }
}

/// Search parameters expressed in grid units.
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub arc_length: f64,      // [grid] length of one motion primitive
    pub linear_bucket: f64,   // [grid]
    pub angular_bucket: f64,  // [rad]
    pub goal_radius: f64,     // [grid]
    pub max_closed: usize,
    pub intermediate_threshold: f64, // [grid]
    pub intermediate_samples: usize,
}

impl SearchParams {
    /// `speed` in m/s. The arc length is rounded up to the arc granularity.
    pub fn new(config: &PlannerConfig, speed: f64) -> Self {
        let reso = config.map.resolution;
        let granularity = config.search.arc_granularity;
        let raw = speed * config.search.control_interval / reso;
        let arc_length = ((raw / granularity).ceil() * granularity).max(granularity);

        Self {
            arc_length,
            linear_bucket: config.search.linear_discretization / reso,
            angular_bucket: config.search.angular_discretization,
            goal_radius: config.search.goal_radius / reso,
            max_closed: config.search.max_closed,
            intermediate_threshold: config.search.intermediate_threshold,
            intermediate_samples: config.search.intermediate_samples,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_config_is_valid() {
        assert!(PlannerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: PlannerConfig = toml::from_str(
            r#"
            [map]
            resolution = 0.5

            [search]
            goal_radius = 2.0
            "#,
        )
        .unwrap();

        assert_relative_eq!(config.map.resolution, 0.5);
        assert_relative_eq!(config.search.goal_radius, 2.0);
        assert_eq!(config.search.steering_angles_deg.len(), 15);
        assert_eq!(config.search.max_closed, 400_000);
    }

    #[test]
    fn test_shipped_config_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("planner.toml");
        let config = PlannerConfig::load(&path).unwrap();
        assert_eq!(config.table.headings, 72);
        assert_relative_eq!(config.costs.reverse_penalty, 25.0);
    }

    #[test]
    fn test_validate_rejects_empty_steering_set() {
        let mut config = PlannerConfig::default();
        config.search.steering_angles_deg.clear();
        assert!(matches!(
            config.validate(),
            Err(PlannerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_arc_length_rounds_up_to_granularity() {
        let mut config = PlannerConfig::default();
        config.map.resolution = 0.5;
        // 1.05 m/s * 1 s / 0.5 m = 2.1 grid units -> 4
        let params = SearchParams::new(&config, 1.05);
        assert_relative_eq!(params.arc_length, 4.0);
        assert_relative_eq!(params.goal_radius, 10.0);
    }

    #[test]
    fn test_slow_targets_use_minimum_speed() {
        let config = PlannerConfig::default();
        let stopped = config.search_params(0.0);
        let crawling = config.search_params(config.search.min_speed_kmh);
        assert_relative_eq!(stopped.arc_length, crawling.arc_length);
        assert!(stopped.arc_length > 0.0);
    }
}
