//! Hybrid A* motion planning for a car-like vehicle on a costed grid.
//!
//! The search is guided by two precomputed estimates: a per-goal
//! Dijkstra field over the cost map ([`holonomic`]) and an offline table
//! of obstacle-free manoeuvre lengths ([`nonholonomic`]).

pub mod config;
pub mod cost_map;
pub mod data_struct;
pub mod error;
pub mod heuristic;
pub mod holonomic;
pub mod hybrid_astar;
pub mod motion;
pub mod nonholonomic;
pub mod path;
pub mod persist;
pub mod planner;
pub mod util;
pub mod viz;

pub use config::{PlannerConfig, SearchParams};
pub use cost_map::{CostMap, RiskOverlay};
pub use data_struct::{Direction, Pose};
pub use error::{PlannerError, Result};
pub use holonomic::{GoalKey, HolonomicCache};
pub use hybrid_astar::SearchOutcome;
pub use nonholonomic::NonHolonomicTable;
pub use path::{Path, PathStep};
pub use planner::{PlanRequest, Planner};
