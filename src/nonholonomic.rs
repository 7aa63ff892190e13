//! Non-holonomic-without-obstacles heuristic.
//!
//! An offline table of how many motion primitives the car needs to reach
//! the goal disc around the origin, for every start cell of the first
//! quadrant and every heading bucket. The goal test ignores heading, so
//! the other quadrants follow by mirroring.

use crate::config::{PlannerConfig, SearchParams};
use crate::data_struct::Pose;
use crate::error::{PlannerError, Result};
use crate::heuristic::EuclideanHeuristic;
use crate::hybrid_astar::{SearchSpace, Terrain, hybrid_astar_search};
use crate::motion::Kinematics;
use crate::persist;
use crate::util::normalize_angle;
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};
use std::path::Path;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::time::Instant;
use tracing::info;

const TABLE_MAGIC: [u8; 4] = *b"NHOL";

/// Marks a start from which the bounded search found no path.
pub const UNREACHED: u16 = u16::MAX;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NonHolonomicTable {
    extent: usize,
    headings: usize,
    cell_size: f64,  // [grid]
    arc_length: f64, // [grid] length of one primitive while building
    steps: Vec<u16>, // indexed [z][x][heading]
}

impl NonHolonomicTable {
    /// Run one simplified search per table entry on `workers` threads.
    ///
    /// The searches use the configured steering set and kinematics but no
    /// cost map, no penalties and forward motion only.
    pub fn build(config: &PlannerConfig, workers: usize) -> Result<Self> {
        config.validate()?;
        let table = &config.table;
        let (extent, headings) = (table.extent, table.headings);

        let mut params = SearchParams::new(config, table.build_speed);
        params.max_closed = table.max_closed;
        let kinematics = Kinematics::new(config);
        let space = SearchSpace {
            kinematics: &kinematics,
            params: &params,
            terrain: Terrain::Open,
            allow_reverse: false,
        };

        info!(
            "Building {}x{}x{} non-holonomic table, arc {:.2}, {} workers",
            extent, extent, headings, params.arc_length, workers
        );
        let t0 = Instant::now();
        let next_row = AtomicUsize::new(0);
        let rows_done = AtomicUsize::new(0);
        let longest = AtomicU16::new(0);

        let goal = Pose::new(0.0, 0.0, 0.0);
        let heuristic = EuclideanHeuristic::new(goal, params.goal_radius);
        let row_steps = |iz: usize| -> Vec<u16> {
            let mut row = Vec::with_capacity(extent * headings);
            for ix in 0..extent {
                for ih in 0..headings {
                    let start = Pose::new(
                        ix as f64 * table.cell_size,
                        iz as f64 * table.cell_size,
                        ih as f64 * TAU / headings as f64,
                    );
                    let outcome = hybrid_astar_search(&space, start, goal, &heuristic, None);
                    let steps = match outcome.path() {
                        Some(path) => path.len().min(UNREACHED as usize - 1) as u16,
                        None => UNREACHED,
                    };
                    if steps != UNREACHED {
                        longest.fetch_max(steps, Ordering::Relaxed);
                    }
                    row.push(steps);
                }
            }
            row
        };

        let mut rows: Vec<(usize, Vec<u16>)> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..workers.max(1))
                .map(|_| {
                    s.spawn(|| {
                        let mut done = Vec::new();
                        loop {
                            let iz = next_row.fetch_add(1, Ordering::Relaxed);
                            if iz >= extent {
                                return done;
                            }
                            done.push((iz, row_steps(iz)));
                            let n = rows_done.fetch_add(1, Ordering::Relaxed) + 1;
                            if n % 10 == 0 || n == extent {
                                info!(
                                    "{:.1}% computed, longest path {} states",
                                    100.0 * n as f64 / extent as f64,
                                    longest.load(Ordering::Relaxed)
                                );
                            }
                        }
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|h| h.join())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(|parts| parts.into_iter().flatten().collect::<Vec<_>>())
                .map_err(|_| PlannerError::Worker("table worker panicked".into()))
        })?;
        rows.sort_by_key(|(iz, _)| *iz);

        let steps: Vec<u16> = rows.into_iter().flat_map(|(_, row)| row).collect();
        let unreached = steps.iter().filter(|&&s| s == UNREACHED).count();
        info!(
            "Table built in {:?}: longest path {} states, {} unreached entries",
            t0.elapsed(),
            longest.load(Ordering::Relaxed),
            unreached
        );

        Ok(NonHolonomicTable {
            extent,
            headings,
            cell_size: table.cell_size,
            arc_length: params.arc_length,
            steps,
        })
    }

    pub fn extent(&self) -> usize {
        self.extent
    }

    pub fn headings(&self) -> usize {
        self.headings
    }

    pub fn arc_length(&self) -> f64 {
        self.arc_length
    }

    /// Stored state count, `None` outside the table.
    pub fn steps_at(&self, ix: usize, iz: usize, heading: usize) -> Option<u16> {
        if ix >= self.extent || iz >= self.extent || heading >= self.headings {
            return None;
        }
        Some(self.steps[(iz * self.extent + ix) * self.headings + heading])
    }

    /// Longest recorded path, in states.
    pub fn longest_path(&self) -> Option<u16> {
        self.steps.iter().copied().filter(|&s| s != UNREACHED).max()
    }

    /// Obstacle-free path length from `state` to the goal disc around
    /// `goal`, `None` outside the table or for unreached entries.
    pub fn lookup(&self, state: &Pose, goal: &Pose) -> Option<f64> {
        let dx = state.x - goal.x;
        let dz = state.z - goal.z;

        let mut theta = state.theta;
        if dx < 0.0 {
            theta = PI - theta;
        }
        if dz < 0.0 {
            theta = -theta;
        }
        let theta = normalize_angle(theta);

        let ix = (dx.abs() / self.cell_size).round() as usize;
        let iz = (dz.abs() / self.cell_size).round() as usize;
        let heading = (theta / (TAU / self.headings as f64)).floor() as usize % self.headings;

        match self.steps_at(ix, iz, heading)? {
            UNREACHED => None,
            steps => Some(steps.saturating_sub(1) as f64 * self.arc_length),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        persist::save(path, TABLE_MAGIC, self)?;
        info!("Saved non-holonomic table to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let table: NonHolonomicTable = persist::load(path, TABLE_MAGIC)?;
        if table.extent == 0
            || table.headings == 0
            || !(table.cell_size > 0.0)
            || table.steps.len() != table.extent * table.extent * table.headings
        {
            return Err(PlannerError::Persist(format!(
                "{} has inconsistent table dimensions",
                path.display()
            )));
        }
        info!(
            "Loaded {}x{}x{} non-holonomic table from {}",
            table.extent,
            table.extent,
            table.headings,
            path.display()
        );
        Ok(table)
    }
}
