//! Holonomic-with-obstacles heuristic.
//!
//! For a goal cell, a full-grid Dijkstra gives the cheapest 8-connected
//! obstacle-respecting cost from every cell to the goal, ignoring the
//! turning radius. Fields are expensive and reused for many searches, so
//! they are cached per goal for the lifetime of the cache.

use crate::cost_map::{CostMap, LETHAL_COST};
use crate::data_struct::Pose;
use crate::error::{PlannerError, Result};
use crate::persist;
use ordered_float::NotNan;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info};

const GOAL_MAPS_MAGIC: [u8; 4] = *b"HOLO";

/// Goal cell used as cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GoalKey {
    pub x: i32,
    pub z: i32,
}

impl GoalKey {
    pub fn new(x: i32, z: i32) -> Self {
        GoalKey { x, z }
    }

    /// Cell containing the goal pose. Floored like [`HolonomicGoalMap::cost_at`],
    /// so the seed cell is the one the goal pose itself reads.
    pub fn from_pose(pose: &Pose) -> Self {
        GoalKey {
            x: pose.x.floor() as i32,
            z: pose.z.floor() as i32,
        }
    }
}

/// Cheapest cost from every cell to one goal cell. `+inf` marks cells
/// that cannot reach the goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolonomicGoalMap {
    goal: GoalKey,
    width: usize,
    height: usize,
    costs: Vec<f32>,
}

impl HolonomicGoalMap {
    pub fn goal(&self) -> GoalKey {
        self.goal
    }

    pub fn costs(&self) -> &[f32] {
        &self.costs
    }

    pub fn cell(&self, x: usize, z: usize) -> f32 {
        if x < self.width && z < self.height {
            self.costs[z * self.width + x]
        } else {
            f32::INFINITY
        }
    }

    /// Value of the cell containing the continuous point `(x, z)`.
    pub fn cost_at(&self, x: f64, z: f64) -> f64 {
        if x < 0.0 || z < 0.0 {
            return f64::INFINITY;
        }
        self.cell(x as usize, z as usize) as f64
    }
}

fn get_motion() -> [(isize, isize, f64); 8] {
    let d = std::f64::consts::SQRT_2;
    [
        (0, -1, 1.0),
        (1, -1, d),
        (1, 0, 1.0),
        (1, 1, d),
        (0, 1, 1.0),
        (-1, 1, d),
        (-1, 0, 1.0),
        (-1, -1, d),
    ]
}

fn check_goal(map: &CostMap, goal: GoalKey) -> Result<()> {
    if goal.x < 0 || goal.z < 0 || goal.x as usize >= map.width() || goal.z as usize >= map.height()
    {
        return Err(PlannerError::OutOfBounds(format!(
            "goal cell ({}, {}) outside {}x{} map",
            goal.x,
            goal.z,
            map.width(),
            map.height()
        )));
    }
    Ok(())
}

/// Run Dijkstra from `goal` over the whole map.
///
/// Entering a cell costs the move length plus `cost * obstacle_weight`;
/// lethal cells are never entered.
pub fn compute_goal_map(map: &CostMap, goal: GoalKey, obstacle_weight: f64) -> Result<HolonomicGoalMap> {
    check_goal(map, goal)?;

    let width = map.width();
    let height = map.height();
    let mut dist = vec![f64::INFINITY; width * height];
    let mut closed = vec![false; width * height];
    let motion = get_motion();

    let goal_ind = goal.z as usize * width + goal.x as usize;
    dist[goal_ind] = 0.0;

    let mut q_priority = BinaryHeap::new();
    q_priority.push((Reverse(NotNan::<f64>::default()), goal_ind));

    while let Some((Reverse(cost), ind)) = q_priority.pop() {
        if closed[ind] {
            continue;
        }
        closed[ind] = true;

        let (x, z) = ((ind % width) as isize, (ind / width) as isize);
        for &(dx, dz, len) in &motion {
            let (nx, nz) = (x + dx, z + dz);
            if nx < 0 || nz < 0 || nx as usize >= width || nz as usize >= height {
                continue;
            }
            let n_ind = nz as usize * width + nx as usize;
            if closed[n_ind] {
                continue;
            }
            let cell = map.cells()[n_ind];
            if cell == LETHAL_COST {
                continue;
            }

            let next = cost.into_inner() + len + cell as f64 * obstacle_weight;
            if next < dist[n_ind] {
                dist[n_ind] = next;
                // finite sums of finite costs are never NaN
                if let Ok(key) = NotNan::new(next) {
                    q_priority.push((Reverse(key), n_ind));
                }
            }
        }
    }

    Ok(HolonomicGoalMap {
        goal,
        width,
        height,
        costs: dist.into_iter().map(|d| d as f32).collect(),
    })
}

/// Process-wide memo of goal maps with one lock per goal.
///
/// Readers of an already computed goal only take the shared read lock.
/// A miss takes the goal's own mutex, so computing one goal never blocks
/// requests for another.
pub struct HolonomicCache {
    map: Arc<CostMap>,
    obstacle_weight: f64,
    maps: RwLock<HashMap<GoalKey, Arc<HolonomicGoalMap>>>,
    key_locks: Mutex<HashMap<GoalKey, Arc<Mutex<()>>>>,
    computed: AtomicUsize,
}

impl HolonomicCache {
    pub fn new(map: Arc<CostMap>, obstacle_weight: f64) -> Self {
        HolonomicCache {
            map,
            obstacle_weight,
            maps: RwLock::new(HashMap::new()),
            key_locks: Mutex::new(HashMap::new()),
            computed: AtomicUsize::new(0),
        }
    }

    pub fn cost_map(&self) -> &Arc<CostMap> {
        &self.map
    }

    pub fn get(&self, goal: GoalKey) -> Option<Arc<HolonomicGoalMap>> {
        self.maps.read().get(&goal).cloned()
    }

    pub fn len(&self) -> usize {
        self.maps.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of Dijkstra runs performed by this cache.
    pub fn computed_count(&self) -> usize {
        self.computed.load(Ordering::Relaxed)
    }

    /// Goal map for `goal`, computing it on first use.
    pub fn goal_map(&self, goal: GoalKey) -> Result<Arc<HolonomicGoalMap>> {
        if let Some(found) = self.get(goal) {
            return Ok(found);
        }
        check_goal(&self.map, goal)?;

        let entry_lock = {
            let mut locks = self.key_locks.lock();
            locks.entry(goal).or_default().clone()
        };
        let _guard = entry_lock.lock();

        if let Some(found) = self.get(goal) {
            return Ok(found);
        }

        let t0 = Instant::now();
        let goal_map = Arc::new(compute_goal_map(&self.map, goal, self.obstacle_weight)?);
        self.computed.fetch_add(1, Ordering::Relaxed);
        info!(
            "Computed holonomic goal map for ({}, {}) in {:?}",
            goal.x,
            goal.z,
            t0.elapsed()
        );

        self.maps.write().insert(goal, goal_map.clone());
        Ok(goal_map)
    }

    /// Compute goal maps for `goals` on `workers` threads.
    pub fn precompute(&self, goals: &[GoalKey], workers: usize) -> Result<()> {
        let next = AtomicUsize::new(0);
        let done = AtomicUsize::new(0);
        let workers = workers.clamp(1, goals.len().max(1));

        std::thread::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    s.spawn(|| -> Result<()> {
                        loop {
                            let i = next.fetch_add(1, Ordering::Relaxed);
                            let Some(&goal) = goals.get(i) else {
                                return Ok(());
                            };
                            self.goal_map(goal)?;
                            let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                            info!("Goal map {}/{} ready", n, goals.len());
                        }
                    })
                })
                .collect();

            // join every worker before reporting the first failure
            let results: Vec<Result<()>> = handles
                .into_iter()
                .map(|h| {
                    h.join()
                        .unwrap_or_else(|_| Err(PlannerError::Worker("goal map worker panicked".into())))
                })
                .collect();
            results.into_iter().collect::<Result<()>>()
        })
    }

    /// Write every cached goal map to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let maps = self.maps.read();
        let mut records: Vec<&HolonomicGoalMap> = maps.values().map(|m| m.as_ref()).collect();
        records.sort_by_key(|m| (m.goal.x, m.goal.z));
        persist::save(path, GOAL_MAPS_MAGIC, &records)?;
        info!("Saved {} goal maps to {}", records.len(), path.display());
        Ok(())
    }

    /// Load goal maps written by [`HolonomicCache::save`] for `map`.
    pub fn load(map: Arc<CostMap>, obstacle_weight: f64, path: &Path) -> Result<Self> {
        let records: Vec<HolonomicGoalMap> = persist::load(path, GOAL_MAPS_MAGIC)?;
        let cache = Self::new(map, obstacle_weight);
        {
            let mut maps = cache.maps.write();
            for record in records {
                if record.width != cache.map.width()
                    || record.height != cache.map.height()
                    || record.costs.len() != record.width * record.height
                {
                    return Err(PlannerError::Persist(format!(
                        "goal map ({}, {}) is {}x{}, cost map is {}x{}",
                        record.goal.x,
                        record.goal.z,
                        record.width,
                        record.height,
                        cache.map.width(),
                        cache.map.height()
                    )));
                }
                maps.insert(record.goal, Arc::new(record));
            }
        }
        debug!("Loaded {} goal maps from {}", cache.len(), path.display());
        Ok(cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost_map::FREE_COST;
    use approx::assert_relative_eq;
    use std::f64::consts::SQRT_2;
    use tempfile::TempDir;

    fn free_map(w: usize, h: usize) -> Arc<CostMap> {
        Arc::new(CostMap::filled(w, h, FREE_COST).unwrap())
    }

    #[test]
    fn test_free_map_gives_octile_distance() {
        let map = free_map(20, 20);
        let field = compute_goal_map(&map, GoalKey::new(5, 5), 1.0).unwrap();
        assert_eq!(field.cell(5, 5), 0.0);
        assert_relative_eq!(field.cell(15, 5) as f64, 10.0, epsilon = 1e-4);
        assert_relative_eq!(field.cell(8, 9) as f64, 3.0 * SQRT_2 + 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_wall_forces_detour_and_blocks_cells() {
        // lethal wall at x = 10 for z in 0..15, open above
        let map = CostMap::from_fn(20, 20, |x, z| if x == 10 && z < 15 { LETHAL_COST } else { 0 }).unwrap();
        let field = compute_goal_map(&map, GoalKey::new(15, 2), 1.0).unwrap();

        assert!(field.cell(10, 3).is_infinite());
        let detour = field.cell(5, 2) as f64;
        assert!(detour > 10.0 + 20.0);
    }

    #[test]
    fn test_cell_costs_are_charged() {
        let map = CostMap::from_fn(10, 1, |x, _| if x == 3 { 10 } else { 0 }).unwrap();
        let field = compute_goal_map(&map, GoalKey::new(0, 0), 1.0).unwrap();
        // cells 1, 2 cost 1 each, cell 3 costs 1 + 10
        assert_relative_eq!(field.cell(3, 0) as f64, 13.0, epsilon = 1e-4);
        assert_relative_eq!(field.cell(4, 0) as f64, 14.0, epsilon = 1e-4);
    }

    #[test]
    fn test_cell_penalty_is_added_once_per_move() {
        let map = CostMap::from_fn(3, 3, |x, z| if (x, z) == (1, 1) { 10 } else { 0 }).unwrap();
        let field = compute_goal_map(&map, GoalKey::new(0, 0), 1.0).unwrap();
        // diagonal entry pays sqrt(2) + 10, not sqrt(2) * 11 or 1 + 11
        assert_relative_eq!(field.cell(1, 1) as f64, SQRT_2 + 10.0, epsilon = 1e-4);
        assert_relative_eq!(field.cell(2, 2) as f64, 2.0 + SQRT_2, epsilon = 1e-4);
    }

    #[test]
    fn test_goal_pose_reads_its_own_seed_cell() {
        let map = free_map(20, 20);
        for goal in [Pose::new(7.5, 3.5, 0.0), Pose::new(7.9, 3.99, 1.0), Pose::new(0.2, 19.6, 0.0)] {
            let field = compute_goal_map(&map, GoalKey::from_pose(&goal), 1.0).unwrap();
            assert_eq!(field.cost_at(goal.x, goal.z), 0.0);
        }
    }

    #[test]
    fn test_precompute_reports_bad_goal_after_all_workers_finish() {
        let cache = HolonomicCache::new(free_map(20, 20), 1.0);
        let goals = [GoalKey::new(1, 1), GoalKey::new(40, 1), GoalKey::new(5, 5), GoalKey::new(9, 9)];
        assert!(matches!(
            cache.precompute(&goals, 4),
            Err(PlannerError::OutOfBounds(_))
        ));
        assert!(cache.get(GoalKey::new(1, 1)).is_some());
    }

    #[test]
    fn test_goal_outside_map_is_error() {
        let map = free_map(10, 10);
        assert!(matches!(
            compute_goal_map(&map, GoalKey::new(10, 3), 1.0),
            Err(PlannerError::OutOfBounds(_))
        ));
        let cache = HolonomicCache::new(map, 1.0);
        assert!(cache.goal_map(GoalKey::new(-1, 3)).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_returns_identical_map_once_computed() {
        let cache = HolonomicCache::new(free_map(30, 30), 1.0);
        let goal = GoalKey::new(12, 7);
        let a = cache.goal_map(goal).unwrap();
        let b = cache.goal_map(goal).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.costs(), b.costs());
        assert_eq!(cache.computed_count(), 1);
    }

    #[test]
    fn test_concurrent_requests_compute_each_goal_once() {
        let cache = Arc::new(HolonomicCache::new(free_map(60, 60), 1.0));
        let goals = [GoalKey::new(3, 4), GoalKey::new(50, 40), GoalKey::new(20, 55)];

        std::thread::scope(|s| {
            for t in 0..8 {
                let cache = cache.clone();
                s.spawn(move || {
                    for k in 0..goals.len() {
                        let goal = goals[(k + t) % goals.len()];
                        cache.goal_map(goal).unwrap();
                    }
                });
            }
        });

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.computed_count(), 3);
    }

    #[test]
    fn test_precompute_and_persist_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("goals.bin");
        let map = free_map(25, 15);

        let cache = HolonomicCache::new(map.clone(), 1.0);
        cache
            .precompute(&[GoalKey::new(1, 1), GoalKey::new(20, 10)], 2)
            .unwrap();
        cache.save(&path).unwrap();

        let loaded = HolonomicCache::load(map, 1.0, &path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.computed_count(), 0);
        assert_eq!(
            loaded.get(GoalKey::new(20, 10)).unwrap().costs(),
            cache.get(GoalKey::new(20, 10)).unwrap().costs()
        );
    }

    #[test]
    fn test_load_rejects_maps_of_other_extents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("goals.bin");
        let cache = HolonomicCache::new(free_map(10, 10), 1.0);
        cache.goal_map(GoalKey::new(2, 2)).unwrap();
        cache.save(&path).unwrap();

        assert!(matches!(
            HolonomicCache::load(free_map(12, 10), 1.0, &path),
            Err(PlannerError::Persist(_))
        ));
    }
}
