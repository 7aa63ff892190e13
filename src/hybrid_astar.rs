use crate::config::{CostConfig, SearchParams};
use crate::cost_map::{CostView, LETHAL_COST};
use crate::data_struct::{Direction, DiscreteKey, NodeId, Pose, SearchNode, SearchTree};
use crate::heuristic::Heuristic;
use crate::motion::{Footprint, Kinematics, Steer};
use crate::path::{Path, extract_path};
use ordered_float::NotNan;
use rerun::external::glam::Vec2;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

const EXPLORED_LOG_INTERVAL: usize = 500; // expansions between rerun updates

/// What the vehicle drives over.
#[derive(Clone, Copy)]
pub enum Terrain<'a> {
    /// Unbounded free plane, step cost is the arc length alone.
    Open,
    /// Costed grid checked through the vehicle footprint.
    Mapped {
        view: CostView<'a>,
        footprint: &'a Footprint,
        costs: &'a CostConfig,
    },
}

impl Terrain<'_> {
    /// Worst cell cost under the vehicle at `pose`, `None` if the pose
    /// leaves the map or touches a lethal cell.
    fn worst_cost(&self, pose: &Pose, kinematics: &Kinematics) -> Option<u8> {
        match self {
            Terrain::Open => Some(0),
            Terrain::Mapped {
                view, footprint, ..
            } => {
                if !view.contains(pose.x, pose.z) {
                    return None;
                }
                let worst = footprint.worst_cost(view, pose, kinematics.table());
                (worst != LETHAL_COST).then_some(worst)
            }
        }
    }

    fn step_cost(
        &self,
        length: f64,
        worst: u8,
        steer_deg: i32,
        parent_steer_deg: i32,
        direction: Direction,
    ) -> f64 {
        match self {
            Terrain::Open => length.abs(),
            Terrain::Mapped { costs, .. } => {
                let steer = steer_deg.unsigned_abs() as f64;
                let steer_cost = if steer <= costs.steer_threshold_deg {
                    steer * costs.steer_cost_low
                } else {
                    steer * costs.steer_cost_high
                };
                let change = (steer_deg - parent_steer_deg).unsigned_abs() as f64;
                let reverse = match direction {
                    Direction::Forward => 0.0,
                    Direction::Reverse => costs.reverse_penalty,
                };

                length.abs() * (1.0 + worst as f64 * costs.obstacle_weight)
                    + steer_cost
                    + change * costs.steer_change_cost
                    + reverse
            }
        }
    }
}

/// Everything a search needs besides its start, goal and heuristic.
#[derive(Clone, Copy)]
pub struct SearchSpace<'a> {
    pub kinematics: &'a Kinematics,
    pub params: &'a SearchParams,
    pub terrain: Terrain<'a>,
    pub allow_reverse: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SearchStats {
    pub expanded: usize,
    pub generated: usize,
    pub closed: usize,
    pub budget_exhausted: bool,
    pub elapsed: Duration,
}

/// Result of one search. The tree is kept so the path (and, for
/// visualization, everything explored) can be read back.
#[derive(Debug)]
pub struct SearchOutcome {
    pub tree: SearchTree,
    pub terminal: Option<NodeId>,
    pub stats: SearchStats,
}

impl SearchOutcome {
    pub fn found(&self) -> bool {
        self.terminal.is_some()
    }

    pub fn path(&self) -> Option<Path> {
        self.terminal.map(|t| extract_path(&self.tree, t))
    }
}

type OpenEntry = (Reverse<NotNan<f64>>, NotNan<f64>, Reverse<NodeId>);

fn open_entry(node: &SearchNode, id: NodeId) -> Option<OpenEntry> {
    let f = NotNan::new(node.f()).ok()?;
    let g = NotNan::new(node.g).ok()?;
    Some((Reverse(f), g, Reverse(id)))
}

/// Hybrid A* from `start` until a state within the goal radius of `goal`
/// is popped, OPEN runs dry or the CLOSED budget is spent.
pub fn hybrid_astar_search(
    space: &SearchSpace<'_>,
    start: Pose,
    goal: Pose,
    heuristic: &dyn Heuristic,
    rec: Option<&rerun::RecordingStream>,
) -> SearchOutcome {
    let t0 = Instant::now();
    let params = space.params;
    let key_of = |pose: &Pose| DiscreteKey::new(pose, params.linear_bucket, params.angular_bucket);

    let mut tree = SearchTree::new();
    let mut stats = SearchStats::default();
    let mut open_set: HashMap<DiscreteKey, NodeId> = HashMap::new();
    let mut closed_set: HashSet<DiscreteKey> = HashSet::new();
    let mut prior_queue: BinaryHeap<OpenEntry> = BinaryHeap::new();
    let mut explored: Vec<[Vec2; 2]> = Vec::new();
    let mut terminal = None;

    debug!(
        "Search from ({:.1}, {:.1}, {:.2}) to ({:.1}, {:.1}), arc {:.1}, reverse {}",
        start.x, start.z, start.theta, goal.x, goal.z, params.arc_length, space.allow_reverse
    );

    let start_node = SearchNode::start(start, heuristic.estimate(&start));
    let start_id = tree.push(start_node);
    if let Some(entry) = open_entry(tree.get(start_id), start_id) {
        open_set.insert(key_of(&start), start_id);
        prior_queue.push(entry);
    }

    while let Some((_, _, Reverse(id))) = prior_queue.pop() {
        let current = tree.get(id).clone();
        let key = key_of(&current.pose);
        if open_set.get(&key) != Some(&id) {
            continue; // superseded by a cheaper entry
        }
        open_set.remove(&key);
        closed_set.insert(key);

        if current.pose.distance(&goal) <= params.goal_radius {
            terminal = Some(id);
            break;
        }
        if closed_set.len() >= params.max_closed {
            stats.budget_exhausted = true;
            break;
        }

        stats.expanded += 1;
        let successors = expand(space, &current, id, &goal, heuristic);
        stats.generated += successors.len();

        for (succ_key, node) in successors {
            if closed_set.contains(&succ_key) {
                continue;
            }
            if let Some(&stored) = open_set.get(&succ_key) {
                if tree.get(stored).f() <= node.f() {
                    continue;
                }
            }

            if rec.is_some() {
                explored.push([
                    Vec2::new(current.pose.x as f32, current.pose.z as f32),
                    Vec2::new(node.pose.x as f32, node.pose.z as f32),
                ]);
            }
            let node_id = tree.push(node);
            if let Some(entry) = open_entry(tree.get(node_id), node_id) {
                open_set.insert(succ_key, node_id);
                prior_queue.push(entry);
            }
        }

        if let Some(rec) = rec {
            if stats.expanded % EXPLORED_LOG_INTERVAL == 0 {
                let _ = rec.log("explored", &rerun::LineStrips2D::new(explored.clone()));
            }
        }
    }

    if let Some(rec) = rec {
        let _ = rec.log("explored", &rerun::LineStrips2D::new(explored));
    }

    stats.closed = closed_set.len();
    stats.elapsed = t0.elapsed();
    match terminal {
        Some(t) => debug!(
            "Path found: cost {:.2}, {} expanded, {} closed in {:?}",
            tree.get(t).g,
            stats.expanded,
            stats.closed,
            stats.elapsed
        ),
        None if stats.budget_exhausted => debug!(
            "No path within budget of {} closed states ({:?})",
            params.max_closed, stats.elapsed
        ),
        None => debug!(
            "No path: open set exhausted after {} expansions ({:?})",
            stats.expanded, stats.elapsed
        ),
    }

    SearchOutcome {
        tree,
        terminal,
        stats,
    }
}

/// Successors of `current`, deduplicated by key keeping the lowest `f`.
fn expand(
    space: &SearchSpace<'_>,
    current: &SearchNode,
    current_id: NodeId,
    goal: &Pose,
    heuristic: &dyn Heuristic,
) -> Vec<(DiscreteKey, SearchNode)> {
    let params = space.params;
    let directions: &[Direction] = if space.allow_reverse {
        &[Direction::Forward, Direction::Reverse]
    } else {
        &[Direction::Forward]
    };

    // few successors per expansion; a vec keeps generation order stable
    let mut best: Vec<(DiscreteKey, SearchNode)> = Vec::new();
    let mut offer = |node: SearchNode| {
        if !node.h.is_finite() {
            return;
        }
        let key = DiscreteKey::new(&node.pose, params.linear_bucket, params.angular_bucket);
        match best.iter_mut().find(|(k, _)| *k == key) {
            Some((_, kept)) if kept.f() <= node.f() => {}
            Some((_, kept)) => *kept = node,
            None => best.push((key, node)),
        }
    };

    for &direction in directions {
        let d = direction.sign() * params.arc_length;
        for &steer in space.kinematics.steers() {
            for node in arc_successors(space, current, current_id, steer, direction, d, goal, heuristic) {
                offer(node);
            }
        }
    }

    trace!("Expanded node {} into {} successors", current_id.0, best.len());
    best
}

/// The end pose of one arc plus every intermediate pose that already lies
/// inside the goal disc.
#[allow(clippy::too_many_arguments)]
fn arc_successors(
    space: &SearchSpace<'_>,
    current: &SearchNode,
    current_id: NodeId,
    steer: Steer,
    direction: Direction,
    d: f64,
    goal: &Pose,
    heuristic: &dyn Heuristic,
) -> Vec<SearchNode> {
    let params = space.params;
    let kin = space.kinematics;
    let make = |pose: Pose, length: f64, worst: u8| {
        let cost = space
            .terrain
            .step_cost(length, worst, steer.deg, current.steer_deg, direction);
        SearchNode::new(
            pose,
            current.g + cost,
            heuristic.estimate(&pose),
            Some(current_id),
            steer.deg,
            direction,
            length,
        )
    };

    let mut out = Vec::new();
    let mut worst = 0u8;

    if d.abs() > params.intermediate_threshold {
        let n = params.intermediate_samples;
        for i in 1..=n {
            let partial = d * i as f64 / (n + 1) as f64;
            let pose = kin.step(&current.pose, steer, partial);
            let Some(w) = space.terrain.worst_cost(&pose, kin) else {
                return Vec::new();
            };
            worst = worst.max(w);
            if pose.distance(goal) <= params.goal_radius {
                out.push(make(pose, partial, worst));
            }
        }
    }

    let pose = kin.step(&current.pose, steer, d);
    let Some(w) = space.terrain.worst_cost(&pose, kin) else {
        return Vec::new();
    };
    worst = worst.max(w);
    out.push(make(pose, d, worst));
    out
}
