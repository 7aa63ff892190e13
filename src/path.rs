use crate::data_struct::{Direction, NodeId, Pose, SearchTree};
use crate::motion::Kinematics;

/// One pose of a planned path and the control that reached it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathStep {
    pub pose: Pose,
    pub steer_deg: i32,
    pub direction: Direction,
    pub arc_length: f64, // signed, zero for the start
}

/// Start-to-goal sequence of steps. The first step is the start pose.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    steps: Vec<PathStep>,
}

/// Walk parent links from `terminal` back to the root of `tree`.
pub fn extract_path(tree: &SearchTree, terminal: NodeId) -> Path {
    let mut steps = Vec::new();
    let mut cursor = Some(terminal);

    while let Some(id) = cursor {
        let node = tree.get(id);
        steps.push(PathStep {
            pose: node.pose,
            steer_deg: node.steer_deg,
            direction: node.direction,
            arc_length: node.arc_length,
        });
        cursor = node.parent;
    }

    steps.reverse();
    Path { steps }
}

impl Path {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathStep> {
        self.steps.iter()
    }

    pub fn start(&self) -> Option<&PathStep> {
        self.steps.first()
    }

    pub fn end(&self) -> Option<&PathStep> {
        self.steps.last()
    }

    /// Steering command for the next control tick, `None` when the start
    /// already satisfies the goal.
    pub fn first_move(&self) -> Option<(i32, Direction)> {
        self.steps.get(1).map(|s| (s.steer_deg, s.direction))
    }

    /// Total travelled length, forward and reverse alike.
    pub fn length(&self) -> f64 {
        self.steps.iter().map(|s| s.arc_length.abs()).sum()
    }

    /// Re-simulate every step at roughly `spacing` grid units.
    ///
    /// Steering angles missing from `kinematics` fall back to the stored
    /// end pose of the step.
    pub fn densify(&self, kinematics: &Kinematics, spacing: f64) -> Vec<Pose> {
        let Some(first) = self.steps.first() else {
            return Vec::new();
        };
        let spacing = spacing.max(1e-3);
        let mut poses = vec![first.pose];

        for pair in self.steps.windows(2) {
            let (from, to) = (&pair[0], &pair[1]);
            let Some(steer) = kinematics.steer_by_deg(to.steer_deg) else {
                poses.push(to.pose);
                continue;
            };
            let n = (to.arc_length.abs() / spacing).ceil().max(1.0) as usize;
            for k in 1..n {
                let dist = to.arc_length * k as f64 / n as f64;
                poses.push(kinematics.step(&from.pose, steer, dist));
            }
            poses.push(to.pose);
        }
        poses
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a PathStep;
    type IntoIter = std::slice::Iter<'a, PathStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use crate::data_struct::SearchNode;

    fn two_step_tree(k: &Kinematics) -> (SearchTree, NodeId) {
        let mut tree = SearchTree::new();
        let start = Pose::new(10.0, 10.0, 0.0);
        let root = tree.push(SearchNode::start(start, 0.0));
        let steer = k.steer_by_deg(15).unwrap();
        let p1 = k.step(&start, steer, 4.0);
        let a = tree.push(SearchNode::new(p1, 4.0, 0.0, Some(root), 15, Direction::Forward, 4.0));
        let back = k.steer_by_deg(0).unwrap();
        let p2 = k.step(&p1, back, -2.0);
        let b = tree.push(SearchNode::new(p2, 6.0, 0.0, Some(a), 0, Direction::Reverse, -2.0));
        (tree, b)
    }

    #[test]
    fn test_extract_walks_back_to_start() {
        let k = Kinematics::new(&PlannerConfig::default());
        let (tree, end) = two_step_tree(&k);
        let path = extract_path(&tree, end);

        assert_eq!(path.len(), 3);
        assert_eq!(path.start().unwrap().pose, Pose::new(10.0, 10.0, 0.0));
        assert_eq!(path.first_move(), Some((15, Direction::Forward)));
        assert_eq!(path.end().unwrap().direction, Direction::Reverse);
        assert!((path.length() - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_pose_path_has_no_move() {
        let mut tree = SearchTree::new();
        let root = tree.push(SearchNode::start(Pose::new(1.0, 1.0, 0.0), 0.0));
        let path = extract_path(&tree, root);
        assert_eq!(path.first_move(), None);
        assert_eq!(path.length(), 0.0);
    }

    #[test]
    fn test_densify_passes_through_every_step() {
        let k = Kinematics::new(&PlannerConfig::default());
        let (tree, end) = two_step_tree(&k);
        let path = extract_path(&tree, end);
        let dense = path.densify(&k, 0.5);

        // 8 samples on the 4-unit arc, 4 on the 2-unit one, plus the start
        assert_eq!(dense.len(), 13);
        assert_eq!(dense[8], path.steps()[1].pose);
        assert_eq!(*dense.last().unwrap(), path.end().unwrap().pose);
        for pair in dense.windows(2) {
            assert!(pair[0].distance(&pair[1]) < 0.6);
        }
    }
}
