use crate::util::normalize_angle;

/// Continuous vehicle pose in grid units, heading in [0, 2pi).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub x: f64,
    pub z: f64,
    pub theta: f64,
}

impl Pose {
    pub fn new(x: f64, z: f64, theta: f64) -> Self {
        Pose {
            x,
            z,
            theta: normalize_angle(theta),
        }
    }

    pub fn distance(&self, other: &Pose) -> f64 {
        (self.x - other.x).hypot(self.z - other.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Direction::Forward => 1.0,
            Direction::Reverse => -1.0,
        }
    }
}

/// Index of a node inside a [`SearchTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Quantized pose used only as OPEN/CLOSED key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiscreteKey {
    pub x: i64,
    pub z: i64,
    pub theta: i64,
}

impl DiscreteKey {
    pub fn new(pose: &Pose, linear_bucket: f64, angular_bucket: f64) -> Self {
        DiscreteKey {
            x: (pose.x / linear_bucket).floor() as i64,
            z: (pose.z / linear_bucket).floor() as i64,
            theta: (pose.theta / angular_bucket).floor() as i64,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchNode {
    pub pose: Pose,
    pub g: f64,          // accumulated cost from the start
    pub h: f64,          // estimated remaining cost, fixed at creation
    pub parent: Option<NodeId>,
    pub steer_deg: i32,  // steering angle used to reach this node
    pub direction: Direction,
    pub arc_length: f64, // signed length travelled from the parent
}

impl SearchNode {
    pub fn new(
        pose: Pose,
        g: f64,
        h: f64,
        parent: Option<NodeId>,
        steer_deg: i32,
        direction: Direction,
        arc_length: f64,
    ) -> Self {
        SearchNode {
            pose,
            g,
            h,
            parent,
            steer_deg,
            direction,
            arc_length,
        }
    }

    pub fn start(pose: Pose, h: f64) -> Self {
        Self::new(pose, 0.0, h, None, 0, Direction::Forward, 0.0)
    }

    #[inline]
    pub fn f(&self) -> f64 {
        self.g + self.h
    }
}

/// Arena holding every node created by one search.
#[derive(Debug, Clone, Default)]
pub struct SearchTree {
    nodes: Vec<SearchNode>,
}

impl SearchTree {
    pub fn new() -> Self {
        SearchTree { nodes: Vec::new() }
    }

    pub fn push(&mut self, node: SearchNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn get(&self, id: NodeId) -> &SearchNode {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SearchNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_pose_heading_is_normalized() {
        let p = Pose::new(1.0, 2.0, -PI / 2.0);
        assert!((p.theta - 1.5 * PI).abs() < 1e-12);
    }

    #[test]
    fn test_nearby_poses_share_a_key() {
        let a = Pose::new(3.3, 4.05, 0.31);
        let b = Pose::new(3.7, 4.7, 0.39);
        let c = Pose::new(4.1, 4.7, 0.39);
        assert_eq!(DiscreteKey::new(&a, 0.8, 0.1), DiscreteKey::new(&b, 0.8, 0.1));
        assert_ne!(DiscreteKey::new(&a, 0.8, 0.1), DiscreteKey::new(&c, 0.8, 0.1));
    }

    #[test]
    fn test_tree_ids_are_dense() {
        let mut tree = SearchTree::new();
        let root = tree.push(SearchNode::start(Pose::new(0.0, 0.0, 0.0), 5.0));
        let child = tree.push(SearchNode::new(
            Pose::new(2.0, 0.0, 0.0),
            2.0,
            3.0,
            Some(root),
            0,
            Direction::Forward,
            2.0,
        ));
        assert_eq!(root, NodeId(0));
        assert_eq!(tree.get(child).parent, Some(root));
        assert_eq!(tree.get(child).f(), 5.0);
    }
}
