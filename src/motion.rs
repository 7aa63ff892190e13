//! Bicycle-model motion primitives and footprint sampling.

use crate::config::{PlannerConfig, VehicleGeometry};
use crate::cost_map::{CostView, LETHAL_COST};
use crate::data_struct::Pose;
use crate::util::{SinCosTable, normalize_angle, rot2d};

const STRAIGHT_EPS: f64 = 1e-4; // [rad] turning angles below this move straight

/// One steering command of the primitive set.
#[derive(Debug, Clone, Copy)]
pub struct Steer {
    pub deg: i32,
    tan: f64,
}

/// Kinematic model shared by the planner and the table builder.
///
/// Poses refer to the vehicle centre; motion pivots about the rear axle
/// which sits `rear_axle_offset` behind it.
#[derive(Debug, Clone)]
pub struct Kinematics {
    steers: Vec<Steer>,
    wheelbase: f64,        // [grid]
    rear_axle_offset: f64, // [grid]
    table: SinCosTable,
}

impl Kinematics {
    pub fn new(config: &PlannerConfig) -> Self {
        let reso = config.map.resolution;
        let steers = config
            .search
            .steering_angles_deg
            .iter()
            .map(|&deg| Steer {
                deg,
                tan: (deg as f64).to_radians().tan(),
            })
            .collect();

        Kinematics {
            steers,
            wheelbase: config.vehicle.wheelbase() / reso,
            rear_axle_offset: config.vehicle.rear_axle_offset / reso,
            table: SinCosTable::new(),
        }
    }

    pub fn steers(&self) -> &[Steer] {
        &self.steers
    }

    pub fn table(&self) -> &SinCosTable {
        &self.table
    }

    pub fn steer_by_deg(&self, deg: i32) -> Option<Steer> {
        self.steers.iter().copied().find(|s| s.deg == deg)
    }

    /// Heading change of an arc of signed length `dist` at `steer`.
    #[inline]
    pub fn turning_angle(&self, steer: Steer, dist: f64) -> f64 {
        dist / self.wheelbase * steer.tan
    }

    /// Drive `pose` along a constant-steering arc of signed length `dist`.
    pub fn step(&self, pose: &Pose, steer: Steer, dist: f64) -> Pose {
        let t = &self.table;
        let (s, c) = t.sin_cos(pose.theta);
        let rx = pose.x - self.rear_axle_offset * c;
        let rz = pose.z - self.rear_axle_offset * s;

        let beta = self.turning_angle(steer, dist);
        let theta = normalize_angle(pose.theta + beta);
        let (s1, c1) = t.sin_cos(theta);

        let (nx, nz) = if beta.abs() < STRAIGHT_EPS {
            (rx + dist * c, rz + dist * s)
        } else {
            let r = dist / beta;
            let cx = rx - s * r;
            let cz = rz + c * r;
            (cx + s1 * r, cz - c1 * r)
        };

        Pose {
            x: nx + self.rear_axle_offset * c1,
            z: nz + self.rear_axle_offset * s1,
            theta,
        }
    }
}

// fractions of the half extents sampled on each rectangle
const SAMPLE_FRACTIONS: [(f64, f64); 16] = [
    (-1.0, -1.0),
    (1.0, -1.0),
    (-1.0, 1.0),
    (1.0, 1.0),
    (0.0, 1.0),
    (0.0, -1.0),
    (1.0, 0.0),
    (-1.0, 0.0),
    (-1.0, -2.0 / 3.0),
    (1.0, -2.0 / 3.0),
    (-1.0, 2.0 / 3.0),
    (1.0, 2.0 / 3.0),
    (-2.0 / 3.0, -1.0),
    (2.0 / 3.0, -1.0),
    (-2.0 / 3.0, 1.0),
    (2.0 / 3.0, 1.0),
];

/// Sample points of the nominal and the inflated vehicle rectangle,
/// in the body frame and grid units.
#[derive(Debug, Clone)]
pub struct Footprint {
    offsets: Vec<[f64; 2]>,
}

impl Footprint {
    pub fn new(vehicle: &VehicleGeometry, resolution: f64) -> Self {
        let rects = [
            (vehicle.length, vehicle.width),
            (
                vehicle.length + vehicle.length_margin,
                vehicle.width + vehicle.width_margin,
            ),
        ];

        let offsets = rects
            .iter()
            .flat_map(|&(l, w)| {
                let hl = l / resolution / 2.0;
                let hw = w / resolution / 2.0;
                SAMPLE_FRACTIONS
                    .iter()
                    .map(move |&(fl, fw)| [fl * hl, fw * hw])
            })
            .collect();

        Footprint { offsets }
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// World positions of every sample at `pose`.
    pub fn points<'a>(
        &'a self,
        pose: &'a Pose,
        table: &'a SinCosTable,
    ) -> impl Iterator<Item = (f64, f64)> + 'a {
        self.offsets.iter().map(move |o| {
            let (dx, dz) = rot2d(o, pose.theta, table);
            (pose.x + dx, pose.z + dz)
        })
    }

    /// Highest effective cell cost under the footprint at `pose`.
    pub fn worst_cost(&self, view: &CostView<'_>, pose: &Pose, table: &SinCosTable) -> u8 {
        let mut worst = view.cost_at(pose.x, pose.z);
        if worst == LETHAL_COST {
            return worst;
        }
        for (x, z) in self.points(pose, table) {
            worst = worst.max(view.cost_at(x, z));
            if worst == LETHAL_COST {
                break;
            }
        }
        worst
    }
}
