//! Rerun logging helpers for maps, endpoints and planned paths.

use crate::config::VehicleGeometry;
use crate::cost_map::{CostMap, FREE_COST, LETHAL_COST};
use crate::data_struct::{Direction, Pose};
use crate::path::Path;
use rerun::external::glam::Vec2;

fn cost_color(cost: u8) -> rerun::Color {
    if cost == LETHAL_COST {
        rerun::Color::from_rgb(0, 0, 0)
    } else {
        let shade = 230 - (cost as u16 * 180 / 254) as u8;
        rerun::Color::from_rgb(255, shade, shade)
    }
}

/// Log every non-free cell as a unit box shaded by cost.
pub fn log_cost_map(rec: &rerun::RecordingStream, map: &CostMap) {
    let mut centers = Vec::new();
    let mut colors = Vec::new();
    for z in 0..map.height() {
        for x in 0..map.width() {
            let cost = map.cell(x, z).unwrap_or(LETHAL_COST);
            if cost == FREE_COST {
                continue;
            }
            centers.push(Vec2::new(x as f32 + 0.5, z as f32 + 0.5));
            colors.push(cost_color(cost));
        }
    }
    let sizes = vec![[1.0_f32, 1.0_f32]; centers.len()];
    let _ = rec.log(
        "map/cells",
        &rerun::Boxes2D::from_centers_and_sizes(centers, sizes).with_colors(colors),
    );
}

pub fn log_endpoints(rec: &rerun::RecordingStream, start: &Pose, goal: &Pose, goal_radius: f64) {
    let _ = rec.log(
        "start",
        &rerun::Points2D::new([Vec2::new(start.x as f32, start.z as f32)]),
    );
    let _ = rec.log(
        "goal",
        &rerun::Points2D::new([Vec2::new(goal.x as f32, goal.z as f32)])
            .with_radii([goal_radius as f32]),
    );
}

/// Log a dense pose polyline of the path.
pub fn log_path(rec: &rerun::RecordingStream, poses: &[Pose]) {
    let line: Vec<Vec2> = poses
        .iter()
        .map(|p| Vec2::new(p.x as f32, p.z as f32))
        .collect();
    let _ = rec.log("path", &rerun::LineStrips2D::new([line]));
}

/// Outline of the vehicle rectangle at `pose`, in grid units.
fn vehicle_outline(pose: &Pose, vehicle: &VehicleGeometry, resolution: f64) -> Vec<Vec2> {
    let hl = vehicle.length / resolution / 2.0;
    let hw = vehicle.width / resolution / 2.0;
    let (s, c) = pose.theta.sin_cos();
    [(hl, hw), (hl, -hw), (-hl, -hw), (-hl, hw), (hl, hw)]
        .iter()
        .map(|&(dx, dz)| {
            Vec2::new(
                (pose.x + dx * c - dz * s) as f32,
                (pose.z + dx * s + dz * c) as f32,
            )
        })
        .collect()
}

/// Log the vehicle outline at every path step, reverse steps in red.
pub fn log_vehicle(
    rec: &rerun::RecordingStream,
    path: &Path,
    vehicle: &VehicleGeometry,
    resolution: f64,
) {
    let outlines: Vec<Vec<Vec2>> = path
        .iter()
        .map(|s| vehicle_outline(&s.pose, vehicle, resolution))
        .collect();
    let colors: Vec<rerun::Color> = path
        .iter()
        .map(|s| match s.direction {
            Direction::Forward => rerun::Color::from_rgb(40, 120, 255),
            Direction::Reverse => rerun::Color::from_rgb(230, 40, 40),
        })
        .collect();
    let _ = rec.log(
        "vehicle",
        &rerun::LineStrips2D::new(outlines).with_colors(colors),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_outline_is_closed_rectangle() {
        let vehicle = VehicleGeometry::default();
        let outline = vehicle_outline(&Pose::new(5.0, 5.0, 0.0), &vehicle, 1.0);
        assert_eq!(outline.len(), 5);
        assert_eq!(outline[0], outline[4]);
        assert_abs_diff_eq!(outline[0].x - outline[3].x, vehicle.length as f32, epsilon = 1e-5);
        assert_abs_diff_eq!(outline[0].y - outline[1].y, vehicle.width as f32, epsilon = 1e-5);
    }
}
