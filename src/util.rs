use std::f64::consts::TAU;

const SIN_COS_STEP: f64 = 0.001; // [rad]

/// Precomputed sine and cosine values over one full turn.
///
/// Lookups truncate to the table step, so results differ from `f64::sin`
/// by at most `SIN_COS_STEP`. All readers share one immutable instance.
#[derive(Debug, Clone)]
pub struct SinCosTable {
    sin: Vec<f64>,
    cos: Vec<f64>,
}

impl SinCosTable {
    pub fn new() -> Self {
        let n = (TAU / SIN_COS_STEP).ceil() as usize;
        let (sin, cos) = (0..n)
            .map(|i| {
                let a = i as f64 * SIN_COS_STEP;
                (a.sin(), a.cos())
            })
            .unzip();
        SinCosTable { sin, cos }
    }

    #[inline]
    fn index(&self, angle: f64) -> usize {
        let i = (angle.rem_euclid(TAU) / SIN_COS_STEP) as usize;
        i.min(self.sin.len() - 1)
    }

    #[inline]
    pub fn sin(&self, angle: f64) -> f64 {
        self.sin[self.index(angle)]
    }

    #[inline]
    pub fn cos(&self, angle: f64) -> f64 {
        self.cos[self.index(angle)]
    }

    #[inline]
    pub fn sin_cos(&self, angle: f64) -> (f64, f64) {
        let i = self.index(angle);
        (self.sin[i], self.cos[i])
    }
}

impl Default for SinCosTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap an angle into [0, 2pi).
pub fn normalize_angle(theta: f64) -> f64 {
    let t = theta.rem_euclid(TAU);
    // rem_euclid can round up to TAU for tiny negative inputs
    if t >= TAU { 0.0 } else { t }
}

pub fn rot2d(p: &[f64; 2], th: f64, table: &SinCosTable) -> (f64, f64) {
    let (s, c) = table.sin_cos(th);
    let x = p[0] * c - p[1] * s;
    let y = p[0] * s + p[1] * c;
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_lookup_close_to_libm() {
        let table = SinCosTable::new();
        for i in 0..628 {
            let a = i as f64 * 0.01;
            assert_abs_diff_eq!(table.sin(a), a.sin(), epsilon = 2e-3);
            assert_abs_diff_eq!(table.cos(a), a.cos(), epsilon = 2e-3);
        }
    }

    #[test]
    fn test_negative_and_wrapped_angles() {
        let table = SinCosTable::new();
        assert_abs_diff_eq!(table.sin(-FRAC_PI_2), -1.0, epsilon = 2e-3);
        assert_abs_diff_eq!(table.cos(3.0 * TAU + PI), -1.0, epsilon = 2e-3);
    }

    #[test]
    fn test_normalize_angle() {
        assert_abs_diff_eq!(normalize_angle(-FRAC_PI_2), 1.5 * PI, epsilon = 1e-12);
        assert_abs_diff_eq!(normalize_angle(TAU + 0.25), 0.25, epsilon = 1e-12);
        assert!(normalize_angle(-1e-18) < TAU);
    }

    #[test]
    fn test_rot2d_quarter_turn() {
        let table = SinCosTable::new();
        let (x, y) = rot2d(&[1.0, 0.0], FRAC_PI_2, &table);
        assert_abs_diff_eq!(x, 0.0, epsilon = 2e-3);
        assert_abs_diff_eq!(y, 1.0, epsilon = 2e-3);
    }
}
