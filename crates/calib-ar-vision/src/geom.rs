use std::f32::consts::{FRAC_PI_2, PI};

/// Absolute difference between two angles (radians), normalized into `[0, π]`.
pub fn angle_diff_abs(a: f32, b: f32) -> f32 {
    let two_pi = 2.0 * PI;
    let mut diff = (b - a).rem_euclid(two_pi);
    if diff >= PI {
        diff -= two_pi;
    }
    diff.abs()
}

/// Angle between an undirected axis (defined modulo π) and a directed vector
/// angle. Returns a value in `[0, π/2]`.
pub fn axis_vec_diff(axis_angle: f32, vec_angle: f32) -> f32 {
    let d = angle_diff_abs(axis_angle, vec_angle);
    d.min(PI - d)
}

/// Whether two undirected axes are orthogonal within `tolerance`.
pub fn is_orthogonal(reference_angle: f32, other_angle: f32, tolerance: f32) -> bool {
    let d = axis_vec_diff(reference_angle, other_angle);
    (FRAC_PI_2 - d).abs() <= tolerance.abs()
}

/// Dominant direction of a set of axes defined modulo π/2 (corner
/// orientations alternate by 90° across a chessboard), weighted.
///
/// Accumulates in quadruple-angle space, returns an angle in `[0, π/2)`.
pub fn dominant_quarter_axis(samples: impl IntoIterator<Item = (f32, f32)>) -> Option<f32> {
    let mut sx = 0.0f32;
    let mut sy = 0.0f32;
    let mut weight_sum = 0.0f32;
    for (theta, w) in samples {
        if w <= 0.0 {
            continue;
        }
        sx += w * (4.0 * theta).cos();
        sy += w * (4.0 * theta).sin();
        weight_sum += w;
    }
    if weight_sum <= 0.0 {
        return None;
    }
    let (mx, my) = (sx / weight_sum, sy / weight_sum);
    if mx * mx + my * my < 1e-4 {
        return None;
    }
    Some((0.25 * my.atan2(mx)).rem_euclid(FRAC_PI_2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_4;

    #[test]
    fn aligned_and_orthogonal_cases() {
        let tol = 1e-3;
        assert!(is_orthogonal(0.0, FRAC_PI_2, tol));
        assert!(is_orthogonal(FRAC_PI_4, -FRAC_PI_4, tol));
        assert!(is_orthogonal(0.1, PI + FRAC_PI_2 + 0.1, tol));
        assert!(!is_orthogonal(0.0, 0.25, 0.05));
    }

    #[test]
    fn axis_difference_ignores_direction() {
        assert!((axis_vec_diff(0.0, PI) - 0.0).abs() < 1e-6);
        assert!((axis_vec_diff(FRAC_PI_4, 0.0) - FRAC_PI_4).abs() < 1e-6);
        assert!((axis_vec_diff(0.0, -FRAC_PI_2) - FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn quarter_axis_merges_alternating_orientations() {
        let samples = [(0.3, 1.0), (0.3 + FRAC_PI_2, 1.0), (0.3 + PI, 2.0)];
        let a = dominant_quarter_axis(samples).unwrap();
        assert!((a - 0.3).abs() < 1e-4);
        assert!(dominant_quarter_axis(std::iter::empty()).is_none());
    }
}
