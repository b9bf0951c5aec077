//! Zhang's closed-form intrinsics from plane homographies.

use calib_ar_core::ImageSize;
use nalgebra::{DMatrix, Matrix3, SVector};

/// The 6-vector `v_ij(H)` of Zhang's method for columns `i`, `j`.
fn v_ij(h: &Matrix3<f64>, i: usize, j: usize) -> SVector<f64, 6> {
    let hi = h.column(i);
    let hj = h.column(j);
    SVector::<f64, 6>::from_row_slice(&[
        hi[0] * hj[0],
        hi[0] * hj[1] + hi[1] * hj[0],
        hi[1] * hj[1],
        hi[2] * hj[0] + hi[0] * hj[2],
        hi[2] * hj[1] + hi[1] * hj[2],
        hi[2] * hj[2],
    ])
}

/// Closed-form K (with skew) from at least three well-conditioned
/// homographies, `None` when the views do not constrain it (e.g. all
/// fronto-parallel).
pub fn intrinsics_from_homographies(hs: &[Matrix3<f64>]) -> Option<Matrix3<f64>> {
    if hs.len() < 3 {
        return None;
    }

    let mut v = DMatrix::<f64>::zeros(2 * hs.len(), 6);
    for (k, h) in hs.iter().enumerate() {
        let v11 = v_ij(h, 0, 0);
        let v22 = v_ij(h, 1, 1);
        let v12 = v_ij(h, 0, 1);
        v.row_mut(2 * k).copy_from(&v12.transpose());
        v.row_mut(2 * k + 1).copy_from(&(v11 - v22).transpose());
    }

    let svd = v.svd(false, true);
    let mut sv: Vec<f64> = svd.singular_values.iter().copied().collect();
    sv.sort_by(f64::total_cmp);
    // A null space of more than one dimension leaves B undetermined.
    if sv[1] <= 1e-9 * sv[sv.len() - 1].max(f64::MIN_POSITIVE) {
        return None;
    }
    let vt = svd.v_t?;
    let row = vt.row(svd.singular_values.imin());
    // B is only defined up to scale; pick the sign that makes it positive definite.
    let sign = if row[0] < 0.0 { -1.0 } else { 1.0 };
    let (b11, b12, b22, b13, b23, b33) = (
        sign * row[0],
        sign * row[1],
        sign * row[2],
        sign * row[3],
        sign * row[4],
        sign * row[5],
    );

    let denom = b11 * b22 - b12 * b12;
    let denom_norm = b11 * b11 + b22 * b22;
    if denom_norm <= 0.0 || denom.abs() / denom_norm < 1e-6 {
        return None;
    }

    let v0 = (b12 * b13 - b11 * b23) / denom;
    let lambda = b33 - (b13 * b13 + v0 * (b12 * b13 - b11 * b23)) / b11;
    if lambda / b11 <= 0.0 || lambda * b11 / denom <= 0.0 {
        return None;
    }

    let alpha = (lambda / b11).sqrt();
    let beta = (lambda * b11 / denom).sqrt();
    let gamma = -b12 * alpha * alpha * beta / lambda;
    let u0 = gamma * v0 / beta - b13 * alpha * alpha / lambda;

    let k = Matrix3::new(alpha, gamma, u0, 0.0, beta, v0, 0.0, 0.0, 1.0);
    k.iter().all(|x| x.is_finite()).then_some(k)
}

/// Fallback guess: focal length `max(w, h)`, principal point at the centre.
pub fn default_intrinsics(size: ImageSize) -> Matrix3<f64> {
    let f = size.width.max(size.height).max(1) as f64;
    Matrix3::new(
        f,
        0.0,
        size.width as f64 / 2.0,
        0.0,
        f,
        size.height as f64 / 2.0,
        0.0,
        0.0,
        1.0,
    )
}

/// Zero-skew initial intrinsics for pixel homographies of `size` images.
///
/// Homographies are conditioned by mapping pixels into roughly `[-0.5, 0.5]`
/// before solving; implausible solutions fall back to [`default_intrinsics`].
pub fn initial_intrinsics(hs: &[Matrix3<f64>], size: ImageSize) -> Matrix3<f64> {
    let (w, h) = (size.width as f64, size.height as f64);
    let s = w.max(h).max(1.0);
    let n = Matrix3::new(1.0 / s, 0.0, -w / (2.0 * s), 0.0, 1.0 / s, -h / (2.0 * s), 0.0, 0.0, 1.0);
    let Some(n_inv) = n.try_inverse() else {
        return default_intrinsics(size);
    };

    let conditioned: Vec<Matrix3<f64>> = hs
        .iter()
        .map(|hm| {
            let c = n * hm;
            c / c.norm()
        })
        .collect();

    let Some(kn) = intrinsics_from_homographies(&conditioned) else {
        return default_intrinsics(size);
    };
    let mut k = n_inv * kn;
    k /= k[(2, 2)];
    k[(0, 1)] = 0.0;

    let (fx, fy, cx, cy) = (k[(0, 0)], k[(1, 1)], k[(0, 2)], k[(1, 2)]);
    let plausible = fx.is_finite()
        && fy.is_finite()
        && fx > 0.0
        && fy > 0.0
        && (0.2..=5.0).contains(&(fx / fy))
        && (-0.5 * w..=1.5 * w).contains(&cx)
        && (-0.5 * h..=1.5 * h).contains(&cy);
    if plausible {
        k
    } else {
        default_intrinsics(size)
    }
}
