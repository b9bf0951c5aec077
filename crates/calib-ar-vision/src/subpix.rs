//! Gradient-orthogonality sub-pixel refinement.
//!
//! For a true corner `q`, every image gradient `g(p)` in its neighborhood is
//! orthogonal to `p - q`. Solving `Σ g gᵀ (p - q) = 0` for `q` and iterating
//! converges to the saddle point.

use crate::params::RefineParams;
use calib_ar_core::{sample_bilinear, GrayImageView};
use nalgebra::{Matrix2, Point2, Vector2};

/// Shrink the window so neighboring corners never fall inside it.
fn effective_half_window(corners: &[Point2<f64>], requested: u32) -> i32 {
    let mut min_dist = f64::INFINITY;
    for (i, a) in corners.iter().enumerate() {
        for b in &corners[i + 1..] {
            min_dist = min_dist.min((a - b).norm());
        }
    }
    let limit = if min_dist.is_finite() {
        ((min_dist * 0.4).floor() as i32).max(2)
    } else {
        i32::MAX
    };
    (requested.max(1) as i32).min(limit)
}

fn refine_one(img: &GrayImageView<'_>, start: Point2<f64>, half: i32, params: &RefineParams) -> Point2<f64> {
    let sigma2 = (half * half) as f64;
    let mut q = start;

    for _ in 0..params.max_iterations {
        let mut a = Matrix2::<f64>::zeros();
        let mut b = Vector2::<f64>::zeros();
        for dy in -half..=half {
            for dx in -half..=half {
                let p = Vector2::new(q.x + dx as f64, q.y + dy as f64);
                let gx = 0.5 * (sample_bilinear(img, p.x + 1.0, p.y) - sample_bilinear(img, p.x - 1.0, p.y));
                let gy = 0.5 * (sample_bilinear(img, p.x, p.y + 1.0) - sample_bilinear(img, p.x, p.y - 1.0));
                let w = (-((dx * dx + dy * dy) as f64) / sigma2).exp();
                let g = Vector2::new(gx, gy);
                let gg = g * g.transpose() * w;
                a += gg;
                b += gg * p;
            }
        }

        let scale = a[(0, 0)] * a[(1, 1)];
        if a.determinant().abs() <= 1e-12 * scale.max(f64::MIN_POSITIVE) {
            break;
        }
        let Some(a_inv) = a.try_inverse() else {
            break;
        };
        let next = a_inv * b;
        let moved = (next - q.coords).norm();
        q = Point2::from(next);
        if !moved.is_finite() || moved < params.epsilon {
            break;
        }
    }

    if !q.x.is_finite() || !q.y.is_finite() || (q - start).norm() > half as f64 {
        start
    } else {
        q
    }
}

/// Refine each corner in place order; corners that drift out of their
/// window keep their input position.
pub fn refine_corners(
    img: &GrayImageView<'_>,
    corners: &[Point2<f64>],
    params: &RefineParams,
) -> Vec<Point2<f64>> {
    if img.is_empty() {
        return corners.to_vec();
    }
    let half = effective_half_window(corners, params.half_window);
    corners
        .iter()
        .map(|&c| refine_one(img, c, half, params))
        .collect()
}

/// Like [`refine_corners`] but always uses `params.half_window`, even when
/// corners are closer together than the window.
pub fn refine_corners_fixed_window(
    img: &GrayImageView<'_>,
    corners: &[Point2<f64>],
    params: &RefineParams,
) -> Vec<Point2<f64>> {
    if img.is_empty() {
        return corners.to_vec();
    }
    let half = params.half_window.max(1) as i32;
    corners
        .iter()
        .map(|&c| refine_one(img, c, half, params))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use calib_ar_core::GrayImage;

    fn x_junction(cx: f64, cy: f64) -> GrayImage {
        // 4x4 supersampled so the junction can sit between pixel centres.
        GrayImage::from_fn(40, 40, |x, y| {
            let mut acc: f64 = 0.0;
            for sy in 0..4 {
                for sx in 0..4 {
                    let u = x as f64 - 0.5 + (sx as f64 + 0.5) / 4.0;
                    let v = y as f64 - 0.5 + (sy as f64 + 0.5) / 4.0;
                    acc += if (u < cx) == (v < cy) { 220.0 } else { 30.0 };
                }
            }
            (acc / 16.0).round() as u8
        })
    }

    #[test]
    fn converges_to_subpixel_junction() {
        let img = x_junction(19.25, 20.75);
        let out = refine_corners(&img.view(), &[Point2::new(18.0, 22.0)], &RefineParams::default());
        assert!((out[0].x - 19.25).abs() < 0.15, "{:?}", out[0]);
        assert!((out[0].y - 20.75).abs() < 0.15, "{:?}", out[0]);
    }

    #[test]
    fn flat_patch_keeps_input_position() {
        let img = GrayImage::from_fn(30, 30, |_, _| 90);
        let start = Point2::new(12.25, 14.5);
        let out = refine_corners(&img.view(), &[start], &RefineParams::default());
        assert_eq!(start, out[0]);
    }

    #[test]
    fn window_shrinks_for_dense_corners() {
        let corners = [Point2::new(0.0, 0.0), Point2::new(8.0, 0.0)];
        assert_eq!(3, effective_half_window(&corners, 5));
        assert_eq!(5, effective_half_window(&corners[..1], 5));
        let tight = [Point2::new(0.0, 0.0), Point2::new(2.0, 0.0)];
        assert_eq!(2, effective_half_window(&tight, 5));
    }
}
