//! Harris corner experiment: response map, thresholded strict local maxima
//! and gradient-orthogonality refinement.

use crate::params::RefineParams;
use crate::subpix::refine_corners_fixed_window;
use calib_ar_core::GrayImageView;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum HarrisError {
    #[error("Sobel aperture must be 3, 5 or 7 (got {0})")]
    InvalidAperture(u32),
    #[error("block size must be at least 1")]
    InvalidBlockSize,
}

/// Harris detector parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarrisParams {
    /// Threshold on the response normalised to `0..=255`.
    pub threshold: f32,
    /// Side of the square window summing the structure tensor.
    pub block_size: u32,
    /// Sobel aperture: 3, 5 or 7.
    pub aperture: u32,
    pub k: f64,
}

impl Default for HarrisParams {
    fn default() -> Self {
        Self {
            threshold: 150.0,
            block_size: 5,
            aperture: 7,
            k: 0.04,
        }
    }
}

impl HarrisParams {
    pub fn validate(&self) -> Result<(), HarrisError> {
        if !matches!(self.aperture, 3 | 5 | 7) {
            return Err(HarrisError::InvalidAperture(self.aperture));
        }
        if self.block_size == 0 {
            return Err(HarrisError::InvalidBlockSize);
        }
        Ok(())
    }
}

fn binomial(order: usize) -> Vec<f64> {
    let mut k = vec![1.0];
    for _ in 0..order {
        let mut next = vec![0.0; k.len() + 1];
        for (i, v) in k.iter().enumerate() {
            next[i] += v;
            next[i + 1] += v;
        }
        k = next;
    }
    k
}

/// Separable Sobel kernels `(smoothing, derivative)` of size `aperture`.
fn sobel_kernels(aperture: usize) -> (Vec<f64>, Vec<f64>) {
    let smooth = binomial(aperture - 1);
    let base = binomial(aperture - 3);
    let mut deriv = vec![0.0; aperture];
    for (i, v) in base.iter().enumerate() {
        deriv[i] -= v;
        deriv[i + 2] += v;
    }
    (smooth, deriv)
}

/// Correlate rows with `kx`, then columns with `ky`, replicating the border.
fn separable(src: &[f64], w: usize, h: usize, kx: &[f64], ky: &[f64]) -> Vec<f64> {
    let r = (kx.len() / 2) as i64;
    let clamp = |v: i64, n: usize| v.clamp(0, n as i64 - 1) as usize;

    let mut tmp = vec![0.0; w * h];
    for y in 0..h {
        let row = &src[y * w..(y + 1) * w];
        for x in 0..w {
            tmp[y * w + x] = kx
                .iter()
                .enumerate()
                .map(|(i, k)| k * row[clamp(x as i64 + i as i64 - r, w)])
                .sum();
        }
    }
    let mut out = vec![0.0; w * h];
    for y in 0..h {
        for x in 0..w {
            out[y * w + x] = ky
                .iter()
                .enumerate()
                .map(|(i, k)| k * tmp[clamp(y as i64 + i as i64 - r, h) * w + x])
                .sum();
        }
    }
    out
}

/// Unnormalised box sum over a `block x block` window.
fn box_sum(src: &[f64], w: usize, h: usize, block: usize) -> Vec<f64> {
    let lo = block / 2;
    let clamp = |v: i64, n: usize| v.clamp(0, n as i64 - 1) as usize;

    let mut tmp = vec![0.0; w * h];
    for y in 0..h {
        for x in 0..w {
            tmp[y * w + x] = (0..block)
                .map(|i| src[y * w + clamp(x as i64 + i as i64 - lo as i64, w)])
                .sum();
        }
    }
    let mut out = vec![0.0; w * h];
    for y in 0..h {
        for x in 0..w {
            out[y * w + x] = (0..block)
                .map(|i| tmp[clamp(y as i64 + i as i64 - lo as i64, h) * w + x])
                .sum();
        }
    }
    out
}

/// Harris response `det(M) - k tr(M)²`, min-max normalised to `0..=255`.
pub fn harris_response(img: &GrayImageView<'_>, params: &HarrisParams) -> Result<Vec<f32>, HarrisError> {
    params.validate()?;
    let (w, h) = (img.width, img.height);
    if img.is_empty() {
        return Ok(Vec::new());
    }

    let ap = params.aperture as usize;
    let block = params.block_size as usize;
    let scale = 1.0 / ((1u32 << (ap - 1)) as f64 * block as f64 * 255.0);
    let src: Vec<f64> = img.data.iter().map(|&v| v as f64).collect();
    let (smooth, deriv) = sobel_kernels(ap);
    let gx = separable(&src, w, h, &deriv, &smooth);
    let gy = separable(&src, w, h, &smooth, &deriv);

    let mut xx = vec![0.0; w * h];
    let mut xy = vec![0.0; w * h];
    let mut yy = vec![0.0; w * h];
    for i in 0..w * h {
        let (dx, dy) = (gx[i] * scale, gy[i] * scale);
        xx[i] = dx * dx;
        xy[i] = dx * dy;
        yy[i] = dy * dy;
    }
    let a = box_sum(&xx, w, h, block);
    let b = box_sum(&xy, w, h, block);
    let c = box_sum(&yy, w, h, block);

    let response: Vec<f64> = (0..w * h)
        .map(|i| a[i] * c[i] - b[i] * b[i] - params.k * (a[i] + c[i]).powi(2))
        .collect();
    let min = response.iter().copied().fold(f64::INFINITY, f64::min);
    let max = response.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    Ok(response
        .iter()
        .map(|&v| {
            if range > 0.0 {
                ((v - min) / range * 255.0) as f32
            } else {
                0.0
            }
        })
        .collect())
}

/// Detect Harris corners: strict 3x3 maxima above the threshold, away from a
/// border of `block_size` pixels, refined to sub-pixel accuracy.
#[cfg_attr(feature = "tracing", instrument(level = "debug", skip(img), fields(w = img.width, h = img.height)))]
pub fn detect_harris(img: &GrayImageView<'_>, params: &HarrisParams) -> Result<Vec<Point2<f64>>, HarrisError> {
    let response = harris_response(img, params)?;
    let (w, h) = (img.width, img.height);
    let border = params.block_size as usize;
    if w <= 2 * border || h <= 2 * border {
        return Ok(Vec::new());
    }

    let mut corners = Vec::new();
    for y in border..h - border {
        for x in border..w - border {
            let v = response[y * w + x];
            if v <= params.threshold {
                continue;
            }
            let strict_max = (-1i64..=1)
                .flat_map(|dy| (-1i64..=1).map(move |dx| (dx, dy)))
                .filter(|&(dx, dy)| dx != 0 || dy != 0)
                .all(|(dx, dy)| {
                    let nx = (x as i64 + dx) as usize;
                    let ny = (y as i64 + dy) as usize;
                    response[ny * w + nx] < v
                });
            if strict_max {
                corners.push(Point2::new(x as f64, y as f64));
            }
        }
    }
    log::debug!("harris: {} raw corners", corners.len());

    if corners.is_empty() {
        return Ok(corners);
    }
    let refine = RefineParams {
        half_window: 5,
        max_iterations: 40,
        epsilon: 0.001,
    };
    Ok(refine_corners_fixed_window(img, &corners, &refine))
}

#[cfg(test)]
mod tests {
    use super::*;
    use calib_ar_core::GrayImage;

    #[test]
    fn sobel_kernels_match_known_values() {
        let (s, d) = sobel_kernels(3);
        assert_eq!(vec![1.0, 2.0, 1.0], s);
        assert_eq!(vec![-1.0, 0.0, 1.0], d);
        let (s, d) = sobel_kernels(5);
        assert_eq!(vec![1.0, 4.0, 6.0, 4.0, 1.0], s);
        assert_eq!(vec![-1.0, -2.0, 0.0, 2.0, 1.0], d);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let img = GrayImage::new(20, 20);
        let bad = HarrisParams {
            aperture: 4,
            ..HarrisParams::default()
        };
        assert_eq!(
            Err(HarrisError::InvalidAperture(4)),
            detect_harris(&img.view(), &bad)
        );
        let bad = HarrisParams {
            block_size: 0,
            ..HarrisParams::default()
        };
        assert_eq!(Err(HarrisError::InvalidBlockSize), detect_harris(&img.view(), &bad));
    }

    #[test]
    fn flat_image_has_no_corners() {
        let img = GrayImage::from_fn(40, 40, |_, _| 128);
        let corners = detect_harris(&img.view(), &HarrisParams::default()).unwrap();
        assert!(corners.is_empty());
    }

    #[test]
    fn finds_inner_corners_of_a_board() {
        const SQUARE: f64 = 30.0;
        const ORIGIN: f64 = 30.25;
        let value = |u: f64, v: f64| {
            let bx = ((u - ORIGIN) / SQUARE).floor();
            let by = ((v - ORIGIN) / SQUARE).floor();
            if (0.0..10.0).contains(&bx) && (0.0..7.0).contains(&by) {
                if (bx + by) as i64 % 2 == 0 {
                    10.0
                } else {
                    245.0
                }
            } else {
                255.0
            }
        };
        let img = GrayImage::from_fn(360, 270, |x, y| {
            let mut acc: f64 = 0.0;
            for sy in 0..4 {
                for sx in 0..4 {
                    let u = x as f64 - 0.5 + (sx as f64 + 0.5) / 4.0;
                    let v = y as f64 - 0.5 + (sy as f64 + 0.5) / 4.0;
                    acc += value(u, v);
                }
            }
            (acc / 16.0).round() as u8
        });

        let corners = detect_harris(&img.view(), &HarrisParams::default()).unwrap();
        for r in 0..6 {
            for c in 0..9 {
                let truth = Point2::new(
                    ORIGIN + SQUARE * (c + 1) as f64,
                    ORIGIN + SQUARE * (r + 1) as f64,
                );
                let best = corners
                    .iter()
                    .map(|p| (p - truth).norm())
                    .fold(f64::INFINITY, f64::min);
                assert!(best < 0.25, "corner ({c}, {r}) missed by {best}");
            }
        }
    }
}
