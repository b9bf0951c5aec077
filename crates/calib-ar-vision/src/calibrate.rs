//! Planar intrinsic calibration: Zhang initialisation followed by a joint
//! Levenberg–Marquardt refinement of intrinsics, distortion and view poses.

use crate::homography::estimate_homography;
use crate::lm::{self, fd_step, NllsProblem};
use crate::params::SolverParams;
use crate::pose::{planar_pose_from_homography, pose_from_params, pose_to_params, PLANAR_EPS};
use crate::projection::project_with;
use crate::zhang::initial_intrinsics;
use calib_ar_core::{CameraModel, Distortion, ImageSize, VisionError};
use nalgebra::{DMatrix, DVector, Matrix3, Point2, Point3};

#[cfg(feature = "tracing")]
use tracing::instrument;

pub const MIN_VIEWS: usize = 3;
pub const MIN_POINTS_PER_VIEW: usize = 4;

const INTRINSIC_PARAMS: usize = 9;
const POSE_PARAMS: usize = 6;

fn intrinsics_from_params(p: &[f64]) -> (Matrix3<f64>, Distortion) {
    let k = Matrix3::new(p[0], 0.0, p[2], 0.0, p[1], p[3], 0.0, 0.0, 1.0);
    let d = Distortion::from_array([p[4], p[5], p[6], p[7], p[8]]);
    (k, d)
}

struct CalibProblem<'a> {
    world: &'a [Vec<Point3<f64>>],
    image: &'a [Vec<Point2<f64>>],
    /// Residual row offset of each view.
    offsets: Vec<usize>,
    rows: usize,
}

impl CalibProblem<'_> {
    fn view_residuals(&self, x: &DVector<f64>, view: usize, out: &mut [f64]) {
        let (k, d) = intrinsics_from_params(&x.as_slice()[..INTRINSIC_PARAMS]);
        let start = INTRINSIC_PARAMS + POSE_PARAMS * view;
        let (rot, t) = pose_from_params(&x.as_slice()[start..start + POSE_PARAMS]);
        let proj = project_with(&k, &d, &rot, &t, &self.world[view]);
        for (i, (p, obs)) in proj.iter().zip(&self.image[view]).enumerate() {
            out[2 * i] = p.x - obs.x;
            out[2 * i + 1] = p.y - obs.y;
        }
    }
}

impl NllsProblem for CalibProblem<'_> {
    fn residuals(&self, x: &DVector<f64>) -> DVector<f64> {
        let mut r = DVector::zeros(self.rows);
        for view in 0..self.world.len() {
            let off = self.offsets[view];
            let len = 2 * self.world[view].len();
            self.view_residuals(x, view, &mut r.as_mut_slice()[off..off + len]);
        }
        r
    }

    /// Central differences, exploiting that pose parameters only touch
    /// the residuals of their own view.
    fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        let mut jac = DMatrix::zeros(self.rows, x.len());
        let mut xp = x.clone();

        for col in 0..INTRINSIC_PARAMS {
            let h = fd_step(x[col]);
            xp[col] = x[col] + h;
            let rp = self.residuals(&xp);
            xp[col] = x[col] - h;
            let rm = self.residuals(&xp);
            xp[col] = x[col];
            jac.set_column(col, &((rp - rm) / (2.0 * h)));
        }

        for view in 0..self.world.len() {
            let off = self.offsets[view];
            let len = 2 * self.world[view].len();
            let mut rp = vec![0.0; len];
            let mut rm = vec![0.0; len];
            for j in 0..POSE_PARAMS {
                let col = INTRINSIC_PARAMS + POSE_PARAMS * view + j;
                let h = fd_step(x[col]);
                xp[col] = x[col] + h;
                self.view_residuals(&xp, view, &mut rp);
                xp[col] = x[col] - h;
                self.view_residuals(&xp, view, &mut rm);
                xp[col] = x[col];
                for row in 0..len {
                    jac[(off + row, col)] = (rp[row] - rm[row]) / (2.0 * h);
                }
            }
        }
        jac
    }
}

fn validate(
    world: &[Vec<Point3<f64>>],
    image: &[Vec<Point2<f64>>],
) -> Result<(), VisionError> {
    if world.len() != image.len() {
        return Err(VisionError::MismatchedViews(world.len(), image.len()));
    }
    if world.len() < MIN_VIEWS {
        return Err(VisionError::NotEnoughViews {
            have: world.len(),
            need: MIN_VIEWS,
        });
    }
    for (view, (w, i)) in world.iter().zip(image).enumerate() {
        if w.len() != i.len() {
            return Err(VisionError::MismatchedView {
                view,
                world: w.len(),
                image: i.len(),
            });
        }
        if w.len() < MIN_POINTS_PER_VIEW {
            return Err(VisionError::NotEnoughPoints {
                view,
                have: w.len(),
                need: MIN_POINTS_PER_VIEW,
            });
        }
        if w.iter().any(|p| p.z.abs() > PLANAR_EPS) {
            return Err(VisionError::Degenerate("calibration target is not planar"));
        }
    }
    Ok(())
}

/// Calibrate a pinhole camera with 5-coefficient distortion from views of a
/// planar (`z = 0`) target.
///
/// `fit_error` of the returned model is the RMS reprojection error in pixels.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(world, image, solver), fields(views = world.len()))
)]
pub fn calibrate_planar(
    world: &[Vec<Point3<f64>>],
    image: &[Vec<Point2<f64>>],
    size: ImageSize,
    solver: &SolverParams,
) -> Result<CameraModel, VisionError> {
    validate(world, image)?;

    let mut homographies = Vec::with_capacity(world.len());
    for (w, i) in world.iter().zip(image) {
        let plane: Vec<Point2<f64>> = w.iter().map(|p| Point2::new(p.x, p.y)).collect();
        let h = estimate_homography(&plane, i)
            .ok_or(VisionError::Degenerate("view homography"))?;
        homographies.push(h.h);
    }

    let k0 = initial_intrinsics(&homographies, size);
    log::debug!(
        "initial intrinsics fx={:.2} fy={:.2} cx={:.2} cy={:.2}",
        k0[(0, 0)],
        k0[(1, 1)],
        k0[(0, 2)],
        k0[(1, 2)]
    );

    let mut x0 = Vec::with_capacity(INTRINSIC_PARAMS + POSE_PARAMS * world.len());
    x0.extend_from_slice(&[k0[(0, 0)], k0[(1, 1)], k0[(0, 2)], k0[(1, 2)]]);
    x0.extend_from_slice(&[0.0; 5]);
    for h in &homographies {
        let (rot, t) = planar_pose_from_homography(&k0, h)
            .ok_or(VisionError::Degenerate("view pose"))?;
        x0.extend_from_slice(&pose_to_params(&rot, &t));
    }

    let mut offsets = Vec::with_capacity(world.len());
    let mut rows = 0;
    for w in world {
        offsets.push(rows);
        rows += 2 * w.len();
    }
    let problem = CalibProblem {
        world,
        image,
        offsets,
        rows,
    };

    let (x, report) = lm::solve(&problem, DVector::from_vec(x0), solver);
    let points = rows / 2;
    let rms = (2.0 * report.final_cost / points as f64).sqrt();
    if !rms.is_finite() || x.iter().any(|v| !v.is_finite()) {
        return Err(VisionError::NotConverged);
    }
    if !report.converged {
        log::warn!("calibration refinement stopped early, rms {:.4} px", rms);
    }
    log::debug!(
        "calibration finished after {} evaluations, rms {:.4} px",
        report.iterations,
        rms
    );

    let (intrinsics, distortion) = intrinsics_from_params(&x.as_slice()[..INTRINSIC_PARAMS]);
    Ok(CameraModel {
        intrinsics,
        distortion,
        fit_error: rms,
        image_size: size,
    })
}
