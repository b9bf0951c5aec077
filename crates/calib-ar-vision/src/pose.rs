//! Planar pose: homography decomposition followed by reprojection refinement.

use crate::homography::estimate_homography;
use crate::lm::{self, NllsProblem};
use crate::params::SolverParams;
use crate::projection::{normalize_pixel, project_with};
use calib_ar_core::{CameraModel, Pose};
use nalgebra::{DVector, Matrix3, Point2, Point3, Rotation3, Vector3};

/// Board points further than this from `z = 0` make a target non-planar.
pub(crate) const PLANAR_EPS: f64 = 1e-9;

/// Decompose `H ~ K [r1 r2 t]` into a rotation and translation with the
/// board in front of the camera.
pub fn planar_pose_from_homography(
    k: &Matrix3<f64>,
    h: &Matrix3<f64>,
) -> Option<(Rotation3<f64>, Vector3<f64>)> {
    let k_inv = k.try_inverse()?;
    let k_inv_h1 = k_inv * h.column(0);
    let k_inv_h2 = k_inv * h.column(1);
    let k_inv_h3 = k_inv * h.column(2);

    let norm = 0.5 * (k_inv_h1.norm() + k_inv_h2.norm());
    if norm < 1e-12 {
        return None;
    }
    let mut lambda = 1.0 / norm;
    if (lambda * k_inv_h3).z < 0.0 {
        lambda = -lambda;
    }

    let r1 = lambda * k_inv_h1;
    let r2 = lambda * k_inv_h2;
    let r3 = r1.cross(&r2);
    let r = Matrix3::from_columns(&[r1, r2, r3]);

    // Project onto SO(3).
    let svd = r.svd(true, true);
    let (u, v_t) = (svd.u?, svd.v_t?);
    let mut r_orth = u * v_t;
    if r_orth.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        r_orth = u_flipped * v_t;
    }

    let t = lambda * k_inv_h3;
    let rotation = Rotation3::from_matrix_unchecked(r_orth);
    (t.iter().all(|v| v.is_finite())).then_some((rotation, t))
}

/// Pack a pose as `[rx, ry, rz, tx, ty, tz]`.
pub(crate) fn pose_to_params(rotation: &Rotation3<f64>, t: &Vector3<f64>) -> [f64; 6] {
    let r = rotation.scaled_axis();
    [r.x, r.y, r.z, t.x, t.y, t.z]
}

pub(crate) fn pose_from_params(p: &[f64]) -> (Rotation3<f64>, Vector3<f64>) {
    (
        Rotation3::new(Vector3::new(p[0], p[1], p[2])),
        Vector3::new(p[3], p[4], p[5]),
    )
}

struct PoseProblem<'a> {
    world: &'a [Point3<f64>],
    image: &'a [Point2<f64>],
    camera: &'a CameraModel,
}

impl NllsProblem for PoseProblem<'_> {
    fn residuals(&self, x: &DVector<f64>) -> DVector<f64> {
        let (rot, t) = pose_from_params(x.as_slice());
        let proj = project_with(
            &self.camera.intrinsics,
            &self.camera.distortion,
            &rot,
            &t,
            self.world,
        );
        let mut r = DVector::zeros(2 * self.world.len());
        for (i, (p, obs)) in proj.iter().zip(self.image).enumerate() {
            r[2 * i] = p.x - obs.x;
            r[2 * i + 1] = p.y - obs.y;
        }
        r
    }
}

/// Pose of a planar (`z = 0`) target from at least four correspondences.
///
/// Returns `None` for too few or mismatched points, non-planar input,
/// degenerate geometry, non-finite results or a target behind the camera.
pub fn solve_planar_pnp(
    world: &[Point3<f64>],
    image: &[Point2<f64>],
    camera: &CameraModel,
    solver: &SolverParams,
) -> Option<Pose> {
    if world.len() != image.len() || world.len() < 4 {
        return None;
    }
    if world.iter().any(|p| p.z.abs() > PLANAR_EPS) {
        return None;
    }

    let plane: Vec<Point2<f64>> = world.iter().map(|p| Point2::new(p.x, p.y)).collect();
    let normalized: Vec<Point2<f64>> = image
        .iter()
        .map(|&p| Point2::from(normalize_pixel(camera, p)))
        .collect();
    let h = estimate_homography(&plane, &normalized)?;
    let (rot, t) = planar_pose_from_homography(&Matrix3::identity(), &h.h)?;

    let problem = PoseProblem {
        world,
        image,
        camera,
    };
    let x0 = DVector::from_row_slice(&pose_to_params(&rot, &t));
    let (x, report) = lm::solve(&problem, x0, solver);
    if !report.final_cost.is_finite() || x.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let (rot, t) = pose_from_params(x.as_slice());
    if world.iter().any(|p| (rot * p.coords + t).z <= 0.0) {
        return None;
    }
    Some(Pose::from_rotation(&rot, t))
}
