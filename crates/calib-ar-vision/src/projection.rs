//! Pinhole projection with Brown-Conrady distortion.

use calib_ar_core::{CameraModel, Distortion, Pose};
use nalgebra::{Matrix3, Point2, Point3, Rotation3, Vector2, Vector3};

/// Apply radial-tangential distortion to a normalized image point.
#[inline]
pub fn distort(d: &Distortion, p: Vector2<f64>) -> Vector2<f64> {
    let (x, y) = (p.x, p.y);
    let r2 = x * x + y * y;
    let radial = 1.0 + r2 * (d.k1 + r2 * (d.k2 + r2 * d.k3));
    let xd = x * radial + 2.0 * d.p1 * x * y + d.p2 * (r2 + 2.0 * x * x);
    let yd = y * radial + d.p1 * (r2 + 2.0 * y * y) + 2.0 * d.p2 * x * y;
    Vector2::new(xd, yd)
}

/// Invert [`distort`] by fixed-point iteration.
pub fn undistort(d: &Distortion, pd: Vector2<f64>) -> Vector2<f64> {
    let mut p = pd;
    for _ in 0..20 {
        let (x, y) = (p.x, p.y);
        let r2 = x * x + y * y;
        let radial = 1.0 + r2 * (d.k1 + r2 * (d.k2 + r2 * d.k3));
        let dx = 2.0 * d.p1 * x * y + d.p2 * (r2 + 2.0 * x * x);
        let dy = d.p1 * (r2 + 2.0 * y * y) + 2.0 * d.p2 * x * y;
        if radial.abs() < 1e-12 {
            break;
        }
        p = Vector2::new((pd.x - dx) / radial, (pd.y - dy) / radial);
    }
    p
}

#[inline]
fn to_pixel(k: &Matrix3<f64>, p: Vector2<f64>) -> Point2<f64> {
    Point2::new(
        k[(0, 0)] * p.x + k[(0, 1)] * p.y + k[(0, 2)],
        k[(1, 1)] * p.y + k[(1, 2)],
    )
}

/// Pixel position to normalized, undistorted camera coordinates.
pub fn normalize_pixel(camera: &CameraModel, p: Point2<f64>) -> Vector2<f64> {
    let k = &camera.intrinsics;
    let y = (p.y - k[(1, 2)]) / k[(1, 1)];
    let x = (p.x - k[(0, 2)] - k[(0, 1)] * y) / k[(0, 0)];
    undistort(&camera.distortion, Vector2::new(x, y))
}

/// Project a camera-frame point. Points on or behind the image plane map to NaN.
#[inline]
pub fn project_camera_point(
    k: &Matrix3<f64>,
    d: &Distortion,
    pc: &Vector3<f64>,
) -> Point2<f64> {
    if pc.z <= 1e-12 {
        return Point2::new(f64::NAN, f64::NAN);
    }
    let n = Vector2::new(pc.x / pc.z, pc.y / pc.z);
    to_pixel(k, distort(d, n))
}

pub fn project_with(
    k: &Matrix3<f64>,
    d: &Distortion,
    rotation: &Rotation3<f64>,
    translation: &Vector3<f64>,
    world: &[Point3<f64>],
) -> Vec<Point2<f64>> {
    world
        .iter()
        .map(|p| project_camera_point(k, d, &(rotation * p.coords + translation)))
        .collect()
}

pub fn project_points(world: &[Point3<f64>], pose: &Pose, camera: &CameraModel) -> Vec<Point2<f64>> {
    project_with(
        &camera.intrinsics,
        &camera.distortion,
        &pose.rotation_matrix(),
        &pose.translation,
        world,
    )
}
