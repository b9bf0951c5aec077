#![allow(dead_code)]

use calib_ar::core::{
    CameraModel, Distortion, GrayImageView, ImageSize, PatternSpec, Pose, VisionBackend,
    VisionError,
};
use image::{Rgb, RgbImage};
use nalgebra::{Matrix3, Point2, Point3, Vector3};

/// Backend that "detects" the board on bright frames only and reports a
/// fixed pinhole camera.
#[derive(Clone, Debug, Default)]
pub struct FakeBackend;

pub const FOCAL: f64 = 500.0;

pub fn fake_corners(pattern: PatternSpec) -> Vec<Point2<f64>> {
    pattern
        .world_points()
        .iter()
        .map(|p| Point2::new(100.0 + 20.0 * p.x, 80.0 - 20.0 * p.y))
        .collect()
}

pub fn bright_frame() -> RgbImage {
    RgbImage::from_pixel(320, 240, Rgb([200, 200, 200]))
}

pub fn dark_frame() -> RgbImage {
    RgbImage::from_pixel(320, 240, Rgb([20, 20, 20]))
}

impl VisionBackend for FakeBackend {
    fn detect_pattern(
        &self,
        image: &GrayImageView<'_>,
        pattern: PatternSpec,
    ) -> Option<Vec<Point2<f64>>> {
        (image.data[0] > 128).then(|| fake_corners(pattern))
    }

    fn refine(&self, _image: &GrayImageView<'_>, corners: &[Point2<f64>]) -> Vec<Point2<f64>> {
        corners.to_vec()
    }

    fn calibrate(
        &self,
        world_points: &[Vec<Point3<f64>>],
        _image_points: &[Vec<Point2<f64>>],
        image_size: ImageSize,
    ) -> Result<CameraModel, VisionError> {
        if world_points.is_empty() {
            return Err(VisionError::NotEnoughViews { have: 0, need: 1 });
        }
        Ok(CameraModel {
            intrinsics: Matrix3::new(
                FOCAL,
                0.0,
                image_size.width as f64 / 2.0,
                0.0,
                FOCAL,
                image_size.height as f64 / 2.0,
                0.0,
                0.0,
                1.0,
            ),
            distortion: Distortion::default(),
            fit_error: 0.125,
            image_size,
        })
    }

    fn solve_pose(
        &self,
        _world_points: &[Point3<f64>],
        _image_points: &[Point2<f64>],
        _camera: &CameraModel,
    ) -> Option<Pose> {
        Some(Pose::new(Vector3::zeros(), Vector3::new(-4.0, 2.5, 20.0)))
    }

    fn project(
        &self,
        world_points: &[Point3<f64>],
        pose: &Pose,
        camera: &CameraModel,
    ) -> Vec<Point2<f64>> {
        world_points
            .iter()
            .map(|p| {
                let q = p.coords + pose.translation;
                Point2::new(
                    camera.fx() * q.x / q.z + camera.cx(),
                    camera.fy() * q.y / q.z + camera.cy(),
                )
            })
            .collect()
    }
}

/// Board square coordinates to pixels for [`render_board`].
pub fn board_homography() -> calib_ar::vision::Homography {
    calib_ar::vision::Homography::new(Matrix3::new(
        30.0, 5.0, 120.0, -3.0, 28.0, 100.0, 0.01, -0.008, 1.0,
    ))
}

/// Anti-aliased 10x7-square board under a mild perspective; inner corner
/// `(r, c)` lands on `H * (c + 1, r + 1)`.
pub fn render_board() -> RgbImage {
    let Some(inv) = board_homography().inverse() else {
        panic!("board homography is invertible");
    };
    RgbImage::from_fn(520, 380, |x, y| {
        let mut acc = 0.0;
        for sy in 0..4 {
            for sx in 0..4 {
                let u = x as f64 - 0.5 + (sx as f64 + 0.5) / 4.0;
                let v = y as f64 - 0.5 + (sy as f64 + 0.5) / 4.0;
                let b = inv.apply(Point2::new(u, v));
                acc += if (0.0..10.0).contains(&b.x) && (0.0..7.0).contains(&b.y) {
                    if (b.x.floor() + b.y.floor()) as i64 % 2 == 0 {
                        10.0
                    } else {
                        245.0
                    }
                } else {
                    255.0
                };
            }
        }
        let g = (acc / 16.0f64).round() as u8;
        Rgb([g, g, g])
    })
}
