use crate::board::detect_board;
use crate::calibrate::calibrate_planar;
use crate::params::DetectorParams;
use crate::pose::solve_planar_pnp;
use crate::projection::project_points;
use crate::subpix::refine_corners;
use calib_ar_core::{
    CameraModel, GrayImageView, ImageSize, PatternSpec, Pose, VisionBackend, VisionError,
};
use nalgebra::{Point2, Point3};

/// Pure-Rust [`VisionBackend`].
#[derive(Clone, Debug, Default)]
pub struct NativeBackend {
    pub params: DetectorParams,
}

impl NativeBackend {
    pub fn new(params: DetectorParams) -> Self {
        Self { params }
    }
}

impl VisionBackend for NativeBackend {
    fn detect_pattern(
        &self,
        image: &GrayImageView<'_>,
        pattern: PatternSpec,
    ) -> Option<Vec<Point2<f64>>> {
        detect_board(image, pattern, &self.params)
    }

    fn refine(&self, image: &GrayImageView<'_>, corners: &[Point2<f64>]) -> Vec<Point2<f64>> {
        refine_corners(image, corners, &self.params.refine)
    }

    fn calibrate(
        &self,
        world_points: &[Vec<Point3<f64>>],
        image_points: &[Vec<Point2<f64>>],
        image_size: ImageSize,
    ) -> Result<CameraModel, VisionError> {
        calibrate_planar(world_points, image_points, image_size, &self.params.solver)
    }

    fn solve_pose(
        &self,
        world_points: &[Point3<f64>],
        image_points: &[Point2<f64>],
        camera: &CameraModel,
    ) -> Option<Pose> {
        solve_planar_pnp(world_points, image_points, camera, &self.params.solver)
    }

    fn project(
        &self,
        world_points: &[Point3<f64>],
        pose: &Pose,
        camera: &CameraModel,
    ) -> Vec<Point2<f64>> {
        project_points(world_points, pose, camera)
    }
}
