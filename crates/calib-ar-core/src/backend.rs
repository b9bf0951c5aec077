use crate::{CameraModel, GrayImageView, ImageSize, PatternSpec, Pose};
use nalgebra::{Point2, Point3};

/// Errors reported by a vision backend while calibrating.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum VisionError {
    #[error("calibration needs at least {need} views (got {have})")]
    NotEnoughViews { have: usize, need: usize },

    #[error("view {view} has {have} points, at least {need} are required")]
    NotEnoughPoints { view: usize, have: usize, need: usize },

    #[error("view {view} has {world} world points but {image} image points")]
    MismatchedView {
        view: usize,
        world: usize,
        image: usize,
    },

    #[error("{0} world point sets but {1} image point sets")]
    MismatchedViews(usize, usize),

    #[error("degenerate input: {0}")]
    Degenerate(&'static str),

    #[error("optimization did not converge to a finite solution")]
    NotConverged,
}

/// The narrow set of computer-vision primitives the session, pipeline and
/// exporter rely on.
///
/// Implementations are expected to be deterministic for identical inputs.
pub trait VisionBackend {
    /// Locate all `pattern.corner_count()` inner corners, ordered row-major
    /// in the same order as [`PatternSpec::world_points`]. `None` means the
    /// pattern is not fully visible.
    fn detect_pattern(
        &self,
        image: &GrayImageView<'_>,
        pattern: PatternSpec,
    ) -> Option<Vec<Point2<f64>>>;

    /// Sub-pixel refinement of already detected corners; same length and order.
    fn refine(&self, image: &GrayImageView<'_>, corners: &[Point2<f64>]) -> Vec<Point2<f64>>;

    /// Estimate intrinsics and distortion from several planar views.
    fn calibrate(
        &self,
        world_points: &[Vec<Point3<f64>>],
        image_points: &[Vec<Point2<f64>>],
        image_size: ImageSize,
    ) -> Result<CameraModel, VisionError>;

    /// Board pose relative to the camera, `None` when no solution is found.
    fn solve_pose(
        &self,
        world_points: &[Point3<f64>],
        image_points: &[Point2<f64>],
        camera: &CameraModel,
    ) -> Option<Pose>;

    /// Project board-frame points into the image.
    fn project(
        &self,
        world_points: &[Point3<f64>],
        pose: &Pose,
        camera: &CameraModel,
    ) -> Vec<Point2<f64>>;
}
