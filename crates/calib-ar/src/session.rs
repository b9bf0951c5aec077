//! Observation bookkeeping, calibration and pose queries.

use crate::pipeline::DetectionResult;
use calib_ar_core::{
    CameraModel, FrameUsed, ImageSize, Observation, PatternSpec, Pose, VisionBackend, VisionError,
};
use calib_ar_vision::NativeBackend;
use nalgebra::{Point2, Point3};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Observations required before [`CalibrationSession::calibrate`] runs.
pub const MIN_CALIBRATION_FRAMES: usize = 5;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("no chessboard detected in the current frame and no earlier detection to fall back on")]
    NoDetection,

    #[error("need {need} observations to calibrate, have {have}")]
    InsufficientData { have: usize, need: usize },

    #[error("calibration failed: {0}")]
    Calibration(#[from] VisionError),
}

/// Most recent frame in which the full pattern was found.
#[derive(Clone, Debug)]
struct LastGood {
    corners: Vec<Point2<f64>>,
    frame: Vec<u8>,
    size: ImageSize,
}

/// Accumulated calibration state for one run of the tool.
///
/// Pose estimation only becomes available after a successful
/// [`calibrate`](Self::calibrate); a later calibration replaces the model.
#[derive(Debug)]
pub struct CalibrationSession<B = NativeBackend> {
    pattern: PatternSpec,
    backend: B,
    observations: Vec<Observation>,
    camera: Option<CameraModel>,
    last_good: Option<LastGood>,
}

impl<B: VisionBackend> CalibrationSession<B> {
    pub fn new(pattern: PatternSpec, backend: B) -> Self {
        Self {
            pattern,
            backend,
            observations: Vec::new(),
            camera: None,
            last_good: None,
        }
    }

    pub fn pattern(&self) -> PatternSpec {
        self.pattern
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn is_complete(&self, result: &DetectionResult) -> bool {
        result.found && result.corners.len() == self.pattern.corner_count()
    }

    /// Remember `result` as the last good detection when the pattern was found.
    pub fn track(&mut self, result: &DetectionResult) {
        if !self.is_complete(result) {
            return;
        }
        self.last_good = Some(LastGood {
            corners: result.corners.clone(),
            frame: result
                .clean_frame
                .as_ref()
                .map(|f| f.as_raw().clone())
                .unwrap_or_default(),
            size: result.frame_size,
        });
    }

    pub fn has_last_good(&self) -> bool {
        self.last_good.is_some()
    }

    /// Record the current detection, or the last good one when the current
    /// frame has none. Fails without touching state when neither exists.
    pub fn record_observation(&mut self, result: &DetectionResult) -> Result<FrameUsed, SessionError> {
        let (corners, frame, size, used) = if self.is_complete(result) {
            let frame = result
                .clean_frame
                .as_ref()
                .map(|f| f.as_raw().clone())
                .unwrap_or_default();
            (result.corners.clone(), frame, result.frame_size, FrameUsed::Current)
        } else if let Some(good) = &self.last_good {
            (
                good.corners.clone(),
                good.frame.clone(),
                good.size,
                FrameUsed::LastGood,
            )
        } else {
            return Err(SessionError::NoDetection);
        };

        self.observations.push(Observation {
            image_points: corners,
            world_points: self.pattern.world_points(),
            source_frame: frame,
            frame_size: size,
            source: used,
        });
        log::debug!(
            "recorded observation {} from {:?} detection",
            self.observations.len(),
            used
        );
        Ok(used)
    }

    /// Calibrate from every recorded observation, replacing any earlier model.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self), fields(observations = self.observations.len())))]
    pub fn calibrate(&mut self) -> Result<&CameraModel, SessionError> {
        let have = self.observations.len();
        if have < MIN_CALIBRATION_FRAMES {
            return Err(SessionError::InsufficientData {
                have,
                need: MIN_CALIBRATION_FRAMES,
            });
        }
        let size = self
            .last_good
            .as_ref()
            .map(|g| g.size)
            .or_else(|| self.observations.last().map(|o| o.frame_size))
            .ok_or(SessionError::NoDetection)?;

        let world: Vec<Vec<Point3<f64>>> = self
            .observations
            .iter()
            .map(|o| o.world_points.clone())
            .collect();
        let image: Vec<Vec<Point2<f64>>> = self
            .observations
            .iter()
            .map(|o| o.image_points.clone())
            .collect();

        let model = self.backend.calibrate(&world, &image, size)?;
        log::info!(
            "calibrated from {} views: fx={:.2} fy={:.2} cx={:.2} cy={:.2} rms={:.4}",
            have,
            model.fx(),
            model.fy(),
            model.cx(),
            model.cy(),
            model.fit_error
        );
        Ok(self.camera.insert(model))
    }

    /// Board pose for a full set of detected corners. `None` when
    /// uncalibrated, for a wrong point count or when no pose is found.
    pub fn pose_for(&self, corners: &[Point2<f64>]) -> Option<Pose> {
        let camera = self.camera.as_ref()?;
        if corners.is_empty() || corners.len() != self.pattern.corner_count() {
            return None;
        }
        let world = self.pattern.world_points();
        self.backend
            .solve_pose(&world, corners, camera)
            .filter(Pose::is_finite)
    }

    /// Project board-frame points through the stored model.
    pub fn project(&self, points: &[Point3<f64>], pose: &Pose) -> Option<Vec<Point2<f64>>> {
        let camera = self.camera.as_ref()?;
        Some(self.backend.project(points, pose, camera))
    }

    pub fn observation_count(&self) -> usize {
        self.observations.len()
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn is_calibrated(&self) -> bool {
        self.camera.is_some()
    }

    pub fn camera_model(&self) -> Option<&CameraModel> {
        self.camera.as_ref()
    }

    /// Observations still missing before calibration may run.
    pub fn remaining_for_calibration(&self) -> usize {
        MIN_CALIBRATION_FRAMES.saturating_sub(self.observations.len())
    }
}
