//! Writes a session's observations, frames and camera model to a directory.
//!
//! Every artifact is attempted independently: a failure is logged and
//! collected in the [`ExportReport`] instead of aborting the export.

use crate::session::CalibrationSession;
use calib_ar_core::{CameraIoError, CameraModel, Observation, PatternSpec, VisionBackend};
use image::RgbImage;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

pub const CORNERS_FILE: &str = "corners.csv";
pub const POINTS_FILE: &str = "points.csv";
pub const SUMMARY_FILE: &str = "summary.csv";
pub const CAMERA_FILE: &str = "camera_params.json";

#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Camera(#[from] CameraIoError),

    #[error("frame buffer does not match {width}x{height} RGB")]
    InvalidFrame { width: u32, height: u32 },
}

/// One artifact that could not be written.
#[derive(thiserror::Error, Debug)]
#[error("{artifact}: {error}")]
pub struct ExportFailure {
    pub artifact: String,
    #[source]
    pub error: ExportError,
}

#[derive(Debug)]
pub struct ExportReport {
    pub directory: PathBuf,
    /// File names written successfully, in write order.
    pub written: Vec<String>,
    pub failures: Vec<ExportFailure>,
}

impl ExportReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Flattened image points, one row per corner.
pub fn corners_csv(observations: &[Observation]) -> String {
    let mut out = String::from("Frame,PointIndex,X,Y\n");
    for (frame, obs) in observations.iter().enumerate() {
        for (i, p) in obs.image_points.iter().enumerate() {
            let _ = writeln!(out, "{frame},{i},{},{}", p.x, p.y);
        }
    }
    out
}

/// Flattened board points, one row per corner.
pub fn points_csv(observations: &[Observation]) -> String {
    let mut out = String::from("Frame,PointIndex,X,Y,Z\n");
    for (frame, obs) in observations.iter().enumerate() {
        for (i, p) in obs.world_points.iter().enumerate() {
            let _ = writeln!(out, "{frame},{i},{},{},{}", p.x, p.y, p.z);
        }
    }
    out
}

pub fn summary_csv(pattern: PatternSpec, frames: usize) -> String {
    let per_frame = pattern.corner_count();
    format!(
        "Parameter,Value\n\
         Number of frames,{frames}\n\
         Board width,{}\n\
         Board height,{}\n\
         Points per frame,{per_frame}\n\
         Total points,{}\n",
        pattern.columns(),
        pattern.rows(),
        frames * per_frame
    )
}

fn write_frame(path: &Path, obs: &Observation) -> Result<(), ExportError> {
    let (width, height) = (obs.frame_size.width, obs.frame_size.height);
    let img = RgbImage::from_raw(width, height, obs.source_frame.clone())
        .ok_or(ExportError::InvalidFrame { width, height })?;
    img.save(path)?;
    Ok(())
}

/// Export everything a session accumulated.
pub fn export_session<B: VisionBackend>(
    dir: impl AsRef<Path>,
    session: &CalibrationSession<B>,
) -> ExportReport {
    export_observations(
        dir,
        session.pattern(),
        session.observations(),
        session.camera_model(),
    )
}

/// Write `corners.csv`, `points.csv`, `summary.csv`, one `frame_<i>.png` per
/// observation and, when a model is given, `camera_params.json`.
pub fn export_observations(
    dir: impl AsRef<Path>,
    pattern: PatternSpec,
    observations: &[Observation],
    camera: Option<&CameraModel>,
) -> ExportReport {
    let dir = dir.as_ref();
    let mut report = ExportReport {
        directory: dir.to_path_buf(),
        written: Vec::new(),
        failures: Vec::new(),
    };
    let mut attempt = |artifact: String, result: Result<(), ExportError>| match result {
        Ok(()) => report.written.push(artifact),
        Err(error) => {
            log::error!("failed to write {}: {}", dir.join(&artifact).display(), error);
            report.failures.push(ExportFailure { artifact, error });
        }
    };

    if let Err(e) = fs::create_dir_all(dir) {
        log::error!("failed to create {}: {}", dir.display(), e);
    }

    attempt(
        CORNERS_FILE.to_string(),
        fs::write(dir.join(CORNERS_FILE), corners_csv(observations)).map_err(ExportError::from),
    );
    attempt(
        POINTS_FILE.to_string(),
        fs::write(dir.join(POINTS_FILE), points_csv(observations)).map_err(ExportError::from),
    );
    attempt(
        SUMMARY_FILE.to_string(),
        fs::write(dir.join(SUMMARY_FILE), summary_csv(pattern, observations.len()))
            .map_err(ExportError::from),
    );
    for (i, obs) in observations.iter().enumerate() {
        let name = format!("frame_{i}.png");
        let result = write_frame(&dir.join(&name), obs);
        attempt(name, result);
    }
    if let Some(camera) = camera {
        attempt(
            CAMERA_FILE.to_string(),
            camera
                .to_params()
                .write_json(dir.join(CAMERA_FILE))
                .map_err(ExportError::from),
        );
    }

    log::info!(
        "exported {} artifacts to {} ({} failed)",
        report.written.len(),
        dir.display(),
        report.failures.len()
    );
    report
}
