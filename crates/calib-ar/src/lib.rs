//! Interactive chessboard camera calibration with pose-aware AR overlays.
//!
//! This crate ties the geometric core (`calib-ar-core`) and the native
//! detector/solver (`calib-ar-vision`) into an application:
//! - [`CalibrationSession`]: observations, last good detection, camera model
//! - [`FramePipeline`]: detect, refine, annotate and overlay one frame
//! - [`export_session`]: CSV, PNG and JSON artifacts of a session
//! - frame sources, playback control and displays for the interactive loop
//! - [`run_batch`]: non-interactive calibration of an image directory
//!
//! ## Quickstart
//!
//! ```no_run
//! use calib_ar::{CalibrationSession, FramePipeline, PipelineConfig};
//! use calib_ar::core::PatternSpec;
//! use calib_ar::vision::NativeBackend;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut frame = image::open("board.png")?.to_rgb8();
//! let mut session = CalibrationSession::new(PatternSpec::default(), NativeBackend::default());
//! let pipeline = FramePipeline::new(PipelineConfig::default());
//!
//! let result = pipeline.process(&mut session, &mut frame);
//! if result.found {
//!     session.record_observation(&result)?;
//! }
//! println!("observations: {}", session.observation_count());
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//! - `cli` (default): the `calib-ar` binary.
//! - `gui`: a `minifb` window display.
//! - `camera`: live capture through `nokhwa`.
//! - `tracing`: spans on the hot paths and a `tracing-subscriber` logger.

pub use calib_ar_core as core;
pub use calib_ar_vision as vision;

mod app;
mod config;
mod corners;
mod display;
mod export;
mod overlay;
mod pipeline;
mod playback;
mod session;
mod source;
mod text;

pub use app::{finish_session, run_batch, AppError, Controller, Flow};
pub use config::{AppConfig, ConfigError, DEFAULT_OUTPUT_DIR};
pub use corners::annotate_harris;
pub use display::{Command, ConsoleDisplay, Display, DisplayError};
pub use export::{
    corners_csv, export_observations, export_session, points_csv, summary_csv, ExportError,
    ExportFailure, ExportReport, CAMERA_FILE, CORNERS_FILE, POINTS_FILE, SUMMARY_FILE,
};
pub use overlay::{
    axes_points, draw_axes, draw_corners, draw_pyramid, draw_thick_line, pyramid_points,
    OverlayKind, AXIS_LENGTH, BLUE, GREEN, PYRAMID_EDGES, RED,
};
pub use pipeline::{status_lines, DetectionResult, FramePipeline, PipelineConfig};
pub use playback::{Playback, PlaybackState, FRAME_INTERVAL};
pub use session::{CalibrationSession, SessionError, MIN_CALIBRATION_FRAMES};
pub use source::{FrameSource, ImageSequence, SourceError, StillImage};
pub use text::{draw_text, text_height, text_width};

#[cfg(feature = "gui")]
pub use display::WindowDisplay;

#[cfg(feature = "camera")]
pub use source::CameraSource;
