//! Core types and interfaces for chessboard camera calibration and AR overlay.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any concrete corner detector, solver or image type; those live
//! behind [`VisionBackend`].
//!
//! ```
//! use calib_ar_core::PatternSpec;
//!
//! let pattern: PatternSpec = "9x6".parse().unwrap();
//! let world = pattern.world_points();
//! assert_eq!(54, world.len());
//! assert_eq!(-5.0, world[53].y);
//! ```

mod backend;
mod camera;
mod image;
mod logger;
mod pattern;

pub use backend::{VisionBackend, VisionError};
pub use camera::{
    CameraIoError, CameraModel, CameraParams, Distortion, FrameUsed, ImageSize, Observation, Pose,
};
pub use image::{sample_bilinear, GrayImage, GrayImageView};
pub use pattern::{PatternError, PatternSpec};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{default_directive, init_with_level, level_from_verbosity};
