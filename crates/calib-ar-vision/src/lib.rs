//! Pure-Rust vision backend for chessboard calibration and AR overlay.
//!
//! ## Quickstart
//!
//! ```
//! use calib_ar_core::{GrayImage, PatternSpec, VisionBackend};
//! use calib_ar_vision::NativeBackend;
//!
//! let backend = NativeBackend::default();
//! let blank = GrayImage::new(64, 48);
//! let pattern = PatternSpec::default();
//! assert!(backend.detect_pattern(&blank.view(), pattern).is_none());
//! ```
//!
//! Pipeline:
//! 1. ChESS corners from the `chess-corners` detector.
//! 2. Grid graph over kd-tree neighbours, BFS coordinates, board ordering.
//! 3. Gradient-orthogonality sub-pixel refinement.
//! 4. Calibration: DLT homographies, Zhang closed form, joint LM refinement.
//! 5. Planar PnP and Brown–Conrady projection for overlays.
//!
//! The Harris detector ([`detect_harris`]) is a standalone experiment and is not
//! used by [`NativeBackend`].

mod backend;
mod board;
mod calibrate;
mod chess;
mod geom;
mod gridgraph;
mod harris;
mod homography;
mod lm;
mod params;
mod pose;
mod projection;
mod subpix;
mod zhang;

pub use backend::NativeBackend;
pub use board::detect_board;
pub use calibrate::{calibrate_planar, MIN_POINTS_PER_VIEW, MIN_VIEWS};
pub use chess::{find_chess_corners, ChessCorner};
pub use harris::{detect_harris, harris_response, HarrisError, HarrisParams};
pub use homography::{estimate_homography, Homography};
pub use lm::{numeric_jacobian, solve as solve_least_squares, NllsProblem, SolveReport};
pub use params::{ChessParams, DetectorParams, GridGraphParams, RefineParams, SolverParams};
pub use pose::{planar_pose_from_homography, solve_planar_pnp};
pub use projection::{distort, normalize_pixel, project_camera_point, project_points, undistort};
pub use subpix::{refine_corners, refine_corners_fixed_window};
pub use zhang::{default_intrinsics, initial_intrinsics, intrinsics_from_homographies};
