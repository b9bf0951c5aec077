//! Per-frame orchestration: detection, annotation, pose overlay and status text.

use crate::overlay::{
    axes_points, draw_axes, draw_corners, draw_pyramid, pyramid_points, OverlayKind, GREEN, RED,
};
use crate::session::CalibrationSession;
use crate::text::{draw_text, text_height, text_width};
use calib_ar_core::{GrayImageView, ImageSize, VisionBackend};
use image::{Rgb, RgbImage};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Rendering options for [`FramePipeline`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub overlay: OverlayKind,
    pub line_thickness: u32,
    pub text_scale: u32,
    /// Run sub-pixel refinement on detected corners.
    pub refine: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            overlay: OverlayKind::Pyramid,
            line_thickness: 2,
            text_scale: 2,
            refine: true,
        }
    }
}

/// Outcome of processing one frame.
#[derive(Clone, Debug)]
pub struct DetectionResult {
    pub found: bool,
    /// Refined corners in pattern order; empty when nothing was found.
    pub corners: Vec<Point2<f64>>,
    pub frame_size: ImageSize,
    /// Unannotated copy of the frame, kept only when the pattern was found.
    pub clean_frame: Option<RgbImage>,
}

impl DetectionResult {
    pub fn not_found(frame_size: ImageSize) -> Self {
        Self {
            found: false,
            corners: Vec::new(),
            frame_size,
            clean_frame: None,
        }
    }
}

/// Status lines for the current session state: detection state, progress,
/// and a hint when an earlier detection can still be saved.
pub fn status_lines<B: VisionBackend>(
    session: &CalibrationSession<B>,
    found: bool,
) -> Vec<(String, Rgb<u8>)> {
    let mut lines = Vec::with_capacity(3);
    lines.push(match (found, session.is_calibrated()) {
        (false, _) => ("NO CHESSBOARD DETECTED".to_string(), RED),
        (true, true) => ("CALIBRATED - SHOWING VIRTUAL OBJECT".to_string(), GREEN),
        (true, false) => ("DETECTED - PRESS S TO SAVE".to_string(), GREEN),
    });

    let saved = session.observation_count();
    let remaining = session.remaining_for_calibration();
    let progress = if session.is_calibrated() {
        format!("SAVED FRAMES: {saved} (CALIBRATED)")
    } else if remaining > 0 {
        format!("SAVED FRAMES: {saved} (NEED {remaining} MORE)")
    } else {
        format!("SAVED FRAMES: {saved} (READY TO CALIBRATE - PRESS C)")
    };
    lines.push((progress, GREEN));

    if !found && session.has_last_good() {
        lines.push(("LAST SUCCESSFUL FRAME AVAILABLE".to_string(), GREEN));
    }
    lines
}

#[derive(Clone, Debug, Default)]
pub struct FramePipeline {
    config: PipelineConfig,
}

impl FramePipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Detect the pattern in `frame`, annotate it in place and update the
    /// session's last good detection.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(width = frame.width(), height = frame.height()))
    )]
    pub fn process<B: VisionBackend>(
        &self,
        session: &mut CalibrationSession<B>,
        frame: &mut RgbImage,
    ) -> DetectionResult {
        let size = ImageSize::new(frame.width(), frame.height());
        if size.width == 0 || size.height == 0 {
            let result = DetectionResult::not_found(size);
            session.track(&result);
            return result;
        }
        let gray = image::imageops::grayscale(&*frame);
        let pattern = session.pattern();

        let result = match GrayImageView::new(size.width as usize, size.height as usize, gray.as_raw())
            .and_then(|view| {
                let corners = session.backend().detect_pattern(&view, pattern)?;
                Some(if self.config.refine {
                    session.backend().refine(&view, &corners)
                } else {
                    corners
                })
            }) {
            Some(corners) => {
                let clean = frame.clone();
                draw_corners(frame, &corners, pattern.columns() as usize, 1);
                DetectionResult {
                    found: true,
                    corners,
                    frame_size: size,
                    clean_frame: Some(clean),
                }
            }
            None => DetectionResult::not_found(size),
        };
        session.track(&result);

        if result.found {
            self.draw_virtual_object(session, frame, &result.corners);
        }
        self.draw_status(session, frame, result.found);
        result
    }

    fn draw_virtual_object<B: VisionBackend>(
        &self,
        session: &CalibrationSession<B>,
        frame: &mut RgbImage,
        corners: &[Point2<f64>],
    ) {
        let Some(pose) = session.pose_for(corners) else {
            return;
        };
        let thickness = self.config.line_thickness;
        match self.config.overlay {
            OverlayKind::Axes => {
                if let Some(projected) = session.project(&axes_points(), &pose) {
                    draw_axes(frame, &projected, thickness);
                }
            }
            OverlayKind::Pyramid => {
                if let Some(projected) = session.project(&pyramid_points(session.pattern()), &pose) {
                    draw_pyramid(frame, &projected, thickness);
                }
            }
        }
    }

    /// First line top-left, progress line top-right (below the first when
    /// the frame is too narrow), hint lines underneath.
    fn draw_status<B: VisionBackend>(&self, session: &CalibrationSession<B>, frame: &mut RgbImage, found: bool) {
        let scale = self.config.text_scale.max(1);
        let margin = 10;
        let line_gap = (text_height(scale) + 2 * scale) as i32;
        let mut next_row = 1;
        for (k, (text, color)) in status_lines(session, found).iter().enumerate() {
            let (x, y) = if k == 0 {
                (margin, margin)
            } else {
                let right = frame.width() as i32 - margin - text_width(text, scale) as i32;
                if k == 1 && right >= margin {
                    (right, margin)
                } else {
                    next_row += 1;
                    (margin, margin + line_gap * (next_row - 1))
                }
            };
            draw_text(frame, x, y, scale, *color, text);
        }
    }
}
