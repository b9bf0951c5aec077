mod common;

use calib_ar::core::PatternSpec;
use calib_ar::vision::NativeBackend;
use calib_ar::{
    annotate_harris, status_lines, CalibrationSession, FramePipeline, PipelineConfig, GREEN, RED,
};
use approx::assert_abs_diff_eq;
use common::{board_homography, render_board};
use image::RgbImage;
use nalgebra::Point2;

#[test]
fn native_pipeline_finds_rendered_board() {
    let mut session = CalibrationSession::new(PatternSpec::default(), NativeBackend::default());
    let pipeline = FramePipeline::new(PipelineConfig::default());

    let mut frame = render_board();
    let result = pipeline.process(&mut session, &mut frame);
    assert!(result.found);
    assert_eq!(54, result.corners.len());
    assert_eq!(Some(&render_board()), result.clean_frame.as_ref());
    assert!(session.has_last_good());

    let h = board_homography();
    for (k, got) in result.corners.iter().enumerate() {
        let expected = h.apply(Point2::new((k % 9 + 1) as f64, (k / 9 + 1) as f64));
        assert_abs_diff_eq!(expected.x, got.x, epsilon = 0.25);
        assert_abs_diff_eq!(expected.y, got.y, epsilon = 0.25);
    }

    // corner markers and status text are drawn in color on a gray frame
    assert!(frame.pixels().any(|p| p[0] != p[1] || p[1] != p[2]));

    let lines = status_lines(&session, true);
    assert_eq!(("DETECTED - PRESS S TO SAVE".to_string(), GREEN), lines[0]);
    assert_eq!("SAVED FRAMES: 0 (NEED 5 MORE)", lines[1].0);
}

#[test]
fn status_reports_missing_board_and_saved_fallback() {
    let mut session = CalibrationSession::new(PatternSpec::default(), NativeBackend::default());
    let pipeline = FramePipeline::new(PipelineConfig::default());

    let mut frame = render_board();
    let result = pipeline.process(&mut session, &mut frame);
    session.record_observation(&result).unwrap();

    let lines = status_lines(&session, false);
    assert_eq!(("NO CHESSBOARD DETECTED".to_string(), RED), lines[0]);
    assert_eq!("SAVED FRAMES: 1 (NEED 4 MORE)", lines[1].0);
    assert_eq!("LAST SUCCESSFUL FRAME AVAILABLE", lines[2].0);
}

#[test]
fn zero_sized_frames_are_reported_as_not_found() {
    let mut session = CalibrationSession::new(PatternSpec::default(), NativeBackend::default());
    let pipeline = FramePipeline::new(PipelineConfig::default());

    for (w, h) in [(0, 0), (0, 48), (64, 0)] {
        let mut frame = RgbImage::new(w, h);
        let result = pipeline.process(&mut session, &mut frame);
        assert!(!result.found, "{w}x{h}");
        assert!(result.corners.is_empty());
        assert!(result.clean_frame.is_none());
        assert_eq!((w, h), (result.frame_size.width, result.frame_size.height));
    }
    assert!(!session.has_last_good());
}

#[test]
fn harris_marks_board_corners() {
    let mut frame = render_board();
    let n = annotate_harris(&mut frame, &Default::default()).unwrap();
    assert!(n > 0);
    assert!(frame.pixels().any(|p| p[0] == 255 && p[1] == 0 && p[2] == 0));
}
