mod common;

use calib_ar::core::{CameraParams, ImageSize, PatternSpec};
use calib_ar::{
    export_session, CalibrationSession, DetectionResult, CAMERA_FILE, CORNERS_FILE, POINTS_FILE,
    SUMMARY_FILE,
};
use common::{bright_frame, fake_corners, FakeBackend, FOCAL};
use std::fs;

fn session_with(frames: usize) -> CalibrationSession<FakeBackend> {
    let mut s = CalibrationSession::new(PatternSpec::default(), FakeBackend);
    let result = DetectionResult {
        found: true,
        corners: fake_corners(s.pattern()),
        frame_size: ImageSize::new(320, 240),
        clean_frame: Some(bright_frame()),
    };
    for _ in 0..frames {
        s.record_observation(&result).unwrap();
    }
    s
}

#[test]
fn export_writes_every_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("calibration_data");
    let mut s = session_with(5);
    s.calibrate().unwrap();

    let report = export_session(&out, &s);
    assert!(report.is_complete());
    assert_eq!(3 + 5 + 1, report.written.len());

    let summary = fs::read_to_string(out.join(SUMMARY_FILE)).unwrap();
    assert!(summary.contains("Number of frames,5\n"));
    assert!(summary.contains("Points per frame,54\n"));
    assert!(summary.contains("Total points,270\n"));

    let corners = fs::read_to_string(out.join(CORNERS_FILE)).unwrap();
    assert_eq!(1 + 5 * 54, corners.lines().count());
    let points = fs::read_to_string(out.join(POINTS_FILE)).unwrap();
    assert!(points.lines().any(|l| l == "4,53,8,-5,0"));

    let frame = image::open(out.join("frame_4.png")).unwrap().to_rgb8();
    assert_eq!(bright_frame(), frame);

    let params = CameraParams::load_json(out.join(CAMERA_FILE)).unwrap();
    assert_eq!(FOCAL, params.camera_matrix[0][0]);
    assert_eq!(0.125, params.reprojection_error);
}

#[test]
fn repeated_exports_are_identical() {
    let s = session_with(2);
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    export_session(a.path(), &s);
    export_session(b.path(), &s);

    for name in [CORNERS_FILE, POINTS_FILE, SUMMARY_FILE] {
        assert_eq!(
            fs::read(a.path().join(name)).unwrap(),
            fs::read(b.path().join(name)).unwrap(),
            "{name} differs"
        );
    }
    assert!(!a.path().join(CAMERA_FILE).exists());
}

#[test]
fn one_failed_artifact_does_not_block_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("frame_0.png")).unwrap();

    let s = session_with(2);
    let report = export_session(dir.path(), &s);
    assert!(!report.is_complete());
    assert_eq!(1, report.failures.len());
    assert_eq!("frame_0.png", report.failures[0].artifact);
    assert!(report.written.iter().any(|w| w == "frame_1.png"));
    assert!(dir.path().join(SUMMARY_FILE).exists());
    assert!(dir.path().join("frame_1.png").exists());
}
