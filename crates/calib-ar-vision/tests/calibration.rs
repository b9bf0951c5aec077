use approx::assert_relative_eq;
use calib_ar_core::{CameraModel, Distortion, ImageSize, PatternSpec, Pose, VisionBackend};
use calib_ar_vision::{project_points, NativeBackend};
use nalgebra::{Matrix3, Point2, Point3, Rotation3, Vector3};

fn truth(distortion: Distortion) -> CameraModel {
    CameraModel {
        intrinsics: Matrix3::new(800.0, 0.0, 320.0, 0.0, 800.0, 240.0, 0.0, 0.0, 1.0),
        distortion,
        fit_error: 0.0,
        image_size: ImageSize::new(640, 480),
    }
}

/// Poses looking at the centre of a 9x6 board from about 15 units away.
fn poses() -> Vec<Pose> {
    let centre = Vector3::new(4.0, -2.5, 0.0);
    [
        Vector3::new(0.3, 0.0, 0.0),
        Vector3::new(0.0, 0.3, 0.0),
        Vector3::new(-0.25, 0.2, 0.1),
        Vector3::new(0.2, -0.3, -0.1),
        Vector3::new(0.1, 0.15, 0.4),
        Vector3::new(-0.2, -0.2, -0.3),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, rvec)| {
        let rot = Rotation3::new(rvec);
        let t = Vector3::new(0.3 * i as f64 - 0.8, 0.2, 15.0) - rot * centre;
        Pose::new(rvec, t)
    })
    .collect()
}

fn views(camera: &CameraModel) -> (Vec<Vec<Point3<f64>>>, Vec<Vec<Point2<f64>>>) {
    let world = PatternSpec::new(9, 6).unwrap().world_points();
    let image: Vec<Vec<Point2<f64>>> = poses()
        .iter()
        .map(|pose| project_points(&world, pose, camera))
        .collect();
    (vec![world; image.len()], image)
}

#[test]
fn recovers_pinhole_intrinsics() {
    let cam = truth(Distortion::default());
    let (world, image) = views(&cam);
    let backend = NativeBackend::default();

    let model = backend.calibrate(&world, &image, cam.image_size).expect("calibrate");
    assert!(model.fit_error < 0.01, "rms {}", model.fit_error);
    assert!((model.fx() - 800.0).abs() < 2.0, "fx {}", model.fx());
    assert!((model.fy() - 800.0).abs() < 2.0, "fy {}", model.fy());
    assert!((model.cx() - 320.0).abs() < 2.0, "cx {}", model.cx());
    assert!((model.cy() - 240.0).abs() < 2.0, "cy {}", model.cy());
    assert_eq!(0.0, model.intrinsics[(0, 1)]);
    assert_eq!(cam.image_size, model.image_size);
}

#[test]
fn recovers_radial_distortion() {
    let cam = truth(Distortion {
        k1: -0.05,
        ..Distortion::default()
    });
    let (world, image) = views(&cam);
    let backend = NativeBackend::default();

    let model = backend.calibrate(&world, &image, cam.image_size).expect("calibrate");
    assert!(model.fit_error < 0.01, "rms {}", model.fit_error);
    assert!((model.fx() - 800.0).abs() < 2.0, "fx {}", model.fx());
    assert!((model.distortion.k1 + 0.05).abs() < 0.02, "k1 {}", model.distortion.k1);
}

#[test]
fn pose_of_calibrated_camera_reprojects() {
    let cam = truth(Distortion::default());
    let (world, image) = views(&cam);
    let backend = NativeBackend::default();
    let model = backend.calibrate(&world, &image, cam.image_size).expect("calibrate");

    let pose = backend.solve_pose(&world[2], &image[2], &model).expect("pose");
    assert!(pose.is_finite());
    let reproj = backend.project(&world[2], &pose, &model);
    for (a, b) in reproj.iter().zip(&image[2]) {
        assert!((a - b).norm() < 0.05, "{a} vs {b}");
    }
    assert_relative_eq!(pose.translation, poses()[2].translation, epsilon = 0.05);
}
