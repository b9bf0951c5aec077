use nalgebra::{Matrix3, Point2, Point3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(thiserror::Error, Debug)]
pub enum CameraIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Which detection a recorded observation came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameUsed {
    /// The frame being shown when the save was requested.
    Current,
    /// The most recent earlier frame in which the pattern was found.
    LastGood,
}

/// One accepted set of corner correspondences.
#[derive(Clone, Debug)]
pub struct Observation {
    pub image_points: Vec<Point2<f64>>,
    pub world_points: Vec<Point3<f64>>,
    /// Clean RGB frame the corners were found on, interleaved `width * height * 3`.
    pub source_frame: Vec<u8>,
    pub frame_size: ImageSize,
    pub source: FrameUsed,
}

/// Radial-tangential (Brown-Conrady) coefficients in the `k1, k2, p1, p2, k3` order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl Distortion {
    pub fn to_array(&self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    pub fn from_array(v: [f64; 5]) -> Self {
        Self {
            k1: v[0],
            k2: v[1],
            p1: v[2],
            p2: v[3],
            k3: v[4],
        }
    }
}

/// Result of a successful calibration.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraModel {
    pub intrinsics: Matrix3<f64>,
    pub distortion: Distortion,
    /// RMS reprojection error over all observations, in pixels.
    pub fit_error: f64,
    pub image_size: ImageSize,
}

impl CameraModel {
    pub fn fx(&self) -> f64 {
        self.intrinsics[(0, 0)]
    }

    pub fn fy(&self) -> f64 {
        self.intrinsics[(1, 1)]
    }

    pub fn cx(&self) -> f64 {
        self.intrinsics[(0, 2)]
    }

    pub fn cy(&self) -> f64 {
        self.intrinsics[(1, 2)]
    }

    /// Serializable snapshot of the model.
    pub fn to_params(&self) -> CameraParams {
        let k = &self.intrinsics;
        CameraParams {
            image_width: self.image_size.width,
            image_height: self.image_size.height,
            camera_matrix: [
                [k[(0, 0)], k[(0, 1)], k[(0, 2)]],
                [k[(1, 0)], k[(1, 1)], k[(1, 2)]],
                [k[(2, 0)], k[(2, 1)], k[(2, 2)]],
            ],
            distortion_coefficients: self.distortion.to_array(),
            reprojection_error: self.fit_error,
        }
    }
}

/// On-disk JSON layout of a calibrated camera.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraParams {
    pub image_width: u32,
    pub image_height: u32,
    pub camera_matrix: [[f64; 3]; 3],
    pub distortion_coefficients: [f64; 5],
    pub reprojection_error: f64,
}

impl CameraParams {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CameraIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CameraIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn into_model(self) -> CameraModel {
        let m = self.camera_matrix;
        CameraModel {
            intrinsics: Matrix3::new(
                m[0][0], m[0][1], m[0][2], //
                m[1][0], m[1][1], m[1][2], //
                m[2][0], m[2][1], m[2][2],
            ),
            distortion: Distortion::from_array(self.distortion_coefficients),
            fit_error: self.reprojection_error,
            image_size: ImageSize::new(self.image_width, self.image_height),
        }
    }
}

/// Board-to-camera rigid transform: `X_cam = R(rotation) * X_board + translation`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Rodrigues (axis * angle) rotation vector.
    pub rotation: Vector3<f64>,
    pub translation: Vector3<f64>,
}

impl Pose {
    pub fn new(rotation: Vector3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    pub fn from_rotation(rotation: &Rotation3<f64>, translation: Vector3<f64>) -> Self {
        Self::new(rotation.scaled_axis(), translation)
    }

    pub fn rotation_matrix(&self) -> Rotation3<f64> {
        Rotation3::new(self.rotation)
    }

    pub fn transform_point(&self, p: &Point3<f64>) -> Point3<f64> {
        self.rotation_matrix() * p + self.translation
    }

    pub fn is_finite(&self) -> bool {
        self.rotation.iter().chain(self.translation.iter()).all(|v| v.is_finite())
    }
}
