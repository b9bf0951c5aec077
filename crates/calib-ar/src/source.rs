//! Frame sources: a still image, a directory of images played as video, and
//! (feature `camera`) a live camera.

use image::RgbImage;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("cannot open {source_name}: {reason}")]
    Unavailable { source_name: String, reason: String },

    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Anything that yields RGB frames one at a time.
pub trait FrameSource {
    /// Next frame in playback order; `None` once a finite source is exhausted.
    fn next_frame(&mut self) -> Result<Option<RgbImage>, SourceError>;

    /// The frame before the current one, clamped at the first frame.
    /// Live sources cannot rewind and return `None`.
    fn step_back(&mut self) -> Result<Option<RgbImage>, SourceError>;

    /// Index of the most recently returned frame.
    fn position(&self) -> usize;

    /// Number of frames, `None` for live sources.
    fn len(&self) -> Option<usize>;

    fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// A single repeated frame: no pacing needed between polls.
    fn is_still(&self) -> bool {
        false
    }

    fn name(&self) -> &str;
}

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

fn load_rgb(path: &Path) -> Result<RgbImage, SourceError> {
    image::open(path)
        .map(|img| img.to_rgb8())
        .map_err(|source| SourceError::Decode {
            path: path.to_path_buf(),
            source,
        })
}

/// One image, returned on every call.
pub struct StillImage {
    frame: RgbImage,
    name: String,
}

impl StillImage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let frame = image::open(path)
            .map_err(|e| SourceError::Unavailable {
                source_name: path.display().to_string(),
                reason: e.to_string(),
            })?
            .to_rgb8();
        Ok(Self::from_image(frame, path.display().to_string()))
    }

    pub fn from_image(frame: RgbImage, name: impl Into<String>) -> Self {
        Self {
            frame,
            name: name.into(),
        }
    }
}

impl FrameSource for StillImage {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, SourceError> {
        Ok(Some(self.frame.clone()))
    }

    fn step_back(&mut self) -> Result<Option<RgbImage>, SourceError> {
        Ok(Some(self.frame.clone()))
    }

    fn position(&self) -> usize {
        0
    }

    fn len(&self) -> Option<usize> {
        Some(1)
    }

    fn is_still(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Image files of a directory in lexicographic order, played like a video.
pub struct ImageSequence {
    paths: Vec<PathBuf>,
    cursor: Option<usize>,
    name: String,
}

impl ImageSequence {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, SourceError> {
        let dir = dir.as_ref();
        let unavailable = |reason: String| SourceError::Unavailable {
            source_name: dir.display().to_string(),
            reason,
        };
        let entries = std::fs::read_dir(dir).map_err(|e| unavailable(e.to_string()))?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            })
            .collect();
        if paths.is_empty() {
            return Err(unavailable("no png, jpg or bmp images found".to_string()));
        }
        paths.sort();
        log::debug!("image sequence {} with {} frames", dir.display(), paths.len());
        Ok(Self {
            paths,
            cursor: None,
            name: dir.display().to_string(),
        })
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    fn load(&mut self, index: usize) -> Result<Option<RgbImage>, SourceError> {
        let frame = load_rgb(&self.paths[index])?;
        self.cursor = Some(index);
        Ok(Some(frame))
    }
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, SourceError> {
        let next = self.cursor.map_or(0, |c| c + 1);
        if next >= self.paths.len() {
            return Ok(None);
        }
        self.load(next)
    }

    fn step_back(&mut self) -> Result<Option<RgbImage>, SourceError> {
        let prev = self.cursor.map_or(0, |c| c.saturating_sub(1));
        self.load(prev)
    }

    fn position(&self) -> usize {
        self.cursor.unwrap_or(0)
    }

    fn len(&self) -> Option<usize> {
        Some(self.paths.len())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(feature = "camera")]
mod camera {
    use super::{FrameSource, SourceError};
    use image::RgbImage;
    use nokhwa::pixel_format::RgbFormat;
    use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
    use nokhwa::Camera;

    /// Live camera through `nokhwa`; the stream stops on drop.
    pub struct CameraSource {
        camera: Camera,
        frames: usize,
        name: String,
    }

    impl CameraSource {
        pub fn open(index: u32) -> Result<Self, SourceError> {
            let name = format!("camera {index}");
            let unavailable = |e: nokhwa::NokhwaError| SourceError::Unavailable {
                source_name: name.clone(),
                reason: e.to_string(),
            };
            let requested =
                RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
            let mut camera = Camera::new(CameraIndex::Index(index), requested).map_err(unavailable)?;
            camera.open_stream().map_err(unavailable)?;
            log::info!("opened {} ({})", name, camera.info().human_name());
            Ok(Self {
                camera,
                frames: 0,
                name,
            })
        }
    }

    impl FrameSource for CameraSource {
        fn next_frame(&mut self) -> Result<Option<RgbImage>, SourceError> {
            let unavailable = |e: nokhwa::NokhwaError| SourceError::Unavailable {
                source_name: self.name.clone(),
                reason: e.to_string(),
            };
            let buffer = self.camera.frame().map_err(unavailable)?;
            let decoded = buffer.decode_image::<RgbFormat>().map_err(unavailable)?;
            let (width, height) = (decoded.width(), decoded.height());
            let frame = RgbImage::from_raw(width, height, decoded.into_raw()).ok_or_else(|| {
                SourceError::Unavailable {
                    source_name: self.name.clone(),
                    reason: format!("camera returned a truncated {width}x{height} frame"),
                }
            })?;
            self.frames += 1;
            Ok(Some(frame))
        }

        fn step_back(&mut self) -> Result<Option<RgbImage>, SourceError> {
            Ok(None)
        }

        fn position(&self) -> usize {
            self.frames.saturating_sub(1)
        }

        fn len(&self) -> Option<usize> {
            None
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    impl Drop for CameraSource {
        fn drop(&mut self) {
            if let Err(e) = self.camera.stop_stream() {
                log::warn!("failed to stop {}: {}", self.name, e);
            }
        }
    }
}

#[cfg(feature = "camera")]
pub use camera::CameraSource;
