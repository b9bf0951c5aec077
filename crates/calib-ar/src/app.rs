//! Interactive controller and the non-interactive batch driver.

use crate::config::{AppConfig, ConfigError};
use crate::display::{Command, Display, DisplayError};
use crate::export::{export_session, ExportReport};
use crate::pipeline::{DetectionResult, FramePipeline};
use crate::playback::{Playback, PlaybackState};
use crate::session::{CalibrationSession, SessionError, MIN_CALIBRATION_FRAMES};
use crate::source::{FrameSource, ImageSequence, SourceError};
use calib_ar_core::{CameraModel, FrameUsed, VisionBackend};
use calib_ar_vision::{HarrisError, NativeBackend};
use image::RgbImage;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Display(#[from] DisplayError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Harris(#[from] HarrisError),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Whether the frame loop keeps going after a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

fn print_model(model: &CameraModel) {
    println!("Calibration complete. Reprojection error: {}", model.fit_error);
    println!("Camera matrix:");
    for r in 0..3 {
        let row = model.intrinsics.row(r);
        println!("  [{:12.4} {:12.4} {:12.4}]", row[0], row[1], row[2]);
    }
    let d = model.distortion.to_array();
    println!(
        "Distortion coefficients: [{}, {}, {}, {}, {}]",
        d[0], d[1], d[2], d[3], d[4]
    );
}

fn calibrate_and_report<B: VisionBackend>(session: &mut CalibrationSession<B>) {
    println!("Calibrating camera...");
    match session.calibrate() {
        Ok(model) => print_model(model),
        Err(SessionError::InsufficientData { have, need }) => {
            log::warn!("Need {} more frames before calibration", need - have);
        }
        Err(e) => log::error!("{e}"),
    }
}

/// Export when anything was recorded, otherwise say so.
pub fn finish_session<B: VisionBackend>(
    session: &CalibrationSession<B>,
    output_dir: &Path,
) -> Option<ExportReport> {
    if session.observation_count() == 0 {
        println!("No frames were saved during this session.");
        return None;
    }
    println!("Saving calibration data...");
    let report = export_session(output_dir, session);
    println!("Calibration session summary:");
    println!("- Total frames saved: {}", session.observation_count());
    println!("- Data location: {}", output_dir.display());
    if !report.is_complete() {
        println!("- {} artifacts could not be written", report.failures.len());
    }
    Some(report)
}

/// Owns the session, pipeline and playback of an interactive run and
/// implements the key semantics.
pub struct Controller<B = NativeBackend> {
    session: CalibrationSession<B>,
    pipeline: FramePipeline,
    playback: Playback,
    last: Option<DetectionResult>,
    output_dir: PathBuf,
}

impl<B: VisionBackend> Controller<B> {
    pub fn new(
        session: CalibrationSession<B>,
        pipeline: FramePipeline,
        playback: Playback,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            session,
            pipeline,
            playback,
            last: None,
            output_dir: output_dir.into(),
        }
    }

    pub fn session(&self) -> &CalibrationSession<B> {
        &self.session
    }

    pub fn playback(&self) -> &Playback {
        &self.playback
    }

    /// Pull and annotate the next frame; `None` at the end of the source.
    pub fn process_next(&mut self) -> Result<Option<RgbImage>, SourceError> {
        let Some(mut frame) = self.playback.tick()? else {
            return Ok(None);
        };
        let result = self.pipeline.process(&mut self.session, &mut frame);
        self.last = Some(result);
        Ok(Some(frame))
    }

    pub fn handle(&mut self, command: Command) -> Result<Flow, SourceError> {
        match command {
            Command::Quit => return Ok(Flow::Exit),
            Command::Save => self.save(),
            Command::Calibrate => calibrate_and_report(&mut self.session),
            Command::TogglePause => {
                if self.playback.is_video() {
                    match self.playback.toggle_pause() {
                        PlaybackState::Paused => println!("Video paused"),
                        PlaybackState::Playing => println!("Video resumed"),
                    }
                }
            }
            Command::StepForward => {
                if self.playback.step_forward()? {
                    log::debug!("stepped to frame {}", self.playback.position());
                }
            }
            Command::StepBackward => {
                if self.playback.step_backward()? {
                    log::debug!("stepped to frame {}", self.playback.position());
                }
            }
        }
        Ok(Flow::Continue)
    }

    fn save(&mut self) {
        let Some(result) = &self.last else {
            log::warn!("No chessboard detected in current frame");
            return;
        };
        match self.session.record_observation(result) {
            Ok(used) => {
                let which = match used {
                    FrameUsed::Current => "current",
                    FrameUsed::LastGood => "last successful",
                };
                println!(
                    "Saved frame {} (using {} detection)",
                    self.session.observation_count(),
                    which
                );
                if !self.session.is_calibrated() {
                    match self.session.remaining_for_calibration() {
                        0 => println!("You can now press 'c' to calibrate"),
                        k => println!("Need {k} more frames before calibration"),
                    }
                }
            }
            Err(e) => log::warn!("{e}"),
        }
    }

    /// Show frames and dispatch commands until quit or the end of the source.
    pub fn run(&mut self, display: &mut dyn Display) -> Result<(), AppError> {
        while display.is_open() {
            let Some(frame) = self.process_next()? else {
                println!("End of {}", self.playback.source_name());
                break;
            };
            display.show(&frame)?;
            if let Some(command) = display.poll(self.playback.poll_wait()) {
                if self.handle(command)? == Flow::Exit {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Export the session (or report that nothing was saved).
    pub fn finish(&self) -> Option<ExportReport> {
        finish_session(&self.session, &self.output_dir)
    }
}

/// Process every frame of an image directory, record each detection,
/// calibrate when enough were found and export.
pub fn run_batch(
    dir: impl AsRef<Path>,
    config: &AppConfig,
) -> Result<Option<ExportReport>, AppError> {
    let mut source = ImageSequence::open(dir)?;
    let backend = NativeBackend::new(config.detector.clone());
    let mut session = CalibrationSession::new(config.pattern, backend);
    let pipeline = FramePipeline::new(config.pipeline.clone());

    while let Some(mut frame) = source.next_frame()? {
        let result = pipeline.process(&mut session, &mut frame);
        let index = source.position();
        if result.found {
            match session.record_observation(&result) {
                Ok(_) => println!("Frame {index}: chessboard detected"),
                Err(e) => log::error!("frame {index}: {e}"),
            }
        } else {
            println!("Frame {index}: no chessboard detected");
        }
    }

    if session.observation_count() >= MIN_CALIBRATION_FRAMES {
        calibrate_and_report(&mut session);
    } else if session.observation_count() > 0 {
        println!(
            "Need {} more frames before calibration",
            session.remaining_for_calibration()
        );
    }
    Ok(finish_session(&session, &config.output_dir))
}
