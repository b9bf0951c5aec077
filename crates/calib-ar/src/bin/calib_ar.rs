//! calib-ar CLI: chessboard camera calibration with an AR overlay.

use calib_ar::vision::NativeBackend;
use calib_ar::{
    annotate_harris, run_batch, AppConfig, AppError, CalibrationSession, ConsoleDisplay,
    Controller, Display, FramePipeline, FrameSource, ImageSequence, OverlayKind, Playback,
    StillImage,
};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "calib-ar")]
#[command(about = "Calibrate a camera from chessboard views and draw a virtual object on the board")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Inner-corner grid as COLUMNSxROWS.
    #[arg(long, global = true)]
    pattern: Option<String>,

    /// Directory for exported calibration data.
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Virtual object drawn once the camera is calibrated (pyramid or axes).
    #[arg(long, global = true)]
    overlay: Option<OverlayKind>,

    /// JSON configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write every annotated frame to this PNG (console display).
    #[arg(long, global = true)]
    preview: Option<PathBuf>,

    /// Read commands from stdin even when a window display is available.
    #[arg(long, global = true)]
    console: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Subcommand)]
enum Commands {
    /// Calibrate from a single still image.
    Image {
        path: PathBuf,
    },

    /// Play a directory of frames as a video.
    Video {
        dir: PathBuf,
    },

    /// Use a live camera.
    Camera {
        #[arg(long, default_value_t = 0)]
        index: u32,
    },

    /// Record every detection in a directory, calibrate and export.
    Batch {
        dir: PathBuf,
    },

    /// Mark Harris corners in an image.
    Harris {
        path: PathBuf,

        #[arg(long)]
        threshold: Option<f32>,

        #[arg(long)]
        block_size: Option<u32>,

        #[arg(long)]
        aperture: Option<u32>,

        /// Annotated output image.
        #[arg(long, default_value = "harris_corners.png")]
        out: PathBuf,
    },
}

fn init_logging(verbose: u8) {
    #[cfg(feature = "tracing")]
    {
        let _ = tracing_log::LogTracer::init();
        calib_ar::core::init_tracing(false, calib_ar::core::level_from_verbosity(verbose));
    }
    #[cfg(not(feature = "tracing"))]
    {
        let _ = calib_ar::core::init_with_level(calib_ar::core::level_from_verbosity(verbose));
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig, AppError> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(pattern) = &cli.pattern {
        config = config.with_pattern(pattern)?;
    }
    if let Some(output) = &cli.output {
        config.output_dir = output.clone();
    }
    if let Some(overlay) = cli.overlay {
        config = config.with_overlay(overlay);
    }
    Ok(config)
}

fn prompt(question: &str) -> Option<String> {
    print!("{question}");
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_string()),
    }
}

/// Ask for an input mode when no subcommand was given.
fn choose_source() -> Option<Commands> {
    println!("Select input source:");
    println!("1. Image file");
    println!("2. Video (directory of frames)");
    println!("3. Camera");
    match prompt("Enter choice (1-3): ")?.as_str() {
        "1" => prompt("Enter image path: ").map(|p| Commands::Image { path: p.into() }),
        "2" => prompt("Enter frame directory: ").map(|p| Commands::Video { dir: p.into() }),
        "3" => Some(Commands::Camera { index: 0 }),
        other => {
            log::error!("invalid choice '{other}'");
            None
        }
    }
}

fn make_display(cli: &Cli) -> Box<dyn Display> {
    #[cfg(not(feature = "gui"))]
    let _ = cli.console;
    #[cfg(feature = "gui")]
    if !cli.console {
        return Box::new(calib_ar::WindowDisplay::new("Camera Calibration"));
    }
    Box::new(ConsoleDisplay::new(cli.preview.clone()))
}

fn open_camera(index: u32) -> Result<Box<dyn FrameSource>, AppError> {
    #[cfg(feature = "camera")]
    {
        Ok(Box::new(calib_ar::CameraSource::open(index)?))
    }
    #[cfg(not(feature = "camera"))]
    {
        Err(calib_ar::SourceError::Unavailable {
            source_name: format!("camera {index}"),
            reason: "built without the `camera` feature".to_string(),
        }
        .into())
    }
}

fn run_interactive(cli: &Cli, config: &AppConfig, source: Box<dyn FrameSource>) -> Result<(), AppError> {
    let backend = NativeBackend::new(config.detector.clone());
    let session = CalibrationSession::new(config.pattern, backend);
    let pipeline = FramePipeline::new(config.pipeline.clone());
    let mut controller = Controller::new(session, pipeline, Playback::new(source), &config.output_dir);

    println!("Press 's' to save a frame, 'c' to calibrate, ESC to quit");
    if controller.playback().is_video() {
        println!("Space ('p' on the console) pauses, Left/Right ('['/']') step while paused");
    }
    let mut display = make_display(cli);
    let outcome = controller.run(display.as_mut());
    controller.finish();
    outcome
}

fn run_harris(path: &Path, config: &AppConfig, out: &Path) -> Result<(), AppError> {
    let mut frame = image::open(path)?.to_rgb8();
    let n = annotate_harris(&mut frame, &config.harris)?;
    frame.save(out)?;
    println!("Detected {n} corners, wrote {}", out.display());
    Ok(())
}

fn run(cli: &Cli) -> Result<(), AppError> {
    let mut config = load_config(cli)?;

    let command = match cli.command.clone() {
        Some(command) => command,
        None => match choose_source() {
            Some(command) => command,
            None => return Ok(()),
        },
    };

    match command {
        Commands::Image { path } => {
            let source = StillImage::open(&path)?;
            run_interactive(cli, &config, Box::new(source))
        }
        Commands::Video { dir } => {
            let source = ImageSequence::open(&dir)?;
            run_interactive(cli, &config, Box::new(source))
        }
        Commands::Camera { index } => {
            let source = open_camera(index)?;
            run_interactive(cli, &config, source)
        }
        Commands::Batch { dir } => run_batch(&dir, &config).map(|_| ()),
        Commands::Harris {
            path,
            threshold,
            block_size,
            aperture,
            out,
        } => {
            if let Some(t) = threshold {
                config.harris.threshold = t;
            }
            if let Some(b) = block_size {
                config.harris.block_size = b;
            }
            if let Some(a) = aperture {
                config.harris.aperture = a;
            }
            run_harris(&path, &config, &out)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
