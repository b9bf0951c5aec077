//! Showing frames and reading user commands.

use image::RgbImage;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

/// A user request, independent of the key or console word that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Save,
    Calibrate,
    Quit,
    TogglePause,
    StepForward,
    StepBackward,
}

impl Command {
    /// Parse a console word: `s`, `c`, `q`/`esc`, `p`/`space`, `left`/`[`,
    /// `right`/`]`.
    pub fn parse(word: &str) -> Option<Self> {
        match word.trim().to_ascii_lowercase().as_str() {
            "s" | "save" => Some(Self::Save),
            "c" | "calibrate" => Some(Self::Calibrate),
            "q" | "quit" | "esc" | "escape" => Some(Self::Quit),
            "p" | "space" | "pause" => Some(Self::TogglePause),
            "right" | "]" | "next" => Some(Self::StepForward),
            "left" | "[" | "prev" => Some(Self::StepBackward),
            _ => None,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DisplayError {
    #[error("failed to write preview: {0}")]
    Preview(#[from] image::ImageError),

    #[error("window error: {0}")]
    Window(String),
}

pub trait Display {
    fn show(&mut self, frame: &RgbImage) -> Result<(), DisplayError>;

    /// Wait up to `wait` (forever when `None`) for the next command.
    fn poll(&mut self, wait: Option<Duration>) -> Option<Command>;

    fn is_open(&self) -> bool;
}

/// Reads commands typed on stdin; optionally writes every shown frame to a
/// preview PNG. Closing stdin quits.
pub struct ConsoleDisplay {
    commands: Receiver<Command>,
    preview: Option<PathBuf>,
    open: bool,
}

impl ConsoleDisplay {
    pub fn new(preview: Option<PathBuf>) -> Self {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut line = String::new();
            loop {
                line.clear();
                match std::io::stdin().read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => match Command::parse(&line) {
                        Some(cmd) => {
                            if tx.send(cmd).is_err() {
                                break;
                            }
                        }
                        None if line.trim().is_empty() => {}
                        None => log::warn!("unknown command `{}`", line.trim()),
                    },
                }
            }
        });
        println!("Commands: s = save, c = calibrate, p = play/pause, [ / ] = step, q = quit");
        Self {
            commands: rx,
            preview,
            open: true,
        }
    }
}

impl Display for ConsoleDisplay {
    fn show(&mut self, frame: &RgbImage) -> Result<(), DisplayError> {
        if let Some(path) = &self.preview {
            frame.save(path)?;
        }
        Ok(())
    }

    fn poll(&mut self, wait: Option<Duration>) -> Option<Command> {
        if !self.open {
            return Some(Command::Quit);
        }
        let received = match wait {
            Some(timeout) => self.commands.recv_timeout(timeout),
            None => self
                .commands
                .recv()
                .map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(cmd) => Some(cmd),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                self.open = false;
                Some(Command::Quit)
            }
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

#[cfg(feature = "gui")]
mod window {
    use super::{Command, Display, DisplayError};
    use image::RgbImage;
    use minifb::{Key, KeyRepeat, Window, WindowOptions};
    use std::time::{Duration, Instant};

    const IDLE_SLEEP: Duration = Duration::from_millis(10);

    /// Native window through `minifb`. Keys: `s`, `c`, `Escape`, `Space`,
    /// `Left`, `Right`.
    pub struct WindowDisplay {
        title: String,
        window: Option<Window>,
        buffer: Vec<u32>,
        size: (usize, usize),
    }

    impl WindowDisplay {
        pub fn new(title: impl Into<String>) -> Self {
            Self {
                title: title.into(),
                window: None,
                buffer: Vec::new(),
                size: (0, 0),
            }
        }

        fn command_from_keys(window: &Window) -> Option<Command> {
            window
                .get_keys_pressed(KeyRepeat::No)
                .into_iter()
                .find_map(|key| match key {
                    Key::S => Some(Command::Save),
                    Key::C => Some(Command::Calibrate),
                    Key::Escape => Some(Command::Quit),
                    Key::Space => Some(Command::TogglePause),
                    Key::Right => Some(Command::StepForward),
                    Key::Left => Some(Command::StepBackward),
                    _ => None,
                })
        }
    }

    impl Display for WindowDisplay {
        fn show(&mut self, frame: &RgbImage) -> Result<(), DisplayError> {
            let size = (frame.width() as usize, frame.height() as usize);
            if self.window.is_none() || self.size != size {
                let window = Window::new(&self.title, size.0, size.1, WindowOptions::default())
                    .map_err(|e| DisplayError::Window(e.to_string()))?;
                self.window = Some(window);
                self.size = size;
            }
            self.buffer.clear();
            self.buffer.extend(
                frame
                    .pixels()
                    .map(|p| (u32::from(p[0]) << 16) | (u32::from(p[1]) << 8) | u32::from(p[2])),
            );
            if let Some(window) = self.window.as_mut() {
                window
                    .update_with_buffer(&self.buffer, size.0, size.1)
                    .map_err(|e| DisplayError::Window(e.to_string()))?;
            }
            Ok(())
        }

        fn poll(&mut self, wait: Option<Duration>) -> Option<Command> {
            let deadline = wait.map(|w| Instant::now() + w);
            loop {
                let window = self.window.as_mut()?;
                if !window.is_open() {
                    return Some(Command::Quit);
                }
                window.update();
                if let Some(cmd) = Self::command_from_keys(window) {
                    return Some(cmd);
                }
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    return None;
                }
                std::thread::sleep(IDLE_SLEEP);
            }
        }

        fn is_open(&self) -> bool {
            self.window.as_ref().is_none_or(Window::is_open)
        }
    }
}

#[cfg(feature = "gui")]
pub use window::WindowDisplay;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_words_map_to_commands() {
        assert_eq!(Some(Command::Save), Command::parse("S\n"));
        assert_eq!(Some(Command::Calibrate), Command::parse("c"));
        assert_eq!(Some(Command::Quit), Command::parse("esc"));
        assert_eq!(Some(Command::TogglePause), Command::parse(" space "));
        assert_eq!(Some(Command::StepBackward), Command::parse("["));
        assert_eq!(Some(Command::StepForward), Command::parse("right"));
        assert_eq!(None, Command::parse("x"));
        assert_eq!(None, Command::parse(""));
    }
}
