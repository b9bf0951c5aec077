//! Play/pause state over a [`FrameSource`].

use crate::source::{FrameSource, SourceError};
use image::RgbImage;
use std::time::Duration;

/// Poll interval while frames advance on their own.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(30);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Paused,
}

/// Owns the source and the most recent raw frame.
pub struct Playback {
    source: Box<dyn FrameSource>,
    state: PlaybackState,
    current: Option<RgbImage>,
}

impl Playback {
    pub fn new(source: Box<dyn FrameSource>) -> Self {
        Self {
            source,
            state: PlaybackState::Playing,
            current: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.state == PlaybackState::Paused
    }

    /// Whether play/pause and stepping apply to this source.
    pub fn is_video(&self) -> bool {
        !self.source.is_still()
    }

    pub fn toggle_pause(&mut self) -> PlaybackState {
        self.state = match self.state {
            PlaybackState::Playing => PlaybackState::Paused,
            PlaybackState::Paused => PlaybackState::Playing,
        };
        self.state
    }

    /// How long to wait for input: a frame interval while playing, forever
    /// while paused or showing a still image.
    pub fn poll_wait(&self) -> Option<Duration> {
        if self.is_paused() || self.source.is_still() {
            None
        } else {
            Some(FRAME_INTERVAL)
        }
    }

    /// Raw frame to process on this tick: the next one while playing, the
    /// current one while paused. `None` at the end of the source.
    pub fn tick(&mut self) -> Result<Option<RgbImage>, SourceError> {
        if self.is_paused() || self.source.is_still() {
            if let Some(frame) = &self.current {
                return Ok(Some(frame.clone()));
            }
        }
        let next = self.source.next_frame()?;
        if let Some(frame) = &next {
            self.current = Some(frame.clone());
        }
        Ok(next)
    }

    /// Move one frame forward while paused, staying on the last frame at
    /// the end. Returns `false` when the request does not apply.
    pub fn step_forward(&mut self) -> Result<bool, SourceError> {
        if !self.is_paused() || !self.is_video() {
            return Ok(false);
        }
        if let Some(frame) = self.source.next_frame()? {
            self.current = Some(frame);
        }
        Ok(true)
    }

    /// Move one frame back while paused, clamped at the first frame.
    pub fn step_backward(&mut self) -> Result<bool, SourceError> {
        if !self.is_paused() || !self.is_video() {
            return Ok(false);
        }
        if let Some(frame) = self.source.step_back()? {
            self.current = Some(frame);
        }
        Ok(true)
    }

    pub fn position(&self) -> usize {
        self.source.position()
    }

    pub fn len(&self) -> Option<usize> {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// In-memory sequence of solid frames whose red channel is the index.
    struct Frames {
        len: usize,
        cursor: Option<usize>,
    }

    impl Frames {
        fn frame(i: usize) -> RgbImage {
            RgbImage::from_pixel(2, 2, image::Rgb([i as u8, 0, 0]))
        }
    }

    impl FrameSource for Frames {
        fn next_frame(&mut self) -> Result<Option<RgbImage>, SourceError> {
            let next = self.cursor.map_or(0, |c| c + 1);
            if next >= self.len {
                return Ok(None);
            }
            self.cursor = Some(next);
            Ok(Some(Self::frame(next)))
        }

        fn step_back(&mut self) -> Result<Option<RgbImage>, SourceError> {
            let prev = self.cursor.map_or(0, |c| c.saturating_sub(1));
            self.cursor = Some(prev);
            Ok(Some(Self::frame(prev)))
        }

        fn position(&self) -> usize {
            self.cursor.unwrap_or(0)
        }

        fn len(&self) -> Option<usize> {
            Some(self.len)
        }

        fn name(&self) -> &str {
            "frames"
        }
    }

    fn playback(len: usize) -> Playback {
        Playback::new(Box::new(Frames { len, cursor: None }))
    }

    fn red(frame: &RgbImage) -> u8 {
        frame.get_pixel(0, 0)[0]
    }

    #[test]
    fn playing_advances_until_the_end() {
        let mut p = playback(2);
        assert_eq!(Some(FRAME_INTERVAL), p.poll_wait());
        assert_eq!(0, red(&p.tick().unwrap().unwrap()));
        assert_eq!(1, red(&p.tick().unwrap().unwrap()));
        assert!(p.tick().unwrap().is_none());
    }

    #[test]
    fn paused_playback_repeats_the_current_frame() {
        let mut p = playback(3);
        p.tick().unwrap();
        assert_eq!(PlaybackState::Paused, p.toggle_pause());
        assert_eq!(None, p.poll_wait());
        assert_eq!(0, red(&p.tick().unwrap().unwrap()));
        assert_eq!(0, red(&p.tick().unwrap().unwrap()));
        assert_eq!(0, p.position());
    }

    #[test]
    fn step_backward_at_first_frame_clamps() {
        let mut p = playback(3);
        p.tick().unwrap();
        p.toggle_pause();
        assert!(p.step_backward().unwrap());
        assert_eq!(0, p.position());
        assert_eq!(0, red(&p.tick().unwrap().unwrap()));
    }

    #[test]
    fn step_forward_clamps_at_last_frame() {
        let mut p = playback(2);
        p.tick().unwrap();
        p.toggle_pause();
        assert!(p.step_forward().unwrap());
        assert!(p.step_forward().unwrap());
        assert_eq!(1, p.position());
        assert_eq!(1, red(&p.tick().unwrap().unwrap()));
    }

    #[test]
    fn stepping_requires_pause() {
        let mut p = playback(3);
        p.tick().unwrap();
        assert!(!p.step_forward().unwrap());
        assert!(!p.step_backward().unwrap());
        assert_eq!(0, p.position());
    }
}
