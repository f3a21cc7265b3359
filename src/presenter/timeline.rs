//! A clock-driven [`PlaybackEngine`] for the scene clip.
//!
//! Tracks position, rate, loop count and play state against the clip's
//! configured duration; the UI draws the scene from the presenter snapshot.
//! Forward playback pauses itself at the end and reports end-of-media.
//! Reverse playback clamps at zero and keeps "playing", like real engines
//! do, so the presenter has to stop it explicitly.

use std::path::Path;
use std::time::Duration;

use super::scene::{EngineEvent, PlaybackEngine, PlaybackError, PlaybackState};

pub struct TimelineEngine {
    duration_ms: u64,
    supports_reverse: bool,
    loaded: bool,
    position_ms: u64,
    rate: f32,
    loops: u32,
    loops_left: u32,
    state: PlaybackState,
    pending: Vec<EngineEvent>,
}

impl TimelineEngine {
    pub fn new(duration_ms: u64, supports_reverse: bool) -> Self {
        Self {
            duration_ms,
            supports_reverse,
            loaded: false,
            position_ms: 0,
            rate: 1.0,
            loops: 1,
            loops_left: 1,
            state: PlaybackState::Stopped,
            pending: Vec::new(),
        }
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }
}

impl PlaybackEngine for TimelineEngine {
    fn load(&mut self, clip: &Path) -> Result<(), PlaybackError> {
        if !clip.is_file() {
            return Err(PlaybackError::Load(format!("{} not found", clip.display())));
        }
        if self.duration_ms == 0 {
            return Err(PlaybackError::Load(format!(
                "{} has no duration",
                clip.display()
            )));
        }
        self.loaded = true;
        self.position_ms = 0;
        self.state = PlaybackState::Stopped;
        self.pending.clear();
        Ok(())
    }

    fn play(&mut self) {
        if !self.loaded || self.state == PlaybackState::Playing {
            return;
        }
        self.state = PlaybackState::Playing;
        self.loops_left = self.loops.max(1);
        self.pending
            .push(EngineEvent::StateChanged(PlaybackState::Playing));
    }

    fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
            self.pending
                .push(EngineEvent::StateChanged(PlaybackState::Paused));
        }
    }

    fn stop(&mut self) {
        if self.state != PlaybackState::Stopped {
            self.state = PlaybackState::Stopped;
            self.position_ms = 0;
            self.pending
                .push(EngineEvent::StateChanged(PlaybackState::Stopped));
        }
    }

    fn set_position(&mut self, ms: u64) {
        self.position_ms = ms.min(self.duration_ms);
        self.pending.push(EngineEvent::Position(self.position_ms));
    }

    fn position(&self) -> u64 {
        self.position_ms
    }

    fn duration(&self) -> u64 {
        self.duration_ms
    }

    fn set_loops(&mut self, loops: u32) {
        self.loops = loops;
    }

    fn set_rate(&mut self, rate: f32) -> bool {
        if rate == 0.0 || (rate < 0.0 && !self.supports_reverse) {
            return false;
        }
        self.rate = rate;
        true
    }

    fn state(&self) -> PlaybackState {
        self.state
    }

    fn poll(&mut self, dt: Duration) -> Vec<EngineEvent> {
        let mut out = std::mem::take(&mut self.pending);
        if self.state != PlaybackState::Playing || dt.is_zero() {
            return out;
        }

        let delta = (dt.as_millis() as f32 * self.rate.abs()).round() as u64;
        if self.rate > 0.0 {
            let next = self.position_ms + delta;
            if next < self.duration_ms {
                self.position_ms = next;
                out.push(EngineEvent::Position(next));
            } else if self.loops_left > 1 {
                self.loops_left -= 1;
                self.position_ms = next - self.duration_ms;
                out.push(EngineEvent::Position(self.position_ms));
            } else {
                self.position_ms = self.duration_ms;
                self.state = PlaybackState::Paused;
                out.push(EngineEvent::Position(self.duration_ms));
                out.push(EngineEvent::StateChanged(PlaybackState::Paused));
                out.push(EngineEvent::EndOfMedia);
            }
        } else {
            self.position_ms = self.position_ms.saturating_sub(delta);
            out.push(EngineEvent::Position(self.position_ms));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded(duration: u64, reverse: bool) -> (TimelineEngine, tempfile::NamedTempFile) {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut engine = TimelineEngine::new(duration, reverse);
        engine.load(file.path()).unwrap();
        (engine, file)
    }

    #[test]
    fn forward_playback_ends_paused_with_end_of_media() {
        let (mut engine, _file) = loaded(300, true);
        engine.play();
        engine.poll(Duration::from_millis(200));
        let events = engine.poll(Duration::from_millis(200));
        assert_eq!(
            events,
            vec![
                EngineEvent::Position(300),
                EngineEvent::StateChanged(PlaybackState::Paused),
                EngineEvent::EndOfMedia,
            ]
        );
        assert_eq!(engine.state(), PlaybackState::Paused);
    }

    #[test]
    fn reverse_clamps_at_zero_and_keeps_playing() {
        let (mut engine, _file) = loaded(300, true);
        engine.set_position(100);
        assert!(engine.set_rate(-1.0));
        engine.play();
        engine.poll(Duration::from_millis(500));
        assert_eq!(engine.position(), 0);
        assert_eq!(engine.state(), PlaybackState::Playing);
    }

    #[test]
    fn negative_rate_rejected_without_support() {
        let (mut engine, _file) = loaded(300, false);
        assert!(!engine.set_rate(-1.0));
        assert_eq!(engine.rate(), 1.0);
    }

    #[test]
    fn missing_clip_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = TimelineEngine::new(300, true);
        assert!(engine.load(&dir.path().join("none.mp4")).is_err());
        engine.play();
        assert_eq!(engine.state(), PlaybackState::Stopped);
    }

    #[test]
    fn extra_loops_wrap_around() {
        let (mut engine, _file) = loaded(300, true);
        engine.set_loops(2);
        engine.play();
        engine.poll(Duration::from_millis(400));
        assert_eq!(engine.position(), 100);
        assert_eq!(engine.state(), PlaybackState::Playing);
    }
}
