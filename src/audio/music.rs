//! Looping background music through the default output device.
//!
//! The window owns one [`BackgroundMusic`] for its whole life.  A missing
//! file or output device leaves it silent: the level and mute state still
//! track the controls, there is just nothing to hear.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use rodio::{Decoder, OutputStream, Sink};
use thiserror::Error;

/// Loudness curve applied to the slider level.
const LOUDNESS_EXPONENT: f32 = 2.5;

#[derive(Debug, Error)]
pub enum MusicError {
    #[error("music file not found: {0}")]
    Missing(String),

    #[error("failed to open music file: {0}")]
    Io(#[from] std::io::Error),

    #[error("no audio output: {0}")]
    Output(#[from] rodio::StreamError),

    #[error("failed to create audio sink: {0}")]
    Sink(#[from] rodio::PlayError),

    #[error("unsupported music file: {0}")]
    Decode(#[from] rodio::decoder::DecoderError),
}

struct Output {
    _stream: OutputStream,
    sink: Sink,
}

pub struct BackgroundMusic {
    output: Option<Output>,
    level: f32,
    muted: bool,
}

impl BackgroundMusic {
    /// Start looping `path`; falls back to [`BackgroundMusic::silent`] on any error.
    pub fn start(path: &Path, level: f32, muted: bool) -> Self {
        let mut music = Self::silent(level, muted);
        match open_looped(path) {
            Ok(output) => {
                log::info!("music: looping {}", path.display());
                music.output = Some(output);
                music.apply();
            }
            Err(e) => log::error!("music: {e}"),
        }
        music
    }

    pub fn silent(level: f32, muted: bool) -> Self {
        Self {
            output: None,
            level: level.clamp(0.0, 1.0),
            muted,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.output.is_some()
    }

    /// Slider position, 0.0 to 1.0.
    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn set_level(&mut self, level: f32) {
        self.level = level.clamp(0.0, 1.0);
        self.apply();
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Flip mute and return the new state.
    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        log::info!("music: muted = {}", self.muted);
        self.apply();
        self.muted
    }

    /// Gain actually sent to the sink.
    pub fn volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.level.powf(LOUDNESS_EXPONENT).clamp(0.0, 1.0)
        }
    }

    fn apply(&self) {
        if let Some(output) = &self.output {
            output.sink.set_volume(self.volume());
        }
    }
}

impl Drop for BackgroundMusic {
    fn drop(&mut self) {
        if let Some(output) = &self.output {
            output.sink.stop();
        }
    }
}

fn open_looped(path: &Path) -> Result<Output, MusicError> {
    if !path.exists() {
        return Err(MusicError::Missing(path.display().to_string()));
    }
    let source = Decoder::new_looped(BufReader::new(File::open(path)?))?;
    let (stream, handle) = OutputStream::try_default()?;
    let sink = Sink::try_new(&handle)?;
    sink.append(source);
    Ok(Output {
        _stream: stream,
        sink,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_is_clamped() {
        let mut music = BackgroundMusic::silent(1.7, false);
        assert_eq!(music.level(), 1.0);
        assert_eq!(music.volume(), 1.0);

        music.set_level(-0.4);
        assert_eq!(music.level(), 0.0);
        assert_eq!(music.volume(), 0.0);
    }

    #[test]
    fn quiet_levels_follow_the_curve() {
        let music = BackgroundMusic::silent(0.5, false);
        assert!((music.volume() - 0.5_f32.powf(2.5)).abs() < 1e-6);
        assert!(music.volume() < music.level());
    }

    #[test]
    fn mute_toggles_and_keeps_level() {
        let mut music = BackgroundMusic::silent(0.8, false);
        assert!(music.toggle_mute());
        assert_eq!(music.volume(), 0.0);
        assert_eq!(music.level(), 0.8);

        assert!(!music.toggle_mute());
        assert!(music.volume() > 0.0);
    }

    #[test]
    fn missing_file_leaves_player_silent() {
        let dir = tempfile::tempdir().unwrap();
        let music = BackgroundMusic::start(&dir.path().join("theme.mp3"), 0.15, true);
        assert!(!music.is_playing());
        assert!(music.is_muted());
        assert_eq!(music.level(), 0.15);
    }

    #[test]
    fn unreadable_music_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("theme.mp3");
        std::fs::write(&path, b"not audio").unwrap();
        assert!(matches!(open_looped(&path), Err(MusicError::Decode(_))));
    }
}
