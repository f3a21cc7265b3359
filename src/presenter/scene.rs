//! Scene clip presenter: plays forward once while the Oracle speaks, then
//! rewinds by playing in reverse, and rests on frame zero.
//!
//! ```text
//!  initialize ─▶ Initializing ──(play, then pause at 0)──▶ Frozen ◀──────────┐
//!                                                           │                │
//!                                          play_forward_once│                │
//!                                                           ▼                │
//!   request_reverse_after_current_playback ◀── PlayingForward{at_end}       │
//!                         │                                                  │
//!                         ▼                 end of media                     │
//!               AwaitingReverseTrigger ──────────────────▶ Reversing ──(≤50ms)┘
//!                         │  rate −1 rejected                                ▲
//!                         └──────────────────────────────────────────────────┘ Frozen
//! ```
//!
//! Every arrival in `Frozen` emits exactly one
//! [`PresenterEvent::CycleComplete`].  Engine errors and load failures also
//! resolve to a resting state with a completion, so nothing upstream ever
//! waits on a signal that cannot come.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use super::{PresenterEvent, PresenterId};

/// Reverse playback stops once the position is this close to zero.
pub const REVERSE_STOP_MS: u64 = 50;

/// Upper bound on the "already at the end" margin.
const END_MARGIN_MS: u64 = 100;

/// Engine polls per pump; each round may queue follow-up events.
const MAX_POLL_ROUNDS: usize = 8;

// ---------------------------------------------------------------------------
// Engine seam
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("cannot load clip: {0}")]
    Load(String),

    #[error("playback failed: {0}")]
    Engine(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// Notifications produced by [`PlaybackEngine::poll`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    StateChanged(PlaybackState),
    Position(u64),
    EndOfMedia,
    Error(String),
}

/// A video playback backend.  Commands take effect immediately; their
/// notifications are delivered by the next [`poll`](PlaybackEngine::poll).
pub trait PlaybackEngine: Send {
    fn load(&mut self, clip: &Path) -> Result<(), PlaybackError>;
    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    fn set_position(&mut self, ms: u64);
    fn position(&self) -> u64;
    fn duration(&self) -> u64;
    fn set_loops(&mut self, loops: u32);
    /// Returns `false` when the engine cannot play at `rate`.
    fn set_rate(&mut self, rate: f32) -> bool;
    fn state(&self) -> PlaybackState;
    /// Advance the engine clock by `dt` and drain pending notifications.
    fn poll(&mut self, dt: Duration) -> Vec<EngineEvent>;
}

// ---------------------------------------------------------------------------
// ScenePresenter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneState {
    /// The clip could not be loaded; every request is a no-op.
    Unavailable,
    Initializing,
    Frozen,
    /// `at_end` once the clip reached its end without a reverse request.
    PlayingForward { at_end: bool },
    AwaitingReverseTrigger,
    Reversing,
}

/// For the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneSnapshot {
    pub state: SceneState,
    pub position_ms: u64,
    pub duration_ms: u64,
}

pub struct ScenePresenter {
    engine: Box<dyn PlaybackEngine>,
    clip: PathBuf,
    state: SceneState,
    outbox: Vec<PresenterEvent>,
}

impl ScenePresenter {
    pub fn new(engine: Box<dyn PlaybackEngine>, clip: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            clip: clip.into(),
            state: SceneState::Unavailable,
            outbox: Vec::new(),
        }
    }

    pub fn state(&self) -> SceneState {
        self.state
    }

    pub fn snapshot(&self) -> SceneSnapshot {
        SceneSnapshot {
            state: self.state,
            position_ms: self.engine.position(),
            duration_ms: self.engine.duration(),
        }
    }

    pub fn take_events(&mut self) -> Vec<PresenterEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Load the clip and show its first frame.
    ///
    /// Some engines only produce a visible frame after playing once, so this
    /// plays and immediately pauses instead of seeking.
    pub fn initialize(&mut self) {
        if let Err(e) = self.engine.load(&self.clip) {
            log::error!("scene: {e}; continuing without the scene clip");
            self.state = SceneState::Unavailable;
            self.complete();
            return;
        }
        log::info!(
            "scene: {} loaded ({} ms)",
            self.clip.display(),
            self.engine.duration()
        );
        self.state = SceneState::Initializing;
        self.engine.set_loops(1);
        self.engine.set_rate(1.0);
        self.engine.set_position(0);
        self.engine.play();
    }

    /// Play the clip once from the start, alongside narration.
    pub fn play_forward_once(&mut self) {
        match self.state {
            SceneState::Unavailable => return,
            SceneState::Frozen | SceneState::PlayingForward { at_end: true } => {}
            other => log::debug!("scene: forward playback supersedes {other:?}"),
        }
        self.state = SceneState::PlayingForward { at_end: false };
        self.engine.pause();
        self.engine.set_loops(1);
        self.engine.set_rate(1.0);
        self.engine.set_position(0);
        self.engine.play();
    }

    /// Reverse once the current forward pass ends, or now if it already has.
    pub fn request_reverse_after_current_playback(&mut self) {
        match self.state {
            SceneState::PlayingForward { at_end: true } => self.start_reverse(),
            SceneState::PlayingForward { at_end: false } => {
                let duration = self.engine.duration();
                let margin = END_MARGIN_MS.min(duration / 20);
                let near_end = self.engine.position() + margin >= duration;
                if near_end || self.engine.state() == PlaybackState::Stopped {
                    self.start_reverse();
                } else {
                    self.state = SceneState::AwaitingReverseTrigger;
                }
            }
            SceneState::Frozen | SceneState::Unavailable => {
                log::debug!("scene: reverse requested while resting; nothing to do");
            }
            SceneState::Initializing
            | SceneState::AwaitingReverseTrigger
            | SceneState::Reversing => {}
        }
    }

    /// Bring any in-flight playback to rest on frame zero.
    pub fn settle(&mut self) {
        match self.state {
            SceneState::PlayingForward { .. }
            | SceneState::AwaitingReverseTrigger
            | SceneState::Reversing => self.freeze(),
            SceneState::Frozen | SceneState::Initializing | SceneState::Unavailable => {}
        }
    }

    /// Final stop on shutdown.  Emits nothing.
    pub fn stop_all(&mut self) {
        if self.state != SceneState::Unavailable {
            self.engine.stop();
            self.state = SceneState::Frozen;
        }
        self.outbox.clear();
    }

    /// Advance the engine by `dt` and react to what it reports.
    pub fn pump(&mut self, dt: Duration) {
        if self.state == SceneState::Unavailable {
            return;
        }
        let mut step = dt;
        for _ in 0..MAX_POLL_ROUNDS {
            let events = self.engine.poll(step);
            if events.is_empty() {
                break;
            }
            for event in events {
                self.handle_engine_event(event);
            }
            step = Duration::ZERO;
        }
    }

    pub fn handle_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::StateChanged(PlaybackState::Playing) => {
                if !self.expects_playing() {
                    log::warn!("scene: unexpected playback in {:?}; pausing", self.state);
                    self.engine.pause();
                    return;
                }
                if self.state == SceneState::Initializing {
                    self.engine.pause();
                    self.engine.set_position(0);
                }
            }
            EngineEvent::StateChanged(PlaybackState::Paused) => {
                if self.state == SceneState::Initializing {
                    self.freeze();
                }
            }
            EngineEvent::StateChanged(PlaybackState::Stopped) => match self.state {
                SceneState::PlayingForward { .. } => {
                    self.state = SceneState::PlayingForward { at_end: true }
                }
                SceneState::AwaitingReverseTrigger => self.start_reverse(),
                SceneState::Reversing | SceneState::Initializing => self.freeze(),
                SceneState::Frozen | SceneState::Unavailable => {}
            },
            EngineEvent::EndOfMedia => match self.state {
                SceneState::AwaitingReverseTrigger => self.start_reverse(),
                SceneState::PlayingForward { .. } => {
                    self.engine.pause();
                    self.state = SceneState::PlayingForward { at_end: true };
                }
                SceneState::Reversing => self.freeze(),
                _ => {}
            },
            EngineEvent::Position(ms) => {
                if self.state == SceneState::Reversing && ms <= REVERSE_STOP_MS {
                    self.freeze();
                }
            }
            EngineEvent::Error(msg) => {
                log::error!("scene: playback error in {:?}: {msg}", self.state);
                self.freeze();
            }
        }
    }

    fn expects_playing(&self) -> bool {
        matches!(
            self.state,
            SceneState::Initializing
                | SceneState::PlayingForward { at_end: false }
                | SceneState::AwaitingReverseTrigger
                | SceneState::Reversing
        )
    }

    fn start_reverse(&mut self) {
        self.engine.pause();
        if !self.engine.set_rate(-1.0) {
            log::warn!("scene: reverse playback unsupported; freezing");
            self.freeze();
            return;
        }
        self.state = SceneState::Reversing;
        self.engine.play();
    }

    fn freeze(&mut self) {
        self.engine.pause();
        self.engine.set_rate(1.0);
        self.engine.set_position(0);
        self.state = SceneState::Frozen;
        self.complete();
    }

    fn complete(&mut self) {
        self.outbox.push(PresenterEvent::CycleComplete(PresenterId::Scene));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
