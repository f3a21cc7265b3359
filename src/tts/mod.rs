//! Text-to-speech for the Oracle's replies.
//!
//! * [`SpeechEngine`] — blocking `speak` plus cross-thread `stop`.
//! * [`CommandSpeechEngine`] — external synthesizer process.
//! * [`filter_for_speech`] — strips symbols the synthesizer would read aloud.

pub mod engine;
pub mod filter;

pub use engine::{CommandSpeechEngine, SpeechEngine, TtsError};
pub use filter::filter_for_speech;

#[cfg(test)]
pub use engine::MockSpeechEngine;
