//! Audio capture → mono downmix → resample → WAV artifact.
//!
//! ```text
//! CaptureDevice::open → AudioChunk (mpsc) → conform (mono, artifact rate)
//!                     → write_wav → RecordingArtifact
//! ```
//!
//! The capture worker in [`crate::worker`] drives these pieces; nothing here
//! knows about sessions or cancellation.
//!
//! [`BackgroundMusic`] is the one output path: a looped track owned by the
//! window.

pub mod artifact;
pub mod capture;
pub mod music;
pub mod resample;

pub use artifact::{
    artifact_size, write_wav, ArtifactError, RecordingArtifact, MIN_ARTIFACT_BYTES,
};
pub use capture::{AudioChunk, CaptureDevice, CaptureError, CpalCaptureDevice, StreamGuard};
pub use music::{BackgroundMusic, MusicError};
pub use resample::conform;
