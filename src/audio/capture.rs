//! Microphone capture via `cpal`.
//!
//! [`CaptureDevice`] is the seam the capture worker records through.  The
//! production [`CpalCaptureDevice`] opens the system default input and
//! streams [`AudioChunk`]s over an mpsc channel; the returned [`StreamGuard`]
//! is a RAII guard, so dropping it stops the hardware stream.
//!
//! `cpal::Stream` is not `Send` on every platform, so the device is opened on
//! the thread that records and the guard never leaves it.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc;
use thiserror::Error;

// ---------------------------------------------------------------------------
// AudioChunk
// ---------------------------------------------------------------------------

/// A single buffer of raw audio as delivered by the device callback.
///
/// Samples are interleaved `f32` in the range `[-1.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Interleaved PCM samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate of this chunk in Hz (e.g. 44100, 48000).
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
}

// ---------------------------------------------------------------------------
// StreamGuard
// ---------------------------------------------------------------------------

/// Keeps an open input stream alive until dropped.
pub struct StreamGuard {
    _inner: Box<dyn std::any::Any>,
}

impl StreamGuard {
    /// Wrap whatever must stay alive for frames to keep flowing.
    pub fn new(inner: impl std::any::Any) -> Self {
        Self {
            _inner: Box::new(inner),
        }
    }
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while opening or running the audio capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

// ---------------------------------------------------------------------------
// CaptureDevice trait
// ---------------------------------------------------------------------------

/// A source of microphone frames.
///
/// `open` starts streaming into `tx` and returns a guard; frames stop when
/// the guard is dropped.  Called from the capture worker's own thread.
pub trait CaptureDevice: Send + Sync {
    fn open(&self, tx: mpsc::Sender<AudioChunk>) -> Result<StreamGuard, CaptureError>;
}

// ---------------------------------------------------------------------------
// CpalCaptureDevice
// ---------------------------------------------------------------------------

/// Default system input via `cpal`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalCaptureDevice;

impl CaptureDevice for CpalCaptureDevice {
    fn open(&self, tx: mpsc::Sender<AudioChunk>) -> Result<StreamGuard, CaptureError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(CaptureError::NoDevice)?;

        let supported = device.default_input_config()?;
        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let chunk = AudioChunk {
                    samples: data.to_vec(),
                    sample_rate,
                    channels,
                };
                // The receiver goes away once the worker stops recording.
                let _ = tx.send(chunk);
            },
            |err: cpal::StreamError| {
                log::error!("cpal stream error: {err}");
            },
            None,
        )?;

        stream.play()?;
        log::info!("capture: input stream open ({sample_rate} Hz, {channels} ch)");
        Ok(StreamGuard::new(stream))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_chunk_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<AudioChunk>();
    }

    #[test]
    fn device_is_object_safe() {
        let device: Box<dyn CaptureDevice> = Box::new(CpalCaptureDevice);
        drop(device);
    }

    #[test]
    fn guard_keeps_sender_alive_until_dropped() {
        let (tx, rx) = mpsc::channel::<AudioChunk>();
        let guard = StreamGuard::new(tx);
        assert!(rx.try_recv().is_err());
        drop(guard);
        assert!(matches!(rx.recv(), Err(mpsc::RecvError)));
    }
}
