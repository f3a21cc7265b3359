//! The recording artifact: a 16-bit PCM WAV file written by the capture
//! worker and read by the transcription worker.
//!
//! Anything smaller than [`MIN_ARTIFACT_BYTES`] is treated as "nothing was
//! said" by both sides.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Artifacts below this size (header included) count as empty captures.
pub const MIN_ARTIFACT_BYTES: u64 = 1024;

/// Errors writing or inspecting the artifact.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to write WAV artifact: {0}")]
    Wav(#[from] hound::Error),

    #[error("artifact I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// What a finished capture produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingArtifact {
    /// No frames arrived before recording stopped.
    Empty,
    /// A WAV file of `bytes` bytes at `path`.
    Written { path: PathBuf, bytes: u64 },
}

impl RecordingArtifact {
    /// The artifact path, if it is long enough to be worth transcribing.
    pub fn usable_path(&self) -> Option<&Path> {
        match self {
            RecordingArtifact::Written { path, bytes } if *bytes >= MIN_ARTIFACT_BYTES => {
                Some(path.as_path())
            }
            _ => None,
        }
    }
}

/// Clip `samples` to `[-1, 1]`, scale to `i16`, and write a mono WAV at
/// `sample_rate`.  Parent directories are created as needed.
pub fn write_wav(
    path: &Path,
    samples: &[f32],
    sample_rate: u32,
    channels: u16,
) -> Result<RecordingArtifact, ArtifactError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &s in samples {
        let pcm = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        // Mono frames are duplicated across any extra output channels.
        for _ in 0..channels.max(1) {
            writer.write_sample(pcm)?;
        }
    }
    writer.finalize()?;

    let bytes = std::fs::metadata(path)?.len();
    Ok(RecordingArtifact::Written {
        path: path.to_path_buf(),
        bytes,
    })
}

/// Size of the artifact at `path`, or `None` when it does not exist.
pub fn artifact_size(path: &Path) -> Option<u64> {
    std::fs::metadata(path).ok().map(|m| m.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writes_clipped_pcm() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("take.wav");

        let artifact = write_wav(&path, &[0.0, 2.0, -2.0, 0.5], 44_100, 1).unwrap();
        assert!(matches!(artifact, RecordingArtifact::Written { bytes, .. } if bytes > 0));

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 44_100);
        let samples: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(samples, vec![0, 32767, -32767, 16383]);
    }

    #[test]
    fn short_recording_is_not_usable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.wav");
        let artifact = write_wav(&path, &[0.1; 100], 44_100, 1).unwrap();
        assert!(artifact.usable_path().is_none());
        assert!(RecordingArtifact::Empty.usable_path().is_none());
    }

    #[test]
    fn one_second_is_usable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("long.wav");
        let artifact = write_wav(&path, &vec![0.1; 44_100], 44_100, 1).unwrap();
        assert_eq!(artifact.usable_path(), Some(path.as_path()));
        assert!(artifact_size(&path).unwrap() >= MIN_ARTIFACT_BYTES);
    }
}
