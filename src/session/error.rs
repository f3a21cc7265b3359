use thiserror::Error;

use crate::llm::LlmError;
use crate::stt::SttError;

/// Everything that can go wrong during a session, as shown to the student.
#[derive(Debug, Error)]
pub enum KioskError {
    #[error("Microphone unavailable. {0}")]
    Device(String),

    #[error("No audio captured or recording was too short.")]
    EmptyCapture,

    #[error("Could not transcribe your answer. {0}")]
    TranscriptionFailure(SttError),

    #[error("The Oracle could not be reached. {0}")]
    DialogueApi(LlmError),

    #[error("Speech engine failed to start. {0}")]
    NarrationInit(String),

    #[error("Speech playback failed. {0}")]
    NarrationSynthesis(String),

    #[error("Internal error. {0}")]
    Internal(String),
}

impl KioskError {
    /// Recoverable errors re-prompt the same question; the rest reset the
    /// session.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, KioskError::EmptyCapture)
    }

    /// The message up to its first full stop, for the status line.
    ///
    /// ```
    /// use sorting_hat::session::KioskError;
    ///
    /// let err = KioskError::NarrationInit("espeak-ng missing".into());
    /// assert_eq!(err.headline(), "Speech engine failed to start");
    /// ```
    pub fn headline(&self) -> String {
        let message = self.to_string();
        match message.split_once('.') {
            Some((first, _)) if !first.trim().is_empty() => first.trim().to_string(),
            _ => message.trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_empty_capture_is_recoverable() {
        assert!(KioskError::EmptyCapture.is_recoverable());
        assert!(!KioskError::Device("gone".into()).is_recoverable());
        assert!(!KioskError::DialogueApi(LlmError::Timeout).is_recoverable());
    }

    #[test]
    fn dialogue_failures_keep_their_reason() {
        let err = KioskError::DialogueApi(LlmError::Http {
            status: 500,
            body: "boom".into(),
        });
        assert_eq!(err.to_string(), "The Oracle could not be reached. HTTP 500: boom");
        assert_eq!(err.headline(), "The Oracle could not be reached");
    }
}
