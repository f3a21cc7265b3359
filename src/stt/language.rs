//! Transcription language hypotheses and the first-non-blank-wins fallback.

use std::path::Path;

use super::client::{SttClient, SttError};
use crate::audio::{artifact_size, MIN_ARTIFACT_BYTES};

/// Which languages to try, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageMode {
    /// English only (setting `1`).
    PrimaryOnly,
    /// Chinese only (setting `2`).
    SecondaryOnly,
    /// English, then Chinese if English came back blank or failed (setting `3`).
    PrimaryThenSecondary,
}

impl LanguageMode {
    pub const PRIMARY: &'static str = "en";
    pub const SECONDARY: &'static str = "zh";

    /// Map the `stt_input_language_mode` setting.  Unknown values fall back
    /// to [`LanguageMode::PrimaryOnly`] with a warning.
    pub fn from_setting(mode: i64) -> Self {
        match mode {
            1 => Self::PrimaryOnly,
            2 => Self::SecondaryOnly,
            3 => Self::PrimaryThenSecondary,
            other => {
                log::warn!("stt: invalid input language mode {other}; using primary only");
                Self::PrimaryOnly
            }
        }
    }

    pub fn languages(self) -> &'static [&'static str] {
        match self {
            Self::PrimaryOnly => &[Self::PRIMARY],
            Self::SecondaryOnly => &[Self::SECONDARY],
            Self::PrimaryThenSecondary => &[Self::PRIMARY, Self::SECONDARY],
        }
    }
}

/// Result of a transcription run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transcript {
    /// Non-blank text and the language that produced it.
    Heard { text: String, language: String },
    /// Every attempt came back blank; the student should be asked again.
    Blank,
}

/// Try each language of `mode` in order; the first non-blank result wins.
///
/// When every attempt is blank the outcome is [`Transcript::Blank`].  When
/// the last attempt failed for any other reason, that error is returned.
pub async fn transcribe_with_fallback(
    client: &dyn SttClient,
    artifact: &Path,
    mode: LanguageMode,
) -> Result<Transcript, SttError> {
    match artifact_size(artifact) {
        Some(bytes) if bytes >= MIN_ARTIFACT_BYTES => {}
        _ => {
            return Err(SttError::Artifact(format!(
                "audio file missing or too short: {}",
                artifact.display()
            )))
        }
    }

    let mut last_error = None;
    for &language in mode.languages() {
        match client.transcribe(artifact, language).await {
            Ok(text) if !text.trim().is_empty() => {
                log::info!("stt: heard {} chars with lang={language}", text.len());
                return Ok(Transcript::Heard {
                    text: text.trim().to_string(),
                    language: language.to_string(),
                });
            }
            Ok(_) => {
                log::info!("stt: blank result with lang={language}");
                last_error = Some(SttError::Unintelligible(language.to_string()));
            }
            Err(e) => {
                log::info!("stt: attempt with lang={language} failed: {e}");
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(SttError::Unintelligible(_)) | None => Ok(Transcript::Blank),
        Some(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stt::client::MockSttClient;
    use tempfile::tempdir;

    fn long_artifact(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("take.wav");
        crate::audio::write_wav(&path, &vec![0.2; 44_100], 44_100, 1).unwrap();
        path
    }

    #[test]
    fn setting_maps_to_mode() {
        assert_eq!(LanguageMode::from_setting(1), LanguageMode::PrimaryOnly);
        assert_eq!(LanguageMode::from_setting(2), LanguageMode::SecondaryOnly);
        assert_eq!(
            LanguageMode::from_setting(3),
            LanguageMode::PrimaryThenSecondary
        );
        assert_eq!(LanguageMode::from_setting(9), LanguageMode::PrimaryOnly);
        assert_eq!(LanguageMode::PrimaryThenSecondary.languages(), &["en", "zh"]);
    }

    #[tokio::test]
    async fn first_non_blank_wins() {
        let dir = tempdir().unwrap();
        let path = long_artifact(dir.path());
        let client = MockSttClient::new(vec![("en", Ok("  ")), ("zh", Ok("ni hao"))]);

        let out = transcribe_with_fallback(&client, &path, LanguageMode::PrimaryThenSecondary)
            .await
            .unwrap();
        assert_eq!(
            out,
            Transcript::Heard {
                text: "ni hao".into(),
                language: "zh".into()
            }
        );
        assert_eq!(client.calls(), vec!["en", "zh"]);
    }

    #[tokio::test]
    async fn primary_success_skips_secondary() {
        let dir = tempdir().unwrap();
        let path = long_artifact(dir.path());
        let client = MockSttClient::new(vec![("en", Ok("I like books"))]);

        let out = transcribe_with_fallback(&client, &path, LanguageMode::PrimaryThenSecondary)
            .await
            .unwrap();
        assert!(matches!(out, Transcript::Heard { ref language, .. } if language == "en"));
        assert_eq!(client.calls(), vec!["en"]);
    }

    #[tokio::test]
    async fn all_blank_is_recoverable() {
        let dir = tempdir().unwrap();
        let path = long_artifact(dir.path());
        let client = MockSttClient::new(vec![("en", Ok("")), ("zh", Ok(" "))]);

        let out = transcribe_with_fallback(&client, &path, LanguageMode::PrimaryThenSecondary)
            .await
            .unwrap();
        assert_eq!(out, Transcript::Blank);
    }

    #[tokio::test]
    async fn last_real_error_is_returned() {
        let dir = tempdir().unwrap();
        let path = long_artifact(dir.path());
        let client = MockSttClient::new(vec![
            ("en", Ok("")),
            ("zh", Err(SttError::Api("HTTP 500".into()))),
        ]);

        let err = transcribe_with_fallback(&client, &path, LanguageMode::PrimaryThenSecondary)
            .await
            .unwrap_err();
        assert!(matches!(err, SttError::Api(_)));
    }

    #[tokio::test]
    async fn missing_artifact_is_rejected_before_any_call() {
        let dir = tempdir().unwrap();
        let client = MockSttClient::new(vec![("en", Ok("hello"))]);

        let err = transcribe_with_fallback(
            &client,
            &dir.path().join("absent.wav"),
            LanguageMode::PrimaryOnly,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SttError::Artifact(_)));
        assert!(client.calls().is_empty());
    }
}
