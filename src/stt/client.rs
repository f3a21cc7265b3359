//! Speech-to-text client trait and the hosted HTTP implementation.
//!
//! [`SttClient`] is object-safe and `Send + Sync` so it can be held behind an
//! `Arc<dyn SttClient>` and called from the transcription worker.
//!
//! [`HttpSttClient`] posts the WAV artifact as `multipart/form-data` to an
//! OpenAI-style `/audio/transcriptions` endpoint and reads `json["text"]`.
//!
//! [`MockSttClient`] (under `#[cfg(test)]`) replays scripted answers per
//! language.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use thiserror::Error;

use crate::config::ApiConfig;

// ---------------------------------------------------------------------------
// SttError
// ---------------------------------------------------------------------------

/// All errors that can arise from a transcription attempt.
#[derive(Debug, Clone, Error)]
pub enum SttError {
    /// The service answered but heard nothing usable.
    #[error("no speech recognised (lang={0})")]
    Unintelligible(String),

    /// Transport failure, non-success status, or malformed body.
    #[error("transcription API error: {0}")]
    Api(String),

    /// The request did not complete within the configured timeout.
    #[error("transcription request timed out")]
    Timeout,

    /// The recording artifact is missing, unreadable, or too short.
    #[error("{0}")]
    Artifact(String),
}

impl From<reqwest::Error> for SttError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SttError::Timeout
        } else {
            SttError::Api(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// SttClient trait
// ---------------------------------------------------------------------------

/// Transcribe the WAV file at `artifact` assuming `language` (ISO-639-1).
///
/// A blank string is a valid answer; the caller decides what blank means.
#[async_trait]
pub trait SttClient: Send + Sync {
    async fn transcribe(&self, artifact: &Path, language: &str) -> Result<String, SttError>;
}

// ---------------------------------------------------------------------------
// HttpSttClient
// ---------------------------------------------------------------------------

/// Hosted transcription over HTTP.
pub struct HttpSttClient {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpSttClient {
    /// Build from the `[api]` settings section.
    pub fn from_config(config: &ApiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            url: config.transcription_url.clone(),
            model: config.transcription_model.clone(),
            api_key: config.resolved_api_key(),
        }
    }
}

#[async_trait]
impl SttClient for HttpSttClient {
    async fn transcribe(&self, artifact: &Path, language: &str) -> Result<String, SttError> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(SttError::Api("API key not configured".into()));
        };

        let wav = tokio::fs::read(artifact)
            .await
            .map_err(|e| SttError::Artifact(format!("cannot read {}: {e}", artifact.display())))?;

        let file_name = artifact
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "recording.wav".into());

        let file_part = multipart::Part::bytes(wav)
            .file_name(file_name)
            .mime_str("audio/wav")?;

        let form = multipart::Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("language", language.to_string());

        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(key)
            .multipart(form)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SttError::Api(format!("HTTP {status}: {body}")));
        }

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| SttError::Api(format!("malformed response: {e}")))?;

        Ok(json["text"].as_str().unwrap_or("").to_string())
    }
}

// ---------------------------------------------------------------------------
// MockSttClient  (test only)
// ---------------------------------------------------------------------------

/// Scripted client: answers per language, records the languages asked.
#[cfg(test)]
pub struct MockSttClient {
    answers: Vec<(&'static str, Result<&'static str, SttError>)>,
    calls: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockSttClient {
    pub fn new(answers: Vec<(&'static str, Result<&'static str, SttError>)>) -> Self {
        Self {
            answers,
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Always answer `text`, whatever the language.
    pub fn ok(text: &'static str) -> Self {
        Self::new(vec![("en", Ok(text)), ("zh", Ok(text))])
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl SttClient for MockSttClient {
    async fn transcribe(&self, _artifact: &Path, language: &str) -> Result<String, SttError> {
        self.calls.lock().unwrap().push(language.to_string());
        self.answers
            .iter()
            .find(|(lang, _)| *lang == language)
            .map(|(_, answer)| answer.clone().map(str::to_string))
            .unwrap_or_else(|| Err(SttError::Api(format!("no scripted answer for {language}"))))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_builds_without_panic() {
        let _client = HttpSttClient::from_config(&ApiConfig::default());
    }

    #[test]
    fn client_is_object_safe() {
        let client: Box<dyn SttClient> = Box::new(HttpSttClient::from_config(&ApiConfig::default()));
        drop(client);
    }

    #[tokio::test]
    async fn missing_key_fails_without_network() {
        let config = ApiConfig {
            api_key: None,
            ..ApiConfig::default()
        };
        let mut client = HttpSttClient::from_config(&config);
        client.api_key = None;

        let err = client
            .transcribe(Path::new("/nonexistent.wav"), "en")
            .await
            .unwrap_err();
        assert!(matches!(err, SttError::Api(_)));
    }
}
