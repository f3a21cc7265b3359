//! Core `LanguageModel` trait and the `DeepSeekClient` implementation.
//!
//! `DeepSeekClient` calls any OpenAI-compatible chat-completions endpoint.
//! All connection details come from [`ApiConfig`]; nothing is hardcoded.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::ApiConfig;

// ---------------------------------------------------------------------------
// LlmError
// ---------------------------------------------------------------------------

/// Errors that can occur during a dialogue request.
///
/// Network failure, timeout, HTTP status and malformed body are kept apart so
/// the kiosk can report which one happened.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Transport or connection error.
    #[error("request failed: {0}")]
    Network(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// Non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The response body was not the expected JSON shape, or held no text.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// No API key in settings or environment.
    #[error("API key not configured")]
    MissingApiKey,
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// LanguageModel trait
// ---------------------------------------------------------------------------

/// Async chat completion: one system message, one user message.
///
/// Implementors must be `Send + Sync` so they can be shared behind
/// `Arc<dyn LanguageModel>`.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, LlmError>;
}

// ---------------------------------------------------------------------------
// DeepSeekClient
// ---------------------------------------------------------------------------

/// Calls an OpenAI-compatible chat-completions endpoint (DeepSeek by default).
pub struct DeepSeekClient {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl DeepSeekClient {
    /// Build a client from the `[api]` settings section.
    ///
    /// The HTTP client carries the per-request timeout from
    /// `config.timeout_secs`; a default client is the fallback if the builder
    /// fails.
    pub fn from_config(config: &ApiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            url: config.chat_url.clone(),
            model: config.chat_model.clone(),
            api_key: config.resolved_api_key(),
        }
    }
}

#[async_trait]
impl LanguageModel for DeepSeekClient {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, LlmError> {
        let key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;

        let body = serde_json::json!({
            "model":       self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user",   "content": user   }
            ],
            "max_tokens":  max_tokens,
            "temperature": temperature
        });

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Malformed(e.to_string()))?;

        extract_reply(&json)
    }
}

/// Pull `choices[0].message.content` out of a chat-completions response.
pub(crate) fn extract_reply(json: &serde_json::Value) -> Result<String, LlmError> {
    let content = json["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| LlmError::Malformed(format!("no message content in {json}")))?
        .trim()
        .to_string();

    if content.is_empty() {
        return Err(LlmError::Malformed("empty message content".into()));
    }

    Ok(content)
}

// ---------------------------------------------------------------------------
// MockLanguageModel  (test only)
// ---------------------------------------------------------------------------

/// Scripted replies in order, then a default question.  Records the user
/// message and token budget of every call.
#[cfg(test)]
pub struct MockLanguageModel {
    replies: std::sync::Mutex<std::collections::VecDeque<Result<String, LlmError>>>,
    delay: Duration,
    calls: std::sync::Mutex<Vec<(String, u32)>>,
}

#[cfg(test)]
impl MockLanguageModel {
    pub fn scripted(replies: Vec<Result<&str, LlmError>>) -> Self {
        Self {
            replies: std::sync::Mutex::new(
                replies
                    .into_iter()
                    .map(|r| r.map(str::to_string))
                    .collect(),
            ),
            delay: Duration::ZERO,
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn complete(
        &self,
        _system: &str,
        user: &str,
        max_tokens: u32,
        _temperature: f32,
    ) -> Result<String, LlmError> {
        self.calls
            .lock()
            .unwrap()
            .push((user.to_string(), max_tokens));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok("And what do you love to do after class?".to_string()))
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
        let _client = DeepSeekClient::from_config(&ApiConfig::default());
    }

    #[test]
    fn client_is_object_safe() {
        let client: Box<dyn LanguageModel> =
            Box::new(DeepSeekClient::from_config(&ApiConfig::default()));
        drop(client);
    }

    #[tokio::test]
    async fn missing_key_is_reported_before_sending() {
        let mut client = DeepSeekClient::from_config(&ApiConfig::default());
        client.api_key = None;

        let err = client.complete("sys", "user", 80, 0.7).await.unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey));
    }

    #[test]
    fn extract_reply_reads_first_choice() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "  Hello, student!  " } }]
        });
        assert_eq!(extract_reply(&json).unwrap(), "Hello, student!");
    }

    #[test]
    fn extract_reply_rejects_missing_or_empty_content() {
        let missing = serde_json::json!({ "error": { "message": "bad" } });
        assert!(matches!(extract_reply(&missing), Err(LlmError::Malformed(_))));

        let empty = serde_json::json!({ "choices": [{ "message": { "content": "   " } }] });
        assert!(matches!(extract_reply(&empty), Err(LlmError::Malformed(_))));
    }

    #[test]
    fn http_error_display_includes_status_and_body() {
        let err = LlmError::Http {
            status: 429,
            body: "rate limited".into(),
        };
        assert_eq!(err.to_string(), "HTTP 429: rate limited");
    }
}
