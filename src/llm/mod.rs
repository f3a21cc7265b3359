//! Dialogue backend for the Sorting Hat.
//!
//! This module provides:
//! * [`LanguageModel`] — async trait implemented by chat backends.
//! * [`DeepSeekClient`] — OpenAI-compatible chat-completions client.
//! * [`PromptBuilder`] / [`DialogueTurn`] — session state → prompt pair.
//! * [`LlmError`] — error variants for dialogue requests.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use sorting_hat::config::AppConfig;
//! use sorting_hat::llm::{DeepSeekClient, DialogueTurn, LanguageModel, PromptBuilder};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let llm = DeepSeekClient::from_config(&config.api);
//!     let prompts = PromptBuilder::from_config(&config);
//!
//!     let turn = DialogueTurn { step: 0, planned: 3, user_text: None, tone: "kind".into() };
//!     let reply = llm
//!         .complete(
//!             &prompts.system_prompt(&turn),
//!             &prompts.user_message(&turn),
//!             prompts.max_tokens(&turn),
//!             prompts.temperature(),
//!         )
//!         .await
//!         .unwrap();
//!     println!("{reply}");
//! }
//! ```

pub mod client;
pub mod prompt;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use client::{DeepSeekClient, LanguageModel, LlmError};
pub use prompt::{DialogueTurn, PromptBuilder, QUESTION_MAX_TOKENS, SORTING_MAX_TOKENS};

#[cfg(test)]
pub use client::MockLanguageModel;
