//! Speech-to-text module.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 SttClient (trait)                    │
//! │                                                      │
//! │   ┌──────────────┐      ┌───────────────────────┐    │
//! │   │ LanguageMode │─────▶│ transcribe_with_      │    │
//! │   │en / zh / both│      │ fallback()            │    │
//! │   └──────────────┘      └──────────┬────────────┘    │
//! │                                    │                 │
//! │                                    ▼                 │
//! │                        ┌──────────────────┐          │
//! │                        │  HttpSttClient   │          │
//! │                        │  WAV → text      │          │
//! │                        └──────────────────┘          │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod client;
pub mod language;

pub use client::{HttpSttClient, SttClient, SttError};
pub use language::{transcribe_with_fallback, LanguageMode, Transcript};

#[cfg(test)]
pub use client::MockSttClient;
