//! Sorting Hat kiosk — orchestration core.
//!
//! A student answers a handful of spoken questions; the hat transcribes each
//! answer, consults a language model, narrates the next question, and finally
//! announces a house.
//!
//! ```text
//!  hotkeys / buttons ──► session::Orchestrator ──► SharedView ──► app::KioskApp
//!                              │        ▲
//!                 spawn worker │        │ WorkerEvent (generation-tagged)
//!                              ▼        │
//!            worker: capture → stt → llm → tts
//!                              │
//!                              └─► presenter: sprite, scene
//! ```

pub mod app;
pub mod audio;
pub mod config;
pub mod hotkey;
pub mod llm;
pub mod presenter;
pub mod session;
pub mod stt;
pub mod tts;
pub mod worker;
