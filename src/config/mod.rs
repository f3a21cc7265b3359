//! Configuration module for the Sorting Hat kiosk.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each subsystem,
//! `AppPaths` for cross-platform data directories, and TOML persistence via
//! `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    ApiConfig, ApiParameters, AppConfig, AssetConfig, AudioConfig, HatCharacteristics,
    HotkeyConfig, MusicConfig, ResponseFormatting, SessionConfig, TtsSettings, UiConfig, VoiceEntry,
    MAX_QUESTIONS,
};
