//! Kiosk settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Every section is `#[serde(default)]`, so a hand-edited `settings.toml`
//! only needs the keys it wants to override.
//!
//! Besides typed access, [`AppConfig::get`] resolves a dotted key path
//! (`"tts_settings.tts_rate"`) against the loaded settings, then against the
//! default template, then against the caller's default.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// HatCharacteristics
// ---------------------------------------------------------------------------

/// Personality knobs offered to the operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HatCharacteristics {
    /// Tones listed in the kiosk tone picker.  The selected one is passed to
    /// the dialogue prompt as the hat's personality.
    pub emotions_to_display: Vec<String>,
    /// Informational only; the prompt wording already asks for simple speech.
    pub speech_style_keywords: Vec<String>,
}

impl Default for HatCharacteristics {
    fn default() -> Self {
        Self {
            emotions_to_display: vec![
                "kind".into(),
                "curious".into(),
                "a little bit funny".into(),
                "smart".into(),
                "caring".into(),
                "a good listener".into(),
            ],
            speech_style_keywords: vec![
                "simple words".into(),
                "clear sentences".into(),
                "friendly".into(),
                "for Grade 6 students".into(),
                "easy to understand".into(),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Upper bound on `max_questions`; larger values are clamped.
pub const MAX_QUESTIONS: u32 = 20;

/// Bounds for the number of questions asked before sorting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub min_questions: u32,
    pub max_questions: u32,
}

impl SessionConfig {
    /// The inclusive range a new session draws `questions_planned` from.
    ///
    /// A zero or inverted range falls back to `3..=5`; both ends are capped
    /// at [`MAX_QUESTIONS`].
    pub fn question_range(&self) -> std::ops::RangeInclusive<u32> {
        if self.min_questions == 0 || self.min_questions > self.max_questions {
            log::warn!(
                "session question range {}..={} is invalid; using 3..=5",
                self.min_questions,
                self.max_questions
            );
            return 3..=5;
        }
        if self.max_questions > MAX_QUESTIONS {
            log::warn!(
                "session max_questions {} capped at {MAX_QUESTIONS}",
                self.max_questions
            );
        }
        let max = self.max_questions.min(MAX_QUESTIONS);
        self.min_questions.min(max)..=max
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_questions: 3,
            max_questions: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// ResponseFormatting / ApiParameters
// ---------------------------------------------------------------------------

/// Word-count targets written into the dialogue prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseFormatting {
    /// Target length of the final sorting answer.
    pub target_word_count: u32,
    /// Target length of each question.
    pub target_word_count_question: u32,
}

impl Default for ResponseFormatting {
    fn default() -> Self {
        Self {
            target_word_count: 70,
            target_word_count_question: 25,
        }
    }
}

/// Sampling parameters for the dialogue model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiParameters {
    pub deepseek_temperature: f32,
    /// When > 0, replaces the per-turn token budget (80 / 200).
    pub max_tokens_override: u32,
}

impl Default for ApiParameters {
    fn default() -> Self {
        Self {
            deepseek_temperature: 0.7,
            max_tokens_override: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// ApiConfig
// ---------------------------------------------------------------------------

/// Connection details for the hosted chat and transcription endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Full URL of the chat-completions endpoint.
    pub chat_url: String,
    /// Full URL of the audio-transcription endpoint.
    pub transcription_url: String,
    /// Model identifier sent with chat requests.
    pub chat_model: String,
    /// Model identifier sent with transcription requests.
    pub transcription_model: String,
    /// Bearer token.  `None` falls back to the `DEEPSEEK_API_KEY` environment
    /// variable.
    pub api_key: Option<String>,
    /// Per-request timeout in seconds for both endpoints.
    pub timeout_secs: u64,
}

impl ApiConfig {
    /// The API key from settings, or from `DEEPSEEK_API_KEY` when unset.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("DEEPSEEK_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            chat_url: "https://api.deepseek.com/chat/completions".into(),
            transcription_url: "https://api.deepseek.com/audio/transcriptions".into(),
            chat_model: "deepseek-chat".into(),
            transcription_model: "deepseek-whisper".into(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// TtsSettings
// ---------------------------------------------------------------------------

/// A voice offered by the speech engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceEntry {
    /// Engine-specific voice identifier (e.g. `"en-us"` for espeak-ng).
    pub id: String,
    /// Display name.
    pub name: String,
}

/// Narration voice and speed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsSettings {
    pub available_voices: Vec<VoiceEntry>,
    /// Index into `available_voices`; out of range means "engine default".
    pub selected_voice_index: i64,
    /// Speaking rate in words per minute.
    pub tts_rate: u32,
    /// Program used for synthesis (`espeak-ng`, `espeak`, or `say`).
    pub program: String,
    /// Output volume in `[0.0, 1.0]`.
    pub volume: f32,
}

impl TtsSettings {
    /// Voice id selected in settings, or `None` to let the engine choose.
    pub fn selected_voice(&self) -> Option<String> {
        let voice = usize::try_from(self.selected_voice_index)
            .ok()
            .and_then(|i| self.available_voices.get(i));
        match voice {
            Some(v) => Some(v.id.clone()),
            None => {
                if !self.available_voices.is_empty() {
                    log::warn!(
                        "tts: voice index {} invalid for {} voices; using engine default",
                        self.selected_voice_index,
                        self.available_voices.len()
                    );
                }
                None
            }
        }
    }
}

impl Default for TtsSettings {
    fn default() -> Self {
        Self {
            available_voices: Vec::new(),
            selected_voice_index: 6,
            tts_rate: 140,
            program: "espeak-ng".into(),
            volume: 0.9,
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Capture and artifact settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate of the written WAV artifact in Hz.
    pub sample_rate: u32,
    /// Channel count of the written WAV artifact.
    pub channels: u16,
    /// Where the recording is written.  `None` uses the data directory.
    pub artifact_path: Option<PathBuf>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 1,
            artifact_path: None,
        }
    }
}

// ---------------------------------------------------------------------------
// AssetConfig
// ---------------------------------------------------------------------------

/// Sprite and scene assets, resolved relative to the assets directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory holding the assets.  `None` uses the data directory.
    pub directory: Option<PathBuf>,
    /// Looping sprite shown while idle or thinking.
    pub idle_sprite: String,
    /// One-shot sprite shown while speaking.
    pub speaking_sprite: String,
    pub idle_scale: f32,
    pub speaking_scale: f32,
    /// Scene clip played forward with narration then reversed.
    pub scene_clip: String,
    /// Clip length used by the timeline engine, in milliseconds.
    pub scene_duration_ms: u64,
    /// Whether the playback backend accepts a negative rate.
    pub scene_supports_reverse: bool,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            directory: None,
            idle_sprite: "hat_think.gif".into(),
            speaking_sprite: "hat.gif".into(),
            idle_scale: 0.5,
            speaking_scale: 1.2,
            scene_clip: "hat_scene.mp4".into(),
            scene_duration_ms: 4_000,
            scene_supports_reverse: true,
        }
    }
}

// ---------------------------------------------------------------------------
// HotkeyConfig
// ---------------------------------------------------------------------------

/// Global key bindings for the three kiosk buttons.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeyConfig {
    pub record_key: String,
    pub stop_key: String,
    pub activate_key: String,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            record_key: "1".into(),
            stop_key: "2".into(),
            activate_key: "3".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// Kiosk window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub fullscreen: bool,
    pub dialogue_font_size: f32,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            fullscreen: false,
            dialogue_font_size: 28.0,
        }
    }
}

// ---------------------------------------------------------------------------
// MusicConfig
// ---------------------------------------------------------------------------

/// Background music; `file` resolves against the asset directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MusicConfig {
    pub file: String,
    /// Initial slider position, 0.0 to 1.0.
    pub level: f32,
    pub muted: bool,
}

impl Default for MusicConfig {
    fn default() -> Self {
        Self {
            file: "sortinghat_music.mp3".into(),
            level: 0.15,
            muted: false,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level kiosk configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use sorting_hat::config::AppConfig;
///
/// let config = AppConfig::load().unwrap();
/// let rate: u32 = config.get("tts_settings.tts_rate", 140);
/// # let _ = rate;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub academy_name: String,
    /// What the houses are called collectively (e.g. "Scientist").
    pub house_system_name: String,
    pub custom_houses: Vec<String>,
    pub max_students_in_class: u32,
    /// 1 = primary only, 2 = secondary only, 3 = primary then secondary.
    pub stt_input_language_mode: i64,
    pub hat_characteristics: HatCharacteristics,
    pub session: SessionConfig,
    pub response_formatting: ResponseFormatting,
    pub api_parameters: ApiParameters,
    pub api: ApiConfig,
    pub tts_settings: TtsSettings,
    pub audio: AudioConfig,
    pub assets: AssetConfig,
    pub music: MusicConfig,
    pub hotkey: HotkeyConfig,
    pub ui: UiConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            academy_name: "BIBS Magical Sorting Hat".into(),
            house_system_name: "Scientist".into(),
            custom_houses: vec![
                "Tesla".into(),
                "Darwin".into(),
                "Pythagoras".into(),
                "Einstein".into(),
            ],
            max_students_in_class: 8,
            stt_input_language_mode: 3,
            hat_characteristics: HatCharacteristics::default(),
            session: SessionConfig::default(),
            response_formatting: ResponseFormatting::default(),
            api_parameters: ApiParameters::default(),
            api: ApiConfig::default(),
            tts_settings: TtsSettings::default(),
            audio: AudioConfig::default(),
            assets: AssetConfig::default(),
            music: MusicConfig::default(),
            hotkey: HotkeyConfig::default(),
            ui: UiConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Look up `dotted` (e.g. `"api_parameters.deepseek_temperature"`).
    ///
    /// Resolution order: these settings, then the default template, then
    /// `default`.  A key whose value cannot be read as `T` counts as missing.
    pub fn get<T: DeserializeOwned>(&self, dotted: &str, default: T) -> T {
        lookup(self, dotted)
            .or_else(|| lookup(&AppConfig::default(), dotted))
            .unwrap_or(default)
    }

    /// Where the capture worker writes its WAV file.
    pub fn artifact_path(&self) -> PathBuf {
        self.audio
            .artifact_path
            .clone()
            .unwrap_or_else(|| AppPaths::new().data_dir.join("student_intro.wav"))
    }

    /// Absolute path of an asset file name.
    pub fn asset_path(&self, file_name: &str) -> PathBuf {
        self.assets
            .directory
            .clone()
            .unwrap_or_else(|| AppPaths::new().assets_dir)
            .join(file_name)
    }
}

fn lookup<T: DeserializeOwned>(config: &AppConfig, dotted: &str) -> Option<T> {
    let root = toml::Value::try_from(config).ok()?;
    let mut node = &root;
    for segment in dotted.split('.') {
        node = node.as_table()?.get(segment)?;
    }
    node.clone().try_into().ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
