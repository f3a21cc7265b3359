//! Application entry point — Sorting Hat kiosk.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create the [`tokio`] runtime.
//! 4. Build the collaborators: microphone, STT, dialogue, narration.
//! 5. Load the sprite assets and the scene clip.
//! 6. Spawn the [`Orchestrator`] on the runtime.
//! 7. Spawn the hotkey listener thread.
//! 8. Start the background music on the main thread.
//! 9. Run [`eframe::run_native`] — blocks the main thread until the window
//!    is closed.
//! 10. Send [`KioskEvent::Shutdown`] and wait for the orchestrator to join its
//!    workers.

use std::sync::Arc;
use std::time::Duration;

use eframe::egui;
use sorting_hat::{
    app::KioskApp,
    audio::{BackgroundMusic, CpalCaptureDevice},
    config::AppConfig,
    hotkey::{key_bindings, HotkeyListener},
    llm::DeepSeekClient,
    presenter::{ScenePresenter, SpriteAsset, SpritePresenter, TimelineEngine},
    session::{new_shared_view, Collaborators, KioskEvent, Orchestrator},
    stt::HttpSttClient,
    tts::CommandSpeechEngine,
    worker::SHUTDOWN_TIMEOUT,
};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Native options builder
// ---------------------------------------------------------------------------

fn native_options(config: &AppConfig) -> eframe::NativeOptions {
    let mut vp = egui::ViewportBuilder::default()
        .with_title(format!("{} Sorting Hat", config.academy_name))
        .with_inner_size([960.0, 720.0])
        .with_min_inner_size([640.0, 480.0]);

    if config.ui.fullscreen {
        vp = vp.with_fullscreen(true).with_decorations(false);
    }

    eframe::NativeOptions {
        viewport: vp,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Presenters
// ---------------------------------------------------------------------------

fn build_sprite(config: &AppConfig) -> SpritePresenter {
    let assets = &config.assets;
    let idle = SpriteAsset::load(&config.asset_path(&assets.idle_sprite), assets.idle_scale);
    let speaking = SpriteAsset::load(
        &config.asset_path(&assets.speaking_sprite),
        assets.speaking_scale,
    );
    SpritePresenter::new(idle, speaking)
}

fn build_scene(config: &AppConfig) -> ScenePresenter {
    let assets = &config.assets;
    let engine = TimelineEngine::new(assets.scene_duration_ms, assets.scene_supports_reverse);
    ScenePresenter::new(Box::new(engine), config.asset_path(&assets.scene_clip))
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Sorting Hat kiosk starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    // 4. Collaborators
    let services = Collaborators {
        capture: Arc::new(CpalCaptureDevice),
        stt: Arc::new(HttpSttClient::from_config(&config.api)),
        llm: Arc::new(DeepSeekClient::from_config(&config.api)),
        tts: Arc::new(CommandSpeechEngine::from_settings(&config.tts_settings)),
    };
    if config.api.resolved_api_key().is_none() {
        log::warn!("No API key configured; transcription and dialogue will fail");
    }

    // 5. Presenters + shared view
    let (events_tx, events_rx) = mpsc::unbounded_channel::<KioskEvent>();
    let view = new_shared_view();
    let sprite = build_sprite(&config);
    let sheets = sprite.sheets();
    let orchestrator = Orchestrator::new(
        config.clone(),
        services,
        sprite,
        build_scene(&config),
        Arc::clone(&view),
        events_tx.clone(),
    );

    // 6. Orchestrator loop
    let session_task = rt.spawn(orchestrator.run(events_rx));

    // 7. Hotkey listener thread
    let _hotkey_listener = match HotkeyListener::start(key_bindings(&config.hotkey), events_tx.clone())
    {
        Ok(listener) => Some(listener),
        Err(e) => {
            log::error!("Failed to start hotkey listener: {e}");
            None
        }
    };

    // 8. Background music
    let music = BackgroundMusic::start(
        &config.asset_path(&config.music.file),
        config.music.level,
        config.music.muted,
    );

    // 9. Window (blocks until closed)
    let app = KioskApp::new(Arc::clone(&view), events_tx.clone(), &config, sheets, music);
    let ui_result = eframe::run_native(
        "Sorting Hat",
        native_options(&config),
        Box::new(move |_cc| Ok(Box::new(app))),
    );

    // 10. Orderly shutdown
    let _ = events_tx.send(KioskEvent::Shutdown);
    let grace = SHUTDOWN_TIMEOUT + Duration::from_secs(1);
    rt.block_on(async {
        if tokio::time::timeout(grace, session_task).await.is_err() {
            log::error!("Orchestrator did not stop within {grace:?}");
        }
    });
    rt.shutdown_timeout(Duration::from_millis(500));
    log::info!("Sorting Hat kiosk stopped");

    ui_result.map_err(|e| anyhow::anyhow!("window error: {e}"))
}
