//! Session orchestrator: the single owner of session, worker and presenter
//! state.
//!
//! [`Orchestrator`] consumes [`KioskEvent`]s from one `tokio::sync::mpsc`
//! channel (user actions from the UI and hotkeys, worker results) and ticks
//! the presenters on a fixed interval.  Workers never touch anything here;
//! they only send results back through the same channel.
//!
//! # Flow
//!
//! ```text
//! Activate ─▶ interrupt all, new session ─▶ dialogue(None)          [Consulting]
//! Record   ─▶ interrupt all ─▶ capture                              [AwaitingRecording]
//! Stop     ─▶ capture.request_stop()
//! capture  ─▶ artifact ok?  ─▶ transcription                        [Transcribing]
//!                  └─ too short ─▶ re-prompt, same step             [AwaitingRecording]
//! transcript ─▶ heard ─▶ dialogue(text)                             [Consulting]
//!                  └─ blank ─▶ re-prompt, same step                 [AwaitingRecording]
//! reply    ─▶ step+1 (or FINAL) ─▶ sprite/scene speak ─▶ narration  [Narrating]
//! narrated ─▶ sprite idle, scene reverse ─▶ FINAL? reset : await answer
//! fatal    ─▶ interrupt all ─▶ reset                                [ErrorRecovery → Idle]
//! ```
//!
//! Every spawn records the worker's [`Generation`]; a result whose
//! generation is not the one expected for its kind is dropped unseen.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::audio::{CaptureDevice, RecordingArtifact};
use crate::config::AppConfig;
use crate::llm::{DialogueTurn, LanguageModel, PromptBuilder};
use crate::presenter::{
    PresenterEvent, PresenterId, ScenePresenter, SpritePresenter, SpriteState,
};
use crate::stt::{LanguageMode, SttClient, Transcript};
use crate::tts::SpeechEngine;
use crate::worker::{
    CaptureTarget, Generation, JoinOutcome, WorkerEvent, WorkerHandle, WorkerHarness,
    WorkerKind, WorkerOutput, WorkerStats, SHUTDOWN_TIMEOUT,
};

use super::error::KioskError;
use super::event::{KioskEvent, UserAction};
use super::state::{Affordances, CapturePhase, OracleState, Session, SessionState};
use super::view::SharedView;

/// Presenter tick interval of [`Orchestrator::run`].
pub const TICK: Duration = Duration::from_millis(40);

const FALLBACK_TONES: [&str; 3] = ["friendly", "wise", "perceptive"];

/// External services the workers talk to.
#[derive(Clone)]
pub struct Collaborators {
    pub capture: Arc<dyn CaptureDevice>,
    pub stt: Arc<dyn SttClient>,
    pub llm: Arc<dyn LanguageModel>,
    pub tts: Arc<dyn SpeechEngine>,
}

/// Whether the event loop keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Shutdown,
}

pub struct Orchestrator {
    config: AppConfig,
    prompts: PromptBuilder,
    language_mode: LanguageMode,
    services: Collaborators,
    harness: WorkerHarness,
    workers: HashMap<WorkerKind, WorkerHandle>,
    expected: HashMap<WorkerKind, Generation>,
    state: SessionState,
    session: Session,
    oracle: OracleState,
    sprite: SpritePresenter,
    scene: ScenePresenter,
    /// Set by the sprite's first cycle-complete; gates every affordance.
    ready: bool,
    just_sorted: bool,
    tones: Vec<String>,
    tone: String,
    status: String,
    view: SharedView,
}

impl Orchestrator {
    pub fn new(
        config: AppConfig,
        services: Collaborators,
        sprite: SpritePresenter,
        scene: ScenePresenter,
        view: SharedView,
        events: mpsc::UnboundedSender<KioskEvent>,
    ) -> Self {
        let mut tones: Vec<String> = config.get("hat_characteristics.emotions_to_display", Vec::new());
        if tones.is_empty() {
            tones = FALLBACK_TONES.iter().map(|t| t.to_string()).collect();
        }
        let tone = tones
            .first()
            .cloned()
            .unwrap_or_else(|| "friendly".to_string());
        let language_mode = LanguageMode::from_setting(config.get("stt_input_language_mode", 1));
        let session = Session::plan(config.session.question_range());

        Self {
            prompts: PromptBuilder::from_config(&config),
            language_mode,
            services,
            harness: WorkerHarness::new(events),
            workers: HashMap::new(),
            expected: HashMap::new(),
            state: SessionState::Idle,
            session,
            oracle: OracleState::Idle,
            sprite,
            scene,
            ready: false,
            just_sorted: false,
            tones,
            tone,
            status: "Initializing...".into(),
            view,
            config,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn oracle(&self) -> OracleState {
        self.oracle
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn tone(&self) -> &str {
        &self.tone
    }

    pub fn worker_stats(&self) -> Arc<WorkerStats> {
        self.harness.stats()
    }

    /// Allowed actions right now.  Nothing is allowed before the sprite has
    /// drawn its first frame.
    pub fn affordances(&self) -> Affordances {
        if self.ready {
            self.state.affordances()
        } else {
            Affordances::NONE
        }
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Bring up the presenters.  Called once by [`run`](Self::run).
    pub fn start(&mut self) {
        log::info!(
            "session: starting ({} planned questions)",
            self.session.questions_planned
        );
        self.sprite.set_idle_loop();
        self.scene.initialize();
        self.drain_presenters();
        self.publish();
    }

    /// Run until a [`KioskEvent::Shutdown`] arrives or every sender is gone.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<KioskEvent>) {
        self.start();
        let mut ticker = tokio::time::interval(TICK);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        if self.handle_event(event).await == Flow::Shutdown {
                            break;
                        }
                    }
                    None => {
                        log::info!("session: event channel closed");
                        self.shutdown().await;
                        break;
                    }
                },
                _ = ticker.tick() => self.tick(TICK),
            }
        }

        log::info!("session: orchestrator stopped");
    }

    /// Advance presenter animations by `dt`.
    pub fn tick(&mut self, dt: Duration) {
        self.sprite.advance(dt);
        self.scene.pump(dt);
        self.drain_presenters();
        self.publish();
    }

    pub async fn handle_event(&mut self, event: KioskEvent) -> Flow {
        match event {
            KioskEvent::User(action) => self.handle_user(action).await,
            KioskEvent::Worker(event) => self.handle_worker(event).await,
            KioskEvent::Shutdown => {
                self.shutdown().await;
                return Flow::Shutdown;
            }
        }
        self.drain_presenters();
        self.publish();
        Flow::Continue
    }

    // -----------------------------------------------------------------------
    // User actions
    // -----------------------------------------------------------------------

    async fn handle_user(&mut self, action: UserAction) {
        let allowed = self.affordances();
        match action {
            UserAction::Activate if allowed.activate => self.activate().await,
            UserAction::Record if allowed.record => self.start_recording().await,
            UserAction::Stop if allowed.stop => self.stop_recording(),
            UserAction::SelectTone(tone) => {
                log::info!("session: tone set to {tone:?}");
                self.tone = tone;
            }
            other => log::debug!("session: {other:?} ignored in {:?}", self.state),
        }
    }

    async fn activate(&mut self) {
        log::info!("session: activate");
        self.interrupt_all().await;
        self.reset_session();
        self.rest_presenters();

        self.oracle = OracleState::Thinking;
        self.state = SessionState::Consulting;
        self.set_status("Oracle is preparing its first question...");
        self.start_dialogue(None).await;
    }

    async fn start_recording(&mut self) {
        match self.state {
            SessionState::Idle => self.reset_session(),
            SessionState::Transcribing | SessionState::Consulting | SessionState::Narrating => {
                log::info!("session: recording interrupts {:?}", self.state);
                self.interrupt_all().await;
                self.rest_presenters();
            }
            // Answering: the scene may still be rewinding from the question.
            _ => self.interrupt_all().await,
        }
        self.oracle = OracleState::Idle;

        let target = CaptureTarget {
            path: self.config.artifact_path(),
            sample_rate: self.config.audio.sample_rate,
            channels: self.config.audio.channels,
        };
        let device = Arc::clone(&self.services.capture);
        self.replace_worker(WorkerKind::Capture, |h| h.spawn_capture(device, target))
            .await;

        self.state = SessionState::AwaitingRecording(CapturePhase::Listening);
        let status = format!(
            "Listening (for Q{} or initial input)... Press 'Stop Recording' ({}) when done.",
            self.session.step + 1,
            self.config.hotkey.stop_key
        );
        self.set_status(status);
    }

    fn stop_recording(&mut self) {
        match self.workers.get(&WorkerKind::Capture) {
            Some(capture) if capture.request_stop() => {
                self.state = SessionState::AwaitingRecording(CapturePhase::Finishing);
                self.set_status("Recording stopped, processing audio...");
            }
            _ => log::warn!("session: stop requested with no capture running"),
        }
    }

    // -----------------------------------------------------------------------
    // Worker results
    // -----------------------------------------------------------------------

    async fn handle_worker(&mut self, event: WorkerEvent) {
        let WorkerEvent {
            kind,
            generation,
            outcome,
        } = event;

        if self.expected.get(&kind) != Some(&generation) {
            log::warn!("session: dropping stale {kind} result {generation}");
            return;
        }
        self.expected.remove(&kind);
        if let Some(done) = self.workers.remove(&kind) {
            done.join(kind.interrupt_timeout()).await;
        }

        match (kind, outcome) {
            (WorkerKind::Capture, Ok(WorkerOutput::Recording(artifact))) => {
                self.on_recording(artifact).await
            }
            (WorkerKind::Transcription, Ok(WorkerOutput::Transcript(transcript))) => {
                self.on_transcript(transcript).await
            }
            (WorkerKind::Dialogue, Ok(WorkerOutput::Reply(reply))) => self.on_reply(reply).await,
            (WorkerKind::Narration, Ok(WorkerOutput::Narrated)) => self.on_narrated(),
            (_, Err(e)) if e.is_recoverable() => self.reprompt(&e.to_string()),
            (_, Err(e)) => self.fail(e).await,
            (kind, Ok(other)) => {
                self.fail(KioskError::Internal(format!(
                    "{kind} worker returned {other:?}"
                )))
                .await
            }
        }
    }

    async fn on_recording(&mut self, artifact: RecordingArtifact) {
        let Some(path) = artifact.usable_path().map(|p| p.to_path_buf()) else {
            log::warn!("session: {:?} is not usable", artifact);
            self.reprompt(&KioskError::EmptyCapture.to_string());
            return;
        };

        self.state = SessionState::Transcribing;
        self.oracle = OracleState::Thinking;
        self.set_status("Transcribing audio to text...");
        let client = Arc::clone(&self.services.stt);
        let mode = self.language_mode;
        self.replace_worker(WorkerKind::Transcription, |h| {
            h.spawn_transcription(client, path, mode)
        })
        .await;
    }

    async fn on_transcript(&mut self, transcript: Transcript) {
        match transcript {
            Transcript::Heard { text, language } => {
                log::info!("session: heard answer ({language})");
                self.session.last_user_text = Some(text.clone());
                self.state = SessionState::Consulting;
                self.oracle = OracleState::Thinking;
                let status = format!("The {} is thinking...", self.prompts.academy_name());
                self.set_status(status);
                self.start_dialogue(Some(text)).await;
            }
            Transcript::Blank => self.reprompt("Could not understand what you said."),
        }
    }

    async fn on_reply(&mut self, reply: String) {
        self.session.last_reply_text = Some(reply.clone());
        self.session.advance();
        self.oracle = OracleState::Speaking;

        if self.session.is_sorted() {
            self.set_status("Oracle has made its decision. Preparing to speak...");
        } else {
            let status = format!(
                "Oracle asks question {}. Preparing to speak...",
                self.session.step
            );
            self.set_status(status);
        }

        self.sprite.set_speaking(true);
        self.scene.play_forward_once();
        self.state = SessionState::Narrating;

        let engine = Arc::clone(&self.services.tts);
        let voice = self.config.tts_settings.selected_voice();
        let rate = self.config.get("tts_settings.tts_rate", 140u32);
        self.replace_worker(WorkerKind::Narration, |h| {
            h.spawn_narration(engine, reply, voice, rate)
        })
        .await;
    }

    fn on_narrated(&mut self) {
        self.oracle = OracleState::Idle;
        self.sprite.set_idle_loop();
        self.scene.request_reverse_after_current_playback();

        if self.session.is_sorted() {
            log::info!("session: sorting delivered; resetting");
            self.reset_session();
            self.just_sorted = true;
            self.state = SessionState::Idle;
            self.set_status("Sorting complete. Waiting for the next student...");
        } else {
            self.state = SessionState::AwaitingRecording(CapturePhase::Idle);
            let status = format!(
                "Please answer the Oracle's question (Q{}).",
                self.session.step
            );
            self.set_status(status);
        }
    }

    /// Recoverable: ask for the same answer again, keeping the step.
    fn reprompt(&mut self, reason: &str) {
        log::warn!("session: {reason} (step {})", self.session.step);
        self.state = SessionState::AwaitingRecording(CapturePhase::Idle);
        self.oracle = OracleState::Idle;
        if self.sprite.state() != SpriteState::IdleLoop {
            self.sprite.set_idle_loop();
        }
        let status = format!(
            "{reason} Please try answering question {} again.",
            self.session.step + 1
        );
        self.set_status(status);
    }

    /// Fatal: stop everything and start over.
    async fn fail(&mut self, error: KioskError) {
        log::error!("session: {error}");
        self.state = SessionState::ErrorRecovery;
        self.publish();

        self.interrupt_all().await;
        self.rest_presenters();
        self.reset_session();
        self.state = SessionState::Idle;

        let status = format!("Error: {}. Resetting.", error.headline());
        self.set_status(status);
        if let Ok(mut view) = self.view.lock() {
            view.error = Some(error.to_string());
        }
    }

    // -----------------------------------------------------------------------
    // Workers
    // -----------------------------------------------------------------------

    async fn start_dialogue(&mut self, user_text: Option<String>) {
        let turn = DialogueTurn {
            step: self.session.step,
            planned: self.session.questions_planned,
            user_text,
            tone: self.tone.clone(),
        };
        let llm = Arc::clone(&self.services.llm);
        let prompts = self.prompts.clone();
        self.replace_worker(WorkerKind::Dialogue, |h| {
            h.spawn_dialogue(llm, prompts, turn)
        })
        .await;
    }

    /// Stop any previous worker of `kind`, then spawn a new one.
    async fn replace_worker(
        &mut self,
        kind: WorkerKind,
        spawn: impl FnOnce(&mut WorkerHarness) -> WorkerHandle,
    ) {
        if let Some(old) = self.workers.remove(&kind) {
            self.expected.remove(&kind);
            old.cancel();
            if old.join(kind.interrupt_timeout()).await == JoinOutcome::ForcedTermination {
                log::warn!("session: previous {kind} worker was forced down");
            }
        }
        let handle = spawn(&mut self.harness);
        self.expected.insert(kind, handle.generation());
        self.workers.insert(kind, handle);
    }

    /// Cancel every live worker, then join each with its own timeout.
    async fn interrupt_all(&mut self) {
        self.join_all(|kind| kind.interrupt_timeout()).await;
    }

    async fn join_all(&mut self, timeout: impl Fn(WorkerKind) -> Duration) {
        self.expected.clear();
        let handles: Vec<WorkerHandle> = WorkerKind::ALL
            .iter()
            .filter_map(|kind| self.workers.remove(kind))
            .collect();
        for handle in &handles {
            handle.cancel();
        }
        for handle in handles {
            let kind = handle.kind();
            if handle.join(timeout(kind)).await == JoinOutcome::ForcedTermination {
                log::warn!("session: {kind} worker did not stop cleanly");
            }
        }
    }

    async fn shutdown(&mut self) {
        log::info!("session: shutting down");
        self.set_status("Shutting down application...");
        self.join_all(|_| SHUTDOWN_TIMEOUT).await;
        self.scene.stop_all();
        self.publish();
    }

    // -----------------------------------------------------------------------
    // Session and presenters
    // -----------------------------------------------------------------------

    fn reset_session(&mut self) {
        self.session = Session::plan(self.config.session.question_range());
        self.oracle = OracleState::Idle;
        self.just_sorted = false;
        log::info!(
            "session: new session with {} planned questions",
            self.session.questions_planned
        );
        if let Ok(mut view) = self.view.lock() {
            view.error = None;
        }
    }

    fn rest_presenters(&mut self) {
        if self.sprite.state() != SpriteState::IdleLoop {
            self.sprite.set_idle_loop();
        }
        self.scene.settle();
    }

    fn drain_presenters(&mut self) {
        let events: Vec<PresenterEvent> = self
            .sprite
            .take_events()
            .into_iter()
            .chain(self.scene.take_events())
            .collect();

        for PresenterEvent::CycleComplete(presenter) in events {
            match presenter {
                PresenterId::Sprite => self.on_sprite_cycle(),
                PresenterId::Scene => log::debug!("scene: at rest"),
            }
        }
    }

    fn on_sprite_cycle(&mut self) {
        if !self.ready {
            self.ready = true;
            log::info!("session: kiosk ready");
        }
        match self.state {
            SessionState::Idle if self.oracle == OracleState::Idle => {
                let status = if self.just_sorted {
                    "Sorting complete. Waiting for the next student..."
                } else {
                    "Waiting for a lucky student..."
                };
                self.set_status(status);
            }
            SessionState::AwaitingRecording(CapturePhase::Idle)
                if self.session.step > 0 && !self.session.is_sorted() =>
            {
                let status = format!(
                    "Oracle awaits your answer to question {}...",
                    self.session.step
                );
                self.set_status(status);
            }
            _ => {}
        }
    }

    fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
        log::debug!("status: {}", self.status);
    }

    fn publish(&self) {
        let Ok(mut view) = self.view.lock() else {
            return;
        };
        view.status = self.status.clone();
        view.state = self.state;
        view.oracle = self.oracle;
        view.affordances = self.affordances();
        view.step = self.session.step;
        view.questions_planned = self.session.questions_planned;
        view.last_user_text = self.session.last_user_text.clone();
        view.last_reply_text = self.session.last_reply_text.clone();
        view.sprite = self.sprite.current_frame();
        view.scene = Some(self.scene.snapshot());
        view.tones = self.tones.clone();
        view.tone = self.tone.clone();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
