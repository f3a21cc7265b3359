//! The four worker bodies and the harness that spawns them.
//!
//! Network-bound work (transcription, dialogue) runs as a plain tokio task
//! and races its request against the cancel token.  Device-bound work
//! (capture, narration) runs under `spawn_blocking`; the outer task only
//! awaits it and reports, so a panic still produces an `Internal` error.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::handle::{LiveGuard, Reporter, WorkerHandle, WorkerStats};
use super::{Generation, WorkerKind, WorkerOutput};
use crate::audio::{conform, write_wav, AudioChunk, CaptureDevice, RecordingArtifact};
use crate::llm::{DialogueTurn, LanguageModel, PromptBuilder};
use crate::session::{KioskError, KioskEvent};
use crate::stt::{transcribe_with_fallback, LanguageMode, SttClient};
use crate::tts::{filter_for_speech, SpeechEngine, TtsError};

/// How long the capture loop waits for a frame before re-checking its flags.
const FRAME_WAIT: Duration = Duration::from_millis(20);

/// Where and how the capture worker writes its recording.
#[derive(Debug, Clone)]
pub struct CaptureTarget {
    pub path: PathBuf,
    pub sample_rate: u32,
    pub channels: u16,
}

// ---------------------------------------------------------------------------
// WorkerHarness
// ---------------------------------------------------------------------------

/// Spawns workers with fresh generations and a shared result channel.
pub struct WorkerHarness {
    events: mpsc::UnboundedSender<KioskEvent>,
    stats: Arc<WorkerStats>,
    next_generation: u64,
}

struct Seed {
    kind: WorkerKind,
    generation: Generation,
    cancel: CancellationToken,
    reporter: Reporter,
    live: LiveGuard,
}

impl WorkerHarness {
    pub fn new(events: mpsc::UnboundedSender<KioskEvent>) -> Self {
        Self {
            events,
            stats: Arc::new(WorkerStats::default()),
            next_generation: 0,
        }
    }

    pub fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    fn seed(&mut self, kind: WorkerKind) -> Seed {
        self.next_generation += 1;
        let generation = Generation(self.next_generation);
        let cancel = CancellationToken::new();
        log::debug!("spawning {kind} worker {generation}");
        Seed {
            kind,
            generation,
            reporter: Reporter::new(kind, generation, cancel.clone(), self.events.clone()),
            live: LiveGuard::enter(Arc::clone(&self.stats), kind),
            cancel,
        }
    }

    /// Record until [`WorkerHandle::request_stop`], then write the artifact.
    pub fn spawn_capture(
        &mut self,
        device: Arc<dyn CaptureDevice>,
        target: CaptureTarget,
    ) -> WorkerHandle {
        let Seed {
            kind,
            generation,
            cancel,
            reporter,
            live,
        } = self.seed(WorkerKind::Capture);
        let recording = Arc::new(AtomicBool::new(true));

        let flag = Arc::clone(&recording);
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let job = tokio::task::spawn_blocking(move || {
                record(device.as_ref(), &target, &flag, &token)
            });
            let outcome = match job.await {
                Ok(Ok(Some(artifact))) => Ok(WorkerOutput::Recording(artifact)),
                Ok(Ok(None)) => return,
                Ok(Err(e)) => Err(e),
                Err(e) => Err(KioskError::Internal(format!("capture worker failed: {e}"))),
            };
            reporter.report(outcome);
        });

        WorkerHandle::new(kind, generation, cancel, task, live).with_recording_flag(recording)
    }

    /// Transcribe the artifact at `artifact` under the configured language mode.
    pub fn spawn_transcription(
        &mut self,
        client: Arc<dyn SttClient>,
        artifact: PathBuf,
        mode: LanguageMode,
    ) -> WorkerHandle {
        let Seed {
            kind,
            generation,
            cancel,
            reporter,
            live,
        } = self.seed(WorkerKind::Transcription);

        let token = cancel.clone();
        let task = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                result = transcribe_with_fallback(client.as_ref(), &artifact, mode) => {
                    reporter.report(
                        result
                            .map(WorkerOutput::Transcript)
                            .map_err(KioskError::TranscriptionFailure),
                    );
                }
            }
        });

        WorkerHandle::new(kind, generation, cancel, task, live)
    }

    /// Ask the language model for the Oracle's next line.
    pub fn spawn_dialogue(
        &mut self,
        llm: Arc<dyn LanguageModel>,
        prompts: PromptBuilder,
        turn: DialogueTurn,
    ) -> WorkerHandle {
        let Seed {
            kind,
            generation,
            cancel,
            reporter,
            live,
        } = self.seed(WorkerKind::Dialogue);

        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let system = prompts.system_prompt(&turn);
            let user = prompts.user_message(&turn);
            let max_tokens = prompts.max_tokens(&turn);
            log::info!(
                "dialogue: step {}/{} ({} tokens)",
                turn.step,
                turn.planned,
                max_tokens
            );
            tokio::select! {
                _ = token.cancelled() => {}
                result = llm.complete(&system, &user, max_tokens, prompts.temperature()) => {
                    reporter.report(
                        result
                            .map(WorkerOutput::Reply)
                            .map_err(KioskError::DialogueApi),
                    );
                }
            }
        });

        WorkerHandle::new(kind, generation, cancel, task, live)
    }

    /// Speak `text` aloud.  Cancelling stops the engine mid-utterance.
    pub fn spawn_narration(
        &mut self,
        engine: Arc<dyn SpeechEngine>,
        text: String,
        voice: Option<String>,
        rate: u32,
    ) -> WorkerHandle {
        let Seed {
            kind,
            generation,
            cancel,
            reporter,
            live,
        } = self.seed(WorkerKind::Narration);

        let speaker = Arc::clone(&engine);
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let job = tokio::task::spawn_blocking(move || {
                if token.is_cancelled() {
                    return Ok(());
                }
                narrate(speaker.as_ref(), &text, voice.as_deref(), rate, &token)
            });
            let outcome = match job.await {
                Ok(result) => result.map(|()| WorkerOutput::Narrated),
                Err(e) => Err(KioskError::Internal(format!("narration worker failed: {e}"))),
            };
            reporter.report(outcome);
        });

        WorkerHandle::new(kind, generation, cancel, task, live).with_interrupt(move || engine.stop())
    }
}

// ---------------------------------------------------------------------------
// Worker bodies
// ---------------------------------------------------------------------------

/// Blocking capture loop.  `Ok(None)` means cancelled: nothing to report.
fn record(
    device: &dyn CaptureDevice,
    target: &CaptureTarget,
    recording: &AtomicBool,
    cancel: &CancellationToken,
) -> Result<Option<RecordingArtifact>, KioskError> {
    let (tx, rx) = std_mpsc::channel::<AudioChunk>();
    let guard = device
        .open(tx)
        .map_err(|e| KioskError::Device(e.to_string()))?;

    let mut samples = Vec::new();
    let mut absorb = |chunk: AudioChunk| {
        samples.extend(conform(
            &chunk.samples,
            chunk.channels,
            chunk.sample_rate,
            target.sample_rate,
        ));
    };

    while recording.load(Ordering::SeqCst) && !cancel.is_cancelled() {
        match rx.recv_timeout(FRAME_WAIT) {
            Ok(chunk) => absorb(chunk),
            Err(std_mpsc::RecvTimeoutError::Timeout) => {}
            Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    drop(guard);
    while let Ok(chunk) = rx.try_recv() {
        absorb(chunk);
    }

    if cancel.is_cancelled() {
        log::debug!("capture: cancelled with {} samples buffered", samples.len());
        return Ok(None);
    }

    if samples.is_empty() {
        log::warn!("capture: no frames captured");
        return Ok(Some(RecordingArtifact::Empty));
    }

    let artifact = write_wav(&target.path, &samples, target.sample_rate, target.channels)
        .map_err(|e| KioskError::Device(format!("could not save recording: {e}")))?;
    log::info!(
        "capture: {} samples ({:.1}s) saved",
        samples.len(),
        samples.len() as f32 / target.sample_rate.max(1) as f32
    );
    Ok(Some(artifact))
}

fn narrate(
    engine: &dyn SpeechEngine,
    text: &str,
    voice: Option<&str>,
    rate: u32,
    cancel: &CancellationToken,
) -> Result<(), KioskError> {
    let speech = filter_for_speech(text);
    if speech.is_empty() {
        return Err(KioskError::NarrationSynthesis(
            "nothing left to say after filtering".into(),
        ));
    }
    engine.speak(&speech, voice, rate, cancel).map_err(|e| match e {
        TtsError::Init(msg) => KioskError::NarrationInit(msg),
        TtsError::Synthesis(msg) => KioskError::NarrationSynthesis(msg),
    })
}

// ---------------------------------------------------------------------------
// MockCaptureDevice  (test only)
// ---------------------------------------------------------------------------

/// Delivers a fixed set of chunks as soon as it is opened, then stays open
/// until the guard is dropped.
#[cfg(test)]
pub struct MockCaptureDevice {
    chunks: Vec<AudioChunk>,
    fail: bool,
}

#[cfg(test)]
impl MockCaptureDevice {
    /// `seconds` of a quiet tone at 44.1 kHz mono.
    pub fn with_audio(seconds: f32) -> Self {
        let len = (44_100.0 * seconds) as usize;
        let samples = (0..len).map(|i| (i as f32 * 0.05).sin() * 0.2).collect();
        Self {
            chunks: vec![AudioChunk {
                samples,
                sample_rate: 44_100,
                channels: 1,
            }],
            fail: false,
        }
    }

    pub fn silent() -> Self {
        Self {
            chunks: Vec::new(),
            fail: false,
        }
    }

    pub fn unplugged() -> Self {
        Self {
            chunks: Vec::new(),
            fail: true,
        }
    }
}

#[cfg(test)]
impl CaptureDevice for MockCaptureDevice {
    fn open(
        &self,
        tx: std_mpsc::Sender<AudioChunk>,
    ) -> Result<crate::audio::StreamGuard, crate::audio::CaptureError> {
        if self.fail {
            return Err(crate::audio::CaptureError::NoDevice);
        }
        for chunk in &self.chunks {
            let _ = tx.send(chunk.clone());
        }
        Ok(crate::audio::StreamGuard::new(tx))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::llm::MockLanguageModel;
    use crate::stt::{MockSttClient, Transcript};
    use crate::tts::MockSpeechEngine;
    use crate::worker::{JoinOutcome, WorkerEvent};

    fn harness() -> (WorkerHarness, mpsc::UnboundedReceiver<KioskEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (WorkerHarness::new(tx), rx)
    }

    async fn next_worker_event(rx: &mut mpsc::UnboundedReceiver<KioskEvent>) -> WorkerEvent {
        match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Some(KioskEvent::Worker(ev))) => ev,
            other => panic!("expected a worker event, got {other:?}"),
        }
    }

    async fn assert_silent(rx: &mut mpsc::UnboundedReceiver<KioskEvent>) {
        let waited = tokio::time::timeout(Duration::from_millis(150), rx.recv()).await;
        assert!(waited.is_err(), "unexpected event: {waited:?}");
    }

    fn target(dir: &tempfile::TempDir) -> CaptureTarget {
        CaptureTarget {
            path: dir.path().join("student_intro.wav"),
            sample_rate: 44_100,
            channels: 1,
        }
    }

    #[tokio::test]
    async fn capture_writes_artifact_after_stop() {
        let dir = tempfile::tempdir().unwrap();
        let (mut harness, mut rx) = harness();
        let handle = harness.spawn_capture(Arc::new(MockCaptureDevice::with_audio(0.5)), target(&dir));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(handle.request_stop());
        let generation = handle.generation();

        let ev = next_worker_event(&mut rx).await;
        assert_eq!(ev.kind, WorkerKind::Capture);
        assert_eq!(ev.generation, generation);
        match ev.outcome {
            Ok(WorkerOutput::Recording(artifact)) => assert!(artifact.usable_path().is_some()),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(handle.join(Duration::from_secs(1)).await, JoinOutcome::Finished);
    }

    #[tokio::test]
    async fn capture_without_frames_reports_empty() {
        let dir = tempfile::tempdir().unwrap();
        let (mut harness, mut rx) = harness();
        let handle = harness.spawn_capture(Arc::new(MockCaptureDevice::silent()), target(&dir));
        handle.request_stop();

        let ev = next_worker_event(&mut rx).await;
        assert!(matches!(
            ev.outcome,
            Ok(WorkerOutput::Recording(RecordingArtifact::Empty))
        ));
    }

    #[tokio::test]
    async fn capture_device_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let (mut harness, mut rx) = harness();
        let _handle = harness.spawn_capture(Arc::new(MockCaptureDevice::unplugged()), target(&dir));

        let ev = next_worker_event(&mut rx).await;
        assert!(matches!(ev.outcome, Err(KioskError::Device(_))));
    }

    #[tokio::test]
    async fn cancelled_capture_reports_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (mut harness, mut rx) = harness();
        let handle = harness.spawn_capture(Arc::new(MockCaptureDevice::with_audio(0.5)), target(&dir));

        handle.cancel();
        assert_eq!(handle.join(Duration::from_secs(1)).await, JoinOutcome::Finished);
        assert_silent(&mut rx).await;
        assert!(!dir.path().join("student_intro.wav").exists());
    }

    #[tokio::test]
    async fn transcription_reports_heard_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wav");
        write_wav(&path, &vec![0.1; 44_100], 44_100, 1).unwrap();

        let (mut harness, mut rx) = harness();
        let _handle = harness.spawn_transcription(
            Arc::new(MockSttClient::ok("I like frogs")),
            path,
            LanguageMode::PrimaryThenSecondary,
        );

        let ev = next_worker_event(&mut rx).await;
        match ev.outcome {
            Ok(WorkerOutput::Transcript(Transcript::Heard { text, language })) => {
                assert_eq!(text, "I like frogs");
                assert_eq!(language, "en");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn dialogue_cancel_beats_slow_reply() {
        let config = AppConfig::default();
        let (mut harness, mut rx) = harness();
        let llm = MockLanguageModel::scripted(vec![Ok("Too late")])
            .with_delay(Duration::from_secs(10));
        let turn = DialogueTurn {
            step: 0,
            planned: 3,
            user_text: None,
            tone: "kind".into(),
        };
        let handle = harness.spawn_dialogue(Arc::new(llm), PromptBuilder::from_config(&config), turn);

        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();
        assert_eq!(handle.join(Duration::from_millis(1500)).await, JoinOutcome::Finished);
        assert_silent(&mut rx).await;
    }

    #[tokio::test]
    async fn narration_speaks_filtered_text() {
        let (mut harness, mut rx) = harness();
        let engine = Arc::new(MockSpeechEngine::instant());
        let _handle = harness.spawn_narration(
            Arc::clone(&engine) as Arc<dyn SpeechEngine>,
            "*Welcome*, young one!".into(),
            None,
            140,
        );

        let ev = next_worker_event(&mut rx).await;
        assert!(matches!(ev.outcome, Ok(WorkerOutput::Narrated)));
        assert_eq!(engine.spoken(), vec!["Welcome, young one!".to_string()]);
    }

    #[tokio::test]
    async fn narration_of_only_symbols_is_a_synthesis_error() {
        let (mut harness, mut rx) = harness();
        let _handle = harness.spawn_narration(
            Arc::new(MockSpeechEngine::instant()),
            "*** ###".into(),
            None,
            140,
        );

        let ev = next_worker_event(&mut rx).await;
        assert!(matches!(ev.outcome, Err(KioskError::NarrationSynthesis(_))));
    }

    #[tokio::test]
    async fn narration_engine_missing_is_an_init_error() {
        let (mut harness, mut rx) = harness();
        let _handle = harness.spawn_narration(
            Arc::new(MockSpeechEngine::broken()),
            "Hello".into(),
            None,
            140,
        );

        let ev = next_worker_event(&mut rx).await;
        assert!(matches!(ev.outcome, Err(KioskError::NarrationInit(_))));
    }

    #[tokio::test]
    async fn cancel_interrupts_speech() {
        let (mut harness, mut rx) = harness();
        let handle = harness.spawn_narration(
            Arc::new(MockSpeechEngine::holding()),
            "A very long speech".into(),
            None,
            140,
        );

        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.cancel();
        assert_eq!(handle.join(Duration::from_millis(1500)).await, JoinOutcome::Finished);
        assert_silent(&mut rx).await;
    }

    #[tokio::test]
    async fn cancel_before_speech_starts_is_not_lost() {
        let (mut harness, mut rx) = harness();
        let engine = Arc::new(MockSpeechEngine::holding());
        let handle = harness.spawn_narration(
            Arc::clone(&engine) as Arc<dyn SpeechEngine>,
            "A very long speech".into(),
            None,
            140,
        );

        handle.cancel();
        assert_eq!(handle.join(Duration::from_millis(1500)).await, JoinOutcome::Finished);
        assert_eq!(engine.stops(), 1);
        assert_silent(&mut rx).await;
    }

    #[tokio::test]
    async fn generations_increase_across_kinds() {
        let (mut harness, _rx) = harness();
        let a = harness.spawn_narration(Arc::new(MockSpeechEngine::instant()), "a".into(), None, 140);
        let b = harness.spawn_narration(Arc::new(MockSpeechEngine::instant()), "b".into(), None, 140);
        assert!(b.generation() > a.generation());
        assert_eq!(harness.stats().peak(WorkerKind::Narration), 2);
    }
}
