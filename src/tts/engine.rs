//! Speech engine trait and a command-line implementation.
//!
//! [`SpeechEngine::speak`] blocks the calling thread until the utterance
//! finishes or its [`CancellationToken`] fires; [`SpeechEngine::stop`] may be
//! called from any other thread and makes an in-progress `speak` return
//! early.  A token cancelled before the synthesizer starts still wins: the
//! engine checks it again once the process exists.
//!
//! [`CommandSpeechEngine`] shells out to `espeak-ng` / `espeak` (Linux,
//! Windows) or `say` (macOS).  `stop` kills the child process.

use std::process::{Child, Command, Stdio};
#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::TtsSettings;

/// How often a blocking `speak` checks whether the child has exited.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

// ---------------------------------------------------------------------------
// TtsError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TtsError {
    /// The engine could not be started at all.
    #[error("speech engine unavailable: {0}")]
    Init(String),

    /// The engine started but the utterance failed.
    #[error("speech synthesis failed: {0}")]
    Synthesis(String),
}

// ---------------------------------------------------------------------------
// SpeechEngine trait
// ---------------------------------------------------------------------------

/// Blocking text-to-speech with cross-thread interruption.
pub trait SpeechEngine: Send + Sync {
    /// Speak `text`, blocking until done, stopped, or `cancel` fires.
    /// `voice` of `None` means the engine default; `rate` is in words per
    /// minute.  An interrupted utterance returns `Ok`.
    fn speak(
        &self,
        text: &str,
        voice: Option<&str>,
        rate: u32,
        cancel: &CancellationToken,
    ) -> Result<(), TtsError>;

    /// Interrupt any in-progress `speak`.
    fn stop(&self);
}

// ---------------------------------------------------------------------------
// CommandSpeechEngine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Espeak,
    Say,
}

/// The process behind the current `speak`.
struct Utterance {
    child: Child,
    /// Set by `stop`; a killed child then counts as a clean finish.
    stopped: bool,
}

impl Utterance {
    fn interrupt(&mut self) {
        self.stopped = true;
        let _ = self.child.kill();
    }
}

/// Speech through an external synthesizer process.
pub struct CommandSpeechEngine {
    program: String,
    flavor: Flavor,
    volume: f32,
    current: Mutex<Option<Utterance>>,
}

impl CommandSpeechEngine {
    pub fn new(program: impl Into<String>, volume: f32) -> Self {
        let program = program.into();
        let flavor = if program.rsplit(['/', '\\']).next() == Some("say") {
            Flavor::Say
        } else {
            Flavor::Espeak
        };
        Self {
            program,
            flavor,
            volume: volume.clamp(0.0, 1.0),
            current: Mutex::new(None),
        }
    }

    pub fn from_settings(settings: &TtsSettings) -> Self {
        Self::new(settings.program.clone(), settings.volume)
    }

    fn command(&self, text: &str, voice: Option<&str>, rate: u32) -> Command {
        let mut cmd = Command::new(&self.program);
        match self.flavor {
            Flavor::Espeak => {
                cmd.arg("-s").arg(rate.to_string());
                cmd.arg("-a").arg(((self.volume * 100.0).round() as u32).to_string());
                if let Some(v) = voice {
                    cmd.arg("-v").arg(v);
                }
                cmd.arg("--");
            }
            Flavor::Say => {
                cmd.arg("-r").arg(rate.to_string());
                if let Some(v) = voice {
                    cmd.arg("-v").arg(v);
                }
            }
        }
        cmd.arg(text);
        cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());
        cmd
    }
}

impl SpeechEngine for CommandSpeechEngine {
    fn speak(
        &self,
        text: &str,
        voice: Option<&str>,
        rate: u32,
        cancel: &CancellationToken,
    ) -> Result<(), TtsError> {
        if cancel.is_cancelled() {
            return Ok(());
        }
        let child = self
            .command(text, voice, rate)
            .spawn()
            .map_err(|e| TtsError::Init(format!("cannot start {}: {e}", self.program)))?;
        log::debug!("tts: {} started (pid {})", self.program, child.id());

        {
            let mut slot = self
                .current
                .lock()
                .map_err(|_| TtsError::Synthesis("engine state poisoned".into()))?;
            *slot = Some(Utterance {
                child,
                stopped: false,
            });
        }

        loop {
            {
                let mut slot = self
                    .current
                    .lock()
                    .map_err(|_| TtsError::Synthesis("engine state poisoned".into()))?;
                let Some(utterance) = slot.as_mut() else {
                    return Ok(());
                };
                // Covers a stop that arrived before the process existed.
                if cancel.is_cancelled() && !utterance.stopped {
                    log::debug!("tts: cancelled; killing {}", self.program);
                    utterance.interrupt();
                }
                match utterance.child.try_wait() {
                    Ok(Some(status)) => {
                        let stopped = utterance.stopped;
                        slot.take();
                        if status.success() || stopped {
                            return Ok(());
                        }
                        return Err(TtsError::Synthesis(format!(
                            "{} exited with {status}",
                            self.program
                        )));
                    }
                    Ok(None) => {}
                    Err(e) => {
                        slot.take();
                        return Err(TtsError::Synthesis(e.to_string()));
                    }
                }
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn stop(&self) {
        if let Ok(mut slot) = self.current.lock() {
            if let Some(utterance) = slot.as_mut() {
                utterance.interrupt();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MockSpeechEngine  (test only)
// ---------------------------------------------------------------------------

/// Records what it was asked to say.  With `hold` set, `speak` blocks until
/// its token is cancelled.
#[cfg(test)]
pub struct MockSpeechEngine {
    pub spoken: Mutex<Vec<String>>,
    pub fail_init: bool,
    hold: bool,
    stops: AtomicUsize,
}

#[cfg(test)]
impl MockSpeechEngine {
    pub fn instant() -> Self {
        Self {
            spoken: Mutex::new(Vec::new()),
            fail_init: false,
            hold: false,
            stops: AtomicUsize::new(0),
        }
    }

    pub fn holding() -> Self {
        Self {
            hold: true,
            ..Self::instant()
        }
    }

    pub fn broken() -> Self {
        Self {
            fail_init: true,
            ..Self::instant()
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
impl SpeechEngine for MockSpeechEngine {
    fn speak(
        &self,
        text: &str,
        _voice: Option<&str>,
        _rate: u32,
        cancel: &CancellationToken,
    ) -> Result<(), TtsError> {
        if self.fail_init {
            return Err(TtsError::Init("mock engine missing".into()));
        }
        if cancel.is_cancelled() {
            return Ok(());
        }
        self.spoken.lock().unwrap().push(text.to_string());
        while self.hold && !cancel.is_cancelled() {
            std::thread::sleep(Duration::from_millis(5));
        }
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flavor_follows_program_name() {
        assert_eq!(CommandSpeechEngine::new("say", 0.9).flavor, Flavor::Say);
        assert_eq!(
            CommandSpeechEngine::new("/usr/bin/say", 0.9).flavor,
            Flavor::Say
        );
        assert_eq!(
            CommandSpeechEngine::new("espeak-ng", 0.9).flavor,
            Flavor::Espeak
        );
    }

    #[test]
    fn missing_program_is_an_init_error() {
        let engine = CommandSpeechEngine::new("definitely-not-a-speech-program-xyz", 0.9);
        let err = engine
            .speak("hello", None, 140, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, TtsError::Init(_)));
    }

    #[test]
    fn stop_without_speech_is_harmless() {
        let engine = CommandSpeechEngine::new("espeak-ng", 0.9);
        engine.stop();
        engine.stop();
    }

    #[test]
    fn espeak_arguments_include_rate_volume_and_voice() {
        let engine = CommandSpeechEngine::new("espeak-ng", 0.9);
        let cmd = engine.command("Hello", Some("en-us"), 140);
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, vec!["-s", "140", "-a", "90", "-v", "en-us", "--", "Hello"]);
    }

    /// Stand-in synthesizer that ignores its arguments and talks for 5 s.
    #[cfg(unix)]
    fn slow_synth(dir: &tempfile::TempDir) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("slow-espeak");
        std::fs::write(&path, "#!/bin/sh\nexec sleep 5\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    #[test]
    fn stop_before_process_starts_still_interrupts() {
        let dir = tempfile::tempdir().unwrap();
        let engine = CommandSpeechEngine::new(slow_synth(&dir), 0.9);
        let cancel = CancellationToken::new();

        // The worker was cancelled and the hook fired with no child running yet.
        cancel.cancel();
        engine.stop();

        let started = std::time::Instant::now();
        engine.speak("hello", None, 140, &cancel).unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[cfg(unix)]
    #[test]
    fn cancel_mid_utterance_kills_the_process() {
        let dir = tempfile::tempdir().unwrap();
        let engine = std::sync::Arc::new(CommandSpeechEngine::new(slow_synth(&dir), 0.9));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        let stopper = std::sync::Arc::clone(&engine);
        let t = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            trigger.cancel();
            stopper.stop();
        });

        let started = std::time::Instant::now();
        engine.speak("hello", None, 140, &cancel).unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
        t.join().unwrap();
    }

    #[test]
    fn mock_honours_a_token_cancelled_before_speaking() {
        let engine = MockSpeechEngine::holding();
        let cancel = CancellationToken::new();
        engine.stop();
        cancel.cancel();

        engine.speak("Welcome", None, 140, &cancel).unwrap();
        assert!(engine.spoken().is_empty());
        assert_eq!(engine.stops(), 1);
    }
}
