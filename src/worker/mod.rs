//! Background workers and their lifecycle harness.
//!
//! # Architecture
//!
//! ```text
//!  Orchestrator ──spawn_*──▶ WorkerHarness ──▶ tokio task (+ spawn_blocking)
//!       ▲                         │                     │
//!       │                         ▼                     │ Reporter::report
//!       │                   WorkerHandle                ▼
//!       └──────────── KioskEvent::Worker(WorkerEvent { kind, generation, .. })
//! ```
//!
//! Every spawn gets a fresh [`Generation`].  The orchestrator remembers the
//! generation it expects per [`WorkerKind`] and drops anything else, so a
//! result that races a cancel can never drive a transition.

pub mod handle;
pub mod jobs;

use std::fmt;
use std::time::Duration;

use crate::audio::RecordingArtifact;
use crate::session::KioskError;
use crate::stt::Transcript;

pub use handle::{JoinOutcome, Reporter, WorkerHandle, WorkerStats, FORCE_GRACE};
pub use jobs::{CaptureTarget, WorkerHarness};

#[cfg(test)]
pub use jobs::MockCaptureDevice;

/// Join timeout once shutdown begins, for every kind.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(3500);

// ---------------------------------------------------------------------------
// WorkerKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerKind {
    Capture,
    Transcription,
    Dialogue,
    Narration,
}

impl WorkerKind {
    pub const ALL: [WorkerKind; 4] = [
        WorkerKind::Capture,
        WorkerKind::Transcription,
        WorkerKind::Dialogue,
        WorkerKind::Narration,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            WorkerKind::Capture => 0,
            WorkerKind::Transcription => 1,
            WorkerKind::Dialogue => 2,
            WorkerKind::Narration => 3,
        }
    }

    /// How long an interrupt waits before forcing termination.
    pub fn interrupt_timeout(self) -> Duration {
        match self {
            WorkerKind::Capture | WorkerKind::Transcription => Duration::from_millis(1000),
            WorkerKind::Dialogue | WorkerKind::Narration => Duration::from_millis(1500),
        }
    }
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerKind::Capture => "capture",
            WorkerKind::Transcription => "transcription",
            WorkerKind::Dialogue => "dialogue",
            WorkerKind::Narration => "narration",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Monotonic spawn counter shared by all kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(pub u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Payload of a successful worker run.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerOutput {
    Recording(RecordingArtifact),
    Transcript(Transcript),
    Reply(String),
    Narrated,
}

/// One result, tagged with who produced it.
#[derive(Debug)]
pub struct WorkerEvent {
    pub kind: WorkerKind,
    pub generation: Generation,
    pub outcome: Result<WorkerOutput, KioskError>,
}
