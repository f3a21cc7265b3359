//! Worker handles, result reporting, and live-handle accounting.
//!
//! A [`WorkerHandle`] owns one spawned worker task.  Its contract:
//!
//! * the worker reports through a [`Reporter`] at most once;
//! * after [`WorkerHandle::cancel`] the reporter stays silent;
//! * [`WorkerHandle::join`] waits up to a timeout, then aborts the task and
//!   gives it [`FORCE_GRACE`] to unwind.  A blocking thread that ignores the
//!   abort is left behind and logged, never waited on;
//! * dropping an unfinished handle cancels its worker.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{Generation, WorkerEvent, WorkerKind, WorkerOutput};
use crate::session::{KioskError, KioskEvent};

/// Extra wait after a forced abort before giving up on the task.
pub const FORCE_GRACE: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// WorkerStats
// ---------------------------------------------------------------------------

/// Live and peak handle counts per worker kind.
#[derive(Debug, Default)]
pub struct WorkerStats {
    live: [AtomicUsize; 4],
    peak: [AtomicUsize; 4],
}

impl WorkerStats {
    pub fn live(&self, kind: WorkerKind) -> usize {
        self.live[kind.index()].load(Ordering::SeqCst)
    }

    /// Highest simultaneous live count seen for `kind`.
    pub fn peak(&self, kind: WorkerKind) -> usize {
        self.peak[kind.index()].load(Ordering::SeqCst)
    }
}

/// Counts one live handle for as long as it exists.
pub(crate) struct LiveGuard {
    stats: Arc<WorkerStats>,
    kind: WorkerKind,
}

impl LiveGuard {
    pub(crate) fn enter(stats: Arc<WorkerStats>, kind: WorkerKind) -> Self {
        let now = stats.live[kind.index()].fetch_add(1, Ordering::SeqCst) + 1;
        stats.peak[kind.index()].fetch_max(now, Ordering::SeqCst);
        Self { stats, kind }
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.stats.live[self.kind.index()].fetch_sub(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Reporter
// ---------------------------------------------------------------------------

/// The worker side of the result channel.  Consumed by the single report.
pub struct Reporter {
    kind: WorkerKind,
    generation: Generation,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<KioskEvent>,
}

impl Reporter {
    pub(crate) fn new(
        kind: WorkerKind,
        generation: Generation,
        cancel: CancellationToken,
        events: mpsc::UnboundedSender<KioskEvent>,
    ) -> Self {
        Self {
            kind,
            generation,
            cancel,
            events,
        }
    }

    /// Deliver the outcome unless the worker was cancelled first.
    pub fn report(self, outcome: Result<WorkerOutput, KioskError>) {
        if self.cancel.is_cancelled() {
            log::debug!(
                "{} worker {} finished after cancel; result discarded",
                self.kind,
                self.generation
            );
            return;
        }
        let event = WorkerEvent {
            kind: self.kind,
            generation: self.generation,
            outcome,
        };
        if self.events.send(KioskEvent::Worker(event)).is_err() {
            log::debug!("{} worker {}: event loop gone", self.kind, self.generation);
        }
    }
}

// ---------------------------------------------------------------------------
// WorkerHandle
// ---------------------------------------------------------------------------

/// How a [`WorkerHandle::join`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The task ended within the timeout.
    Finished,
    /// The timeout elapsed and the task was aborted.
    ForcedTermination,
}

type InterruptHook = Box<dyn Fn() + Send + Sync>;

/// Owner-side handle of one running worker.
pub struct WorkerHandle {
    kind: WorkerKind,
    generation: Generation,
    cancel: CancellationToken,
    recording: Option<Arc<AtomicBool>>,
    interrupt: Option<InterruptHook>,
    task: JoinHandle<()>,
    _live: LiveGuard,
}

impl WorkerHandle {
    pub(crate) fn new(
        kind: WorkerKind,
        generation: Generation,
        cancel: CancellationToken,
        task: JoinHandle<()>,
        live: LiveGuard,
    ) -> Self {
        Self {
            kind,
            generation,
            cancel,
            recording: None,
            interrupt: None,
            task,
            _live: live,
        }
    }

    /// Capture workers record while this flag is set.
    pub(crate) fn with_recording_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.recording = Some(flag);
        self
    }

    /// Called once on cancel, e.g. to stop an in-progress utterance.
    pub(crate) fn with_interrupt(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.interrupt = Some(Box::new(hook));
        self
    }

    pub fn kind(&self) -> WorkerKind {
        self.kind
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Ask a capture worker to stop recording and deliver what it has.
    ///
    /// Returns `false` for workers without a recording phase.
    pub fn request_stop(&self) -> bool {
        match &self.recording {
            Some(flag) => {
                flag.store(false, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Cooperative cancel.  Idempotent; safe after the worker finished.
    pub fn cancel(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        log::debug!("cancelling {} worker {}", self.kind, self.generation);
        self.cancel.cancel();
        if let Some(flag) = &self.recording {
            flag.store(false, Ordering::SeqCst);
        }
        if let Some(hook) = &self.interrupt {
            hook();
        }
    }

    /// Wait for the task to end, escalating to abort after `timeout`.
    pub async fn join(mut self, timeout: Duration) -> JoinOutcome {
        match tokio::time::timeout(timeout, &mut self.task).await {
            Ok(Ok(())) => JoinOutcome::Finished,
            Ok(Err(e)) => {
                if e.is_panic() {
                    log::error!("{} worker {} panicked", self.kind, self.generation);
                }
                JoinOutcome::Finished
            }
            Err(_) => {
                log::warn!(
                    "{} worker {} did not stop within {:?}; forcing termination",
                    self.kind,
                    self.generation,
                    timeout
                );
                self.task.abort();
                if tokio::time::timeout(FORCE_GRACE, &mut self.task).await.is_err() {
                    log::error!(
                        "{} worker {} still running after abort; its thread may leak",
                        self.kind,
                        self.generation
                    );
                }
                JoinOutcome::ForcedTermination
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if !self.task.is_finished() {
            self.cancel();
        }
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("kind", &self.kind)
            .field("generation", &self.generation)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn handle_for(
        stats: &Arc<WorkerStats>,
        task: JoinHandle<()>,
        cancel: CancellationToken,
    ) -> WorkerHandle {
        WorkerHandle::new(
            WorkerKind::Dialogue,
            Generation(1),
            cancel,
            task,
            LiveGuard::enter(Arc::clone(stats), WorkerKind::Dialogue),
        )
    }

    #[tokio::test]
    async fn live_count_follows_handle_lifetime() {
        let stats = Arc::new(WorkerStats::default());
        let handle = handle_for(&stats, tokio::spawn(async {}), CancellationToken::new());
        assert_eq!(stats.live(WorkerKind::Dialogue), 1);

        assert_eq!(handle.join(Duration::from_secs(1)).await, JoinOutcome::Finished);
        assert_eq!(stats.live(WorkerKind::Dialogue), 0);
        assert_eq!(stats.peak(WorkerKind::Dialogue), 1);
    }

    #[tokio::test]
    async fn cancel_is_idempotent_and_runs_hook_once() {
        let stats = Arc::new(WorkerStats::default());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let handle = handle_for(&stats, tokio::spawn(async {}), CancellationToken::new())
            .with_interrupt(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        handle.join(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn unresponsive_task_is_forced() {
        let stats = Arc::new(WorkerStats::default());
        let task = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(30)).await;
        });
        let handle = handle_for(&stats, task, CancellationToken::new());
        handle.cancel();

        let outcome = handle.join(Duration::from_millis(20)).await;
        assert_eq!(outcome, JoinOutcome::ForcedTermination);
        assert_eq!(stats.live(WorkerKind::Dialogue), 0);
    }

    #[tokio::test]
    async fn reporter_is_silent_after_cancel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let reporter = Reporter::new(WorkerKind::Narration, Generation(4), cancel.clone(), tx);

        cancel.cancel();
        reporter.report(Ok(WorkerOutput::Narrated));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn reporter_delivers_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let reporter = Reporter::new(
            WorkerKind::Dialogue,
            Generation(9),
            CancellationToken::new(),
            tx,
        );
        reporter.report(Ok(WorkerOutput::Reply("Hello".into())));

        match rx.try_recv() {
            Ok(KioskEvent::Worker(ev)) => {
                assert_eq!(ev.kind, WorkerKind::Dialogue);
                assert_eq!(ev.generation, Generation(9));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn request_stop_only_applies_to_capture() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let stats = Arc::new(WorkerStats::default());
            let flag = Arc::new(AtomicBool::new(true));
            let capture = handle_for(&stats, tokio::spawn(async {}), CancellationToken::new())
                .with_recording_flag(Arc::clone(&flag));
            assert!(capture.request_stop());
            assert!(!flag.load(Ordering::SeqCst));

            let other = handle_for(&stats, tokio::spawn(async {}), CancellationToken::new());
            assert!(!other.request_stop());
        });
    }
}
