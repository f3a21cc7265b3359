//! Session data and the orchestrator's state machine.
//!
//! ```text
//! Idle ──activate──▶ Consulting ──reply──▶ Narrating ──done──▶ AwaitingRecording
//!  │                    ▲                                        │
//!  └──record──▶ AwaitingRecording ──audio──▶ Transcribing ──text─┘
//!                                                  (step == FINAL_STEP: back to Idle)
//! any ──fatal error──▶ ErrorRecovery ──▶ Idle
//! ```

use std::ops::RangeInclusive;

use rand::Rng;

/// Sub-phase of [`SessionState::AwaitingRecording`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    /// Waiting for the student to press Record.
    Idle,
    /// The capture worker is recording.
    Listening,
    /// Stop was pressed; the artifact is being written.
    Finishing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingRecording(CapturePhase),
    Transcribing,
    Consulting,
    Narrating,
    ErrorRecovery,
}

/// Which user actions are currently allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Affordances {
    pub activate: bool,
    pub record: bool,
    pub stop: bool,
}

impl Affordances {
    pub const NONE: Affordances = Affordances {
        activate: false,
        record: false,
        stop: false,
    };
}

impl SessionState {
    /// ```
    /// use sorting_hat::session::{CapturePhase, SessionState};
    ///
    /// let listening = SessionState::AwaitingRecording(CapturePhase::Listening).affordances();
    /// assert!(listening.stop && !listening.record);
    /// assert!(SessionState::Narrating.affordances().record);
    /// ```
    pub fn affordances(&self) -> Affordances {
        match self {
            SessionState::AwaitingRecording(CapturePhase::Listening) => Affordances {
                activate: true,
                record: false,
                stop: true,
            },
            SessionState::ErrorRecovery => Affordances::NONE,
            SessionState::Idle
            | SessionState::AwaitingRecording(_)
            | SessionState::Transcribing
            | SessionState::Consulting
            | SessionState::Narrating => Affordances {
                activate: true,
                record: true,
                stop: false,
            },
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::AwaitingRecording(CapturePhase::Listening) => "Listening",
            SessionState::AwaitingRecording(CapturePhase::Finishing) => "Finishing recording",
            SessionState::AwaitingRecording(CapturePhase::Idle) => "Awaiting answer",
            SessionState::Transcribing => "Transcribing",
            SessionState::Consulting => "Consulting",
            SessionState::Narrating => "Narrating",
            SessionState::ErrorRecovery => "Recovering",
        }
    }
}

/// What the Oracle is doing, independent of which worker runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleState {
    Idle,
    Thinking,
    Speaking,
}

/// One sorting conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Questions asked so far; [`Session::FINAL_STEP`] once sorted.
    pub step: u32,
    pub questions_planned: u32,
    pub last_user_text: Option<String>,
    pub last_reply_text: Option<String>,
}

impl Session {
    pub const FINAL_STEP: u32 = 99;

    /// `questions_planned` is kept below [`Session::FINAL_STEP`].
    pub fn new(questions_planned: u32) -> Self {
        Self {
            step: 0,
            questions_planned: questions_planned.min(Self::FINAL_STEP - 1),
            last_user_text: None,
            last_reply_text: None,
        }
    }

    /// Start a session with a random question count from `range`.
    pub fn plan(range: RangeInclusive<u32>) -> Self {
        Self::new(rand::thread_rng().gen_range(range))
    }

    pub fn is_sorted(&self) -> bool {
        self.step == Self::FINAL_STEP
    }

    /// Record a reply: the next question, or the sorting decision once every
    /// planned question has been asked.
    pub fn advance(&mut self) {
        if self.step < self.questions_planned {
            self.step += 1;
        } else {
            self.step = Self::FINAL_STEP;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planned_questions_stay_in_range() {
        for _ in 0..200 {
            let s = Session::plan(3..=5);
            assert!((3..=5).contains(&s.questions_planned));
            assert_eq!(s.step, 0);
        }
    }

    #[test]
    fn advance_asks_exactly_planned_questions() {
        let mut s = Session::new(3);
        let mut asked = 0;
        while !s.is_sorted() {
            s.advance();
            if !s.is_sorted() {
                asked += 1;
            }
        }
        assert_eq!(asked, 3);
    }

    #[test]
    fn huge_plan_never_reaches_final_step_by_counting() {
        let mut s = Session::new(500);
        assert!(s.questions_planned < Session::FINAL_STEP);
        let mut asked = 0;
        while !s.is_sorted() {
            s.advance();
            if !s.is_sorted() {
                asked += 1;
            }
        }
        assert_eq!(asked, s.questions_planned);
    }

    #[test]
    fn affordance_table() {
        let idle = SessionState::Idle.affordances();
        assert_eq!((idle.activate, idle.record, idle.stop), (true, true, false));

        let waiting = SessionState::AwaitingRecording(CapturePhase::Idle).affordances();
        assert_eq!(
            (waiting.activate, waiting.record, waiting.stop),
            (true, true, false)
        );

        for busy in [
            SessionState::Transcribing,
            SessionState::Consulting,
            SessionState::Narrating,
        ] {
            let a = busy.affordances();
            assert_eq!((a.activate, a.record, a.stop), (true, true, false));
        }

        assert_eq!(SessionState::ErrorRecovery.affordances(), Affordances::NONE);
    }
}
