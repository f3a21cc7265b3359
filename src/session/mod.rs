//! Session orchestration.
//!
//! * [`Orchestrator`] — event loop owning the session, workers and presenters.
//! * [`SessionState`] / [`Session`] — the state machine and its data.
//! * [`KioskEvent`] / [`UserAction`] — the loop's input.
//! * [`KioskView`] / [`SharedView`] — what the UI renders.
//! * [`KioskError`] — user-facing error taxonomy.

pub mod error;
pub mod event;
pub mod orchestrator;
pub mod state;
pub mod view;

pub use error::KioskError;
pub use event::{KioskEvent, UserAction};
pub use orchestrator::{Collaborators, Flow, Orchestrator, TICK};
pub use state::{Affordances, CapturePhase, OracleState, Session, SessionState};
pub use view::{new_shared_view, KioskView, SharedView};
