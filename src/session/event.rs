use crate::worker::WorkerEvent;

/// Something the student asked for, via button or hotkey.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    Activate,
    Record,
    Stop,
    SelectTone(String),
}

/// Everything the orchestrator's loop reacts to.
#[derive(Debug)]
pub enum KioskEvent {
    User(UserAction),
    Worker(WorkerEvent),
    Shutdown,
}
