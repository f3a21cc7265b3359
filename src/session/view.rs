//! The snapshot the UI renders.
//!
//! [`SharedView`] is `Arc<Mutex<KioskView>>`: the orchestrator writes it after
//! every event or tick, the egui update loop reads it every frame.

use std::sync::{Arc, Mutex};

use crate::presenter::{SceneSnapshot, SpriteFrame};

use super::state::{Affordances, OracleState, SessionState};

#[derive(Debug, Clone)]
pub struct KioskView {
    pub status: String,
    pub state: SessionState,
    pub oracle: OracleState,
    pub affordances: Affordances,
    pub step: u32,
    pub questions_planned: u32,
    pub last_user_text: Option<String>,
    pub last_reply_text: Option<String>,
    /// Set on fatal errors; cleared by the UI once dismissed.
    pub error: Option<String>,
    pub sprite: Option<SpriteFrame>,
    pub scene: Option<SceneSnapshot>,
    pub tones: Vec<String>,
    pub tone: String,
}

impl Default for KioskView {
    fn default() -> Self {
        Self {
            status: "Initializing...".into(),
            state: SessionState::Idle,
            oracle: OracleState::Idle,
            affordances: Affordances::NONE,
            step: 0,
            questions_planned: 0,
            last_user_text: None,
            last_reply_text: None,
            error: None,
            sprite: None,
            scene: None,
            tones: Vec::new(),
            tone: String::new(),
        }
    }
}

pub type SharedView = Arc<Mutex<KioskView>>;

pub fn new_shared_view() -> SharedView {
    Arc::new(Mutex::new(KioskView::default()))
}
