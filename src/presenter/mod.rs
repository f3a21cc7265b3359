//! Visual presenters driven by the orchestrator's event loop.
//!
//! * [`SpritePresenter`] — Sorting Hat sprite (idle loop / speaking).
//! * [`ScenePresenter`] — scene clip, forward once then reverse to rest.
//! * [`GifAnimation`] — sprite frames decoded to RGBA for the window.
//! * [`TimelineEngine`] — clock-driven [`PlaybackEngine`] for the scene.
//!
//! Presenters never call back into the orchestrator.  They queue
//! [`PresenterEvent`]s which the loop drains with `take_events()` after each
//! command or tick.

pub mod gif;
pub mod scene;
pub mod sprite;
pub mod timeline;

pub use gif::{GifAnimation, GifFrame, SpriteError};
pub use scene::{
    EngineEvent, PlaybackEngine, PlaybackError, PlaybackState, ScenePresenter, SceneSnapshot,
    SceneState,
};
pub use sprite::{
    SpriteAsset, SpriteAssetKind, SpriteFrame, SpritePresenter, SpriteSheets, SpriteState,
};
pub use timeline::TimelineEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenterId {
    Sprite,
    Scene,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenterEvent {
    /// The presenter reached a resting state.
    CycleComplete(PresenterId),
}
