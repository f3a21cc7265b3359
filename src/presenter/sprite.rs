//! The Sorting Hat sprite: an idle/thinking loop and a one-shot speaking
//! animation.
//!
//! ```text
//!            set_idle_loop()             set_speaking(true)
//!   None ─────────────────────▶ IdleLoop ──────────────────▶ Speaking{active}
//!    ▲                            ▲   │                         │
//!    └─ both assets unusable      │   └── first frame drawn ──▶ CycleComplete
//!                                 └──────── set_idle_loop() ────┘
//! ```
//!
//! Frames are advanced by [`SpritePresenter::advance`] from the event loop
//! tick.  Every advance re-renders the current frame size from the asset's
//! native dimensions and its fixed scale.
//!
//! A missing or broken asset never stalls the caller: the presenter falls
//! back to whatever it can show and still reports completion.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::gif::GifAnimation;
use super::{PresenterEvent, PresenterId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpriteAssetKind {
    Idle,
    Speaking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpriteState {
    None,
    IdleLoop,
    Speaking { active: bool },
}

/// What the UI should draw right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpriteFrame {
    pub asset: SpriteAssetKind,
    pub index: usize,
    pub width: u32,
    pub height: u32,
}

/// A loaded asset.  `animation` is `None` when the file was missing or invalid.
#[derive(Debug, Clone)]
pub struct SpriteAsset {
    animation: Option<Arc<GifAnimation>>,
    scale: f32,
}

impl SpriteAsset {
    pub fn load(path: &Path, scale: f32) -> Self {
        let animation = match GifAnimation::open(path) {
            Ok(anim) => {
                log::info!(
                    "sprite: {} loaded ({} frames, {}x{})",
                    path.display(),
                    anim.frame_count(),
                    anim.width,
                    anim.height
                );
                Some(Arc::new(anim))
            }
            Err(e) => {
                log::error!("sprite: {e}");
                None
            }
        };
        Self { animation, scale }
    }

    pub fn from_animation(animation: Option<GifAnimation>, scale: f32) -> Self {
        Self {
            animation: animation.map(Arc::new),
            scale,
        }
    }

    pub fn is_usable(&self) -> bool {
        self.animation.is_some()
    }
}

/// Decoded pixels for both assets, shared with the window for texture upload.
#[derive(Debug, Clone, Default)]
pub struct SpriteSheets {
    pub idle: Option<Arc<GifAnimation>>,
    pub speaking: Option<Arc<GifAnimation>>,
}

impl SpriteSheets {
    pub fn get(&self, kind: SpriteAssetKind) -> Option<&GifAnimation> {
        match kind {
            SpriteAssetKind::Idle => self.idle.as_deref(),
            SpriteAssetKind::Speaking => self.speaking.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Playback {
    asset: SpriteAssetKind,
    frame: usize,
    elapsed_ms: u64,
    looping: bool,
    running: bool,
}

pub struct SpritePresenter {
    idle: SpriteAsset,
    speaking: SpriteAsset,
    state: SpriteState,
    playback: Option<Playback>,
    frame: Option<SpriteFrame>,
    ready_pending: bool,
    outbox: Vec<PresenterEvent>,
}

impl SpritePresenter {
    pub fn new(idle: SpriteAsset, speaking: SpriteAsset) -> Self {
        Self {
            idle,
            speaking,
            state: SpriteState::None,
            playback: None,
            frame: None,
            ready_pending: false,
            outbox: Vec::new(),
        }
    }

    pub fn state(&self) -> SpriteState {
        self.state
    }

    pub fn sheets(&self) -> SpriteSheets {
        SpriteSheets {
            idle: self.idle.animation.clone(),
            speaking: self.speaking.animation.clone(),
        }
    }

    pub fn current_frame(&self) -> Option<SpriteFrame> {
        self.frame
    }

    pub fn take_events(&mut self) -> Vec<PresenterEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Loop the idle asset; completion follows once its first frame is drawn.
    pub fn set_idle_loop(&mut self) {
        self.stop_active();

        if self.idle.is_usable() {
            self.state = SpriteState::IdleLoop;
            self.start(SpriteAssetKind::Idle, true, true);
            self.ready_pending = true;
        } else if self.speaking.is_usable() {
            log::warn!("sprite: idle asset unusable; showing frozen speaking sprite");
            self.state = SpriteState::Speaking { active: false };
            self.start(SpriteAssetKind::Speaking, false, false);
            self.render();
            self.complete();
        } else {
            log::error!("sprite: no usable sprite assets");
            self.state = SpriteState::None;
            self.complete();
        }
    }

    /// Play the speaking asset once, or freeze it on frame zero.
    pub fn set_speaking(&mut self, active: bool) {
        self.stop_active();

        if !self.speaking.is_usable() {
            log::warn!("sprite: speaking asset unusable");
            self.state = SpriteState::None;
            self.complete();
            return;
        }

        self.state = SpriteState::Speaking { active };
        self.start(SpriteAssetKind::Speaking, false, active);
        if !active {
            self.render();
            self.complete();
        }
    }

    /// Advance the running animation by `dt` and re-render.
    pub fn advance(&mut self, dt: Duration) {
        let Some(mut pb) = self.playback else {
            return;
        };

        if pb.running {
            let Some(anim) = self.asset(pb.asset).animation.as_deref() else {
                return;
            };
            let count = anim.frame_count();
            pb.elapsed_ms += dt.as_millis() as u64;
            // At most one full pass per tick.
            for _ in 0..count {
                let delay = u64::from(anim.frames[pb.frame].delay_ms);
                if pb.elapsed_ms < delay {
                    break;
                }
                pb.elapsed_ms -= delay;
                if pb.frame + 1 < count {
                    pb.frame += 1;
                } else if pb.looping {
                    pb.frame = 0;
                } else {
                    pb.running = false;
                    pb.elapsed_ms = 0;
                    break;
                }
            }
            self.playback = Some(pb);
        }

        self.render();
        if self.ready_pending && self.frame.is_some() {
            self.ready_pending = false;
            self.complete();
        }
    }

    fn asset(&self, kind: SpriteAssetKind) -> &SpriteAsset {
        match kind {
            SpriteAssetKind::Idle => &self.idle,
            SpriteAssetKind::Speaking => &self.speaking,
        }
    }

    fn start(&mut self, asset: SpriteAssetKind, looping: bool, running: bool) {
        self.playback = Some(Playback {
            asset,
            frame: 0,
            elapsed_ms: 0,
            looping,
            running,
        });
    }

    fn stop_active(&mut self) {
        self.playback = None;
        self.frame = None;
        self.ready_pending = false;
    }

    fn render(&mut self) {
        let Some(pb) = self.playback else {
            self.frame = None;
            return;
        };
        let asset = self.asset(pb.asset);
        let Some(anim) = asset.animation.as_deref() else {
            self.frame = None;
            return;
        };
        self.frame = Some(SpriteFrame {
            asset: pb.asset,
            index: pb.frame,
            width: scaled(anim.width, asset.scale),
            height: scaled(anim.height, asset.scale),
        });
    }

    fn complete(&mut self) {
        self.outbox.push(PresenterEvent::CycleComplete(PresenterId::Sprite));
    }
}

fn scaled(px: u32, scale: f32) -> u32 {
    ((px as f32 * scale).round() as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presenter::gif::plain_gif;

    fn anim(w: u16, h: u16, frames: usize) -> Option<GifAnimation> {
        Some(GifAnimation::decode(plain_gif(w, h, frames).as_slice()).unwrap())
    }

    fn presenter() -> SpritePresenter {
        SpritePresenter::new(
            SpriteAsset::from_animation(anim(200, 100, 3), 0.5),
            SpriteAsset::from_animation(anim(100, 50, 4), 1.2),
        )
    }

    fn completions(p: &mut SpritePresenter) -> usize {
        p.take_events().len()
    }

    #[test]
    fn idle_loop_signals_after_first_frame() {
        let mut p = presenter();
        p.set_idle_loop();
        assert_eq!(completions(&mut p), 0);

        p.advance(Duration::ZERO);
        assert_eq!(completions(&mut p), 1);
        let frame = p.current_frame().unwrap();
        assert_eq!((frame.width, frame.height), (100, 50));

        // Looping does not signal again.
        p.advance(Duration::from_millis(1000));
        assert_eq!(completions(&mut p), 0);
        assert_eq!(p.state(), SpriteState::IdleLoop);
    }

    #[test]
    fn idle_loop_wraps_around() {
        let mut p = presenter();
        p.set_idle_loop();
        p.advance(Duration::from_millis(250));
        assert_eq!(p.current_frame().unwrap().index, 2);
        p.advance(Duration::from_millis(100));
        assert_eq!(p.current_frame().unwrap().index, 0);
    }

    #[test]
    fn speaking_plays_once_and_holds_last_frame() {
        let mut p = presenter();
        p.set_speaking(true);
        p.advance(Duration::from_millis(2000));
        let frame = p.current_frame().unwrap();
        assert_eq!(frame.asset, SpriteAssetKind::Speaking);
        assert_eq!(frame.index, 3);
        assert_eq!((frame.width, frame.height), (120, 60));
        assert_eq!(completions(&mut p), 0);
    }

    #[test]
    fn inactive_speaking_freezes_on_frame_zero() {
        let mut p = presenter();
        p.set_speaking(false);
        assert_eq!(p.state(), SpriteState::Speaking { active: false });
        assert_eq!(p.current_frame().unwrap().index, 0);
        assert_eq!(completions(&mut p), 1);
        p.advance(Duration::from_millis(500));
        assert_eq!(p.current_frame().unwrap().index, 0);
    }

    #[test]
    fn missing_idle_asset_still_signals() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = SpritePresenter::new(
            SpriteAsset::load(&dir.path().join("hat_think.gif"), 0.5),
            SpriteAsset::load(&dir.path().join("hat.gif"), 1.2),
        );
        p.set_idle_loop();
        assert_eq!(completions(&mut p), 1);
        assert_eq!(p.state(), SpriteState::None);
        assert!(p.current_frame().is_none());
    }

    #[test]
    fn missing_idle_falls_back_to_frozen_speaking() {
        let mut p = SpritePresenter::new(
            SpriteAsset::from_animation(None, 0.5),
            SpriteAsset::from_animation(anim(100, 50, 2), 1.2),
        );
        p.set_idle_loop();
        assert_eq!(completions(&mut p), 1);
        assert_eq!(p.state(), SpriteState::Speaking { active: false });
        assert_eq!(p.current_frame().unwrap().index, 0);
    }

    #[test]
    fn sheets_share_decoded_pixels() {
        let p = presenter();
        let sheets = p.sheets();
        let idle = sheets.get(SpriteAssetKind::Idle).unwrap();
        assert_eq!((idle.width, idle.height), (200, 100));
        assert_eq!(sheets.get(SpriteAssetKind::Speaking).unwrap().frame_count(), 4);
        assert!(SpriteSheets::default().get(SpriteAssetKind::Idle).is_none());
    }

    #[test]
    fn tiny_frames_never_scale_below_one_pixel() {
        assert_eq!(scaled(1, 0.1), 1);
        assert_eq!(scaled(3, 0.5), 2);
    }
}
