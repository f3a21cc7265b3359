//! Kiosk window — egui/eframe application.
//!
//! # Architecture
//!
//! [`KioskApp`] is the top-level [`eframe::App`].  It never touches session
//! state directly:
//!
//! * reads   — a [`SharedView`] snapshot published by the orchestrator after
//!   every event and presenter tick;
//! * writes  — [`KioskEvent::User`] sent over an unbounded channel, the same
//!   path the global hotkeys use.
//!
//! # Layout
//!
//! | Area | Content |
//! |------|---------|
//! | Top | status line, tone selector, music mute and volume |
//! | Middle | hat sprite, scene progress |
//! | Dialogue | last answer (grey), last reply (gold) |
//! | Bottom | Record / Stop / Activate, enabled per affordance |

use std::collections::HashMap;
use std::time::Duration;

use eframe::egui;
use tokio::sync::mpsc;

use crate::audio::BackgroundMusic;
use crate::config::AppConfig;
use crate::presenter::{SceneSnapshot, SceneState, SpriteAssetKind, SpriteFrame, SpriteSheets};
use crate::session::{KioskEvent, KioskView, SessionState, SharedView, UserAction};

const GOLD: egui::Color32 = egui::Color32::from_rgb(230, 190, 90);
const DIM: egui::Color32 = egui::Color32::from_rgb(140, 140, 140);
const ERROR: egui::Color32 = egui::Color32::from_rgb(255, 136, 68);

// Button text stays within the bundled fonts' coverage.
const RECORD_LABEL: &str = "Record";
const STOP_LABEL: &str = "Stop";
const BEGIN_LABEL: &str = "Begin";
const MUTE_LABEL: &str = "Mute";
const UNMUTE_LABEL: &str = "Unmute";
const NO_SPRITE_LABEL: &str = "(no sprite)";

pub struct KioskApp {
    view: SharedView,
    events: mpsc::UnboundedSender<KioskEvent>,
    font_size: f32,
    title: String,
    sheets: SpriteSheets,
    textures: HashMap<(SpriteAssetKind, usize), egui::TextureHandle>,
    music: BackgroundMusic,
}

impl KioskApp {
    pub fn new(
        view: SharedView,
        events: mpsc::UnboundedSender<KioskEvent>,
        config: &AppConfig,
        sheets: SpriteSheets,
        music: BackgroundMusic,
    ) -> Self {
        Self {
            view,
            events,
            font_size: config.ui.dialogue_font_size,
            title: format!("{} Sorting Hat", config.academy_name),
            sheets,
            textures: HashMap::new(),
            music,
        }
    }

    fn send(&self, action: UserAction) {
        if self.events.send(KioskEvent::User(action)).is_err() {
            log::warn!("ui: orchestrator is gone; input dropped");
        }
    }

    fn snapshot(&self) -> KioskView {
        match self.view.lock() {
            Ok(view) => view.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn clear_error(&self) {
        match self.view.lock() {
            Ok(mut view) => view.error = None,
            Err(poisoned) => poisoned.into_inner().error = None,
        }
    }

    // ── Panels ────────────────────────────────────────────────────────────

    fn draw_header(&mut self, ui: &mut egui::Ui, view: &KioskView) {
        ui.horizontal(|ui| {
            ui.label(
                egui::RichText::new(self.title.as_str())
                    .color(GOLD)
                    .strong()
                    .size(18.0),
            );
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                self.draw_music_controls(ui);
                ui.add_space(12.0);
                self.draw_tone_selector(ui, view);
            });
        });

        ui.add_space(4.0);
        ui.horizontal(|ui| {
            let (dot, _) = ui.allocate_exact_size(egui::vec2(10.0, 10.0), egui::Sense::hover());
            ui.painter()
                .circle_filled(dot.center(), 5.0, state_color(view.state));
            ui.label(
                egui::RichText::new(view.status.as_str())
                    .color(egui::Color32::from_rgb(220, 220, 220))
                    .size(15.0),
            );
            if view.questions_planned > 0 && view.step > 0 && view.step <= view.questions_planned {
                ui.label(
                    egui::RichText::new(format!(
                        "  question {} of {}",
                        view.step, view.questions_planned
                    ))
                    .color(DIM)
                    .size(12.0),
                );
            }
        });
    }

    fn draw_tone_selector(&self, ui: &mut egui::Ui, view: &KioskView) {
        if view.tones.is_empty() {
            return;
        }
        let mut selected = view.tone.clone();
        egui::ComboBox::from_id_salt("tone")
            .selected_text(selected.as_str())
            .show_ui(ui, |ui| {
                for tone in &view.tones {
                    ui.selectable_value(&mut selected, tone.clone(), tone.as_str());
                }
            });
        ui.label(egui::RichText::new("Tone:").color(DIM).size(12.0));
        if selected != view.tone {
            self.send(UserAction::SelectTone(selected));
        }
    }

    /// Right-to-left: the slider lands at the far edge, mute beside it.
    fn draw_music_controls(&mut self, ui: &mut egui::Ui) {
        ui.add_enabled_ui(self.music.is_playing(), |ui| {
            let mut level = self.music.level();
            let slider = egui::Slider::new(&mut level, 0.0..=1.0).show_value(false);
            if ui.add(slider).on_hover_text("Music volume").changed() {
                self.music.set_level(level);
            }
            ui.label(egui::RichText::new("Vol:").color(DIM).size(12.0));
            if ui.button(mute_label(self.music.is_muted())).clicked() {
                self.music.toggle_mute();
            }
        });
    }

    fn draw_stage(&mut self, ui: &mut egui::Ui, view: &KioskView) {
        ui.vertical_centered(|ui| {
            let texture = view.sprite.and_then(|frame| self.texture(ui.ctx(), frame));
            match (view.sprite, texture) {
                (Some(frame), Some(texture)) => {
                    let size = egui::vec2(frame.width as f32, frame.height as f32);
                    ui.add(egui::Image::new((texture.id(), size)));
                }
                _ => {
                    ui.label(egui::RichText::new(NO_SPRITE_LABEL).color(DIM).italics());
                }
            }
            ui.add_space(6.0);
            if let Some(scene) = view.scene {
                draw_scene(ui, scene);
            }
        });
    }

    /// Upload `frame` on first use; frames stay cached for the app's life.
    fn texture(&mut self, ctx: &egui::Context, frame: SpriteFrame) -> Option<egui::TextureHandle> {
        let key = (frame.asset, frame.index);
        if let Some(handle) = self.textures.get(&key) {
            return Some(handle.clone());
        }
        let anim = self.sheets.get(frame.asset)?;
        let pixels = anim.frames.get(frame.index)?;
        let image = egui::ColorImage::from_rgba_unmultiplied(
            [anim.width as usize, anim.height as usize],
            &pixels.rgba,
        );
        let handle = ctx.load_texture(
            format!("sprite-{:?}-{}", frame.asset, frame.index),
            image,
            egui::TextureOptions::LINEAR,
        );
        self.textures.insert(key, handle.clone());
        Some(handle)
    }

    fn draw_dialogue(&self, ui: &mut egui::Ui, view: &KioskView) {
        if let Some(answer) = &view.last_user_text {
            ui.label(
                egui::RichText::new(format!("You: {answer}"))
                    .color(DIM)
                    .italics()
                    .size(self.font_size * 0.7),
            );
            ui.add_space(6.0);
        }
        if let Some(reply) = &view.last_reply_text {
            ui.label(
                egui::RichText::new(reply.as_str())
                    .color(GOLD)
                    .size(self.font_size),
            );
        }
    }

    fn draw_controls(&self, ui: &mut egui::Ui, view: &KioskView) {
        let a = view.affordances;
        ui.horizontal(|ui| {
            let big = egui::vec2(140.0, 44.0);
            if ui
                .add_enabled(
                    a.record,
                    egui::Button::new(egui::RichText::new(RECORD_LABEL).size(16.0)).min_size(big),
                )
                .clicked()
            {
                self.send(UserAction::Record);
            }
            if ui
                .add_enabled(
                    a.stop,
                    egui::Button::new(egui::RichText::new(STOP_LABEL).size(16.0)).min_size(big),
                )
                .clicked()
            {
                self.send(UserAction::Stop);
            }
            if ui
                .add_enabled(
                    a.activate,
                    egui::Button::new(egui::RichText::new(BEGIN_LABEL).size(16.0)).min_size(big),
                )
                .clicked()
            {
                self.send(UserAction::Activate);
            }
        });
    }

    fn draw_error_window(&self, ctx: &egui::Context, message: &str) {
        let mut dismissed = false;
        egui::Window::new("Something went wrong")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label(egui::RichText::new(message).color(ERROR).size(14.0));
                ui.add_space(6.0);
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });
        if dismissed {
            self.clear_error();
        }
    }
}

// ---------------------------------------------------------------------------
// Drawing helpers
// ---------------------------------------------------------------------------

fn mute_label(muted: bool) -> &'static str {
    if muted {
        UNMUTE_LABEL
    } else {
        MUTE_LABEL
    }
}

fn draw_scene(ui: &mut egui::Ui, scene: SceneSnapshot) {
    if scene.state == SceneState::Unavailable || scene.duration_ms == 0 {
        return;
    }
    let fraction = scene.position_ms as f32 / scene.duration_ms as f32;
    let label = match scene.state {
        SceneState::Reversing => "rewinding",
        SceneState::PlayingForward { .. } | SceneState::AwaitingReverseTrigger => "playing",
        _ => "",
    };
    ui.add(
        egui::ProgressBar::new(fraction.clamp(0.0, 1.0))
            .desired_width(240.0)
            .text(label),
    );
}

fn state_color(state: SessionState) -> egui::Color32 {
    match state {
        SessionState::Idle => egui::Color32::from_rgb(100, 100, 100),
        SessionState::AwaitingRecording(_) => egui::Color32::from_rgb(255, 68, 68),
        SessionState::Transcribing | SessionState::Consulting => {
            egui::Color32::from_rgb(68, 136, 255)
        }
        SessionState::Narrating => egui::Color32::from_rgb(80, 200, 120),
        SessionState::ErrorRecovery => ERROR,
    }
}

// ---------------------------------------------------------------------------
// eframe::App impl
// ---------------------------------------------------------------------------

impl eframe::App for KioskApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let view = self.snapshot();

        // Sprite and scene advance on the orchestrator's tick.
        ctx.request_repaint_after(Duration::from_millis(40));

        let frame = egui::Frame::new()
            .fill(egui::Color32::from_rgb(20, 18, 24))
            .inner_margin(egui::Margin::same(16));

        egui::TopBottomPanel::bottom("controls")
            .frame(frame)
            .show(ctx, |ui| self.draw_controls(ui, &view));

        egui::CentralPanel::default().frame(frame).show(ctx, |ui| {
            self.draw_header(ui, &view);
            ui.separator();
            self.draw_stage(ui, &view);
            ui.separator();
            egui::ScrollArea::vertical().show(ui, |ui| self.draw_dialogue(ui, &view));
        });

        if let Some(message) = &view.error {
            self.draw_error_window(ctx, message);
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        log::info!("kiosk window closing");
        let _ = self.events.send(KioskEvent::Shutdown);
    }
}
