//! Dedicated OS-thread key listener using `rdev::listen`.
//!
//! `rdev::listen` blocks forever and has no shutdown call, so it lives on its
//! own thread.  Dropping [`HotkeyListener`] only stops forwarding; the thread
//! stays parked in rdev until the process exits.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::mpsc;

use crate::session::{KioskEvent, UserAction};

pub struct HotkeyListener {
    stop: Arc<AtomicBool>,
    _thread: std::thread::JoinHandle<()>,
}

impl HotkeyListener {
    /// Forward key presses matching `bindings` to the orchestrator as
    /// [`KioskEvent::User`].  Releases are ignored.
    pub fn start(
        bindings: Vec<(rdev::Key, UserAction)>,
        tx: mpsc::UnboundedSender<KioskEvent>,
    ) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name("hotkey-listener".into())
            .spawn(move || {
                let result = rdev::listen(move |event| {
                    if stop_flag.load(Ordering::Relaxed) {
                        return;
                    }
                    let rdev::EventType::KeyPress(pressed) = event.event_type else {
                        return;
                    };
                    if let Some(action) = action_for(&bindings, pressed) {
                        log::debug!("hotkey: {pressed:?} -> {action:?}");
                        let _ = tx.send(KioskEvent::User(action));
                    }
                });

                if let Err(e) = result {
                    log::error!("hotkey-listener: rdev::listen exited with error: {e:?}");
                }
            })?;

        Ok(Self {
            stop,
            _thread: thread,
        })
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

fn action_for(bindings: &[(rdev::Key, UserAction)], pressed: rdev::Key) -> Option<UserAction> {
    bindings
        .iter()
        .find(|(key, _)| *key == pressed)
        .map(|(_, action)| action.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pressed_key_maps_to_bound_action() {
        let bindings = vec![
            (rdev::Key::Num1, UserAction::Record),
            (rdev::Key::Num3, UserAction::Activate),
        ];
        assert_eq!(
            action_for(&bindings, rdev::Key::Num3),
            Some(UserAction::Activate)
        );
        assert_eq!(action_for(&bindings, rdev::Key::Num2), None);
    }
}
