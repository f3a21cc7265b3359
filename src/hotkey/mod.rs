//! Global kiosk keys, backed by `rdev`.
//!
//! The kiosk has no keyboard focus requirements: the number keys on the
//! operator's keypad drive Record / Stop / Activate even while the window is
//! in the background.
//!
//! ```no_run
//! use sorting_hat::config::HotkeyConfig;
//! use sorting_hat::hotkey::{key_bindings, HotkeyListener};
//!
//! let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
//! let bindings = key_bindings(&HotkeyConfig::default());
//! let _listener = HotkeyListener::start(bindings, tx).unwrap();
//! ```

pub mod listener;

pub use listener::HotkeyListener;

use rdev::Key;

use crate::config::HotkeyConfig;
use crate::session::UserAction;

const DIGITS: [Key; 10] = [
    Key::Num0,
    Key::Num1,
    Key::Num2,
    Key::Num3,
    Key::Num4,
    Key::Num5,
    Key::Num6,
    Key::Num7,
    Key::Num8,
    Key::Num9,
];

const KEYPAD: [Key; 10] = [
    Key::Kp0,
    Key::Kp1,
    Key::Kp2,
    Key::Kp3,
    Key::Kp4,
    Key::Kp5,
    Key::Kp6,
    Key::Kp7,
    Key::Kp8,
    Key::Kp9,
];

const LETTERS: [Key; 26] = [
    Key::KeyA,
    Key::KeyB,
    Key::KeyC,
    Key::KeyD,
    Key::KeyE,
    Key::KeyF,
    Key::KeyG,
    Key::KeyH,
    Key::KeyI,
    Key::KeyJ,
    Key::KeyK,
    Key::KeyL,
    Key::KeyM,
    Key::KeyN,
    Key::KeyO,
    Key::KeyP,
    Key::KeyQ,
    Key::KeyR,
    Key::KeyS,
    Key::KeyT,
    Key::KeyU,
    Key::KeyV,
    Key::KeyW,
    Key::KeyX,
    Key::KeyY,
    Key::KeyZ,
];

const FUNCTION: [Key; 12] = [
    Key::F1,
    Key::F2,
    Key::F3,
    Key::F4,
    Key::F5,
    Key::F6,
    Key::F7,
    Key::F8,
    Key::F9,
    Key::F10,
    Key::F11,
    Key::F12,
];

/// Parse a key name from the settings file.
///
/// Accepts digits (`"1"`), keypad digits (`"Kp1"`), letters (either case),
/// `F1`–`F12`, and a few named keys.
///
/// ```
/// use sorting_hat::hotkey::parse_key;
///
/// assert_eq!(parse_key("1"), Some(rdev::Key::Num1));
/// assert_eq!(parse_key("Kp3"), Some(rdev::Key::Kp3));
/// assert_eq!(parse_key("F9"), Some(rdev::Key::F9));
/// assert_eq!(parse_key("Ctrl+1"), None);
/// ```
pub fn parse_key(name: &str) -> Option<Key> {
    let name = name.trim();
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return match c {
            '0'..='9' => Some(DIGITS[(c as u8 - b'0') as usize]),
            'a'..='z' => Some(LETTERS[(c as u8 - b'a') as usize]),
            'A'..='Z' => Some(LETTERS[(c as u8 - b'A') as usize]),
            _ => None,
        };
    }

    if let Some(n) = name.strip_prefix("Kp").and_then(|d| d.parse::<usize>().ok()) {
        return KEYPAD.get(n).copied();
    }
    if let Some(n) = name.strip_prefix('F').and_then(|d| d.parse::<usize>().ok()) {
        return n.checked_sub(1).and_then(|i| FUNCTION.get(i)).copied();
    }

    match name {
        "Space" => Some(Key::Space),
        "Return" | "Enter" => Some(Key::Return),
        "Escape" | "Esc" => Some(Key::Escape),
        "Tab" => Some(Key::Tab),
        _ => None,
    }
}

/// Resolve the configured keys.  Unknown names are logged and skipped.
///
/// Each digit binding also answers to the matching keypad key.
pub fn key_bindings(config: &HotkeyConfig) -> Vec<(Key, UserAction)> {
    let wanted = [
        (&config.record_key, UserAction::Record),
        (&config.stop_key, UserAction::Stop),
        (&config.activate_key, UserAction::Activate),
    ];

    let mut bindings = Vec::new();
    for (name, action) in wanted {
        let Some(key) = parse_key(name) else {
            log::warn!("hotkey: unknown key {name:?} for {action:?}; not bound");
            continue;
        };
        if let Some(i) = DIGITS.iter().position(|&d| d == key) {
            bindings.push((KEYPAD[i], action.clone()));
        }
        bindings.push((key, action));
    }
    bindings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_letters_and_function_keys() {
        assert_eq!(parse_key("0"), Some(Key::Num0));
        assert_eq!(parse_key("9"), Some(Key::Num9));
        assert_eq!(parse_key("q"), Some(Key::KeyQ));
        assert_eq!(parse_key("Q"), Some(Key::KeyQ));
        assert_eq!(parse_key("F1"), Some(Key::F1));
        assert_eq!(parse_key("F12"), Some(Key::F12));
        assert_eq!(parse_key("Kp0"), Some(Key::Kp0));
        assert_eq!(parse_key("Enter"), Some(Key::Return));
    }

    #[test]
    fn rejects_unknown_names() {
        assert_eq!(parse_key(""), None);
        assert_eq!(parse_key("F0"), None);
        assert_eq!(parse_key("F13"), None);
        assert_eq!(parse_key("Kp10"), None);
        assert_eq!(parse_key("#"), None);
    }

    #[test]
    fn default_bindings_cover_row_and_keypad() {
        let bindings = key_bindings(&HotkeyConfig::default());
        assert!(bindings.contains(&(Key::Num1, UserAction::Record)));
        assert!(bindings.contains(&(Key::Kp1, UserAction::Record)));
        assert!(bindings.contains(&(Key::Num2, UserAction::Stop)));
        assert!(bindings.contains(&(Key::Num3, UserAction::Activate)));
        assert_eq!(bindings.len(), 6);
    }

    #[test]
    fn bad_key_is_skipped() {
        let config = HotkeyConfig {
            record_key: "nope".into(),
            stop_key: "s".into(),
            activate_key: "a".into(),
        };
        let bindings = key_bindings(&config);
        assert_eq!(
            bindings,
            vec![(Key::KeyS, UserAction::Stop), (Key::KeyA, UserAction::Activate)]
        );
    }
}
