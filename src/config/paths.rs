//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\sorting-hat-kiosk\
//!   macOS:   ~/Library/Application Support/sorting-hat-kiosk/
//!   Linux:   ~/.config/sorting-hat-kiosk/
//!
//! Data dir (recording artifact, assets):
//!   Windows: %LOCALAPPDATA%\sorting-hat-kiosk\
//!   macOS:   ~/Library/Application Support/sorting-hat-kiosk/
//!   Linux:   ~/.local/share/sorting-hat-kiosk/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory for the recording artifact.
    pub data_dir: PathBuf,
    /// Default directory for sprite and scene assets.
    pub assets_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "sorting-hat-kiosk";

    /// Resolves all paths using the `dirs` crate, falling back to the current
    /// directory when the platform provides none.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let assets_dir = data_dir.join("assets");

        Self {
            config_dir,
            settings_file,
            data_dir,
            assets_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_non_empty() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths.data_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "settings.toml"));
        assert!(paths.assets_dir.ends_with("assets"));
    }
}
