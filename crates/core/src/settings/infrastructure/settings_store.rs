use std::fs;
use std::path::{Path, PathBuf};

use crate::settings::domain::settings::Settings;

/// Persists [`Settings`] as pretty JSON.
///
/// Loading never fails: a missing, unreadable, or invalid file yields the
/// defaults, so a bad config cannot keep the application from starting.
pub struct SettingsStore {
    path: Option<PathBuf>,
}

impl SettingsStore {
    /// Store at the platform config location, e.g.
    /// `~/.config/FaceSwap/settings.json` on Linux.
    pub fn new() -> Self {
        Self {
            path: dirs::config_dir().map(|d| d.join("FaceSwap").join("settings.json")),
        }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn load(&self) -> Settings {
        let Some(path) = &self.path else {
            return Settings::default();
        };
        let Ok(json) = fs::read_to_string(path) else {
            return Settings::default();
        };
        match serde_json::from_str(&json) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Ignoring invalid settings file {}: {e}", path.display());
                Settings::default()
            }
        }
    }

    pub fn save(&self, settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
        let path = self.path.as_ref().ok_or("could not determine config directory")?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(settings)?)?;
        Ok(())
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new()
    }
}
