//! JSON persistence for [`AppSettings`]
//!
//! A corrupt document is replaced with defaults and overwritten; losing a
//! broken file is preferred over refusing to start.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::{info, warn};

use super::model::{AppSettings, SettingsError};

/// Reads and writes the settings document
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load settings, falling back to defaults on any failure
    pub fn load(&self) -> AppSettings {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = ?self.path, "no settings file found, using defaults");
                return AppSettings::default();
            }
            Err(e) => {
                warn!(path = ?self.path, error = %e, "failed to read settings, using defaults");
                return AppSettings::default();
            }
        };

        match serde_json::from_str::<AppSettings>(&contents) {
            Ok(settings) => {
                info!(
                    path = ?self.path,
                    profiles = settings.profiles.len(),
                    hotkeys = settings.hotkeys.len(),
                    "settings loaded"
                );
                settings
            }
            Err(e) => {
                warn!(
                    path = ?self.path,
                    error = %e,
                    "settings file is corrupt, resetting to defaults and overwriting it"
                );
                let settings = AppSettings::default();
                if let Err(e) = self.save(&settings) {
                    warn!(path = ?self.path, error = %e, "failed to overwrite corrupt settings");
                }
                settings
            }
        }
    }

    /// Overwrite the settings document
    pub fn save(&self, settings: &AppSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, json)?;
        info!(path = ?self.path, "settings saved");
        Ok(())
    }
}
