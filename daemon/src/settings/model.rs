//! Profiles, hotkey bindings and the persisted settings aggregate

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hotkey::{KeyCode, Modifiers};

/// Stable identity of a profile
pub type ProfileId = Uuid;

/// A named bundle of display color parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub name: String,
    /// Digital vibrance, conventionally 0-100
    pub vibrance: i32,
    /// Conventionally 0.0-1.0
    pub brightness: f64,
    /// Conventionally 0.0-1.0
    pub contrast: f64,
    pub gamma: f64,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: "New Profile".to_string(),
            vibrance: 50,
            brightness: 0.5,
            contrast: 0.5,
            gamma: 1.0,
        }
    }
}

impl Profile {
    /// Create a profile with default parameters and a fresh id
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Copy every field except the id from `other`
    pub fn update_from(&mut self, other: &Profile) {
        self.name.clone_from(&other.name);
        self.vibrance = other.vibrance;
        self.brightness = other.brightness;
        self.contrast = other.contrast;
        self.gamma = other.gamma;
    }

    /// One-line rendering of the four parameters
    pub fn summary(&self) -> String {
        format!(
            "vibrance {}  brightness {:.2}  contrast {:.2}  gamma {:.2}",
            self.vibrance, self.brightness, self.contrast, self.gamma
        )
    }
}

/// What a hotkey does when pressed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicType {
    /// Always activate the one referenced profile
    #[default]
    DirectSwitch,
    /// Alternate between the two referenced profiles
    TwoProfileToggle,
}

impl LogicType {
    /// How many profile ids a binding with this logic needs
    pub fn required_profiles(self) -> usize {
        match self {
            LogicType::DirectSwitch => 1,
            LogicType::TwoProfileToggle => 2,
        }
    }
}

/// A key combination bound to one or two profiles and a set of displays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotkeyBinding {
    pub id: Uuid,
    /// `None` when the stored key is missing or not bindable
    #[serde(default, deserialize_with = "lenient_key")]
    pub key: Option<KeyCode>,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default)]
    pub logic: LogicType,
    /// Order matters for toggles: the second profile is activated first
    #[serde(default)]
    pub profile_ids: Vec<ProfileId>,
    #[serde(default)]
    pub target_displays: Vec<String>,
}

/// Unknown key names become `None` instead of failing the whole document
fn lenient_key<'de, D>(deserializer: D) -> Result<Option<KeyCode>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let name: Option<String> = Option::deserialize(deserializer)?;
    Ok(name.as_deref().and_then(KeyCode::from_name))
}

/// Problems that make a binding unusable
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindingIssue {
    #[error("no key assigned")]
    NoKey,

    #[error("{logic:?} needs {expected} profile(s), found {found}")]
    ProfileCount {
        logic: LogicType,
        expected: usize,
        found: usize,
    },

    #[error("no target displays")]
    NoTargetDisplays,
}

impl HotkeyBinding {
    /// Create a binding with a fresh id
    pub fn new(
        key: KeyCode,
        modifiers: Modifiers,
        logic: LogicType,
        profile_ids: Vec<ProfileId>,
        target_displays: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            key: Some(key),
            modifiers,
            logic,
            profile_ids,
            target_displays,
        }
    }

    /// Human-readable combination, e.g. `Ctrl + Shift + F5`
    pub fn display_text(&self) -> String {
        let key = self.key.map_or("None", KeyCode::name);
        if self.modifiers.is_empty() {
            key.to_string()
        } else {
            format!("{} + {}", self.modifiers, key)
        }
    }

    /// List everything that keeps this binding from doing its job
    pub fn validate(&self) -> Vec<BindingIssue> {
        let mut issues = Vec::new();
        if self.key.is_none() {
            issues.push(BindingIssue::NoKey);
        }
        let expected = self.logic.required_profiles();
        if self.profile_ids.len() < expected {
            issues.push(BindingIssue::ProfileCount {
                logic: self.logic,
                expected,
                found: self.profile_ids.len(),
            });
        }
        if self.target_displays.is_empty() {
            issues.push(BindingIssue::NoTargetDisplays);
        }
        issues
    }
}

/// Errors from editing the settings aggregate
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("a profile with id {0} already exists")]
    DuplicateProfile(ProfileId),

    #[error("no profile with id {0}")]
    UnknownProfile(ProfileId),

    #[error("settings file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode settings: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Everything the daemon persists between runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub profiles: Vec<Profile>,
    pub hotkeys: Vec<HotkeyBinding>,
    pub selected_displays: Vec<String>,
    pub start_minimized: bool,
    pub start_with_os: bool,
    pub hide_on_close: bool,
}

impl AppSettings {
    /// Look up a profile by id
    pub fn profile(&self, id: ProfileId) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    /// Add a new profile; ids must be unique
    pub fn add_profile(&mut self, profile: Profile) -> Result<(), SettingsError> {
        if self.profile(profile.id).is_some() {
            return Err(SettingsError::DuplicateProfile(profile.id));
        }
        self.profiles.push(profile);
        Ok(())
    }

    /// Copy `profile`'s fields into the stored profile with the same id
    pub fn update_profile(&mut self, profile: &Profile) -> Result<(), SettingsError> {
        let existing = self
            .profiles
            .iter_mut()
            .find(|p| p.id == profile.id)
            .ok_or(SettingsError::UnknownProfile(profile.id))?;
        existing.update_from(profile);
        Ok(())
    }

    /// Remove a profile; bindings referencing it become stale
    pub fn remove_profile(&mut self, id: ProfileId) -> Option<Profile> {
        let index = self.profiles.iter().position(|p| p.id == id)?;
        Some(self.profiles.remove(index))
    }

    /// Bindings that share a key combination with an earlier binding
    pub fn duplicate_combinations(&self) -> Vec<&HotkeyBinding> {
        let mut seen = HashMap::new();
        self.hotkeys
            .iter()
            .filter(|binding| {
                let Some(key) = binding.key else {
                    return false;
                };
                seen.insert((key, binding.modifiers), binding.id).is_some()
            })
            .collect()
    }
}
