//! Events published by the controller
//!
//! Front-ends subscribe to these to drive the applied-profile indicator and
//! to show user-facing notifications.

use serde::{Deserialize, Serialize};

use crate::settings::ProfileId;

/// Events emitted by the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    /// A profile was applied and is now the active one
    ProfileApplied {
        profile_id: ProfileId,
        profile_name: String,
    },

    /// Applying a profile failed; `message` is meant for the user
    ApplyFailed {
        profile_id: ProfileId,
        message: String,
    },

    /// Hotkeys were (re)registered
    HotkeysRegistered {
        /// Number of bindings handed to the listener
        count: usize,
    },

    /// Settings were written to disk
    SettingsSaved,

    /// Something the user should be told about
    Notice { title: String, message: String },
}

impl std::fmt::Display for AppEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppEvent::ProfileApplied { profile_name, .. } => {
                write!(f, "PROFILE_APPLIED ({})", profile_name)
            }
            AppEvent::ApplyFailed { message, .. } => write!(f, "APPLY_FAILED ({})", message),
            AppEvent::HotkeysRegistered { count } => write!(f, "HOTKEYS_REGISTERED ({})", count),
            AppEvent::SettingsSaved => write!(f, "SETTINGS_SAVED"),
            AppEvent::Notice { title, message } => write!(f, "NOTICE ({}: {})", title, message),
        }
    }
}
