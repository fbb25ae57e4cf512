//! Settings module: profiles, hotkey bindings and their persistence

mod model;
mod store;

pub use model::{AppSettings, HotkeyBinding, LogicType, Profile, ProfileId};
pub use store::SettingsStore;
