//! Hotkey module for global keyboard shortcuts
//!
//! A dedicated listener thread owns the native registrations; the
//! registry on top of it maps ids to actions and forwards fired actions
//! to the primary context.

#[cfg(test)]
pub(crate) mod fake;
mod keys;
mod listener;
pub mod platform;
mod service;

pub use keys::{KeyCode, Modifiers};
pub use service::HotkeyService;
