//! Application state and the controller that mutates it
//!
//! - `resolver`: picks the profile a hotkey press applies
//! - `controller`: owns the state and handles hotkeys and commands in order

mod controller;
mod resolver;

pub use controller::{AppCommand, AppState, Controller};
