//! Fallback for targets without a global hotkey facility

use std::time::Duration;

use crate::hotkey::keys::{KeyCode, Modifiers};
use crate::hotkey::listener::{HotkeyBackend, HotkeyError};

/// Backend that never initializes, leaving the listener inert
pub struct UnsupportedBackend;

impl UnsupportedBackend {
    pub fn new() -> Result<Self, HotkeyError> {
        Err(HotkeyError::Unsupported)
    }
}

impl HotkeyBackend for UnsupportedBackend {
    fn register(&mut self, _id: u32, _modifiers: Modifiers, _key: KeyCode) -> Result<(), HotkeyError> {
        Err(HotkeyError::Unsupported)
    }

    fn unregister(&mut self, _id: u32) -> Result<(), HotkeyError> {
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> Result<Vec<u32>, HotkeyError> {
        std::thread::sleep(timeout);
        Ok(Vec::new())
    }
}
