//! Global hotkeys using the Win32 RegisterHotKey API
//!
//! Hotkeys are registered without a window, so `WM_HOTKEY` is posted to the
//! message queue of the thread that registered them: the listener thread.

use std::time::Duration;

use windows::Win32::UI::Input::KeyboardAndMouse::{
    RegisterHotKey, UnregisterHotKey, HOT_KEY_MODIFIERS, MOD_NOREPEAT,
};
use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, MsgWaitForMultipleObjects, PeekMessageW, TranslateMessage, MSG,
    PM_NOREMOVE, PM_REMOVE, QS_ALLINPUT, WM_HOTKEY, WM_USER,
};

use crate::hotkey::keys::{KeyCode, Modifiers};
use crate::hotkey::listener::{HotkeyBackend, HotkeyError};

/// Thread-level `RegisterHotKey` backend
pub struct Win32Backend;

impl Win32Backend {
    /// Create the backend on the calling thread
    pub fn new() -> Result<Self, HotkeyError> {
        // Touching the queue forces Windows to create it for this thread,
        // so no WM_HOTKEY can be lost before the first poll
        let mut msg = MSG::default();
        unsafe {
            let _ = PeekMessageW(&mut msg, None, WM_USER, WM_USER, PM_NOREMOVE);
        }
        Ok(Self)
    }
}

impl HotkeyBackend for Win32Backend {
    fn register(&mut self, id: u32, modifiers: Modifiers, key: KeyCode) -> Result<(), HotkeyError> {
        // The modifier mask shares the MOD_* bit layout
        let mods = HOT_KEY_MODIFIERS(u32::from(modifiers.mask()) | MOD_NOREPEAT.0);

        unsafe { RegisterHotKey(None, id as i32, mods, key.virtual_key()) }.map_err(|e| {
            HotkeyError::Register {
                id,
                reason: e.to_string(),
            }
        })
    }

    fn unregister(&mut self, id: u32) -> Result<(), HotkeyError> {
        unsafe { UnregisterHotKey(None, id as i32) }.map_err(|e| HotkeyError::Unregister {
            id,
            reason: e.to_string(),
        })
    }

    fn poll(&mut self, timeout: Duration) -> Result<Vec<u32>, HotkeyError> {
        let millis = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);
        unsafe {
            let _ = MsgWaitForMultipleObjects(None, false, millis, QS_ALLINPUT);
        }

        let mut fired = Vec::new();
        let mut msg = MSG::default();
        while unsafe { PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE) }.as_bool() {
            if msg.message == WM_HOTKEY {
                fired.push(msg.wParam.0 as u32);
            } else {
                unsafe {
                    let _ = TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                }
            }
        }

        Ok(fired)
    }
}
