//! Global hotkeys using macOS CGEventTap
//!
//! A listen-only tap reports every key-down; the backend matches key code
//! and modifier flags against the registered combinations. Requires the
//! Accessibility permission.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::Duration;

use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop, CFRunLoopSource};
use core_graphics::event::{
    CGEvent, CGEventFlags, CGEventTap, CGEventTapLocation, CGEventTapOptions,
    CGEventTapPlacement, CGEventTapProxy, CGEventType, EventField,
};
use tracing::{info, warn};

use crate::hotkey::keys::{KeyCode, Modifiers};
use crate::hotkey::listener::{HotkeyBackend, HotkeyError};

/// Key-down tap backend
pub struct EventTapBackend {
    tap: CGEventTap<'static>,
    _source: CFRunLoopSource,
    /// Set by the callback when macOS switched the tap off
    disabled: Arc<AtomicBool>,
    key_rx: Receiver<(u16, CGEventFlags)>,
    combos: HashMap<u32, (Modifiers, u16)>,
}

impl EventTapBackend {
    /// Create the tap and attach it to the calling thread's run loop
    pub fn new() -> Result<Self, HotkeyError> {
        let (key_tx, key_rx) = mpsc::channel();
        let disabled = Arc::new(AtomicBool::new(false));
        let disabled_flag = Arc::clone(&disabled);

        // Tap callback - must be fast and non-blocking
        let callback = move |_proxy: CGEventTapProxy, event_type: CGEventType, event: &CGEvent| -> Option<CGEvent> {
            match event_type {
                CGEventType::KeyDown => {
                    let repeat = event.get_integer_value_field(EventField::KEYBOARD_EVENT_AUTOREPEAT);
                    if repeat == 0 {
                        let code = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u16;
                        let _ = key_tx.send((code, event.get_flags()));
                    }
                }
                CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput => {
                    warn!("event tap disabled by the system");
                    disabled_flag.store(true, Ordering::SeqCst);
                }
                _ => {}
            }
            Some(event.clone())
        };

        let tap = CGEventTap::new(
            CGEventTapLocation::Session,
            CGEventTapPlacement::HeadInsertEventTap,
            CGEventTapOptions::ListenOnly,
            vec![CGEventType::KeyDown],
            callback,
        )
        .map_err(|_| HotkeyError::EventTapCreation)?;

        tap.enable();

        let source = tap
            .mach_port
            .create_runloop_source(0)
            .map_err(|_| HotkeyError::EventTapCreation)?;
        unsafe {
            CFRunLoop::get_current().add_source(&source, kCFRunLoopCommonModes);
        }

        info!("event tap created and enabled");

        Ok(Self {
            tap,
            _source: source,
            disabled,
            key_rx,
            combos: HashMap::new(),
        })
    }
}

/// Clear the disabled flag, reporting whether it was set
fn take_disabled(flag: &AtomicBool) -> bool {
    flag.swap(false, Ordering::SeqCst)
}

fn modifiers_from_flags(flags: CGEventFlags) -> Modifiers {
    Modifiers {
        alt: flags.contains(CGEventFlags::CGEventFlagAlternate),
        ctrl: flags.contains(CGEventFlags::CGEventFlagControl),
        shift: flags.contains(CGEventFlags::CGEventFlagShift),
        meta: flags.contains(CGEventFlags::CGEventFlagCommand),
    }
}

impl HotkeyBackend for EventTapBackend {
    fn register(&mut self, id: u32, modifiers: Modifiers, key: KeyCode) -> Result<(), HotkeyError> {
        self.combos.insert(id, (modifiers, key.mac_keycode()));
        Ok(())
    }

    fn unregister(&mut self, id: u32) -> Result<(), HotkeyError> {
        self.combos.remove(&id);
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> Result<Vec<u32>, HotkeyError> {
        unsafe {
            CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, timeout, true);
        }

        if take_disabled(&self.disabled) {
            self.tap.enable();
            info!("event tap re-enabled");
        }

        let mut fired = Vec::new();
        while let Ok((code, flags)) = self.key_rx.try_recv() {
            let pressed = (modifiers_from_flags(flags), code);
            fired.extend(
                self.combos
                    .iter()
                    .filter(|(_, combo)| **combo == pressed)
                    .map(|(id, _)| *id),
            );
        }
        Ok(fired)
    }
}
