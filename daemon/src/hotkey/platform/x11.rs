//! Global hotkeys using X11 passive key grabs
//!
//! Each combination is grabbed on the root window, once per combination of
//! the lock modifiers (Caps Lock, Num Lock) so it fires regardless of them.

use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use x11rb::connection::Connection;
use x11rb::protocol::xproto::{ConnectionExt, GrabMode, Keycode, ModMask, Window};
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

use crate::hotkey::keys::{KeyCode, Modifiers};
use crate::hotkey::listener::{HotkeyBackend, HotkeyError};

/// Upper bound on how long one poll sleeps when the queue is empty
const IDLE_SLICE: Duration = Duration::from_millis(25);

const LOCK_MASK: u16 = 0x0002;
const NUM_LOCK_MASK: u16 = 0x0010;
const LOCK_VARIANTS: [u16; 4] = [0, LOCK_MASK, NUM_LOCK_MASK, LOCK_MASK | NUM_LOCK_MASK];

/// Root-window key grab backend
pub struct X11Backend {
    conn: RustConnection,
    root: Window,
    keymap: HashMap<u32, Keycode>,
    grabs: HashMap<u32, (u16, Keycode)>,
    last_release: HashMap<Keycode, u32>,
}

impl X11Backend {
    /// Connect to `$DISPLAY` and load the keyboard mapping
    pub fn new() -> Result<Self, HotkeyError> {
        let (conn, screen_num) =
            RustConnection::connect(None).map_err(|e| HotkeyError::BackendInit(e.to_string()))?;
        let root = conn
            .setup()
            .roots
            .get(screen_num)
            .map(|screen| screen.root)
            .ok_or_else(|| HotkeyError::BackendInit(format!("no screen {screen_num}")))?;
        let keymap = load_keymap(&conn)?;

        Ok(Self {
            conn,
            root,
            keymap,
            grabs: HashMap::new(),
            last_release: HashMap::new(),
        })
    }

    fn grab_mask(modifiers: Modifiers) -> u16 {
        let mut mask = 0u16;
        if modifiers.shift {
            mask |= u16::from(ModMask::SHIFT);
        }
        if modifiers.ctrl {
            mask |= u16::from(ModMask::CONTROL);
        }
        if modifiers.alt {
            mask |= u16::from(ModMask::M1);
        }
        if modifiers.meta {
            mask |= u16::from(ModMask::M4);
        }
        mask
    }

    fn ungrab(&self, mask: u16, keycode: Keycode) -> Result<(), String> {
        for variant in LOCK_VARIANTS {
            self.conn
                .ungrab_key(keycode, self.root, ModMask::from(mask | variant))
                .map_err(|e| e.to_string())?;
        }
        self.conn.flush().map_err(|e| e.to_string())
    }
}

/// Map every keysym to the first keycode that produces it
fn load_keymap(conn: &RustConnection) -> Result<HashMap<u32, Keycode>, HotkeyError> {
    let setup = conn.setup();
    let min = setup.min_keycode;
    let count = setup.max_keycode.saturating_sub(min).saturating_add(1);

    let mapping = conn
        .get_keyboard_mapping(min, count)
        .map_err(|e| HotkeyError::BackendInit(e.to_string()))?
        .reply()
        .map_err(|e| HotkeyError::BackendInit(e.to_string()))?;

    let per_keycode = usize::from(mapping.keysyms_per_keycode);
    if per_keycode == 0 {
        return Err(HotkeyError::BackendInit("empty keyboard mapping".to_string()));
    }

    let mut keymap = HashMap::new();
    for (offset, keysyms) in mapping.keysyms.chunks(per_keycode).enumerate() {
        let Ok(offset) = u8::try_from(offset) else {
            break;
        };
        for keysym in keysyms.iter().filter(|sym| **sym != 0) {
            keymap.entry(*keysym).or_insert(min.saturating_add(offset));
        }
    }
    Ok(keymap)
}

impl HotkeyBackend for X11Backend {
    fn register(&mut self, id: u32, modifiers: Modifiers, key: KeyCode) -> Result<(), HotkeyError> {
        let keycode = *self
            .keymap
            .get(&key.keysym())
            .ok_or(HotkeyError::UnmappedKey(key))?;
        let mask = Self::grab_mask(modifiers);
        let register_error = |reason: String| HotkeyError::Register { id, reason };

        for variant in LOCK_VARIANTS {
            let result = self
                .conn
                .grab_key(
                    true,
                    self.root,
                    ModMask::from(mask | variant),
                    keycode,
                    GrabMode::ASYNC,
                    GrabMode::ASYNC,
                )
                .map_err(|e| register_error(e.to_string()))?
                .check();

            // BadAccess here means another client already owns the combination
            if let Err(e) = result {
                let _ = self.ungrab(mask, keycode);
                return Err(register_error(e.to_string()));
            }
        }

        self.grabs.insert(id, (mask, keycode));
        Ok(())
    }

    fn unregister(&mut self, id: u32) -> Result<(), HotkeyError> {
        let Some((mask, keycode)) = self.grabs.remove(&id) else {
            return Ok(());
        };
        self.ungrab(mask, keycode)
            .map_err(|reason| HotkeyError::Unregister { id, reason })
    }

    fn poll(&mut self, timeout: Duration) -> Result<Vec<u32>, HotkeyError> {
        let mut fired = Vec::new();

        loop {
            let event = self
                .conn
                .poll_for_event()
                .map_err(|e| HotkeyError::EventLoop(e.to_string()))?;
            let Some(event) = event else {
                break;
            };

            match event {
                Event::KeyRelease(release) => {
                    self.last_release.insert(release.detail, release.time);
                }
                Event::KeyPress(press) => {
                    // Auto-repeat shows up as a release/press pair sharing a timestamp
                    if self.last_release.get(&press.detail) == Some(&press.time) {
                        continue;
                    }
                    let state = u16::from(press.state) & !(LOCK_MASK | NUM_LOCK_MASK);
                    fired.extend(
                        self.grabs
                            .iter()
                            .filter(|(_, (mask, keycode))| *keycode == press.detail && *mask == state)
                            .map(|(id, _)| *id),
                    );
                }
                _ => {}
            }
        }

        if fired.is_empty() {
            thread::sleep(timeout.min(IDLE_SLICE));
        }
        Ok(fired)
    }
}
