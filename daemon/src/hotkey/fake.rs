//! In-process hotkey backend for tests

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::keys::{KeyCode, Modifiers};
use super::listener::{HotkeyBackend, HotkeyError};

#[derive(Default)]
struct FakeState {
    registered: HashMap<u32, (Modifiers, KeyCode)>,
    rejected: HashSet<(Modifiers, KeyCode)>,
    pending: VecDeque<(Modifiers, KeyCode)>,
}

/// Test handle that simulates a keyboard and inspects registrations
#[derive(Clone, Default)]
pub struct FakeKeyboard {
    state: Arc<Mutex<FakeState>>,
}

impl FakeKeyboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend factory suitable for `HotkeyListener::start`
    pub fn factory(&self) -> impl FnOnce() -> Result<FakeBackend, HotkeyError> + Send + 'static {
        let state = Arc::clone(&self.state);
        move || Ok(FakeBackend { state })
    }

    /// Make the OS refuse this combination, as if another app owned it
    pub fn reject(&self, modifiers: Modifiers, key: KeyCode) {
        self.state.lock().rejected.insert((modifiers, key));
    }

    /// Simulate a physical key press
    pub fn press(&self, modifiers: Modifiers, key: KeyCode) {
        self.state.lock().pending.push_back((modifiers, key));
    }

    pub fn is_registered(&self, id: u32) -> bool {
        self.state.lock().registered.contains_key(&id)
    }

    pub fn registered_count(&self) -> usize {
        self.state.lock().registered.len()
    }

    /// Wait until the listener thread has registered `id`
    pub fn wait_registered(&self, id: u32) -> bool {
        self.wait_for(|keyboard| keyboard.is_registered(id))
    }

    /// Wait until the listener thread has released `id`
    pub fn wait_unregistered(&self, id: u32) -> bool {
        self.wait_for(|keyboard| !keyboard.is_registered(id))
    }

    fn wait_for(&self, condition: impl Fn(&Self) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition(self) {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition(self)
    }
}

/// Backend half of [`FakeKeyboard`], owned by the listener thread
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

impl HotkeyBackend for FakeBackend {
    fn register(&mut self, id: u32, modifiers: Modifiers, key: KeyCode) -> Result<(), HotkeyError> {
        let mut state = self.state.lock();
        if state.rejected.contains(&(modifiers, key)) {
            return Err(HotkeyError::Register {
                id,
                reason: "combination already taken".to_string(),
            });
        }
        state.registered.insert(id, (modifiers, key));
        Ok(())
    }

    fn unregister(&mut self, id: u32) -> Result<(), HotkeyError> {
        self.state.lock().registered.remove(&id);
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> Result<Vec<u32>, HotkeyError> {
        let fired: Vec<u32> = {
            let mut state = self.state.lock();
            let presses: Vec<_> = state.pending.drain(..).collect();
            presses
                .into_iter()
                .filter_map(|combo| {
                    state
                        .registered
                        .iter()
                        .find(|(_, registered)| **registered == combo)
                        .map(|(id, _)| *id)
                })
                .collect()
        };

        if fired.is_empty() {
            thread::sleep(timeout.min(Duration::from_millis(5)));
        }
        Ok(fired)
    }
}
