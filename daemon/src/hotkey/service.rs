//! Hotkey registry
//!
//! Maps locally generated ids to actions and hands fired actions over to the
//! primary context through a channel, so nothing runs on the listener thread
//! except a map lookup and a channel send.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::keys::{KeyCode, Modifiers};
use super::listener::{HotkeyBackend, HotkeyError, HotkeyListener};

/// Registry of active hotkeys and the actions they dispatch
pub struct HotkeyService<A> {
    listener: HotkeyListener,
    actions: Arc<RwLock<HashMap<u32, A>>>,
    dispatch_tx: mpsc::Sender<A>,
    next_id: AtomicU32,
}

impl<A> HotkeyService<A>
where
    A: Clone + Send + Sync + 'static,
{
    /// Create a registry whose fired actions are sent to `dispatch_tx`
    ///
    /// The underlying listener stays inert until [`Self::start`] succeeds.
    pub fn new(dispatch_tx: mpsc::Sender<A>) -> Self {
        Self {
            listener: HotkeyListener::new(),
            actions: Arc::new(RwLock::new(HashMap::new())),
            dispatch_tx,
            next_id: AtomicU32::new(0),
        }
    }

    /// Start the listener thread with the given backend factory
    pub fn start<B, F>(&self, factory: F) -> Result<(), HotkeyError>
    where
        B: HotkeyBackend + 'static,
        F: FnOnce() -> Result<B, HotkeyError> + Send + 'static,
    {
        let actions = Arc::clone(&self.actions);
        let dispatch_tx = self.dispatch_tx.clone();

        self.listener.start(factory, move |id| {
            let Some(action) = actions.read().get(&id).cloned() else {
                debug!(id, "ignoring stale hotkey id");
                return;
            };
            match dispatch_tx.try_send(action) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(id, "dispatch queue full, dropping hotkey press");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(id, "dispatch queue closed, dropping hotkey press");
                }
            }
        })
    }

    /// Whether the native listener is up
    pub fn is_available(&self) -> bool {
        self.listener.is_running()
    }

    /// Register a combination and the action it dispatches
    ///
    /// Returns the new registration id. Ids increase strictly and are never
    /// reused. Whether the OS accepted the combination is only logged.
    pub fn register(&self, modifiers: Modifiers, key: KeyCode, action: A) -> u32 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.actions.write().insert(id, action);
        self.listener.register(id, modifiers, key);
        id
    }

    /// Remove a registration; unknown ids are ignored
    pub fn unregister(&self, id: u32) {
        if self.actions.write().remove(&id).is_some() {
            self.listener.unregister(id);
        }
    }

    /// Number of live registrations
    pub fn len(&self) -> usize {
        self.actions.read().len()
    }

    /// Check if no registration is live
    pub fn is_empty(&self) -> bool {
        self.actions.read().is_empty()
    }

    /// Tear down the listener thread
    pub fn dispose(&self) {
        self.listener.dispose();
    }
}
