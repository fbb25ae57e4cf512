//! Global hotkey listener on a dedicated thread
//!
//! The listener owns one background thread for the lifetime of the daemon.
//! The platform backend is constructed on that thread (native hotkey
//! registrations are bound to the thread that runs the event loop), and all
//! register/unregister requests are posted to it through a command inbox.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::keys::{KeyCode, Modifiers};

/// How long the backend may block waiting for native events before the
/// loop checks its inbox again
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A native global hotkey facility
///
/// Implementations are created and used exclusively on the listener thread.
pub trait HotkeyBackend {
    /// Register a key combination under `id`
    fn register(&mut self, id: u32, modifiers: Modifiers, key: KeyCode) -> Result<(), HotkeyError>;

    /// Remove the combination registered under `id`
    fn unregister(&mut self, id: u32) -> Result<(), HotkeyError>;

    /// Wait up to `timeout` for native events and return the ids that fired
    fn poll(&mut self, timeout: Duration) -> Result<Vec<u32>, HotkeyError>;
}

/// Errors that can occur in the hotkey listener
#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("hotkey listener is already running")]
    AlreadyRunning,

    #[error("global hotkeys are not supported on this platform")]
    Unsupported,

    #[error("failed to initialize hotkey backend: {0}")]
    BackendInit(String),

    #[error("failed to create event tap - check Accessibility permissions")]
    EventTapCreation,

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),

    #[error("listener thread exited before signalling readiness")]
    ThreadExited,

    #[error("key {0} has no key code on this keyboard layout")]
    UnmappedKey(KeyCode),

    #[error("failed to register hotkey {id}: {reason}")]
    Register { id: u32, reason: String },

    #[error("failed to unregister hotkey {id}: {reason}")]
    Unregister { id: u32, reason: String },

    #[error("hotkey event loop failed: {0}")]
    EventLoop(String),
}

/// Requests posted to the listener thread
#[derive(Debug)]
enum Command {
    Register {
        id: u32,
        modifiers: Modifiers,
        key: KeyCode,
    },
    Unregister(u32),
    Shutdown,
}

/// Global hotkey listener running a native event loop on its own thread
///
/// Until [`HotkeyListener::start`] succeeds every operation is a silent
/// no-op, so a platform without global hotkeys degrades to "feature
/// unavailable" instead of failing at unrelated call sites.
pub struct HotkeyListener {
    inbox: OnceLock<Sender<Command>>,
    started: AtomicBool,
    running: Arc<AtomicBool>,
}

impl HotkeyListener {
    /// Create an inert listener
    pub fn new() -> Self {
        Self {
            inbox: OnceLock::new(),
            started: AtomicBool::new(false),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the hotkey listener
    ///
    /// Spawns the `hotkey-listener` thread, builds the backend there with
    /// `factory`, and blocks until the backend reports ready or failed.
    /// `on_fired` runs on the listener thread for every triggered id.
    pub fn start<B, F, C>(&self, factory: F, on_fired: C) -> Result<(), HotkeyError>
    where
        B: HotkeyBackend + 'static,
        F: FnOnce() -> Result<B, HotkeyError> + Send + 'static,
        C: Fn(u32) + Send + 'static,
    {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(HotkeyError::AlreadyRunning);
        }

        let (inbox_tx, inbox_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), HotkeyError>>(1);
        let running = Arc::clone(&self.running);

        thread::Builder::new()
            .name("hotkey-listener".to_string())
            .spawn(move || {
                let backend = match factory() {
                    Ok(backend) => backend,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                running.store(true, Ordering::SeqCst);
                let _ = ready_tx.send(Ok(()));
                info!("hotkey listener thread started");

                run_event_loop(backend, inbox_rx, on_fired);

                running.store(false, Ordering::SeqCst);
                info!("hotkey listener thread stopped");
            })
            .map_err(|e| HotkeyError::ThreadSpawn(e.to_string()))?;

        ready_rx.recv().map_err(|_| HotkeyError::ThreadExited)??;

        // Only a ready listener gets an inbox; a failed start stays inert
        let _ = self.inbox.set(inbox_tx);
        Ok(())
    }

    /// Ask the listener thread to register a combination under `id`
    ///
    /// Fire-and-forget: a rejected combination is logged on the listener
    /// thread and is not reported back to the caller.
    pub fn register(&self, id: u32, modifiers: Modifiers, key: KeyCode) {
        self.post(Command::Register { id, modifiers, key });
    }

    /// Ask the listener thread to unregister `id`
    pub fn unregister(&self, id: u32) {
        self.post(Command::Unregister(id));
    }

    /// Stop the listener thread
    pub fn dispose(&self) {
        self.post(Command::Shutdown);
    }

    /// Check if the listener thread is currently running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn post(&self, command: Command) {
        let Some(inbox) = self.inbox.get() else {
            return;
        };
        if inbox.send(command).is_err() {
            debug!("hotkey listener thread is gone, request dropped");
        }
    }
}

impl Default for HotkeyListener {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Alternate between draining the inbox and polling the backend
fn run_event_loop<B, C>(mut backend: B, inbox: Receiver<Command>, on_fired: C)
where
    B: HotkeyBackend,
    C: Fn(u32),
{
    let mut registered = HashSet::new();

    'outer: loop {
        loop {
            match inbox.try_recv() {
                Ok(Command::Register { id, modifiers, key }) => {
                    match backend.register(id, modifiers, key) {
                        Ok(()) => {
                            debug!(id, %modifiers, %key, "hotkey registered");
                            registered.insert(id);
                        }
                        Err(e) => {
                            warn!(id, %modifiers, %key, error = %e, "failed to register hotkey");
                        }
                    }
                }
                Ok(Command::Unregister(id)) => {
                    if registered.remove(&id) {
                        match backend.unregister(id) {
                            Ok(()) => debug!(id, "hotkey unregistered"),
                            Err(e) => warn!(id, error = %e, "failed to unregister hotkey"),
                        }
                    }
                }
                Ok(Command::Shutdown) | Err(TryRecvError::Disconnected) => break 'outer,
                Err(TryRecvError::Empty) => break,
            }
        }

        match backend.poll(POLL_INTERVAL) {
            Ok(fired) => {
                for id in fired {
                    debug!(id, "hotkey fired");
                    on_fired(id);
                }
            }
            Err(e) => {
                error!(error = %e, "hotkey backend failed, stopping listener");
                break;
            }
        }
    }

    for id in registered {
        if let Err(e) = backend.unregister(id) {
            warn!(id, error = %e, "failed to unregister hotkey during shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::fake::FakeKeyboard;

    fn ctrl() -> Modifiers {
        Modifiers {
            ctrl: true,
            ..Modifiers::default()
        }
    }

    #[test]
    fn test_listener_creation() {
        let listener = HotkeyListener::new();
        assert!(!listener.is_running());
    }

    #[test]
    fn test_inert_listener_ignores_requests() {
        let listener = HotkeyListener::new();
        listener.register(1, ctrl(), KeyCode::A);
        listener.unregister(1);
        listener.dispose();
        assert!(!listener.is_running());
    }

    #[test]
    fn test_failed_backend_leaves_listener_inert() {
        let listener = HotkeyListener::new();
        let result = listener.start(
            || Err::<crate::hotkey::fake::FakeBackend, _>(HotkeyError::Unsupported),
            |_| {},
        );
        assert!(matches!(result, Err(HotkeyError::Unsupported)));
        assert!(!listener.is_running());

        // Requests after a failed start are silently dropped
        listener.register(1, ctrl(), KeyCode::A);
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let keyboard = FakeKeyboard::new();
        let listener = HotkeyListener::new();
        listener.start(keyboard.factory(), |_| {}).unwrap();
        assert!(listener.is_running());

        let second = listener.start(keyboard.factory(), |_| {});
        assert!(matches!(second, Err(HotkeyError::AlreadyRunning)));
    }

    #[test]
    fn test_register_and_fire() {
        let keyboard = FakeKeyboard::new();
        let (fired_tx, fired_rx) = mpsc::channel();
        let listener = HotkeyListener::new();
        listener
            .start(keyboard.factory(), move |id| {
                let _ = fired_tx.send(id);
            })
            .unwrap();

        listener.register(7, ctrl(), KeyCode::F5);
        assert!(keyboard.wait_registered(7));

        keyboard.press(ctrl(), KeyCode::F5);
        let id = fired_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(id, 7);
    }

    #[test]
    fn test_unregister_stops_firing() {
        let keyboard = FakeKeyboard::new();
        let (fired_tx, fired_rx) = mpsc::channel();
        let listener = HotkeyListener::new();
        listener
            .start(keyboard.factory(), move |id| {
                let _ = fired_tx.send(id);
            })
            .unwrap();

        listener.register(1, ctrl(), KeyCode::A);
        listener.register(2, ctrl(), KeyCode::B);
        assert!(keyboard.wait_registered(2));

        listener.unregister(1);
        assert!(keyboard.wait_unregistered(1));

        keyboard.press(ctrl(), KeyCode::A);
        keyboard.press(ctrl(), KeyCode::B);
        let id = fired_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(id, 2);
        assert!(fired_rx.recv_timeout(Duration::from_millis(300)).is_err());
    }

    #[test]
    fn test_rejected_registration_is_not_fatal() {
        let keyboard = FakeKeyboard::new();
        keyboard.reject(ctrl(), KeyCode::Q);
        let listener = HotkeyListener::new();
        listener.start(keyboard.factory(), |_| {}).unwrap();

        listener.register(1, ctrl(), KeyCode::Q);
        listener.register(2, ctrl(), KeyCode::W);
        assert!(keyboard.wait_registered(2));
        assert!(!keyboard.is_registered(1));
        assert!(listener.is_running());
    }

    #[test]
    fn test_dispose_stops_thread_and_releases_hotkeys() {
        let keyboard = FakeKeyboard::new();
        let listener = HotkeyListener::new();
        listener.start(keyboard.factory(), |_| {}).unwrap();
        listener.register(3, ctrl(), KeyCode::Space);
        assert!(keyboard.wait_registered(3));

        listener.dispose();
        assert!(keyboard.wait_unregistered(3));

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while listener.is_running() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(!listener.is_running());
    }
}
