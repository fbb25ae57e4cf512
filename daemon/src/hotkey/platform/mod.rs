//! Native hotkey backends
//!
//! `SystemBackend` is the backend for the platform being compiled for:
//! - Windows: `RegisterHotKey` on the listener thread's message queue
//! - macOS: a listen-only CGEventTap for key-down events
//! - Linux/BSD: passive `XGrabKey` grabs on the X11 root window

#[cfg(windows)]
mod win32;
#[cfg(windows)]
pub use self::win32::Win32Backend as SystemBackend;

#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "macos")]
pub use self::macos::EventTapBackend as SystemBackend;

#[cfg(all(unix, not(target_os = "macos")))]
mod x11;
#[cfg(all(unix, not(target_os = "macos")))]
pub use self::x11::X11Backend as SystemBackend;

#[cfg(not(any(windows, unix)))]
mod unsupported;
#[cfg(not(any(windows, unix)))]
pub use self::unsupported::UnsupportedBackend as SystemBackend;
