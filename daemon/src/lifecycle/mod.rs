//! Process lifecycle: single instance, panics and shutdown signals

mod instance;
mod panic;
mod shutdown;

pub use instance::InstanceLock;
pub use panic::install_panic_hook;
pub use shutdown::ShutdownSignal;
