//! Route panics into the diagnostic log

use tracing::error;

/// Log every panic through `tracing` before the default hook runs
pub fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let thread = std::thread::current();
        error!(
            thread = thread.name().unwrap_or("<unnamed>"),
            panic = %info,
            "unhandled panic"
        );
        default_hook(info);
    }));
}
