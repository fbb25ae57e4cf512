//! profile-toggler: background daemon that switches display color profiles
//!
//! This daemon provides:
//! - Global hotkey detection (RegisterHotKey, CGEventTap or X11 key grabs)
//! - Direct-switch and two-profile toggle bindings
//! - Profile application through the external color applier
//! - Persistent profiles, bindings and flags in a JSON settings file
//!
//! Windows, tray and notifications belong to a front-end, which talks to
//! the daemon over its local IPC endpoint.

mod applier;
mod autostart;
mod config;
mod displays;
mod events;
mod hotkey;
mod ipc;
mod lifecycle;
mod settings;
mod state;
#[cfg(test)]
mod testing;

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::applier::ApplierInvoker;
use crate::config::Config;
use crate::displays::SystemDisplays;
use crate::events::AppEvent;
use crate::hotkey::{platform, HotkeyService};
use crate::ipc::Server;
use crate::lifecycle::{install_panic_hook, InstanceLock, ShutdownSignal};
use crate::settings::SettingsStore;
use crate::state::{AppCommand, AppState, Controller};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load();
    init_logging(&config);
    install_panic_hook();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "profile-toggler starting"
    );
    for warning in &config.warnings {
        warn!("{warning}");
    }
    info!(
        settings = ?config.settings_path,
        applier = ?config.applier_path,
        log = ?config.log_path,
        ipc = ?config.ipc_path,
        timeout = ?config.apply_timeout,
        "configuration loaded"
    );

    let _instance = match InstanceLock::acquire(&config.lock_path) {
        Ok(Some(lock)) => Some(lock),
        Ok(None) => {
            info!("profile-toggler is already running, exiting this instance");
            return Ok(());
        }
        Err(e) => {
            warn!(path = ?config.lock_path, error = %e, "failed to take the instance lock, continuing without it");
            None
        }
    };

    let shutdown = ShutdownSignal::new();

    // Listener thread -> controller
    let (hotkey_tx, hotkey_rx) = mpsc::channel(32);
    // Front-end -> controller
    let (command_tx, command_rx) = mpsc::channel::<AppCommand>(32);
    // Controller -> front-end
    let (event_tx, mut event_rx) = broadcast::channel::<AppEvent>(64);

    let store = SettingsStore::new(&config.settings_path);
    let settings = store.load();

    let hotkeys = HotkeyService::new(hotkey_tx);
    match hotkeys.start(platform::SystemBackend::new) {
        Ok(()) => info!("hotkey listener started"),
        Err(e) => {
            error!(error = %e, "failed to start hotkey listener");
            warn!("continuing without global hotkeys");
        }
    }

    if !config.applier_path.is_file() {
        warn!(path = ?config.applier_path, "color applier not found, applying profiles will fail");
    }

    let server = match Server::bind(&config.ipc_path, command_tx, event_tx.clone()) {
        Ok(server) => Some(server),
        Err(e) => {
            error!(error = %e, "failed to start IPC server");
            warn!("continuing without front-end access");
            None
        }
    };

    let mut controller = Controller::new(
        AppState::new(settings),
        store,
        hotkeys,
        ApplierInvoker::new(&config.applier_path, config.apply_timeout),
        SystemDisplays,
        config.exe_path.clone(),
        event_tx,
    );
    controller.report_displays();
    controller.register_all_hotkeys();
    controller.sync_autostart();

    info!("daemon initialized, entering main loop");

    tokio::select! {
        _ = controller.run(hotkey_rx, command_rx) => {
            info!("controller exited");
        }

        // Run the IPC server (accepts front-end connections); losing it
        // leaves hotkeys working
        _ = async {
            if let Some(server) = &server {
                if let Err(e) = server.run().await {
                    error!(error = %e, "IPC server stopped");
                }
            }
            std::future::pending::<()>().await
        } => {}

        _ = async {
            loop {
                match event_rx.recv().await {
                    Ok(event) => info!(%event, "app event"),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        } => {
            info!("event logger exited");
        }

        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    info!("shutting down...");

    if let Some(server) = &server {
        server.shutdown().await;
    }
    controller.shutdown();

    info!("profile-toggler stopped");

    Ok(())
}

/// Log to stderr and append to the diagnostic log file
///
/// A log file that cannot be opened only costs the file output.
fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path);
    let (file_layer, file_error) = match file {
        Ok(file) => (
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            ),
            None,
        ),
        Err(e) => (None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    if let Some(e) = file_error {
        warn!(path = ?config.log_path, error = %e, "failed to open log file, logging to stderr only");
    }
}
