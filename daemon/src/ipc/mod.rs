//! IPC module for front-end communication
//!
//! A front-end (settings window, tray) connects to the daemon's local
//! endpoint, sends requests and, once subscribed, receives every
//! `AppEvent` as it is published.

mod protocol;
mod server;

pub use server::Server;
