//! Primary-context controller
//!
//! Owns all mutable application state. Hotkey presses (marshalled off the
//! listener thread) and front-end commands are handled here one at a time,
//! so the last-applied slot needs no locking and a toggle always sees the
//! outcome of the press before it.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::resolver::{resolve, Unresolved};
use crate::applier::{ApplyError, ProfileApplier};
use crate::autostart;
use crate::displays::DisplaySource;
use crate::events::AppEvent;
use crate::hotkey::HotkeyService;
use crate::settings::{AppSettings, HotkeyBinding, Profile, ProfileId, SettingsStore};

/// Mutable application state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    pub settings: AppSettings,
    /// Only updated after the applier confirmed success
    pub last_applied: Option<ProfileId>,
}

impl AppState {
    pub fn new(settings: AppSettings) -> Self {
        Self {
            settings,
            last_applied: None,
        }
    }
}

/// Requests from a front-end
#[derive(Debug)]
pub enum AppCommand {
    /// Apply a profile to the selected displays
    ApplyProfile { profile_id: ProfileId },
    /// Add a new profile or update the one with the same id
    SaveProfile(Profile),
    DeleteProfile { profile_id: ProfileId },
    /// Replace all hotkey bindings and re-register them
    SetHotkeys(Vec<HotkeyBinding>),
    SetSelectedDisplays(Vec<String>),
    SetFlags {
        start_minimized: bool,
        start_with_os: bool,
        hide_on_close: bool,
    },
    ListDisplays { reply: oneshot::Sender<Vec<String>> },
    Snapshot { reply: oneshot::Sender<AppState> },
}

/// Ties hotkeys, resolution, the applier and persistence together
pub struct Controller<P, D> {
    state: AppState,
    store: SettingsStore,
    hotkeys: HotkeyService<HotkeyBinding>,
    /// Binding id -> registration id
    registrations: HashMap<Uuid, u32>,
    applier: P,
    displays: D,
    exe_path: PathBuf,
    event_tx: broadcast::Sender<AppEvent>,
}

impl<P, D> Controller<P, D>
where
    P: ProfileApplier,
    D: DisplaySource,
{
    pub fn new(
        state: AppState,
        store: SettingsStore,
        hotkeys: HotkeyService<HotkeyBinding>,
        applier: P,
        displays: D,
        exe_path: PathBuf,
        event_tx: broadcast::Sender<AppEvent>,
    ) -> Self {
        Self {
            state,
            store,
            hotkeys,
            registrations: HashMap::new(),
            applier,
            displays,
            exe_path,
            event_tx,
        }
    }

    /// Current state
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run until the hotkey dispatch channel closes
    pub async fn run(
        &mut self,
        mut hotkey_rx: mpsc::Receiver<HotkeyBinding>,
        mut command_rx: mpsc::Receiver<AppCommand>,
    ) {
        info!("controller started");

        loop {
            // Queued commands go first so none is lost when dispatch closes
            tokio::select! {
                biased;
                Some(command) = command_rx.recv() => {
                    self.handle_command(command).await;
                }
                binding = hotkey_rx.recv() => match binding {
                    Some(binding) => self.handle_hotkey(binding).await,
                    None => break,
                },
            }
        }

        info!("controller stopped");
    }

    /// Log the displays the system reports and flag unknown binding targets
    pub fn report_displays(&self) -> Vec<String> {
        let names = match self.displays.display_names() {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "failed to enumerate displays");
                return Vec::new();
            }
        };
        info!(displays = ?names, "displays found");

        if !names.is_empty() {
            for binding in &self.state.settings.hotkeys {
                for target in binding.target_displays.iter().filter(|&t| !names.contains(t)) {
                    warn!(
                        hotkey = %binding.display_text(),
                        display = %target,
                        "hotkey targets a display that is not connected"
                    );
                }
            }
        }
        names
    }

    /// Make the autostart entry match the persisted flag
    pub fn sync_autostart(&self) {
        if let Err(e) = autostart::set_enabled(self.state.settings.start_with_os, &self.exe_path) {
            warn!(error = %e, "failed to update start-with-OS registration");
        }
    }

    /// Replace every registration with one per usable binding
    pub fn register_all_hotkeys(&mut self) {
        self.unregister_all_hotkeys();

        if !self.hotkeys.is_available() {
            info!("global hotkeys unavailable, bindings are kept but inactive");
        }

        let duplicates: HashSet<Uuid> = self
            .state
            .settings
            .duplicate_combinations()
            .into_iter()
            .map(|binding| binding.id)
            .collect();

        for binding in &self.state.settings.hotkeys {
            if duplicates.contains(&binding.id) {
                warn!(
                    hotkey = %binding.display_text(),
                    binding = %binding.id,
                    "hotkey combination is already bound by an earlier hotkey, skipping"
                );
                continue;
            }
            for issue in binding.validate() {
                warn!(hotkey = %binding.display_text(), %issue, "hotkey binding is incomplete");
            }

            let Some(key) = binding.key else {
                warn!(binding = %binding.id, "skipping hotkey without a supported key");
                continue;
            };

            let id = self.hotkeys.register(binding.modifiers, key, binding.clone());
            self.registrations.insert(binding.id, id);
            info!(hotkey = %binding.display_text(), id, "hotkey registered");
        }

        let count = self.registrations.len();
        info!(count, "hotkeys registered");
        self.publish(AppEvent::HotkeysRegistered { count });
    }

    /// Drop every registration this controller made
    pub fn unregister_all_hotkeys(&mut self) {
        for (_, id) in self.registrations.drain() {
            self.hotkeys.unregister(id);
        }
    }

    /// Resolve and apply the profile a hotkey press selects
    pub async fn handle_hotkey(&mut self, binding: HotkeyBinding) {
        info!(hotkey = %binding.display_text(), binding = %binding.id, "hotkey triggered");

        let profile = match resolve(&binding, &self.state.settings.profiles, self.state.last_applied) {
            Ok(profile) => profile.clone(),
            Err(Unresolved::NoTargetDisplays) => {
                info!(hotkey = %binding.display_text(), "hotkey has no target displays, skipping");
                return;
            }
            Err(reason) => {
                debug!(hotkey = %binding.display_text(), %reason, "hotkey has nothing to apply");
                return;
            }
        };

        self.apply_profile(&profile, &binding.target_displays).await;
    }

    /// Apply `profile` to `displays`; returns whether it succeeded
    pub async fn apply_profile(&mut self, profile: &Profile, displays: &[String]) -> bool {
        info!(profile = %profile.name, summary = %profile.summary(), ?displays, "applying profile");

        match self.applier.apply(profile, displays).await {
            Ok(()) => {
                self.state.last_applied = Some(profile.id);
                self.publish(AppEvent::ProfileApplied {
                    profile_id: profile.id,
                    profile_name: profile.name.clone(),
                });
                true
            }
            Err(e) => {
                warn!(profile = %profile.name, error = %e, "failed to apply profile");
                self.publish(AppEvent::ApplyFailed {
                    profile_id: profile.id,
                    message: user_message(&e),
                });
                false
            }
        }
    }

    /// Handle one front-end request
    pub async fn handle_command(&mut self, command: AppCommand) {
        debug!(?command, "handling command");

        match command {
            AppCommand::ApplyProfile { profile_id } => {
                let Some(profile) = self.state.settings.profile(profile_id).cloned() else {
                    self.notice("Information", format!("Profile {profile_id} no longer exists."));
                    return;
                };
                if self.state.settings.selected_displays.is_empty() {
                    self.notice(
                        "Information",
                        "Please select at least one display first.".to_string(),
                    );
                    return;
                }
                let displays = self.state.settings.selected_displays.clone();
                self.apply_profile(&profile, &displays).await;
            }

            AppCommand::SaveProfile(profile) => {
                info!(profile = %profile.name, summary = %profile.summary(), "saving profile");
                let settings = &mut self.state.settings;
                let result = if settings.profile(profile.id).is_some() {
                    settings.update_profile(&profile)
                } else {
                    settings.add_profile(profile)
                };
                match result {
                    Ok(()) => self.save(),
                    Err(e) => {
                        warn!(error = %e, "failed to save profile");
                        self.notice("Error", format!("Failed to save profile: {e}"));
                    }
                }
            }

            AppCommand::DeleteProfile { profile_id } => {
                match self.state.settings.remove_profile(profile_id) {
                    Some(profile) => {
                        info!(profile = %profile.name, "profile deleted");
                        if self.state.last_applied == Some(profile_id) {
                            self.state.last_applied = None;
                        }
                        self.save();
                    }
                    None => debug!(%profile_id, "delete of unknown profile ignored"),
                }
            }

            AppCommand::SetHotkeys(bindings) => {
                self.state.settings.hotkeys = bindings;
                self.save();
                self.register_all_hotkeys();
            }

            AppCommand::SetSelectedDisplays(names) => {
                if names.is_empty() {
                    self.notice("Validation Error", "You must select at least one display.".to_string());
                    return;
                }
                self.state.settings.selected_displays = names;
                self.save();
            }

            AppCommand::SetFlags {
                start_minimized,
                start_with_os,
                hide_on_close,
            } => {
                let autostart_changed = self.state.settings.start_with_os != start_with_os;
                self.state.settings.start_minimized = start_minimized;
                self.state.settings.start_with_os = start_with_os;
                self.state.settings.hide_on_close = hide_on_close;
                if autostart_changed {
                    self.sync_autostart();
                }
                self.save();
            }

            AppCommand::ListDisplays { reply } => {
                let _ = reply.send(self.report_displays());
            }

            AppCommand::Snapshot { reply } => {
                let _ = reply.send(self.state.clone());
            }
        }
    }

    /// Unregister everything and stop the listener thread
    pub fn shutdown(&mut self) {
        self.unregister_all_hotkeys();
        self.hotkeys.dispose();
        info!("controller shut down");
    }

    fn save(&self) {
        match self.store.save(&self.state.settings) {
            Ok(()) => self.publish(AppEvent::SettingsSaved),
            Err(e) => {
                warn!(error = %e, "failed to save settings");
                self.notice("Error", format!("Failed to save settings: {e}"));
            }
        }
    }

    fn notice(&self, title: &str, message: String) {
        self.publish(AppEvent::Notice {
            title: title.to_string(),
            message,
        });
    }

    fn publish(&self, event: AppEvent) {
        debug!(%event, "publishing event");
        let _ = self.event_tx.send(event);
    }
}

/// Text shown to the user for an apply failure
fn user_message(error: &ApplyError) -> String {
    match error {
        ApplyError::ToolMissing { path } => format!(
            "Could not find the color applier at '{}'. Place it in a 'ColorApplier' folder next to the daemon.",
            path.display()
        ),
        ApplyError::ApplierError { code, .. } => format!(
            "Failed to apply settings: the color applier exited with error code {code}. See the debug log for details."
        ),
        other => format!("Failed to apply settings: {other}."),
    }
}
