//! Configuration loading and management
//!
//! Everything lives next to the executable unless overridden from the
//! environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

const SETTINGS_ENV: &str = "PROFILE_TOGGLER_SETTINGS";
const APPLIER_ENV: &str = "PROFILE_TOGGLER_APPLIER";
const LOG_ENV: &str = "PROFILE_TOGGLER_LOG";
const TIMEOUT_ENV: &str = "PROFILE_TOGGLER_APPLY_TIMEOUT_SECS";
const IPC_ENV: &str = "PROFILE_TOGGLER_IPC";

const DEFAULT_APPLY_TIMEOUT: Duration = Duration::from_secs(30);

#[cfg(windows)]
const APPLIER_FILE: &str = "ColorApplier.exe";
#[cfg(not(windows))]
const APPLIER_FILE: &str = "ColorApplier";

#[cfg(windows)]
const DEFAULT_PIPE: &str = r"\\.\pipe\profile-toggler";

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path of the running executable, used for autostart
    pub exe_path: PathBuf,

    /// Settings document (profiles, hotkeys, flags)
    pub settings_path: PathBuf,

    /// External color applier executable
    pub applier_path: PathBuf,

    /// Durable diagnostic log
    pub log_path: PathBuf,

    /// Lock file guarding against a second daemon (Unix)
    pub lock_path: PathBuf,

    /// Front-end endpoint: a Unix socket path or a Windows pipe name
    pub ipc_path: PathBuf,

    /// Upper bound on one applier run; `None` waits forever
    pub apply_timeout: Option<Duration>,

    /// Problems recovered from while loading, logged once logging is up
    pub warnings: Vec<String>,
}

impl Config {
    /// Load configuration from environment and defaults
    ///
    /// Never fails: unusable values fall back to their defaults and are
    /// reported through `warnings`.
    pub fn load() -> Self {
        let mut warnings = Vec::new();
        let exe_path = match std::env::current_exe() {
            Ok(path) => path,
            Err(e) => {
                warnings.push(format!(
                    "failed to locate the running executable ({e}), using the working directory"
                ));
                PathBuf::from(".").join(env!("CARGO_PKG_NAME"))
            }
        };
        let base_dir = exe_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut config = Self::from_parts(exe_path, &base_dir, |key| std::env::var(key).ok());
        warnings.append(&mut config.warnings);
        config.warnings = warnings;
        config
    }

    fn from_parts(exe_path: PathBuf, base_dir: &Path, env: impl Fn(&str) -> Option<String>) -> Self {
        let path_or = |key: &str, default: PathBuf| env(key).map(PathBuf::from).unwrap_or(default);
        let mut warnings = Vec::new();

        let apply_timeout = match env(TIMEOUT_ENV).map(|raw| raw.trim().parse::<u64>()) {
            Some(Ok(0)) => None,
            Some(Ok(secs)) => Some(Duration::from_secs(secs)),
            Some(Err(e)) => {
                warnings.push(format!(
                    "{TIMEOUT_ENV} must be a whole number of seconds ({e}), using {}s",
                    DEFAULT_APPLY_TIMEOUT.as_secs()
                ));
                Some(DEFAULT_APPLY_TIMEOUT)
            }
            None => Some(DEFAULT_APPLY_TIMEOUT),
        };

        #[cfg(windows)]
        let default_ipc = PathBuf::from(DEFAULT_PIPE);
        #[cfg(not(windows))]
        let default_ipc = base_dir.join("profile-toggler.sock");

        Self {
            settings_path: path_or(SETTINGS_ENV, base_dir.join("config.json")),
            applier_path: path_or(
                APPLIER_ENV,
                base_dir.join("ColorApplier").join(APPLIER_FILE),
            ),
            log_path: path_or(LOG_ENV, base_dir.join("debug_log.txt")),
            lock_path: base_dir.join("profile-toggler.lock"),
            ipc_path: path_or(IPC_ENV, default_ipc),
            apply_timeout,
            exe_path,
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_with(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_parts(
            PathBuf::from("/opt/toggler/profile-toggler"),
            Path::new("/opt/toggler"),
            |key| vars.get(key).cloned(),
        )
    }

    #[test]
    fn test_config_load() {
        let config = Config::load();
        assert!(config.settings_path.ends_with("config.json"));
    }

    #[test]
    fn test_defaults_next_to_executable() {
        let config = config_with(&[]);
        assert_eq!(config.settings_path, Path::new("/opt/toggler/config.json"));
        assert_eq!(config.log_path, Path::new("/opt/toggler/debug_log.txt"));
        assert_eq!(config.lock_path, Path::new("/opt/toggler/profile-toggler.lock"));
        assert!(config.applier_path.starts_with("/opt/toggler/ColorApplier"));
        assert_eq!(config.apply_timeout, Some(DEFAULT_APPLY_TIMEOUT));
        assert!(config.warnings.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_default_socket_next_to_executable() {
        let config = config_with(&[]);
        assert_eq!(config.ipc_path, Path::new("/opt/toggler/profile-toggler.sock"));
    }

    #[test]
    fn test_environment_overrides() {
        let config = config_with(&[
            (SETTINGS_ENV, "/tmp/settings.json"),
            (APPLIER_ENV, "/usr/bin/applier"),
            (IPC_ENV, "/run/user/1000/toggler.sock"),
            (TIMEOUT_ENV, "5"),
        ]);
        assert_eq!(config.settings_path, Path::new("/tmp/settings.json"));
        assert_eq!(config.applier_path, Path::new("/usr/bin/applier"));
        assert_eq!(config.ipc_path, Path::new("/run/user/1000/toggler.sock"));
        assert_eq!(config.apply_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_zero_timeout_disables_it() {
        let config = config_with(&[(TIMEOUT_ENV, "0")]);
        assert_eq!(config.apply_timeout, None);
    }

    #[test]
    fn test_bad_timeout_falls_back_to_default() {
        let config = config_with(&[(TIMEOUT_ENV, "soon")]);
        assert_eq!(config.apply_timeout, Some(DEFAULT_APPLY_TIMEOUT));
        assert_eq!(config.warnings.len(), 1);
        assert!(config.warnings[0].contains(TIMEOUT_ENV));
    }
}
