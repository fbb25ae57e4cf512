//! External color applier invocation
//!
//! The applier is a separate executable that changes the display color
//! settings. It is launched directly (no shell) with one argument per value:
//!
//! ```text
//! <applier> --vibrance <int> --brightness <float> --contrast <float>
//!           --gamma <float> --display <name> [--display <name> ...]
//! ```
//!
//! Exit code 0 means the profile was applied.

use std::future::Future;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::settings::Profile;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Why a profile could not be applied
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("no target displays selected")]
    NoTargetDisplays,

    #[error("color applier not found at {}", path.display())]
    ToolMissing { path: PathBuf },

    #[error("failed to launch color applier: {source}")]
    LaunchFailed {
        #[source]
        source: std::io::Error,
    },

    #[error("color applier exited with error code {code}")]
    ApplierError { code: i32, stderr: String },

    #[error("color applier was terminated without an exit code")]
    Terminated,

    #[error("color applier did not finish within {after:?}")]
    TimedOut { after: Duration },

    #[error("failed waiting for color applier: {0}")]
    Wait(#[source] std::io::Error),
}

/// Something that can push a profile to a set of displays
pub trait ProfileApplier {
    fn apply(
        &self,
        profile: &Profile,
        displays: &[String],
    ) -> impl Future<Output = Result<(), ApplyError>> + Send;
}

/// Build the applier argument list
///
/// Numbers use Rust's float formatting, which is locale independent and
/// prints the shortest representation (`0.40` becomes `0.4`). Each display
/// name is its own argument, so names with spaces need no quoting.
pub fn applier_args(profile: &Profile, displays: &[String]) -> Vec<String> {
    let mut args = vec![
        "--vibrance".to_string(),
        profile.vibrance.to_string(),
        "--brightness".to_string(),
        profile.brightness.to_string(),
        "--contrast".to_string(),
        profile.contrast.to_string(),
        "--gamma".to_string(),
        profile.gamma.to_string(),
    ];
    for display in displays {
        args.push("--display".to_string());
        args.push(display.clone());
    }
    args
}

/// Render arguments as a single line for logs, quoting display names
pub fn render_command_line(args: &[String]) -> String {
    let mut rendered = Vec::with_capacity(args.len());
    let mut quote_next = false;
    for arg in args {
        if quote_next {
            rendered.push(format!("\"{arg}\""));
        } else {
            rendered.push(arg.clone());
        }
        quote_next = arg == "--display";
    }
    rendered.join(" ")
}

/// Launches the applier executable
pub struct ApplierInvoker {
    executable: PathBuf,
    timeout: Option<Duration>,
    serial: Mutex<()>,
}

impl ApplierInvoker {
    /// `timeout` bounds each run; `None` waits indefinitely
    pub fn new(executable: impl Into<PathBuf>, timeout: Option<Duration>) -> Self {
        Self {
            executable: executable.into(),
            timeout,
            serial: Mutex::new(()),
        }
    }

    async fn run(&self, profile: &Profile, displays: &[String]) -> Result<(), ApplyError> {
        if displays.is_empty() {
            return Err(ApplyError::NoTargetDisplays);
        }

        let is_file = tokio::fs::metadata(&self.executable)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(ApplyError::ToolMissing {
                path: self.executable.clone(),
            });
        }

        // One applier at a time; overlapping presses queue here
        let _serial = self.serial.lock().await;

        let args = applier_args(profile, displays);
        info!(
            applier = ?self.executable,
            args = %render_command_line(&args),
            profile = %profile.name,
            "launching color applier"
        );

        let mut command = Command::new(&self.executable);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(windows)]
        command.creation_flags(CREATE_NO_WINDOW);

        let child = command.spawn().map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                ApplyError::ToolMissing {
                    path: self.executable.clone(),
                }
            } else {
                ApplyError::LaunchFailed { source }
            }
        })?;

        // Dropping the wait on timeout kills the child (kill_on_drop)
        let output = match self.timeout {
            Some(after) => tokio::time::timeout(after, child.wait_with_output())
                .await
                .map_err(|_| ApplyError::TimedOut { after })?,
            None => child.wait_with_output().await,
        }
        .map_err(ApplyError::Wait)?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stdout.trim().is_empty() {
            debug!(output = %stdout.trim(), "color applier stdout");
        }
        if !stderr.trim().is_empty() {
            warn!(output = %stderr.trim(), "color applier stderr");
        }

        match output.status.code() {
            Some(0) => {
                info!(profile = %profile.name, "color applier finished successfully");
                Ok(())
            }
            Some(code) => Err(ApplyError::ApplierError {
                code,
                stderr: stderr.trim().to_string(),
            }),
            None => Err(ApplyError::Terminated),
        }
    }
}

impl ProfileApplier for ApplierInvoker {
    fn apply(
        &self,
        profile: &Profile,
        displays: &[String],
    ) -> impl Future<Output = Result<(), ApplyError>> + Send {
        self.run(profile, displays)
    }
}
