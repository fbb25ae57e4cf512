//! Start-with-OS registration
//!
//! On Windows this is a value under the current user's `Run` key. Other
//! platforms are left to the session manager.

use std::path::Path;

use anyhow::Result;

#[cfg(windows)]
const RUN_KEY: &str = "Software\\Microsoft\\Windows\\CurrentVersion\\Run";
#[cfg(windows)]
const VALUE_NAME: &str = "ProfileToggler";

/// Add or remove the autostart entry pointing at `exe_path`
#[cfg(windows)]
pub fn set_enabled(enabled: bool, exe_path: &Path) -> Result<()> {
    use windows::core::HSTRING;
    use windows::Win32::Foundation::ERROR_FILE_NOT_FOUND;
    use windows::Win32::System::Registry::{
        RegCloseKey, RegDeleteValueW, RegOpenKeyExW, RegSetValueExW, HKEY, HKEY_CURRENT_USER,
        KEY_WRITE, REG_SZ,
    };

    unsafe {
        let subkey = HSTRING::from(RUN_KEY);
        let value_name = HSTRING::from(VALUE_NAME);
        let mut hkey = HKEY::default();

        let open_result = RegOpenKeyExW(HKEY_CURRENT_USER, &subkey, None, KEY_WRITE, &mut hkey);
        if open_result.is_err() {
            anyhow::bail!("failed to open Run key for write: {:?}", open_result);
        }

        let result = if enabled {
            // Quoted so paths with spaces survive the shell's parsing
            let command = format!("\"{}\"", exe_path.display());
            let wide: Vec<u16> = command.encode_utf16().chain(std::iter::once(0)).collect();
            let bytes = std::slice::from_raw_parts(wide.as_ptr() as *const u8, wide.len() * 2);
            RegSetValueExW(hkey, &value_name, None, REG_SZ, Some(bytes))
        } else {
            RegDeleteValueW(hkey, &value_name)
        };

        let _ = RegCloseKey(hkey);

        if result.is_err() && !(result == ERROR_FILE_NOT_FOUND && !enabled) {
            anyhow::bail!("failed to update Run value: {:?}", result);
        }
    }

    tracing::info!(enabled, path = ?exe_path, "autostart updated");
    Ok(())
}

#[cfg(not(windows))]
pub fn set_enabled(enabled: bool, exe_path: &Path) -> Result<()> {
    if enabled {
        tracing::warn!(
            path = ?exe_path,
            "start-with-OS is not supported on this platform, add the daemon to your session startup"
        );
    }
    Ok(())
}
