//! Single-instance guard
//!
//! Two daemons would grab the same hotkeys and race on the settings file.
//! Windows uses a named mutex; elsewhere an exclusive lock on a file next
//! to the executable.

use std::io;
use std::path::Path;

#[cfg(windows)]
const MUTEX_NAME: &str = "Local\\ProfileToggler_7E8F6A9D-4B8C-4D2E-9A1F-8C7D6E5B4A3C";

/// Held for the lifetime of the daemon; released on drop
pub struct InstanceLock {
    #[cfg(windows)]
    handle: windows::Win32::Foundation::HANDLE,
    #[cfg(not(windows))]
    _file: std::fs::File,
}

impl InstanceLock {
    /// Try to become the only running daemon
    ///
    /// Returns `Ok(None)` when another instance already holds the lock.
    #[cfg(not(windows))]
    pub fn acquire(lock_path: &Path) -> io::Result<Option<Self>> {
        use std::fs::{OpenOptions, TryLockError};

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(lock_path)?;

        match file.try_lock() {
            Ok(()) => Ok(Some(Self { _file: file })),
            Err(TryLockError::WouldBlock) => Ok(None),
            Err(TryLockError::Error(e)) => Err(e),
        }
    }

    #[cfg(windows)]
    pub fn acquire(_lock_path: &Path) -> io::Result<Option<Self>> {
        use windows::core::HSTRING;
        use windows::Win32::Foundation::{CloseHandle, GetLastError, ERROR_ALREADY_EXISTS};
        use windows::Win32::System::Threading::CreateMutexW;

        let name = HSTRING::from(MUTEX_NAME);
        let handle = unsafe { CreateMutexW(None, true, &name) }?;

        if unsafe { GetLastError() } == ERROR_ALREADY_EXISTS {
            let _ = unsafe { CloseHandle(handle) };
            return Ok(None);
        }
        Ok(Some(Self { handle }))
    }
}

#[cfg(windows)]
impl Drop for InstanceLock {
    fn drop(&mut self) {
        use windows::Win32::Foundation::CloseHandle;
        use windows::Win32::System::Threading::ReleaseMutex;

        unsafe {
            let _ = ReleaseMutex(self.handle);
            let _ = CloseHandle(self.handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[cfg(not(windows))]
    #[test]
    fn test_second_instance_is_refused() {
        let dir = std::env::temp_dir().join(format!("profile-toggler-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let lock_path = dir.join("profile-toggler.lock");

        let first = InstanceLock::acquire(&lock_path).unwrap();
        assert!(first.is_some());
        assert!(InstanceLock::acquire(&lock_path).unwrap().is_none());

        drop(first);
        assert!(InstanceLock::acquire(&lock_path).unwrap().is_some());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[cfg(not(windows))]
    #[test]
    fn test_unwritable_location_is_an_error() {
        let lock_path = Path::new("/nonexistent-profile-toggler-dir/profile-toggler.lock");
        assert!(InstanceLock::acquire(lock_path).is_err());
    }
}
