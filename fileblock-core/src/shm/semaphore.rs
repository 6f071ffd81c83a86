// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Named POSIX semaphore wrapper.
//!
//! Thin layer over `sem_open`/`sem_wait`/`sem_post`. The handle stays valid
//! across `fork`, so a region created in the parent can be driven from
//! both children.

use std::ffi::CString;
use std::io;
use std::ptr::NonNull;

use crate::error::RegionError;

/// An open handle to a named semaphore.
///
/// Dropping the handle closes it. Removing the name from the system is a
/// separate step ([`NamedSemaphore::unlink`]) owned by whoever created it.
pub struct NamedSemaphore {
    name: String,
    sem: NonNull<libc::sem_t>,
}

// SAFETY: a sem_t opened with sem_open is process-shared and its operations
// are thread-safe.
unsafe impl Send for NamedSemaphore {}
unsafe impl Sync for NamedSemaphore {}

impl NamedSemaphore {
    /// Create a fresh semaphore with the given initial value.
    ///
    /// A leftover object with the same name (from a session that never
    /// reached `destroy`) is unlinked first, so the initial value is
    /// always the one requested here.
    pub fn create(name: &str, initial: u32) -> Result<Self, RegionError> {
        let c_name = CString::new(name).map_err(|e| RegionError::SemaphoreFailed {
            name: name.to_string(),
            reason: format!("Invalid name: {}", e),
        })?;

        // SAFETY: c_name is a valid CString
        let stale = unsafe { libc::sem_unlink(c_name.as_ptr()) };
        if stale == 0 {
            tracing::debug!(name = %name, "Removed stale semaphore");
        }

        // SAFETY: c_name is valid; mode and value are passed as the
        // variadic unsigned ints sem_open expects with O_CREAT.
        let sem = unsafe {
            libc::sem_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL,
                0o600 as libc::c_uint,
                initial as libc::c_uint,
            )
        };

        if sem == libc::SEM_FAILED {
            return Err(RegionError::SemaphoreFailed {
                name: name.to_string(),
                reason: format!("sem_open failed: {}", io::Error::last_os_error()),
            });
        }

        let sem = NonNull::new(sem).ok_or_else(|| RegionError::SemaphoreFailed {
            name: name.to_string(),
            reason: "sem_open returned null".to_string(),
        })?;

        tracing::debug!(name = %name, initial = initial, "Created semaphore");

        Ok(Self {
            name: name.to_string(),
            sem,
        })
    }

    /// Get the name of this semaphore.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decrement, blocking while the value is zero. Retries on EINTR.
    pub fn wait(&self) -> Result<(), RegionError> {
        loop {
            // SAFETY: sem is a live handle from sem_open
            let rc = unsafe { libc::sem_wait(self.sem.as_ptr()) };
            if rc == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(RegionError::Sync {
                operation: "wait",
                name: self.name.clone(),
                reason: err.to_string(),
            });
        }
    }

    /// Increment, waking one waiter.
    pub fn post(&self) -> Result<(), RegionError> {
        // SAFETY: sem is a live handle from sem_open
        let rc = unsafe { libc::sem_post(self.sem.as_ptr()) };
        if rc != 0 {
            return Err(RegionError::Sync {
                operation: "post",
                name: self.name.clone(),
                reason: io::Error::last_os_error().to_string(),
            });
        }
        Ok(())
    }

    /// Current value.
    pub fn value(&self) -> Result<i32, RegionError> {
        let mut value: libc::c_int = 0;
        // SAFETY: sem is live, value is a valid out pointer
        let rc = unsafe { libc::sem_getvalue(self.sem.as_ptr(), &mut value) };
        if rc != 0 {
            return Err(RegionError::Sync {
                operation: "getvalue",
                name: self.name.clone(),
                reason: io::Error::last_os_error().to_string(),
            });
        }
        Ok(value)
    }

    /// Remove a semaphore name from the system. Missing names are ignored.
    pub fn unlink(name: &str) {
        if let Ok(c_name) = CString::new(name) {
            // SAFETY: c_name is a valid CString
            if unsafe { libc::sem_unlink(c_name.as_ptr()) } == 0 {
                tracing::debug!(name = %name, "Unlinked semaphore");
            }
        }
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        // SAFETY: sem came from sem_open and is closed exactly once here
        let rc = unsafe { libc::sem_close(self.sem.as_ptr()) };
        if rc != 0 {
            tracing::error!(
                name = %self.name,
                error = %io::Error::last_os_error(),
                "Failed to close semaphore"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_name(tag: &str) -> String {
        format!("/fileblock-semtest-{}-{}", tag, std::process::id())
    }

    #[test]
    fn test_initial_value_and_handshake() {
        let name = test_name("handshake");
        let sem = NamedSemaphore::create(&name, 1).unwrap();
        assert_eq!(sem.value().unwrap(), 1);

        sem.wait().unwrap();
        assert_eq!(sem.value().unwrap(), 0);
        sem.post().unwrap();
        assert_eq!(sem.value().unwrap(), 1);

        drop(sem);
        NamedSemaphore::unlink(&name);
    }

    #[test]
    fn test_create_replaces_stale_semaphore() {
        let name = test_name("stale");
        let first = NamedSemaphore::create(&name, 5).unwrap();
        drop(first);

        // Never unlinked: a second create must still start from its own value.
        let second = NamedSemaphore::create(&name, 0).unwrap();
        assert_eq!(second.value().unwrap(), 0);

        drop(second);
        NamedSemaphore::unlink(&name);
    }
}
