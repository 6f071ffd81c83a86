// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! SharedRegion - POSIX shared memory block guarded by two semaphores.
//!
//! Provides safe abstraction over shm_open, mmap and sem_open for moving
//! one block at a time between exactly one producer and one consumer.
//! All unsafe operations are encapsulated with bounds checking.
//!
//! Protocol constraint: `write_raw` and `read_raw` clamp to the region
//! capacity and never report the truncation as an error. Callers must
//! never hand over more than `capacity()` bytes; the transfer protocol
//! sizes its frames accordingly.

use std::ffi::CString;
use std::ptr::NonNull;

use crate::error::RegionError;
use crate::shm::NamedSemaphore;
use crate::types::SessionName;

/// Everything acquired by `init`, released together by `destroy`.
struct Mapping {
    /// Pointer to the mapped memory.
    ptr: NonNull<u8>,
    /// File descriptor for the shared memory object.
    fd: i32,
    /// "Buffer available for production" - starts at 1.
    empty: NamedSemaphore,
    /// "Buffer holds unconsumed data" - starts at 0.
    full: NamedSemaphore,
}

/// A named, fixed-capacity shared memory block with its semaphore pair.
///
/// One value per transfer session, owned by the process that created it.
/// Forked children inherit the mapping and drive it through `&self`.
pub struct SharedRegion {
    /// Name of the session; backing objects are derived from it.
    name: SessionName,
    /// Size of the mapped region in bytes, fixed for its lifetime.
    capacity: usize,
    /// PID of the creating process. Only it unlinks the named objects.
    owner_pid: u32,
    /// `None` once destroyed.
    mapping: Option<Mapping>,
}

// SAFETY: SharedRegion owns its mapping; the block itself is only touched
// while holding the semaphore that grants access to it.
unsafe impl Send for SharedRegion {}

// SAFETY: concurrent access is serialized by the empty/full semaphore pair.
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    /// Create (or reopen) the named shared memory object, size it, map it
    /// and create the `(empty = 1, full = 0)` semaphore pair.
    ///
    /// Anything acquired before a failing step is released again before
    /// the error is returned.
    ///
    /// # Errors
    /// Returns RegionError if the name is invalid, the size is zero, or
    /// any creation, sizing or mapping step fails.
    pub fn init(name: &str, size: usize) -> Result<Self, RegionError> {
        let session = SessionName::new(name).map_err(|e| RegionError::InitFailed {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

        if size == 0 {
            return Err(RegionError::InitFailed {
                name: name.to_string(),
                reason: "Size must be greater than zero".to_string(),
            });
        }

        let shm_name = session.shm_path();
        let c_name =
            CString::new(shm_name.as_str()).map_err(|e| RegionError::InitFailed {
                name: name.to_string(),
                reason: format!("Invalid name: {}", e),
            })?;

        // Create or open the shared memory object
        // SAFETY: c_name is a valid CString, flags are valid POSIX flags
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_CREAT | libc::O_RDWR, 0o600) };

        if fd < 0 {
            return Err(RegionError::InitFailed {
                name: name.to_string(),
                reason: format!("shm_open failed: {}", std::io::Error::last_os_error()),
            });
        }

        // Set size
        // SAFETY: fd is a valid file descriptor
        let result = unsafe { libc::ftruncate(fd, size as libc::off_t) };
        if result < 0 {
            let errno = std::io::Error::last_os_error();
            Self::release_object(fd, &c_name, None);
            return Err(RegionError::InitFailed {
                name: name.to_string(),
                reason: format!("ftruncate failed: {}", errno),
            });
        }

        // Map the memory
        // SAFETY: fd is valid, size is non-zero, offset 0 is valid
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            let errno = std::io::Error::last_os_error();
            Self::release_object(fd, &c_name, None);
            return Err(RegionError::MapFailed {
                reason: format!("mmap of {} bytes failed: {}", size, errno),
            });
        }

        let Some(ptr) = NonNull::new(ptr as *mut u8) else {
            Self::release_object(fd, &c_name, None);
            return Err(RegionError::MapFailed {
                reason: "mmap returned null".to_string(),
            });
        };

        // Zero-initialize the memory
        // SAFETY: ptr is valid for size bytes
        unsafe {
            std::ptr::write_bytes(ptr.as_ptr(), 0, size);
        }

        let empty = match NamedSemaphore::create(&session.empty_sem_path(), 1) {
            Ok(sem) => sem,
            Err(e) => {
                Self::release_object(fd, &c_name, Some((ptr, size)));
                return Err(e);
            }
        };

        let full = match NamedSemaphore::create(&session.full_sem_path(), 0) {
            Ok(sem) => sem,
            Err(e) => {
                drop(empty);
                NamedSemaphore::unlink(&session.empty_sem_path());
                Self::release_object(fd, &c_name, Some((ptr, size)));
                return Err(e);
            }
        };

        tracing::debug!(name = %session, size = size, "Created shared region");

        Ok(Self {
            name: session,
            capacity: size,
            owner_pid: std::process::id(),
            mapping: Some(Mapping {
                ptr,
                fd,
                empty,
                full,
            }),
        })
    }

    /// Get the session name of this region.
    pub fn name(&self) -> &SessionName {
        &self.name
    }

    /// Get the fixed capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether `destroy` has not run yet.
    pub fn is_initialized(&self) -> bool {
        self.mapping.is_some()
    }

    /// Current `(empty, full)` semaphore values.
    pub fn semaphore_values(&self) -> Result<(i32, i32), RegionError> {
        let mapping = self.mapping()?;
        Ok((mapping.empty.value()?, mapping.full.value()?))
    }

    /// Copy one block into the region.
    ///
    /// Blocks until the consumer has drained the previous block (`empty`),
    /// copies `min(data.len(), capacity)` bytes and signals `full`.
    /// Returns the number of bytes copied.
    pub fn write_raw(&self, data: &[u8]) -> Result<usize, RegionError> {
        let mapping = self.mapping()?;
        let len = data.len().min(self.capacity);

        mapping.empty.wait()?;
        // SAFETY: holding `empty` grants exclusive access to the block;
        // len is clamped to the mapped size.
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapping.ptr.as_ptr(), len);
        }
        mapping.full.post()?;

        Ok(len)
    }

    /// Copy one block out of the region.
    ///
    /// Blocks until the producer has published a block (`full`), copies
    /// `min(buf.len(), capacity)` bytes and signals `empty`.
    /// Returns the number of bytes copied.
    pub fn read_raw(&self, buf: &mut [u8]) -> Result<usize, RegionError> {
        let mapping = self.mapping()?;
        let len = buf.len().min(self.capacity);

        mapping.full.wait()?;
        // SAFETY: holding `full` grants exclusive access to the block;
        // len is clamped to the mapped size.
        unsafe {
            std::ptr::copy_nonoverlapping(mapping.ptr.as_ptr(), buf.as_mut_ptr(), len);
        }
        mapping.empty.post()?;

        Ok(len)
    }

    /// Unmap, close and remove the shared memory object and both
    /// semaphores. Calling it again is a no-op.
    ///
    /// Named objects are only unlinked in the creating process; anywhere
    /// else this just detaches.
    pub fn destroy(&mut self) {
        let Some(mapping) = self.mapping.take() else {
            tracing::debug!(name = %self.name, "Shared region already destroyed");
            return;
        };

        let is_owner = std::process::id() == self.owner_pid;

        // SAFETY: ptr and capacity were set during init
        let result =
            unsafe { libc::munmap(mapping.ptr.as_ptr() as *mut libc::c_void, self.capacity) };
        if result < 0 {
            tracing::error!(
                name = %self.name,
                error = %std::io::Error::last_os_error(),
                "Failed to unmap shared region"
            );
        }

        // SAFETY: fd was opened during init and is closed exactly once here
        unsafe { libc::close(mapping.fd) };

        drop(mapping.empty);
        drop(mapping.full);

        if is_owner {
            if let Ok(c_name) = CString::new(self.name.shm_path()) {
                // SAFETY: c_name is a valid CString
                unsafe { libc::shm_unlink(c_name.as_ptr()) };
            }
            NamedSemaphore::unlink(&self.name.empty_sem_path());
            NamedSemaphore::unlink(&self.name.full_sem_path());
            tracing::debug!(name = %self.name, "Destroyed shared region");
        } else {
            tracing::debug!(name = %self.name, "Detached from shared region");
        }
    }

    fn mapping(&self) -> Result<&Mapping, RegionError> {
        self.mapping.as_ref().ok_or_else(|| RegionError::NotInitialized {
            name: self.name.to_string(),
        })
    }

    /// Roll back a partially initialized shared memory object.
    fn release_object(fd: i32, c_name: &CString, mapped: Option<(NonNull<u8>, usize)>) {
        if let Some((ptr, size)) = mapped {
            // SAFETY: ptr/size describe a mapping created in init
            unsafe { libc::munmap(ptr.as_ptr() as *mut libc::c_void, size) };
        }
        // SAFETY: fd and c_name come from the failed init
        unsafe {
            libc::close(fd);
            libc::shm_unlink(c_name.as_ptr());
        }
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_name(tag: &str) -> String {
        format!("fileblock-regiontest-{}-{}", tag, std::process::id())
    }

    #[test]
    fn test_init_rejects_empty_name() {
        assert!(matches!(
            SharedRegion::init("", 1024),
            Err(RegionError::InitFailed { .. })
        ));
    }

    #[test]
    fn test_init_rejects_zero_size() {
        assert!(matches!(
            SharedRegion::init(&test_name("zero"), 0),
            Err(RegionError::InitFailed { .. })
        ));
    }

    #[test]
    fn test_initial_semaphore_values() {
        let region = SharedRegion::init(&test_name("initial"), 64).unwrap();
        assert_eq!(region.semaphore_values().unwrap(), (1, 0));
        assert_eq!(region.capacity(), 64);
    }

    #[test]
    fn test_write_then_read_alternates() {
        let region = SharedRegion::init(&test_name("alternate"), 64).unwrap();

        assert_eq!(region.write_raw(b"hello").unwrap(), 5);
        assert_eq!(region.semaphore_values().unwrap(), (0, 1));

        let mut buf = [0u8; 5];
        assert_eq!(region.read_raw(&mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");
        assert_eq!(region.semaphore_values().unwrap(), (1, 0));
    }

    #[test]
    fn test_oversized_write_is_clamped() {
        let region = SharedRegion::init(&test_name("clamp"), 16).unwrap();
        let data = [7u8; 40];
        assert_eq!(region.write_raw(&data).unwrap(), 16);

        let mut buf = [0u8; 40];
        assert_eq!(region.read_raw(&mut buf).unwrap(), 16);
        assert_eq!(&buf[..16], &[7u8; 16]);
        assert_eq!(&buf[16..], &[0u8; 24]);
    }

    #[test]
    fn test_destroy_is_idempotent_and_name_reusable() {
        let name = test_name("destroy");
        let mut region = SharedRegion::init(&name, 128).unwrap();
        region.destroy();
        region.destroy();
        assert!(!region.is_initialized());

        let again = SharedRegion::init(&name, 128).unwrap();
        assert_eq!(again.semaphore_values().unwrap(), (1, 0));
    }

    #[test]
    fn test_raw_ops_after_destroy_fail() {
        let mut region = SharedRegion::init(&test_name("after"), 32).unwrap();
        region.destroy();

        assert!(matches!(
            region.write_raw(b"x"),
            Err(RegionError::NotInitialized { .. })
        ));
        let mut buf = [0u8; 1];
        assert!(matches!(
            region.read_raw(&mut buf),
            Err(RegionError::NotInitialized { .. })
        ));
    }
}
