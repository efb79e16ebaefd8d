// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// POSIX shared memory mappings for the mailbox windows.
// Named windows use shm_open + mmap; anonymous windows use a
// MAP_SHARED | MAP_ANON mapping (zero-filled by the kernel).

use std::ffi::CString;
use std::io;
use std::ptr;

#[derive(Debug)]
pub struct PlatformShm {
    mem: *mut u8,
    size: usize,
    /// POSIX name (with leading '/') for named mappings.
    name: Option<String>,
    /// Whether this handle created the object and must unlink it.
    owner: bool,
}

// Safety: the mapping is shared memory by design; all concurrent access
// goes through atomics or the ring protocol.
unsafe impl Send for PlatformShm {}
unsafe impl Sync for PlatformShm {}

impl PlatformShm {
    /// Map `size` zeroed bytes not backed by any name.
    pub fn anonymous(size: usize) -> io::Result<Self> {
        if size == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "size is 0"));
        }
        let mem = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_ANON,
                -1,
                0,
            )
        };
        if mem == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { mem: mem as *mut u8, size, name: None, owner: false })
    }

    /// Create a fresh named object of `size` bytes.
    ///
    /// A stale object left behind under the same name is unlinked first, so
    /// the returned window is always zeroed.
    pub fn create(posix_name: &str, size: usize) -> io::Result<Self> {
        if posix_name.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "name is empty"));
        }
        if size == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "size is 0"));
        }
        let c_name = CString::new(posix_name.as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let perms: libc::mode_t = 0o600;
        unsafe { libc::shm_unlink(c_name.as_ptr()) };
        let fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_RDWR | libc::O_CREAT | libc::O_EXCL,
                perms as libc::c_uint,
            )
        };
        if fd == -1 {
            return Err(io::Error::last_os_error());
        }

        if unsafe { libc::ftruncate(fd, size as libc::off_t) } != 0 {
            let err = io::Error::last_os_error();
            unsafe {
                libc::close(fd);
                libc::shm_unlink(c_name.as_ptr());
            }
            return Err(err);
        }

        let mem = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        unsafe { libc::close(fd) };

        if mem == libc::MAP_FAILED {
            let err = io::Error::last_os_error();
            unsafe { libc::shm_unlink(c_name.as_ptr()) };
            return Err(err);
        }

        Ok(Self { mem: mem as *mut u8, size, name: Some(posix_name.to_owned()), owner: true })
    }

    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.mem
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Remove a named object without holding a mapping.
    pub fn unlink_by_name(posix_name: &str) {
        if let Ok(c_name) = CString::new(posix_name.as_bytes()) {
            unsafe { libc::shm_unlink(c_name.as_ptr()) };
        }
    }
}

impl Drop for PlatformShm {
    fn drop(&mut self) {
        if self.mem.is_null() {
            return;
        }
        let ret = unsafe { libc::munmap(self.mem as *mut libc::c_void, self.size) };
        if ret != 0 {
            tracing::error!("munmap failed during drop: {}", io::Error::last_os_error());
        }
        if self.owner {
            if let Some(name) = &self.name {
                Self::unlink_by_name(name);
            }
        }
    }
}
