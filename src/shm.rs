// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Shared-memory windows for the mailbox rings.
// Delegates the actual mapping to platform::PlatformShm.

use crate::error::{IpcError, Result};
use crate::mailbox::Channel;
use crate::platform::PlatformShm;
use crate::shm_name;

/// One mapped, zero-initialised shared-memory window.
///
/// The window stays mapped and at a fixed address until the region is
/// dropped.
#[derive(Debug)]
pub struct ShmRegion {
    inner: PlatformShm,
    bus_addr: u64,
}

impl ShmRegion {
    /// Virtual base address of the window.
    pub fn as_ptr(&self) -> *mut u8 {
        self.inner.as_mut_ptr()
    }

    pub fn len(&self) -> usize {
        self.inner.size()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.size() == 0
    }

    /// Physical/bus address the peer uses for the same window.
    pub fn bus_addr(&self) -> u64 {
        self.bus_addr
    }

    /// POSIX name for named windows.
    pub fn name(&self) -> Option<&str> {
        self.inner.name()
    }
}

/// Hands out the per-channel shared-memory windows.
pub trait ShmAllocator: Send + Sync {
    /// Map a zeroed window of `size` bytes for `channel`.
    ///
    /// Requests larger than the configured window are a configuration error.
    fn allocate(&self, channel: Channel, size: usize) -> Result<ShmRegion>;
}

fn window_bus_addr(bus_base: u64, window: usize, channel: Channel) -> u64 {
    bus_base + (channel.index() as u64) * (window as u64)
}

fn check_window(channel: Channel, size: usize, window: usize) -> Result<()> {
    if size > window {
        return Err(IpcError::config(format!(
            "{channel} ring needs {size} bytes but the window is {window} bytes"
        )));
    }
    Ok(())
}

/// Anonymous shared mappings, private to this process tree.
#[derive(Debug, Clone)]
pub struct AnonymousShm {
    bus_base: u64,
    window: usize,
}

impl AnonymousShm {
    pub fn new(bus_base: u64, window: usize) -> Self {
        Self { bus_base, window }
    }
}

impl Default for AnonymousShm {
    fn default() -> Self {
        Self::new(0x8000_0000, 1 << 20)
    }
}

impl ShmAllocator for AnonymousShm {
    fn allocate(&self, channel: Channel, size: usize) -> Result<ShmRegion> {
        check_window(channel, size, self.window)?;
        let inner = PlatformShm::anonymous(size)?;
        tracing::debug!(%channel, size, "mapped anonymous mailbox window");
        Ok(ShmRegion { inner, bus_addr: window_bus_addr(self.bus_base, self.window, channel) })
    }
}

/// Named POSIX shm objects (`/<prefix>_ap2dsp`, `/<prefix>_dsp2ap`) that
/// another process can map to play the peer.
#[derive(Debug, Clone)]
pub struct NamedShm {
    prefix: String,
    bus_base: u64,
    window: usize,
}

impl NamedShm {
    pub fn new(prefix: &str, bus_base: u64, window: usize) -> Self {
        Self { prefix: prefix.to_owned(), bus_base, window }
    }

    pub fn region_name(&self, channel: Channel) -> String {
        shm_name::region_name(&self.prefix, channel)
    }

    /// Remove leftover objects from a previous run.
    pub fn clear_storage(&self) {
        for channel in Channel::ALL {
            PlatformShm::unlink_by_name(&self.region_name(channel));
        }
    }
}

impl ShmAllocator for NamedShm {
    fn allocate(&self, channel: Channel, size: usize) -> Result<ShmRegion> {
        check_window(channel, size, self.window)?;
        let name = self.region_name(channel);
        let inner = PlatformShm::create(&name, size)?;
        tracing::debug!(%channel, size, name = %name, "mapped named mailbox window");
        Ok(ShmRegion { inner, bus_addr: window_bus_addr(self.bus_base, self.window, channel) })
    }
}
