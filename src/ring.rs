// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Ring buffer store: the shared-memory layout of one direction of the
// mailbox, a header followed by `block_count` fixed-size blocks.
//
// The producer side only ever advances put_*, the consumer side only ever
// advances get_*. Slot contents are published by the Release store of the
// count and observed by the Acquire load on the other side.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::error::{IpcError, Result};
use crate::mailbox::Channel;
use crate::message::MessageHeader;
use crate::shm::ShmRegion;

// ---------------------------------------------------------------------------
// Shared memory layout
// ---------------------------------------------------------------------------

/// Header at the start of each channel's window. Both processors map it.
#[repr(C)]
pub struct RingHeader {
    /// Bus address of block 0. Informational, set at init and on reset.
    pub message_base: AtomicU64,
    pub block_count: AtomicU32,
    pub block_size: AtomicU32,
    /// Messages ever enqueued. Wraps at `u32::MAX`.
    pub put_count: AtomicU32,
    /// Next block to write. Wraps at `block_count`.
    pub put_index: AtomicU32,
    pub get_count: AtomicU32,
    pub get_index: AtomicU32,
    pub overflow_count: AtomicU32,
    _reserved: u32,
}

const _: () = assert!(std::mem::size_of::<RingHeader>() == 40);

/// Bytes reserved for the header; blocks start at this offset.
pub const HEADER_SPAN: usize = 64;

/// Plain copy of a header, for assertions and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeaderSnapshot {
    pub message_base: u64,
    pub block_count: u32,
    pub block_size: u32,
    pub put_count: u32,
    pub put_index: u32,
    pub get_count: u32,
    pub get_index: u32,
    pub overflow_count: u32,
}

impl fmt::Display for HeaderSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "base={:#x} blocks={}x{} put={}@{} get={}@{} overflow={}",
            self.message_base,
            self.block_count,
            self.block_size,
            self.put_count,
            self.put_index,
            self.get_count,
            self.get_index,
            self.overflow_count,
        )
    }
}

// ---------------------------------------------------------------------------
// Ring
// ---------------------------------------------------------------------------

/// One direction of the mailbox over its shared-memory window.
///
/// `Ring` applies no locking of its own; callers serialise each role
/// (producer, consumer) externally. See [`Mailbox`](crate::Mailbox).
pub struct Ring {
    channel: Channel,
    region: ShmRegion,
    block_count: u32,
    block_size: u32,
}

impl Ring {
    /// Bytes of shared memory needed for the given geometry.
    pub fn layout_size(block_count: u32, block_size: u32) -> usize {
        HEADER_SPAN + block_count as usize * block_size as usize
    }

    /// Take ownership of a zeroed window and write a fresh header into it.
    pub fn new(channel: Channel, region: ShmRegion, block_count: u32, block_size: u32) -> Result<Self> {
        let need = Self::layout_size(block_count, block_size);
        if region.len() < need {
            return Err(IpcError::config(format!(
                "{channel} window is {} bytes, ring needs {need}",
                region.len()
            )));
        }
        let ring = Self { channel, region, block_count, block_size };
        let hdr = ring.header();
        hdr.block_count.store(block_count, Ordering::Relaxed);
        hdr.block_size.store(block_size, Ordering::Relaxed);
        ring.reset();
        tracing::debug!(%channel, block_count, block_size, "ring initialised");
        Ok(ring)
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Configured slot count.
    pub fn block_count(&self) -> u32 {
        self.block_count
    }

    /// Configured slot size.
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn header(&self) -> &RingHeader {
        // Safety: the region is page aligned, at least `layout_size` bytes
        // (checked in `new`) and lives as long as `self`.
        unsafe { &*(self.region.as_ptr() as *const RingHeader) }
    }

    pub fn snapshot(&self) -> HeaderSnapshot {
        let h = self.header();
        HeaderSnapshot {
            message_base: h.message_base.load(Ordering::Relaxed),
            block_count: h.block_count.load(Ordering::Relaxed),
            block_size: h.block_size.load(Ordering::Relaxed),
            put_count: h.put_count.load(Ordering::Acquire),
            put_index: h.put_index.load(Ordering::Acquire),
            get_count: h.get_count.load(Ordering::Acquire),
            get_index: h.get_index.load(Ordering::Acquire),
            overflow_count: h.overflow_count.load(Ordering::Relaxed),
        }
    }

    fn slot_ptr(&self, index: u32) -> *mut u8 {
        debug_assert!(index < self.block_count);
        let offset = HEADER_SPAN + index as usize * self.block_size as usize;
        // Safety: index < block_count keeps the offset inside the window.
        unsafe { self.region.as_ptr().add(offset) }
    }

    fn slot(&self, index: u32) -> &[u8] {
        // Safety: see `slot_ptr`; the bytes may be concurrently rewritten by
        // the producer, which only affects what is logged.
        unsafe { std::slice::from_raw_parts(self.slot_ptr(index), self.block_size as usize) }
    }

    fn next_index(&self, index: u32) -> u32 {
        if index + 1 >= self.block_count {
            0
        } else {
            index + 1
        }
    }

    // --- Status ---

    /// Nothing to consume: `put_count <= get_count` (wrap-aware).
    pub fn is_empty(&self) -> bool {
        let h = self.header();
        let put = h.put_count.load(Ordering::Acquire);
        let get = h.get_count.load(Ordering::Acquire);
        put.wrapping_sub(get) as i32 <= 0
    }

    /// One probe of the full condition: the write index has lapped the read
    /// index while the counts differ.
    pub fn probe_full(&self) -> bool {
        let h = self.header();
        let put_index = h.put_index.load(Ordering::Acquire);
        let get_index = h.get_index.load(Ordering::Acquire);
        let put_count = h.put_count.load(Ordering::Acquire);
        let get_count = h.get_count.load(Ordering::Acquire);
        put_index == get_index && put_count != get_count
    }

    /// Messages written but not yet consumed.
    pub fn pending(&self) -> u32 {
        let h = self.header();
        let put = h.put_count.load(Ordering::Acquire);
        let get = h.get_count.load(Ordering::Acquire);
        let lag = put.wrapping_sub(get) as i32;
        lag.max(0) as u32
    }

    // --- Consistency checks against shared-memory corruption ---

    fn check_block_size(&self) -> Result<()> {
        let stored = self.header().block_size.load(Ordering::Relaxed);
        if stored != self.block_size {
            return Err(IpcError::corrupt(
                self.channel,
                format!("block_size {stored}, expected {}", self.block_size),
            ));
        }
        Ok(())
    }

    pub fn validate_producer(&self) -> Result<()> {
        let put_index = self.header().put_index.load(Ordering::Acquire);
        if put_index >= self.block_count {
            return Err(IpcError::corrupt(
                self.channel,
                format!("put_index {put_index} out of range (blocks {})", self.block_count),
            ));
        }
        self.check_block_size()
    }

    pub fn validate_consumer(&self) -> Result<()> {
        let h = self.header();
        let get_index = h.get_index.load(Ordering::Acquire);
        if get_index >= self.block_count {
            return Err(IpcError::corrupt(
                self.channel,
                format!("get_index {get_index} out of range (blocks {})", self.block_count),
            ));
        }
        self.check_block_size()?;
        let put = h.put_count.load(Ordering::Acquire);
        let get = h.get_count.load(Ordering::Acquire);
        let lag = put.wrapping_sub(get) as i32;
        if lag > self.block_count as i32 {
            return Err(IpcError::corrupt(
                self.channel,
                format!("get_count {get} is {lag} behind put_count {put}"),
            ));
        }
        Ok(())
    }

    // --- Producer role ---

    /// Copy `msg` into the block at `put_index` and publish it.
    ///
    /// The caller holds the producer lock, has validated the header and has
    /// established that the ring is not full.
    pub fn push(&self, msg: &[u8]) {
        debug_assert!(msg.len() <= self.block_size as usize);
        let h = self.header();
        let index = h.put_index.load(Ordering::Relaxed);
        // Safety: index validated by `validate_producer`; msg fits one block.
        unsafe { std::ptr::copy_nonoverlapping(msg.as_ptr(), self.slot_ptr(index), msg.len()) };
        h.put_index.store(self.next_index(index), Ordering::Release);
        let count = h.put_count.load(Ordering::Relaxed);
        h.put_count.store(count.wrapping_add(1), Ordering::Release);
    }

    pub fn note_overflow(&self) -> u32 {
        self.header().overflow_count.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    // --- Consumer role ---

    /// Copy the whole block at `get_index` into `out` and release the block.
    /// Returns the number of bytes copied (always `block_size`).
    ///
    /// The caller holds the consumer lock, has validated the header and has
    /// established that the ring is not empty. `out` must hold a full block.
    pub fn pop(&self, out: &mut [u8]) -> usize {
        let size = self.block_size as usize;
        debug_assert!(out.len() >= size);
        let h = self.header();
        let index = h.get_index.load(Ordering::Relaxed);
        // Safety: index validated by `validate_consumer`; out holds a block.
        unsafe { std::ptr::copy_nonoverlapping(self.slot_ptr(index), out.as_mut_ptr(), size) };
        h.get_index.store(self.next_index(index), Ordering::Release);
        let count = h.get_count.load(Ordering::Relaxed);
        h.get_count.store(count.wrapping_add(1), Ordering::Release);
        size
    }

    // --- Recovery / diagnostics ---

    /// Zero every counter and recompute `message_base`. Only safe while the
    /// peer is not running (full-subsystem recovery).
    pub fn reset(&self) {
        let h = self.header();
        h.put_count.store(0, Ordering::Relaxed);
        h.put_index.store(0, Ordering::Relaxed);
        h.get_count.store(0, Ordering::Relaxed);
        h.get_index.store(0, Ordering::Relaxed);
        h.overflow_count.store(0, Ordering::Relaxed);
        h.message_base.store(self.region.bus_addr() + HEADER_SPAN as u64, Ordering::Release);
    }

    /// Log the header and the message header found in every block. Stale
    /// blocks are listed too; nothing marks which ones are live.
    pub fn dump(&self) {
        let snap = self.snapshot();
        tracing::info!(channel = %self.channel, "ring header: {snap}");
        for index in 0..self.block_count {
            match MessageHeader::parse(self.slot(index)) {
                Some(m) => tracing::info!(
                    channel = %self.channel,
                    slot = index,
                    scene = m.scene_id,
                    instance = m.instance_id,
                    cmd = m.cmd_id,
                    func = m.func_id,
                    len = m.len,
                    result = m.result,
                    source = m.source,
                    "ring slot"
                ),
                None => tracing::info!(channel = %self.channel, slot = index, "ring slot too small"),
            }
        }
    }
}
