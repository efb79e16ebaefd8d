// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Ring buffer driver: bounded, lock-protected put/get over the two
// mailbox rings shared with the audio DSP.

use std::fmt;
use std::sync::Arc;

use crate::config::{FullProbe, MailboxConfig};
use crate::delay::{Delay, SpinDelay};
use crate::error::{IpcError, Result};
use crate::ring::{HeaderSnapshot, Ring};
use crate::shm::ShmAllocator;
use crate::spin_lock::SpinLock;
use crate::telemetry::{EventSink, RingFullEvent};

/// Direction of a ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Written by the AP, drained by the DSP.
    ApToDsp = 0,
    /// Written by the DSP, drained by the AP receive dispatcher.
    DspToAp = 1,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::ApToDsp, Channel::DspToAp];

    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::ALL.get(raw as usize).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Identifier used in shm object names.
    pub fn short_name(self) -> &'static str {
        match self {
            Channel::ApToDsp => "ap2dsp",
            Channel::DspToAp => "dsp2ap",
        }
    }
}

impl TryFrom<u32> for Channel {
    type Error = IpcError;

    fn try_from(raw: u32) -> Result<Self> {
        Self::from_raw(raw).ok_or_else(|| IpcError::invalid_argument(format!("no channel {raw}")))
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Channel::ApToDsp => "ap->dsp",
            Channel::DspToAp => "dsp->ap",
        })
    }
}

/// Both mailbox rings plus the AP-side locks.
///
/// Each channel has one lock that serialises this process's accessors of
/// that ring. The two channels never contend with each other. Exclusion
/// against the DSP comes only from the single-producer/single-consumer
/// discipline: the AP advances `put_*` of the ring it writes and `get_*`
/// of the ring it reads, nothing else.
pub struct Mailbox {
    rings: [Ring; 2],
    locks: [SpinLock; 2],
    peer_locks: [SpinLock; 2],
    probe: FullProbe,
    delay: Arc<dyn Delay>,
    events: Option<Arc<dyn EventSink>>,
}

impl Mailbox {
    /// Allocate and initialise both rings.
    pub fn new(config: &MailboxConfig, allocator: &dyn ShmAllocator) -> Result<Self> {
        config.validate()?;
        let make = |channel: Channel, blocks: u32| -> Result<Ring> {
            let size = Ring::layout_size(blocks, config.block_size);
            let region = allocator.allocate(channel, size)?;
            Ring::new(channel, region, blocks, config.block_size)
        };
        let rings = [
            make(Channel::ApToDsp, config.ap_to_dsp_blocks)?,
            make(Channel::DspToAp, config.dsp_to_ap_blocks)?,
        ];
        Ok(Self {
            rings,
            locks: [SpinLock::new(), SpinLock::new()],
            peer_locks: [SpinLock::new(), SpinLock::new()],
            probe: config.full_probe,
            delay: Arc::new(SpinDelay),
            events: None,
        })
    }

    /// Replace the wait used between full probes.
    pub fn with_delay(mut self, delay: Arc<dyn Delay>) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    pub fn ring(&self, channel: Channel) -> &Ring {
        &self.rings[channel.index()]
    }

    pub fn snapshot(&self, channel: Channel) -> HeaderSnapshot {
        self.ring(channel).snapshot()
    }

    pub fn block_size(&self, channel: Channel) -> usize {
        self.ring(channel).block_size() as usize
    }

    pub fn is_empty(&self, channel: Channel) -> bool {
        self.ring(channel).is_empty()
    }

    /// Like [`is_empty`](Self::is_empty) for a raw channel id. Unknown ids
    /// report empty.
    pub fn is_empty_by_id(&self, raw: u32) -> bool {
        Channel::from_raw(raw).map_or(true, |ch| self.is_empty(ch))
    }

    /// Probe the full condition up to `full_probe.attempts` times. A full
    /// declaration counts as an overflow and is reported.
    pub fn is_full(&self, channel: Channel) -> bool {
        let ring = self.ring(channel);
        let full = self.declare_full(ring);
        if full {
            self.record_overflow(ring);
        }
        full
    }

    /// Enqueue `msg` (at most one block) on `channel`.
    pub fn put(&self, channel: Channel, msg: &[u8]) -> Result<()> {
        self.put_with(&self.locks[channel.index()], channel, msg)
    }

    /// Dequeue the oldest block of `channel` into `out`, which must hold at
    /// least one block. Returns the block size; the embedded header says
    /// how much of it is message.
    pub fn get(&self, channel: Channel, out: &mut [u8]) -> Result<usize> {
        self.get_with(&self.locks[channel.index()], channel, out)
    }

    /// Zero the channel's counters. Recovery only.
    pub fn reset(&self, channel: Channel) {
        let _guard = self.locks[channel.index()].lock();
        self.ring(channel).reset();
        tracing::info!(%channel, "ring reset");
    }

    pub fn reset_all(&self) {
        for channel in Channel::ALL {
            self.reset(channel);
        }
    }

    pub fn dump(&self, channel: Channel) {
        self.ring(channel).dump();
    }

    pub fn dump_all(&self) {
        for channel in Channel::ALL {
            self.dump(channel);
        }
    }

    /// The DSP's view of the rings, for simulation and tests.
    pub fn peer(&self) -> PeerEndpoint<'_> {
        PeerEndpoint { mailbox: self }
    }

    // --- internals ---

    fn declare_full(&self, ring: &Ring) -> bool {
        let attempts = self.probe.attempts.max(1);
        for attempt in 1..=attempts {
            if !ring.probe_full() {
                return false;
            }
            if attempt < attempts {
                self.delay.delay(self.probe.interval());
            }
        }
        true
    }

    fn record_overflow(&self, ring: &Ring) {
        let overflow_count = ring.note_overflow();
        let snap = ring.snapshot();
        tracing::warn!(channel = %ring.channel(), overflow_count, "ring full: {snap}");
        if let Some(sink) = &self.events {
            sink.ring_full(RingFullEvent {
                channel: ring.channel(),
                overflow_count,
                put_count: snap.put_count,
                get_count: snap.get_count,
            });
        }
    }

    fn put_with(&self, lock: &SpinLock, channel: Channel, msg: &[u8]) -> Result<()> {
        let ring = self.ring(channel);
        let max = ring.block_size() as usize;
        if msg.len() > max {
            return Err(IpcError::InvalidLength { len: msg.len(), max });
        }
        if let Err(e) = ring.validate_producer() {
            tracing::error!(%channel, error = %e, "refusing put");
            return Err(e);
        }

        let guard = lock.lock();
        if self.declare_full(ring) {
            drop(guard);
            self.record_overflow(ring);
            return Err(IpcError::Full { channel });
        }
        ring.push(msg);
        drop(guard);

        tracing::trace!(%channel, len = msg.len(), "put");
        Ok(())
    }

    fn get_with(&self, lock: &SpinLock, channel: Channel, out: &mut [u8]) -> Result<usize> {
        let ring = self.ring(channel);
        let size = ring.block_size() as usize;
        if out.len() < size {
            return Err(IpcError::invalid_argument(format!(
                "output buffer of {} bytes is smaller than one {size}-byte block",
                out.len()
            )));
        }
        if let Err(e) = ring.validate_consumer() {
            tracing::error!(%channel, error = %e, "refusing get");
            return Err(e);
        }

        let _guard = lock.lock();
        if ring.is_empty() {
            return Err(IpcError::Empty { channel });
        }
        let n = ring.pop(out);
        tracing::trace!(%channel, n, "get");
        Ok(n)
    }
}

/// The opposite role over the same rings: produces into DSP->AP and
/// consumes from AP->DSP. Stands in for the DSP firmware in simulations.
///
/// Uses its own locks, as the peer processor would.
pub struct PeerEndpoint<'a> {
    mailbox: &'a Mailbox,
}

impl PeerEndpoint<'_> {
    /// Post a message for the AP.
    pub fn put(&self, msg: &[u8]) -> Result<()> {
        let ch = Channel::DspToAp;
        self.mailbox.put_with(&self.mailbox.peer_locks[ch.index()], ch, msg)
    }

    /// Take the next message the AP sent.
    pub fn get(&self, out: &mut [u8]) -> Result<usize> {
        let ch = Channel::ApToDsp;
        self.mailbox.get_with(&self.mailbox.peer_locks[ch.index()], ch, out)
    }

    pub fn is_empty(&self) -> bool {
        self.mailbox.is_empty(Channel::ApToDsp)
    }
}
