// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// IPC traffic counters.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct IpcStats {
    pub sent_async: AtomicU64,
    pub sent_sync: AtomicU64,
    /// Sends the AP->DSP ring refused. Transport notification failures
    /// after a successful ring write are logged, not counted.
    pub send_failures: AtomicU64,
    /// Messages drained from the DSP->AP ring.
    pub received: AtomicU64,
    /// Messages handed to a registered callback.
    pub dispatched: AtomicU64,
    /// Messages consumed with no callback registered for their source.
    pub unrouted: AtomicU64,
    pub wakeups: AtomicU64,
    pub drain_cycles: AtomicU64,
    pub batch_limit_hits: AtomicU64,
}

/// Point-in-time copy of [`IpcStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub sent_async: u64,
    pub sent_sync: u64,
    pub send_failures: u64,
    pub received: u64,
    pub dispatched: u64,
    pub unrouted: u64,
    pub wakeups: u64,
    pub drain_cycles: u64,
    pub batch_limit_hits: u64,
}

impl IpcStats {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let r = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            sent_async: r(&self.sent_async),
            sent_sync: r(&self.sent_sync),
            send_failures: r(&self.send_failures),
            received: r(&self.received),
            dispatched: r(&self.dispatched),
            unrouted: r(&self.unrouted),
            wakeups: r(&self.wakeups),
            drain_cycles: r(&self.drain_cycles),
            batch_limit_hits: r(&self.batch_limit_hits),
        }
    }

    pub fn dump(&self) {
        let s = self.snapshot();
        tracing::info!(
            sent_async = s.sent_async,
            sent_sync = s.sent_sync,
            send_failures = s.send_failures,
            received = s.received,
            dispatched = s.dispatched,
            unrouted = s.unrouted,
            wakeups = s.wakeups,
            drain_cycles = s.drain_cycles,
            batch_limit_hits = s.batch_limit_hits,
            "ipc stats"
        );
    }
}
