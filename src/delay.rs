// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Short bounded waits used between full-ring probes.

use std::time::{Duration, Instant};

/// Something that can wait for a short, bounded interval.
///
/// The ring driver calls this while holding a channel lock, so an
/// implementation must return promptly.
pub trait Delay: Send + Sync {
    fn delay(&self, interval: Duration);
}

/// Busy-waits on the monotonic clock, like a kernel `udelay`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpinDelay;

impl Delay for SpinDelay {
    fn delay(&self, interval: Duration) {
        let deadline = Instant::now() + interval;
        while Instant::now() < deadline {
            std::hint::spin_loop();
        }
    }
}

/// Sleeps the calling thread. Coarser than [`SpinDelay`] but does not burn a core.
#[derive(Debug, Default, Clone, Copy)]
pub struct SleepDelay;

impl Delay for SleepDelay {
    fn delay(&self, interval: Duration) {
        std::thread::sleep(interval);
    }
}
