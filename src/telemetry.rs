// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Platform telemetry hook for ring saturation.

use crate::mailbox::Channel;

/// Emitted once per full declaration, after the probe retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingFullEvent {
    pub channel: Channel,
    pub overflow_count: u32,
    pub put_count: u32,
    pub get_count: u32,
}

/// Receives ring-full events, e.g. to forward them to a platform
/// event-reporting service. Called on the thread that hit the full ring,
/// possibly with a channel lock held.
pub trait EventSink: Send + Sync {
    fn ring_full(&self, event: RingFullEvent);
}
