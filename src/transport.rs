// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Low-level cross-processor notification primitive the mailbox rides on
// (an rproc/mailbox-IRQ style doorbell with a short inline payload).

use std::sync::Arc;

use crate::error::Result;

/// Invoked once when the peer acknowledges an asynchronously sent message.
pub type AckCallback = Box<dyn FnOnce(Result<()>) + Send + 'static>;

/// Invoked by the transport, typically from interrupt context, whenever
/// the DSP posts to the DSP->AP ring. The bytes are the short inline
/// payload that travelled with the notification.
pub type FastAckHandler = Arc<dyn Fn(&[u8]) + Send + Sync + 'static>;

/// The transport primitive.
///
/// Implementations must not block for long in `send_async`; it can be
/// called from interrupt-adjacent contexts.
pub trait Transport: Send + Sync {
    /// Queue `bytes` for the peer and return immediately. `ack` fires when
    /// the peer acknowledges. When this returns an error `ack` is dropped
    /// without being called.
    fn send_async(&self, channel_id: u32, bytes: &[u8], ack: Option<AckCallback>) -> Result<()>;

    /// Deliver `bytes` and wait for the transport to accept them.
    fn send_sync(&self, channel_id: u32, bytes: &[u8]) -> Result<()>;

    /// Install the handler called on every fast-ack notification. A later
    /// registration replaces the earlier one.
    fn register_fast_ack(&self, handler: FastAckHandler);
}
