// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Send path: the authoritative ring write into AP->DSP followed by a
// transport notification, and escalation to a DSP reset when the ring
// stays full.

use std::sync::Arc;

use crate::error::{IpcError, Result};
use crate::mailbox::{Channel, Mailbox};
use crate::message::{leading_word, MessageHeader};
use crate::recovery::{RemoteRecovery, DIAG_MAILBOX_FULL};
use crate::stats::IpcStats;
use crate::transport::{AckCallback, Transport};

enum Leg {
    Async(Option<AckCallback>),
    Sync,
}

pub struct SendPath {
    mailbox: Arc<Mailbox>,
    transport: Arc<dyn Transport>,
    recovery: Arc<dyn RemoteRecovery>,
    stats: Arc<IpcStats>,
    channel_id: u32,
    fast_msg_max: usize,
}

impl SendPath {
    pub fn new(
        mailbox: Arc<Mailbox>,
        transport: Arc<dyn Transport>,
        recovery: Arc<dyn RemoteRecovery>,
        stats: Arc<IpcStats>,
        channel_id: u32,
        fast_msg_max: usize,
    ) -> Self {
        Self { mailbox, transport, recovery, stats, channel_id, fast_msg_max }
    }

    /// Largest message the AP->DSP ring accepts.
    pub fn max_message_size(&self) -> usize {
        self.mailbox.block_size(Channel::ApToDsp)
    }

    pub fn validate(&self, msg: &[u8]) -> Result<()> {
        if msg.is_empty() {
            return Err(IpcError::invalid_argument("empty message"));
        }
        let max = self.max_message_size();
        if msg.len() > max {
            return Err(IpcError::invalid_argument(format!(
                "message of {} bytes exceeds the {max}-byte maximum",
                msg.len()
            )));
        }
        if let Some(hdr) = MessageHeader::parse(msg) {
            if hdr.total_len() > max {
                return Err(IpcError::invalid_argument(format!(
                    "header length {} exceeds the {max}-byte block",
                    hdr.len
                )));
            }
        }
        Ok(())
    }

    /// Write `msg` into the ring and notify the peer, without blocking.
    pub fn send_async(&self, msg: &[u8], ack: Option<AckCallback>) -> Result<()> {
        self.validate(msg)?;
        self.deliver(msg, Leg::Async(ack))
    }

    /// Ring write plus a synchronous transport send. Runs on the work queue.
    pub fn deliver_sync(&self, msg: &[u8]) -> Result<()> {
        self.validate(msg)?;
        self.deliver(msg, Leg::Sync)
    }

    fn deliver(&self, msg: &[u8], leg: Leg) -> Result<()> {
        if let Err(e) = self.mailbox.put(Channel::ApToDsp, msg) {
            IpcStats::bump(&self.stats.send_failures);
            return Err(self.on_put_failure(msg, e));
        }

        match leg {
            Leg::Async(ack) => {
                IpcStats::bump(&self.stats.sent_async);
                let n = msg.len().min(self.fast_msg_max);
                if let Err(e) = self.transport.send_async(self.channel_id, &msg[..n], ack) {
                    tracing::warn!(channel_id = self.channel_id, "fast notification failed: {e}");
                }
            }
            Leg::Sync => {
                IpcStats::bump(&self.stats.sent_sync);
                if let Err(e) = self.transport.send_sync(self.channel_id, msg) {
                    tracing::warn!(channel_id = self.channel_id, "sync notification failed: {e}");
                }
            }
        }
        Ok(())
    }

    fn on_put_failure(&self, msg: &[u8], err: IpcError) -> IpcError {
        match &err {
            IpcError::Full { .. } if self.recovery.is_remote_resetting() => {
                tracing::debug!("ap->dsp ring full while the dsp is resetting");
            }
            IpcError::Full { .. } => {
                tracing::error!(
                    "ap->dsp ring full, message {:#010x} dropped; resetting dsp",
                    leading_word(msg)
                );
                self.mailbox.dump_all();
                self.stats.dump();
                self.recovery.trigger_remote_reset(DIAG_MAILBOX_FULL);
            }
            IpcError::CorruptHeader { .. } => {
                tracing::error!("message {:#010x} not sent: {err}", leading_word(msg));
                self.mailbox.dump_all();
            }
            _ => {}
        }
        err
    }
}
