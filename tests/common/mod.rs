// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::thread;
use std::time::{Duration, Instant};

use audio_mailbox::{
    AckCallback, Delay, FastAckHandler, IpcConfig, IpcError, Mailbox, RemoteRecovery, Result,
    Transport,
};

/// Small rings, fast probes, no real-time scheduling.
pub fn test_config(ap_to_dsp: u32, dsp_to_ap: u32) -> IpcConfig {
    let mut cfg = IpcConfig::default();
    cfg.mailbox.ap_to_dsp_blocks = ap_to_dsp;
    cfg.mailbox.dsp_to_ap_blocks = dsp_to_ap;
    cfg.mailbox.block_size = 128;
    cfg.mailbox.full_probe.interval_us = 10;
    cfg.dispatcher.thread.priority = None;
    cfg.dispatcher.thread.affinity_mask = 0;
    cfg.workqueue.priority = None;
    cfg
}

/// Poll `pred` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, pred: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if pred() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    pred()
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    pub channel_id: u32,
    pub bytes: Vec<u8>,
    pub had_ack: bool,
}

/// Records every send and acks asynchronous ones immediately.
#[derive(Default)]
pub struct MockTransport {
    pub async_sent: Mutex<Vec<SentFrame>>,
    pub sync_sent: Mutex<Vec<SentFrame>>,
    pub fail_async: AtomicBool,
    handler: Mutex<Option<FastAckHandler>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Play the DSP raising a fast-ack interrupt.
    pub fn fire_fast_ack(&self, bytes: &[u8]) {
        let handler = self.handler.lock().unwrap().clone();
        let handler = handler.expect("no fast-ack handler registered");
        handler(bytes);
    }

    pub fn async_count(&self) -> usize {
        self.async_sent.lock().unwrap().len()
    }

    pub fn sync_count(&self) -> usize {
        self.sync_sent.lock().unwrap().len()
    }
}

impl Transport for MockTransport {
    fn send_async(&self, channel_id: u32, bytes: &[u8], ack: Option<AckCallback>) -> Result<()> {
        if self.fail_async.load(Ordering::Relaxed) {
            return Err(IpcError::transport("mock link down"));
        }
        self.async_sent.lock().unwrap().push(SentFrame {
            channel_id,
            bytes: bytes.to_vec(),
            had_ack: ack.is_some(),
        });
        if let Some(ack) = ack {
            ack(Ok(()));
        }
        Ok(())
    }

    fn send_sync(&self, channel_id: u32, bytes: &[u8]) -> Result<()> {
        self.sync_sent.lock().unwrap().push(SentFrame {
            channel_id,
            bytes: bytes.to_vec(),
            had_ack: false,
        });
        Ok(())
    }

    fn register_fast_ack(&self, handler: FastAckHandler) {
        *self.handler.lock().unwrap() = Some(handler);
    }
}

// ---------------------------------------------------------------------------
// Recovery
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockRecovery {
    pub resetting: AtomicBool,
    pub resets: Mutex<Vec<u32>>,
}

impl MockRecovery {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reset_codes(&self) -> Vec<u32> {
        self.resets.lock().unwrap().clone()
    }
}

impl RemoteRecovery for MockRecovery {
    fn is_remote_resetting(&self) -> bool {
        self.resetting.load(Ordering::Relaxed)
    }

    fn trigger_remote_reset(&self, diagnostic_code: u32) {
        self.resets.lock().unwrap().push(diagnostic_code);
    }
}

// ---------------------------------------------------------------------------
// Delay
// ---------------------------------------------------------------------------

/// Counts probe delays. On the configured call it plays the DSP and drains
/// one block from the AP->DSP ring.
#[derive(Default)]
pub struct ScriptedDelay {
    pub calls: AtomicU32,
    drain_on_call: AtomicU32,
    mailbox: OnceLock<Weak<Mailbox>>,
}

impl ScriptedDelay {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Drain one AP->DSP block during the `n`-th delay (1-based). 0 never drains.
    pub fn drain_on(&self, n: u32, mailbox: &Arc<Mailbox>) {
        self.drain_on_call.store(n, Ordering::Relaxed);
        let _ = self.mailbox.set(Arc::downgrade(mailbox));
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Delay for ScriptedDelay {
    fn delay(&self, _interval: Duration) {
        let n = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        if n != self.drain_on_call.load(Ordering::Relaxed) {
            return;
        }
        if let Some(mb) = self.mailbox.get().and_then(Weak::upgrade) {
            let mut buf = vec![0u8; mb.block_size(audio_mailbox::Channel::ApToDsp)];
            mb.peer().get(&mut buf).expect("peer drain");
        }
    }
}
