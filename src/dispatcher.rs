// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Receive dispatcher: a dedicated, pinned, SCHED_FIFO thread that sleeps on
// a completion, drains the DSP->AP ring when woken and routes every message
// to the callback registered for its source.
//
//   WAITING --complete()--> DRAINING --Empty / batch limit--> WAITING
//   WAITING --quit_waiting()--> exit

use std::sync::Arc;
use std::thread::JoinHandle;

use crate::config::DispatcherConfig;
use crate::error::{IpcError, Result};
use crate::mailbox::{Channel, Mailbox};
use crate::message::{MessageHeader, Source};
use crate::registry::CallbackRegistry;
use crate::rt_prio;
use crate::stats::IpcStats;
use crate::transport::FastAckHandler;
use crate::waiter::{Completion, WaitOutcome};
use crate::workqueue::WorkSender;

pub struct Dispatcher {
    completion: Arc<Completion>,
    worker: Option<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn spawn(
        mailbox: Arc<Mailbox>,
        registry: Arc<CallbackRegistry>,
        stats: Arc<IpcStats>,
        config: &DispatcherConfig,
    ) -> Result<Self> {
        let completion = Arc::new(Completion::new());
        let drainer = Drainer {
            buf: vec![0u8; mailbox.block_size(Channel::DspToAp)],
            mailbox,
            registry,
            stats,
            batch_limit: config.batch_limit,
        };
        let c = Arc::clone(&completion);
        let worker = rt_prio::spawn_configured(&config.thread, move || drainer.run(&c))?;
        Ok(Self { completion, worker: Some(worker) })
    }

    /// The signal the fast-ack path raises.
    pub fn completion(&self) -> Arc<Completion> {
        Arc::clone(&self.completion)
    }

    /// Request a drain cycle.
    pub fn notify(&self) {
        self.completion.complete();
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Stop the thread and wait for it. A drain cycle in progress runs to
    /// completion first.
    pub fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.completion.quit_waiting();
            if worker.join().is_err() {
                tracing::error!("dispatcher thread panicked");
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Drainer {
    mailbox: Arc<Mailbox>,
    registry: Arc<CallbackRegistry>,
    stats: Arc<IpcStats>,
    batch_limit: u32,
    buf: Vec<u8>,
}

impl Drainer {
    fn run(mut self, completion: &Completion) {
        tracing::debug!("dispatcher started");
        loop {
            match completion.wait() {
                WaitOutcome::Quit => break,
                WaitOutcome::Signalled => self.drain(),
                WaitOutcome::TimedOut => {}
            }
        }
        tracing::debug!("dispatcher stopped");
    }

    fn drain(&mut self) {
        IpcStats::bump(&self.stats.drain_cycles);
        let mut processed = 0u32;
        loop {
            match self.mailbox.get(Channel::DspToAp, &mut self.buf) {
                Ok(n) => {
                    IpcStats::bump(&self.stats.received);
                    processed += 1;
                    route(&self.registry, &self.stats, &self.buf[..n]);
                    if processed > self.batch_limit {
                        IpcStats::bump(&self.stats.batch_limit_hits);
                        tracing::warn!(processed, limit = self.batch_limit, "drain batch limit hit");
                        self.mailbox.dump_all();
                        break;
                    }
                }
                Err(IpcError::Empty { .. }) => break,
                Err(e) => {
                    tracing::error!("drain aborted: {e}");
                    self.mailbox.dump(Channel::DspToAp);
                    break;
                }
            }
        }
        tracing::trace!(processed, "drain cycle done");
    }
}

/// Hand one block to its source's callback. Unknown source tags go to
/// [`Source::ApAudio`].
fn route(registry: &CallbackRegistry, stats: &IpcStats, block: &[u8]) {
    let Some(hdr) = MessageHeader::parse(block) else {
        tracing::warn!(len = block.len(), "block too short for a message header");
        IpcStats::bump(&stats.unrouted);
        return;
    };
    if hdr.total_len() > block.len() {
        tracing::warn!(len = hdr.len, block = block.len(), "message length exceeds block, dropped");
        IpcStats::bump(&stats.unrouted);
        return;
    }
    let source = hdr.source_tag().unwrap_or_else(|| {
        tracing::warn!(raw = hdr.source, "unknown source tag, routing to {}", Source::ApAudio);
        Source::ApAudio
    });
    if registry.dispatch(source, &block[..hdr.total_len()]) {
        IpcStats::bump(&stats.dispatched);
    } else {
        IpcStats::bump(&stats.unrouted);
        tracing::debug!(%source, cmd = hdr.cmd_id, "no callback registered, message dropped");
    }
}

/// Build the handler the transport calls on each fast ack.
///
/// Wake events ([`Source::Wakeup`] in the inline payload) are delivered
/// straight from here through the work queue so a long drain cannot delay
/// them; anything else wakes the dispatcher.
pub fn fast_ack_handler(
    completion: Arc<Completion>,
    registry: Arc<CallbackRegistry>,
    work: WorkSender,
    stats: Arc<IpcStats>,
) -> FastAckHandler {
    Arc::new(move |bytes: &[u8]| {
        let wake = MessageHeader::parse(bytes).filter(|h| h.source_tag() == Some(Source::Wakeup));
        let Some(hdr) = wake else {
            completion.complete();
            return;
        };

        IpcStats::bump(&stats.wakeups);
        let len = hdr.total_len();
        if len > bytes.len() {
            tracing::warn!(len = hdr.len, got = bytes.len(), "truncated wake event, dropped");
            IpcStats::bump(&stats.unrouted);
            return;
        }
        let msg = bytes[..len].to_vec();
        let registry = Arc::clone(&registry);
        let stats = Arc::clone(&stats);
        let queued = work.submit(move || {
            if registry.dispatch(Source::Wakeup, &msg) {
                IpcStats::bump(&stats.dispatched);
            } else {
                IpcStats::bump(&stats.unrouted);
                tracing::debug!("wake event with no callback registered");
            }
        });
        if let Err(e) = queued {
            tracing::warn!("wake event dropped: {e}");
        }
    })
}
