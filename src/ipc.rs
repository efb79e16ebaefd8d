// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The audio IPC subsystem: both rings, the send path, the receive
// dispatcher and the high-priority work queue, with one lifecycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::{IpcConfig, MailboxConfig};
use crate::dispatcher::{fast_ack_handler, Dispatcher};
use crate::error::{IpcError, Result};
use crate::mailbox::{Channel, Mailbox};
use crate::message::Source;
use crate::recovery::RemoteRecovery;
use crate::registry::{CallbackRegistry, MessageCallback};
use crate::send::SendPath;
use crate::shm::ShmAllocator;
use crate::stats::{IpcStats, StatsSnapshot};
use crate::transport::{AckCallback, FastAckHandler, Transport};
use crate::workqueue::WorkQueue;

/// AP side of the audio DSP mailbox.
///
/// ```no_run
/// # use std::sync::Arc;
/// # use audio_mailbox::{AnonymousShm, AudioIpc, IpcConfig, NoRecovery, Source, Transport};
/// # fn wire(transport: Arc<dyn Transport>) -> audio_mailbox::Result<()> {
/// let ipc = AudioIpc::start(IpcConfig::default(), &AnonymousShm::default(), transport, Arc::new(NoRecovery))?;
/// ipc.register(Source::ApAudio, Arc::new(|msg: &[u8]| println!("{} bytes from dsp", msg.len())))?;
/// ipc.send_async(b"\x01\x00\x02\x00", None)?;
/// ipc.shutdown();
/// # Ok(())
/// # }
/// ```
pub struct AudioIpc {
    config: IpcConfig,
    mailbox: Arc<Mailbox>,
    registry: Arc<CallbackRegistry>,
    stats: Arc<IpcStats>,
    send: Arc<SendPath>,
    workqueue: WorkQueue,
    dispatcher: Mutex<Option<Dispatcher>>,
    fast_ack: FastAckHandler,
    shut_down: AtomicBool,
}

impl AudioIpc {
    /// Map both rings through `allocator` and start the subsystem.
    pub fn start(
        config: IpcConfig,
        allocator: &dyn ShmAllocator,
        transport: Arc<dyn Transport>,
        recovery: Arc<dyn RemoteRecovery>,
    ) -> Result<Self> {
        config.validate()?;
        let mailbox = Mailbox::new(&config.mailbox, allocator)?;
        Self::launch(config, mailbox, transport, recovery)
    }

    /// Start over an already built mailbox (custom delay or event sink).
    /// Its ring geometry must match `config.mailbox`.
    pub fn start_with_mailbox(
        config: IpcConfig,
        mailbox: Mailbox,
        transport: Arc<dyn Transport>,
        recovery: Arc<dyn RemoteRecovery>,
    ) -> Result<Self> {
        config.validate()?;
        check_geometry(&config.mailbox, &mailbox)?;
        Self::launch(config, mailbox, transport, recovery)
    }

    fn launch(
        config: IpcConfig,
        mailbox: Mailbox,
        transport: Arc<dyn Transport>,
        recovery: Arc<dyn RemoteRecovery>,
    ) -> Result<Self> {
        let mailbox = Arc::new(mailbox);
        let registry = Arc::new(CallbackRegistry::new());
        let stats = Arc::new(IpcStats::default());

        let send = Arc::new(SendPath::new(
            Arc::clone(&mailbox),
            Arc::clone(&transport),
            recovery,
            Arc::clone(&stats),
            config.transport.channel_id,
            config.transport.fast_msg_max,
        ));

        let workqueue = WorkQueue::spawn(&config.workqueue)?;
        let dispatcher = Dispatcher::spawn(
            Arc::clone(&mailbox),
            Arc::clone(&registry),
            Arc::clone(&stats),
            &config.dispatcher,
        )?;

        let fast_ack = fast_ack_handler(
            dispatcher.completion(),
            Arc::clone(&registry),
            workqueue.sender(),
            Arc::clone(&stats),
        );
        transport.register_fast_ack(Arc::clone(&fast_ack));

        tracing::info!(
            ap_to_dsp = config.mailbox.ap_to_dsp_blocks,
            dsp_to_ap = config.mailbox.dsp_to_ap_blocks,
            block_size = config.mailbox.block_size,
            "audio ipc started"
        );

        Ok(Self {
            config,
            mailbox,
            registry,
            stats,
            send,
            workqueue,
            dispatcher: Mutex::new(Some(dispatcher)),
            fast_ack,
            shut_down: AtomicBool::new(false),
        })
    }

    fn ensure_running(&self) -> Result<()> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(IpcError::ShutDown);
        }
        Ok(())
    }

    /// Enqueue `msg` on the AP->DSP ring and ping the DSP, without blocking.
    /// `ack` fires when the DSP acknowledges the notification.
    ///
    /// A full ring escalates to a DSP reset unless one is already underway.
    pub fn send_async(&self, msg: &[u8], ack: Option<AckCallback>) -> Result<()> {
        self.ensure_running()?;
        self.send.send_async(msg, ack)
    }

    /// Copy `msg` and hand delivery to the high-priority work queue.
    /// Returns once the copy is queued; ring and transport errors that
    /// happen later are logged.
    pub fn send_sync(&self, msg: &[u8]) -> Result<()> {
        self.ensure_running()?;
        self.send.validate(msg)?;
        let staged = msg.to_vec();
        let send = Arc::clone(&self.send);
        self.workqueue.submit(move || {
            if let Err(e) = send.deliver_sync(&staged) {
                tracing::warn!("deferred send failed: {e}");
            }
        })
    }

    pub fn register(&self, source: Source, callback: MessageCallback) -> Result<()> {
        self.ensure_running()?;
        self.registry.register(source, callback);
        Ok(())
    }

    pub fn unregister(&self, source: Source) -> Result<()> {
        self.ensure_running()?;
        self.registry.unregister(source);
        Ok(())
    }

    /// The handler installed with the transport, for transports that
    /// deliver notifications by other means.
    pub fn fast_ack_handler(&self) -> FastAckHandler {
        Arc::clone(&self.fast_ack)
    }

    pub fn mailbox(&self) -> &Arc<Mailbox> {
        &self.mailbox
    }

    pub fn config(&self) -> &IpcConfig {
        &self.config
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Log both ring headers, their slots and the traffic counters.
    pub fn dump(&self) {
        self.mailbox.dump_all();
        self.stats.dump();
    }

    /// Called by the reset orchestrator once the DSP is back: both rings
    /// start over from zero.
    pub fn on_remote_reset_complete(&self) {
        tracing::info!("dsp reset complete, resetting mailbox");
        self.stats.dump();
        self.mailbox.reset_all();
    }

    /// Stop the dispatcher and the work queue. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let dispatcher = self.dispatcher.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(mut dispatcher) = dispatcher {
            dispatcher.shutdown();
        }
        self.workqueue.shutdown();
        tracing::info!("audio ipc stopped");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

fn check_geometry(cfg: &MailboxConfig, mailbox: &Mailbox) -> Result<()> {
    let want = [(Channel::ApToDsp, cfg.ap_to_dsp_blocks), (Channel::DspToAp, cfg.dsp_to_ap_blocks)];
    for (channel, blocks) in want {
        let ring = mailbox.ring(channel);
        if ring.block_count() != blocks || ring.block_size() != cfg.block_size {
            return Err(IpcError::config(format!(
                "{channel} ring is {} x {} bytes, config says {blocks} x {}",
                ring.block_count(),
                ring.block_size(),
                cfg.block_size
            )));
        }
    }
    Ok(())
}

impl Drop for AudioIpc {
    fn drop(&mut self) {
        self.shutdown();
    }
}
