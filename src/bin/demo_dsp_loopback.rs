// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Loopback demo: the AP side of the mailbox talking to a simulated DSP
// thread in the same process.
//
// Usage: demo_dsp_loopback [--config <file.toml>] [--messages <n>]
//
// The simulated DSP drains AP->DSP on every notification, echoes each
// message back on DSP->AP with result 0 and raises a fast ack. Every 100th
// message it also raises a wake event. Set RUST_LOG=audio_mailbox=debug for
// ring-level logging.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use tracing_subscriber::EnvFilter;

use audio_mailbox::{
    AckCallback, AnonymousShm, AudioIpc, Channel, FastAckHandler, IpcConfig, IpcError, Mailbox,
    MessageBuilder, MessageHeader, NoRecovery, Source, Transport,
};

const DEFAULT_MESSAGES: u32 = 1000;
const WAKE_EVERY: u32 = 100;

/// Doorbell into the simulated DSP plus the fast-ack line back out.
struct LoopbackTransport {
    doorbell: Mutex<Option<Sender<()>>>,
    fast_ack: Mutex<Option<FastAckHandler>>,
}

impl Transport for LoopbackTransport {
    fn send_async(
        &self,
        _channel_id: u32,
        _bytes: &[u8],
        ack: Option<AckCallback>,
    ) -> audio_mailbox::Result<()> {
        self.ring()?;
        if let Some(ack) = ack {
            ack(Ok(()));
        }
        Ok(())
    }

    fn send_sync(&self, _channel_id: u32, _bytes: &[u8]) -> audio_mailbox::Result<()> {
        self.ring()
    }

    fn register_fast_ack(&self, handler: FastAckHandler) {
        if let Ok(mut slot) = self.fast_ack.lock() {
            *slot = Some(handler);
        }
    }
}

impl LoopbackTransport {
    fn ring(&self) -> audio_mailbox::Result<()> {
        let slot = self.doorbell.lock().map_err(|_| IpcError::transport("doorbell poisoned"))?;
        match slot.as_ref() {
            Some(tx) => tx.send(()).map_err(|_| IpcError::transport("dsp thread gone")),
            None => Err(IpcError::transport("link closed")),
        }
    }

    /// Close the doorbell so the simulated DSP exits.
    fn hang_up(&self) {
        if let Ok(mut slot) = self.doorbell.lock() {
            slot.take();
        }
    }

    fn raise_fast_ack(&self, bytes: &[u8]) {
        let handler = self.fast_ack.lock().ok().and_then(|slot| slot.clone());
        if let Some(handler) = handler {
            handler(bytes);
        }
    }
}

fn simulated_dsp(mailbox: Arc<Mailbox>, transport: Arc<LoopbackTransport>, doorbell: Receiver<()>) {
    let mut buf = vec![0u8; mailbox.block_size(Channel::ApToDsp)];
    let ring_ack = MessageBuilder::new(Source::ApAudio).build();
    let mut seen = 0u32;

    for () in doorbell.iter() {
        let peer = mailbox.peer();
        while peer.get(&mut buf).is_ok() {
            seen += 1;
            let Some(mut hdr) = MessageHeader::parse(&buf) else { continue };
            let len = hdr.total_len().min(buf.len());
            hdr.result = 0;
            let mut reply = buf[..len].to_vec();
            if hdr.write_to(&mut reply).is_err() {
                continue;
            }
            loop {
                match peer.put(&reply) {
                    Ok(()) => break,
                    Err(e) if e.is_full() => thread::sleep(Duration::from_micros(200)),
                    Err(e) => {
                        tracing::error!("dsp reply dropped: {e}");
                        break;
                    }
                }
            }
            transport.raise_fast_ack(&ring_ack);

            if seen % WAKE_EVERY == 0 {
                let wake =
                    MessageBuilder::new(Source::Wakeup).cmd(1).payload(&seen.to_le_bytes()).build();
                transport.raise_fast_ack(&wake);
            }
        }
    }
}

fn parse_args() -> Result<(IpcConfig, u32), Box<dyn std::error::Error>> {
    let mut config = IpcConfig::default();
    let mut messages = DEFAULT_MESSAGES;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().ok_or("--config needs a path")?;
                config = IpcConfig::load(path)?;
            }
            "--messages" => {
                messages = args.next().ok_or("--messages needs a count")?.parse()?;
            }
            other => return Err(format!("unknown argument {other}").into()),
        }
    }
    Ok((config, messages))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let (config, messages) = parse_args()?;

    let (doorbell_tx, doorbell_rx) = crossbeam_channel::unbounded();
    let transport = Arc::new(LoopbackTransport {
        doorbell: Mutex::new(Some(doorbell_tx)),
        fast_ack: Mutex::new(None),
    });
    let ipc =
        AudioIpc::start(config, &AnonymousShm::default(), transport.clone(), Arc::new(NoRecovery))?;

    let replies = Arc::new(AtomicU64::new(0));
    let r = Arc::clone(&replies);
    ipc.register(
        Source::ApAudio,
        Arc::new(move |msg: &[u8]| {
            if MessageHeader::parse(msg).is_some_and(|h| h.result == 0) {
                r.fetch_add(1, Ordering::Relaxed);
            }
        }),
    )?;
    let wakes = Arc::new(AtomicU64::new(0));
    let w = Arc::clone(&wakes);
    ipc.register(
        Source::Wakeup,
        Arc::new(move |_: &[u8]| {
            w.fetch_add(1, Ordering::Relaxed);
        }),
    )?;

    let dsp = {
        let mailbox = Arc::clone(ipc.mailbox());
        let transport = Arc::clone(&transport);
        thread::Builder::new()
            .name("sim-dsp".into())
            .spawn(move || simulated_dsp(mailbox, transport, doorbell_rx))?
    };

    println!("loopback: sending {messages} messages");
    let t0 = Instant::now();
    let mut full = 0u32;
    for seq in 0..messages {
        let msg = MessageBuilder::new(Source::ApAudio)
            .cmd(2)
            .result(-1)
            .payload(&seq.to_le_bytes())
            .build();
        loop {
            match ipc.send_async(&msg, None) {
                Ok(()) => break,
                Err(e) if e.is_full() => {
                    full += 1;
                    thread::sleep(Duration::from_micros(500));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    while replies.load(Ordering::Relaxed) < u64::from(messages) && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    let elapsed = t0.elapsed();

    println!(
        "loopback: {} replies, {} wake events, {full} full rings in {elapsed:?}",
        replies.load(Ordering::Relaxed),
        wakes.load(Ordering::Relaxed),
    );
    println!("loopback: {:?}", ipc.stats());

    ipc.shutdown();
    transport.hang_up();
    if dsp.join().is_err() {
        return Err("dsp thread panicked".into());
    }
    Ok(())
}
