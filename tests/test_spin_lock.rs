// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Channel locking: the guard itself, then several AP producers sharing one
// ring against a concurrent consumer.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use audio_mailbox::message::HEADER_LEN;
use audio_mailbox::{
    AnonymousShm, Channel, FullProbe, Mailbox, MailboxConfig, MessageBuilder, Source, SpinLock,
};

const PRODUCERS: u32 = 4;
const PER_PRODUCER: u32 = 200;

fn mailbox(blocks: u32) -> Arc<Mailbox> {
    let cfg = MailboxConfig {
        ap_to_dsp_blocks: blocks,
        dsp_to_ap_blocks: blocks,
        block_size: 64,
        full_probe: FullProbe { attempts: 3, interval_us: 1 },
    };
    Arc::new(Mailbox::new(&cfg, &AnonymousShm::default()).expect("mailbox"))
}

fn tagged(producer: u32, seq: u32) -> Vec<u8> {
    let mut payload = producer.to_le_bytes().to_vec();
    payload.extend_from_slice(&seq.to_le_bytes());
    MessageBuilder::new(Source::ApAudio).payload(&payload).build()
}

fn untag(block: &[u8]) -> (u32, u32) {
    let word = |o: usize| {
        let mut b = [0u8; 4];
        b.copy_from_slice(&block[HEADER_LEN + o..HEADER_LEN + o + 4]);
        u32::from_le_bytes(b)
    };
    (word(0), word(4))
}

/// Put until the ring takes it; a full ring means the consumer is behind.
fn put_retrying(put: impl Fn() -> audio_mailbox::Result<()>) {
    loop {
        match put() {
            Ok(()) => return,
            Err(e) if e.is_full() => thread::yield_now(),
            Err(e) => panic!("put failed: {e}"),
        }
    }
}

fn spawn_producers(
    count: u32,
    put: impl Fn(&[u8]) -> audio_mailbox::Result<()> + Send + Sync + 'static,
) -> Vec<thread::JoinHandle<()>> {
    let put = Arc::new(put);
    (0..count)
        .map(|p| {
            let put = Arc::clone(&put);
            thread::spawn(move || {
                for seq in 0..PER_PRODUCER {
                    let msg = tagged(p, seq);
                    put_retrying(|| put(&msg));
                }
            })
        })
        .collect()
}

/// Collect `total` tagged messages, checking each producer's sequence.
fn consume(total: u32, get: impl Fn(&mut [u8]) -> audio_mailbox::Result<usize>) -> HashSet<(u32, u32)> {
    let mut seen = HashSet::new();
    let mut next = vec![0u32; PRODUCERS as usize];
    let mut buf = [0u8; 64];
    while seen.len() < total as usize {
        match get(&mut buf) {
            Ok(_) => {
                let (p, seq) = untag(&buf);
                assert_eq!(seq, next[p as usize], "producer {p} out of order");
                next[p as usize] += 1;
                assert!(seen.insert((p, seq)), "duplicate slot {p}/{seq}");
            }
            Err(e) if e.is_empty() => thread::yield_now(),
            Err(e) => panic!("get failed: {e}"),
        }
    }
    seen
}

#[test]
fn guard_releases_on_drop() {
    let lock = SpinLock::new();
    {
        let _g = lock.lock();
        assert!(lock.is_locked());
        assert!(lock.try_lock().is_none());
    }
    assert!(!lock.is_locked());
    assert!(lock.try_lock().is_some());
    assert!(!lock.is_locked());
}

#[test]
fn ap_producers_share_one_ring_without_losing_slots() {
    let mb = mailbox(8);
    let total = PRODUCERS * PER_PRODUCER;

    let m = Arc::clone(&mb);
    let producers = spawn_producers(PRODUCERS, move |msg| m.put(Channel::ApToDsp, msg));
    let peer_mb = Arc::clone(&mb);
    let seen = consume(total, move |buf| peer_mb.peer().get(buf));

    for p in producers {
        p.join().unwrap();
    }
    assert_eq!(seen.len(), total as usize);
    assert!(mb.is_empty(Channel::ApToDsp));

    let snap = mb.snapshot(Channel::ApToDsp);
    assert_eq!(snap.put_count, total);
    assert_eq!(snap.get_count, total);
}

#[test]
fn both_directions_run_concurrently() {
    let mb = mailbox(4);
    let total = PRODUCERS * PER_PRODUCER;

    let m = Arc::clone(&mb);
    let ap = spawn_producers(PRODUCERS, move |msg| m.put(Channel::ApToDsp, msg));
    let m = Arc::clone(&mb);
    let dsp = spawn_producers(PRODUCERS, move |msg| m.peer().put(msg));

    // DSP side drains AP->DSP on its own thread while the AP drains DSP->AP here.
    let dsp_reader = {
        let m = Arc::clone(&mb);
        thread::spawn(move || consume(total, |buf| m.peer().get(buf)).len())
    };
    let m = Arc::clone(&mb);
    let from_dsp = consume(total, move |buf| m.get(Channel::DspToAp, buf));

    for t in ap.into_iter().chain(dsp) {
        t.join().unwrap();
    }
    assert_eq!(dsp_reader.join().unwrap(), total as usize);
    assert_eq!(from_dsp.len(), total as usize);
    for ch in Channel::ALL {
        assert!(mb.is_empty(ch), "{ch} left non-empty");
    }
}
