// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Ring buffer driver: capacity, ordering, wrap-around, overflow accounting,
// corruption detection and the full-probe retry.

mod common;

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::thread;

use audio_mailbox::{
    AnonymousShm, Channel, EventSink, IpcError, Mailbox, MailboxConfig, MessageBuilder,
    NamedShm, RingFullEvent, Source,
};

use common::ScriptedDelay;

fn config(blocks: u32) -> MailboxConfig {
    MailboxConfig {
        ap_to_dsp_blocks: blocks,
        dsp_to_ap_blocks: blocks,
        block_size: 64,
        full_probe: audio_mailbox::FullProbe { attempts: 3, interval_us: 10 },
    }
}

fn mailbox(blocks: u32) -> Mailbox {
    Mailbox::new(&config(blocks), &AnonymousShm::default()).expect("mailbox")
}

fn block(mb: &Mailbox, ch: Channel) -> Vec<u8> {
    vec![0u8; mb.block_size(ch)]
}

const CH: Channel = Channel::ApToDsp;

// ===========================================================================
// Scenarios
// ===========================================================================

#[test]
fn normal_traffic_round_trip() {
    let mb = mailbox(8);
    mb.put(CH, b"START").expect("put");

    let mut buf = block(&mb, CH);
    let n = mb.get(CH, &mut buf).expect("get");
    assert_eq!(n, 64);
    assert_eq!(&buf[..5], b"START");

    let snap = mb.snapshot(CH);
    assert_eq!(snap.put_count, 1);
    assert_eq!(snap.get_count, 1);
    assert_eq!(snap.put_index, 1);
    assert_eq!(snap.get_index, 1);
}

#[test]
fn overflow_then_reset() {
    let mb = mailbox(4);
    for i in 0..4u8 {
        mb.put(CH, &[i]).expect("put within capacity");
    }
    assert!(matches!(mb.put(CH, b"x"), Err(IpcError::Full { channel: CH })));
    assert_eq!(mb.snapshot(CH).overflow_count, 1);

    mb.reset(CH);
    let snap = mb.snapshot(CH);
    assert_eq!((snap.put_count, snap.put_index, snap.get_count, snap.get_index), (0, 0, 0, 0));
    assert_eq!(snap.overflow_count, 0);

    mb.put(CH, b"again").expect("put after reset");
    assert_eq!(mb.snapshot(CH).put_count, 1);
}

#[test]
fn corrupt_get_index_is_detected() {
    let mb = mailbox(4);
    mb.put(CH, b"a").expect("put");
    mb.ring(CH).header().get_index.store(4, Ordering::Release);
    let before = mb.snapshot(CH);

    let mut buf = block(&mb, CH);
    let err = mb.get(CH, &mut buf).unwrap_err();
    assert!(err.is_corrupt(), "{err}");
    assert_eq!(mb.snapshot(CH), before);
}

// ===========================================================================
// Properties
// ===========================================================================

#[test]
fn capacity_is_block_count() {
    for blocks in [1u32, 2, 5, 16] {
        let mb = mailbox(blocks);
        for i in 0..blocks {
            mb.put(CH, &i.to_le_bytes()).expect("put within capacity");
        }
        assert!(mb.put(CH, b"over").unwrap_err().is_full());
        assert_eq!(mb.ring(CH).pending(), blocks);
    }
}

#[test]
fn fifo_order() {
    let mb = mailbox(16);
    for i in 0..10u32 {
        mb.put(CH, &i.to_le_bytes()).expect("put");
    }
    let mut buf = block(&mb, CH);
    for i in 0..10u32 {
        mb.get(CH, &mut buf).expect("get");
        assert_eq!(&buf[..4], &i.to_le_bytes());
    }
}

#[test]
fn round_trip_keeps_every_byte() {
    let mb = mailbox(4);
    let mut buf = block(&mb, CH);
    for len in [1usize, 7, 33, 64] {
        let msg: Vec<u8> = (0..len).map(|i| (i * 31 + len) as u8).collect();
        mb.put(CH, &msg).expect("put");
        mb.get(CH, &mut buf).expect("get");
        assert_eq!(&buf[..len], &msg[..]);
    }
}

#[test]
fn get_on_empty_changes_nothing() {
    let mb = mailbox(4);
    mb.put(CH, b"a").expect("put");
    let mut buf = block(&mb, CH);
    mb.get(CH, &mut buf).expect("get");
    let before = mb.snapshot(CH);

    for _ in 0..3 {
        assert!(matches!(mb.get(CH, &mut buf), Err(IpcError::Empty { .. })));
    }
    assert_eq!(mb.snapshot(CH), before);
}

#[test]
fn every_full_counts_one_overflow() {
    let mb = mailbox(2);
    mb.put(CH, b"a").expect("put");
    mb.put(CH, b"b").expect("put");
    let before = mb.snapshot(CH);

    for expected in 1..=5u32 {
        assert!(mb.put(CH, b"c").unwrap_err().is_full());
        let snap = mb.snapshot(CH);
        assert_eq!(snap.overflow_count, expected);
        assert_eq!(snap.put_count, before.put_count);
        assert_eq!(snap.put_index, before.put_index);
    }
}

#[test]
fn indices_wrap_at_block_count() {
    let mb = mailbox(4);
    let mut buf = block(&mb, CH);
    for _ in 0..4 {
        mb.put(CH, b"w").expect("put");
        mb.get(CH, &mut buf).expect("get");
    }
    let snap = mb.snapshot(CH);
    assert_eq!((snap.put_index, snap.get_index), (0, 0));
    assert_eq!((snap.put_count, snap.get_count), (4, 4));

    for _ in 0..10 {
        mb.put(CH, b"w").expect("put");
        mb.get(CH, &mut buf).expect("get");
    }
    let snap = mb.snapshot(CH);
    assert_eq!((snap.put_index, snap.get_index), (2, 2));
    assert_eq!((snap.put_count, snap.get_count), (14, 14));
}

#[test]
fn counters_survive_integer_wrap() {
    let mb = mailbox(4);
    let hdr = mb.ring(CH).header();
    hdr.put_count.store(u32::MAX - 1, Ordering::Release);
    hdr.get_count.store(u32::MAX - 1, Ordering::Release);
    assert!(mb.is_empty(CH));

    for i in 0..4u8 {
        mb.put(CH, &[i]).expect("put across wrap");
    }
    assert!(!mb.is_empty(CH));
    assert!(mb.put(CH, b"x").unwrap_err().is_full());

    let mut buf = block(&mb, CH);
    for i in 0..4u8 {
        mb.get(CH, &mut buf).expect("get across wrap");
        assert_eq!(buf[0], i);
    }
    assert!(mb.is_empty(CH));
    let snap = mb.snapshot(CH);
    assert_eq!((snap.put_count, snap.get_count), (2, 2));
    assert_eq!((snap.put_index, snap.get_index), (0, 0));
}

// ===========================================================================
// Validation
// ===========================================================================

#[test]
fn oversize_message_is_rejected() {
    let mb = mailbox(4);
    let err = mb.put(CH, &[0u8; 65]).unwrap_err();
    assert!(matches!(err, IpcError::InvalidLength { len: 65, max: 64 }));
    assert_eq!(mb.snapshot(CH).put_count, 0);
}

#[test]
fn short_output_buffer_is_rejected() {
    let mb = mailbox(4);
    mb.put(CH, b"a").expect("put");
    let mut small = [0u8; 16];
    assert!(matches!(mb.get(CH, &mut small), Err(IpcError::InvalidArgument { .. })));
    assert_eq!(mb.snapshot(CH).get_count, 0);
}

#[test]
fn corrupt_put_index_is_detected() {
    let mb = mailbox(4);
    mb.ring(CH).header().put_index.store(9, Ordering::Release);
    assert!(mb.put(CH, b"a").unwrap_err().is_corrupt());
}

#[test]
fn block_size_mismatch_is_detected() {
    let mb = mailbox(4);
    mb.put(CH, b"a").expect("put");
    mb.ring(CH).header().block_size.store(32, Ordering::Release);
    assert!(mb.put(CH, b"b").unwrap_err().is_corrupt());
    let mut buf = block(&mb, CH);
    assert!(mb.get(CH, &mut buf).unwrap_err().is_corrupt());
}

#[test]
fn consumer_far_behind_is_corruption() {
    let mb = mailbox(4);
    mb.ring(CH).header().put_count.store(5, Ordering::Release);
    let mut buf = block(&mb, CH);
    assert!(mb.get(CH, &mut buf).unwrap_err().is_corrupt());
}

#[test]
fn unknown_channel_id_reads_as_empty() {
    let mb = mailbox(4);
    mb.put(Channel::DspToAp, b"a").expect("put");
    assert!(!mb.is_empty_by_id(1));
    assert!(mb.is_empty_by_id(0));
    assert!(mb.is_empty_by_id(7));
    assert!(Channel::try_from(7u32).is_err());
}

#[test]
fn channels_are_independent() {
    let mb = mailbox(2);
    mb.put(Channel::ApToDsp, b"a").expect("put");
    mb.put(Channel::ApToDsp, b"b").expect("put");
    assert!(mb.put(Channel::ApToDsp, b"c").unwrap_err().is_full());
    mb.put(Channel::DspToAp, b"d").expect("other channel unaffected");
    assert_eq!(mb.snapshot(Channel::DspToAp).overflow_count, 0);
}

#[test]
fn message_base_points_past_header() {
    let mb = mailbox(4);
    let base = mb.snapshot(CH).message_base;
    mb.ring(CH).header().message_base.store(0, Ordering::Release);
    mb.reset(CH);
    assert_eq!(mb.snapshot(CH).message_base, base);
    assert_eq!(base, 0x8000_0000 + audio_mailbox::ring::HEADER_SPAN as u64);
}

// ===========================================================================
// Full probe
// ===========================================================================

#[test]
fn full_needs_three_consecutive_probes() {
    let delay = ScriptedDelay::new();
    let mb = mailbox(4).with_delay(delay.clone());
    for i in 0..4u8 {
        mb.put(CH, &[i]).expect("put");
    }
    assert_eq!(delay.calls(), 0);

    assert!(mb.put(CH, b"x").unwrap_err().is_full());
    // Three probes, two delays between them.
    assert_eq!(delay.calls(), 2);
}

#[test]
fn peer_catching_up_before_third_probe_avoids_full() {
    let delay = ScriptedDelay::new();
    let mb = Arc::new(mailbox(4).with_delay(delay.clone()));
    for i in 0..4u8 {
        mb.put(CH, &[i]).expect("put");
    }
    delay.drain_on(2, &mb);

    mb.put(CH, b"late").expect("peer drained one block during the probe window");
    let snap = mb.snapshot(CH);
    assert_eq!(snap.overflow_count, 0);
    assert_eq!(snap.put_count, 5);
    assert_eq!(snap.get_count, 1);
}

#[test]
fn is_full_query_reports_overflow() {
    let mb = mailbox(1);
    assert!(!mb.is_full(CH));
    mb.put(CH, b"a").expect("put");
    assert!(mb.is_full(CH));
    assert_eq!(mb.snapshot(CH).overflow_count, 1);
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<RingFullEvent>>,
}

impl EventSink for RecordingSink {
    fn ring_full(&self, event: RingFullEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[test]
fn full_declaration_reaches_event_sink() {
    let sink = Arc::new(RecordingSink::default());
    let mb = mailbox(2).with_event_sink(sink.clone());
    mb.put(CH, b"a").expect("put");
    mb.put(CH, b"b").expect("put");
    assert!(mb.put(CH, b"c").is_err());

    let events = sink.events.lock().unwrap();
    assert_eq!(
        *events,
        vec![RingFullEvent { channel: CH, overflow_count: 1, put_count: 2, get_count: 0 }]
    );
}

// ===========================================================================
// Peer endpoint and cross-thread traffic
// ===========================================================================

#[test]
fn peer_sees_ap_messages_and_answers() {
    let mb = mailbox(4);
    let msg = MessageBuilder::new(Source::ApAudio).cmd(1).payload(b"open").build();
    mb.put(Channel::ApToDsp, &msg).expect("ap put");

    let peer = mb.peer();
    assert!(!peer.is_empty());
    let mut buf = block(&mb, Channel::ApToDsp);
    peer.get(&mut buf).expect("peer get");
    assert_eq!(&buf[..msg.len()], &msg[..]);
    assert!(peer.is_empty());

    peer.put(b"reply").expect("peer put");
    mb.get(Channel::DspToAp, &mut buf).expect("ap get");
    assert_eq!(&buf[..5], b"reply");
}

#[test]
fn spsc_cross_thread_preserves_order() {
    let mb = Arc::new(mailbox(8));
    const N: u32 = 2000;

    let producer = {
        let mb = Arc::clone(&mb);
        thread::spawn(move || {
            for i in 0..N {
                loop {
                    match mb.put(CH, &i.to_le_bytes()) {
                        Ok(()) => break,
                        Err(e) if e.is_full() => thread::yield_now(),
                        Err(e) => panic!("put: {e}"),
                    }
                }
            }
        })
    };

    let consumer = {
        let mb = Arc::clone(&mb);
        thread::spawn(move || {
            let mut buf = vec![0u8; mb.block_size(CH)];
            let mut next = 0u32;
            while next < N {
                match mb.peer().get(&mut buf) {
                    Ok(_) => {
                        let got = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
                        assert_eq!(got, next);
                        next += 1;
                    }
                    Err(e) if e.is_empty() => thread::yield_now(),
                    Err(e) => panic!("get: {e}"),
                }
            }
        })
    };

    producer.join().unwrap();
    consumer.join().unwrap();
    let snap = mb.snapshot(CH);
    assert_eq!(snap.put_count, N);
    assert_eq!(snap.get_count, N);
}

#[test]
fn named_windows_carry_traffic() {
    let alloc = NamedShm::new(&format!("mbx_test_{}", std::process::id()), 0x4000_0000, 1 << 16);
    alloc.clear_storage();
    let mb = Mailbox::new(&config(4), &alloc).expect("named mailbox");
    mb.put(CH, b"named").expect("put");
    let mut buf = block(&mb, CH);
    mb.get(CH, &mut buf).expect("get");
    assert_eq!(&buf[..5], b"named");
    assert_eq!(mb.snapshot(Channel::DspToAp).message_base, 0x4000_0000 + (1 << 16) + 64);
}
