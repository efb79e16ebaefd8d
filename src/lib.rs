// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Mailbox transport between the application processor and an audio DSP:
// two fixed-capacity single-producer/single-consumer rings in shared memory,
// an asynchronous send path with reset escalation, and a pinned real-time
// receive dispatcher that routes DSP messages to per-source callbacks.

#[cfg(not(unix))]
compile_error!("audio_mailbox requires a unix target");

mod error;
pub use error::{IpcError, Result};

pub mod config;
pub use config::{DispatcherConfig, FullProbe, IpcConfig, MailboxConfig, ThreadConfig, TransportConfig};

pub mod shm_name;

mod platform;

mod shm;
pub use shm::{AnonymousShm, NamedShm, ShmAllocator, ShmRegion};

mod spin_lock;
pub use spin_lock::{SpinGuard, SpinLock};

pub mod delay;
pub use delay::{Delay, SleepDelay, SpinDelay};

pub mod message;
pub use message::{MessageBuilder, MessageHeader, Source};

pub mod ring;
pub use ring::{HeaderSnapshot, RingHeader};

mod mailbox;
pub use mailbox::{Channel, Mailbox, PeerEndpoint};

mod telemetry;
pub use telemetry::{EventSink, RingFullEvent};

mod transport;
pub use transport::{AckCallback, FastAckHandler, Transport};

mod recovery;
pub use recovery::{NoRecovery, RemoteRecovery, DIAG_MAILBOX_FULL};

mod registry;
pub use registry::{CallbackRegistry, MessageCallback};

mod waiter;
pub use waiter::{Completion, WaitOutcome};

pub mod rt_prio;

mod workqueue;
pub use workqueue::{WorkQueue, WorkSender};

mod stats;
pub use stats::{IpcStats, StatsSnapshot};

mod send;

mod dispatcher;
pub use dispatcher::Dispatcher;

mod ipc;
pub use ipc::AudioIpc;
