// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// CPU affinity and real-time priority for the mailbox threads.

use std::io;
use std::thread::{self, JoinHandle};

use crate::config::ThreadConfig;

/// Pin the calling thread to the CPUs set in `mask` (bit n = CPU n).
#[cfg(target_os = "linux")]
pub fn set_affinity(mask: u64) -> io::Result<()> {
    if mask == 0 {
        return Ok(());
    }
    // Safety: cpu_set_t is plain data; CPU_* only touch the local set.
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        for cpu in (0..64).filter(|cpu| mask & (1u64 << cpu) != 0) {
            libc::CPU_SET(cpu, &mut set);
        }
        if libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn set_affinity(mask: u64) -> io::Result<()> {
    if mask == 0 {
        return Ok(());
    }
    Err(io::Error::new(io::ErrorKind::Unsupported, "thread affinity is not supported on this platform"))
}

/// Switch the calling thread to SCHED_FIFO at `priority`
/// (requires CAP_SYS_NICE or root).
pub fn set_fifo_priority(priority: i32) -> io::Result<()> {
    // Safety: sched_param is plain data; some platforms carry padding fields.
    let mut param: libc::sched_param = unsafe { std::mem::zeroed() };
    param.sched_priority = priority;
    let ret =
        unsafe { libc::pthread_setschedparam(libc::pthread_self(), libc::SCHED_FIFO, &param) };
    if ret != 0 {
        return Err(io::Error::from_raw_os_error(ret));
    }
    Ok(())
}

/// Apply `config` to the calling thread. Failures are logged but not
/// fatal: an unprivileged process still runs, just without the latency
/// guarantees.
pub fn apply_current(config: &ThreadConfig) {
    if let Err(e) = set_affinity(config.affinity_mask) {
        tracing::warn!(
            thread = %config.name,
            mask = config.affinity_mask,
            "could not set cpu affinity: {e}"
        );
    }
    if let Some(priority) = config.priority {
        match set_fifo_priority(priority) {
            Ok(()) => tracing::debug!(thread = %config.name, priority, "SCHED_FIFO set"),
            Err(e) => tracing::warn!(thread = %config.name, priority, "could not set SCHED_FIFO: {e}"),
        }
    }
}

/// Spawn a named thread that applies `config` to itself before running `f`.
pub fn spawn_configured<F, T>(config: &ThreadConfig, f: F) -> io::Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let config = config.clone();
    thread::Builder::new().name(config.name.clone()).spawn(move || {
        apply_current(&config);
        f()
    })
}
