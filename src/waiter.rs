// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Counting completion with a quit flag: the receive dispatcher sleeps on it
// and the fast-ack path signals it.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Why a wait on a [`Completion`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// One `complete()` was consumed.
    Signalled,
    /// `quit_waiting()` was called.
    Quit,
    TimedOut,
}

struct State {
    done: u32,
    quit: bool,
}

/// Each [`complete`](Self::complete) lets exactly one wait through.
/// [`quit_waiting`](Self::quit_waiting) releases every current and future
/// waiter, taking precedence over pending completions.
pub struct Completion {
    state: Mutex<State>,
    cond: Condvar,
}

impl Completion {
    pub fn new() -> Self {
        Self { state: Mutex::new(State { done: 0, quit: false }), cond: Condvar::new() }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Signal one waiter (or the next one to arrive).
    pub fn complete(&self) {
        let mut st = self.lock();
        st.done = st.done.saturating_add(1);
        drop(st);
        self.cond.notify_one();
    }

    /// Block until signalled or told to quit.
    pub fn wait(&self) -> WaitOutcome {
        let mut st = self.lock();
        loop {
            if st.quit {
                return WaitOutcome::Quit;
            }
            if st.done > 0 {
                st.done -= 1;
                return WaitOutcome::Signalled;
            }
            st = self.cond.wait(st).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`wait`](Self::wait) with an upper bound.
    pub fn wait_timeout(&self, timeout: Duration) -> WaitOutcome {
        let deadline = Instant::now() + timeout;
        let mut st = self.lock();
        loop {
            if st.quit {
                return WaitOutcome::Quit;
            }
            if st.done > 0 {
                st.done -= 1;
                return WaitOutcome::Signalled;
            }
            let now = Instant::now();
            if now >= deadline {
                return WaitOutcome::TimedOut;
            }
            st = self
                .cond
                .wait_timeout(st, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Set the quit flag and wake all waiters.
    pub fn quit_waiting(&self) {
        self.lock().quit = true;
        self.cond.notify_all();
    }

    pub fn is_quit(&self) -> bool {
        self.lock().quit
    }

    /// Completions not yet consumed.
    pub fn pending(&self) -> u32 {
        self.lock().done
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}
