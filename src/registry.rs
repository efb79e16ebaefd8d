// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Per-source message callbacks.

use std::sync::{Arc, Mutex, PoisonError};

use crate::message::Source;

/// Handler for messages of one source. Receives the message bytes (header
/// and payload, trimmed to the size the header declares). Any context the
/// handler needs is captured by the closure.
///
/// Runs synchronously on the dispatcher thread and must not block for long.
pub type MessageCallback = Arc<dyn Fn(&[u8]) + Send + Sync + 'static>;

/// At most one callback per [`Source`].
pub struct CallbackRegistry {
    slots: Mutex<[Option<MessageCallback>; Source::COUNT]>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self { slots: Mutex::new(Default::default()) }
    }

    /// Install `callback` for `source`, replacing any previous one.
    pub fn register(&self, source: Source, callback: MessageCallback) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots[source.index()].replace(callback).is_some() {
            tracing::debug!(%source, "callback replaced");
        } else {
            tracing::debug!(%source, "callback registered");
        }
    }

    /// Remove the callback for `source`. Returns whether one was set.
    pub fn unregister(&self, source: Source) -> bool {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let had = slots[source.index()].take().is_some();
        tracing::debug!(%source, had, "callback unregistered");
        had
    }

    pub fn get(&self, source: Source) -> Option<MessageCallback> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots[source.index()].clone()
    }

    pub fn is_registered(&self, source: Source) -> bool {
        self.get(source).is_some()
    }

    /// Invoke the callback for `source`, if any, outside the registry lock.
    /// Returns whether a callback ran.
    pub fn dispatch(&self, source: Source, msg: &[u8]) -> bool {
        match self.get(source) {
            Some(cb) => {
                cb(msg);
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        *slots = Default::default();
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}
