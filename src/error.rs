// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Error taxonomy for the mailbox transport and its dispatcher.

use thiserror::Error;

use crate::mailbox::Channel;

/// Result type alias for mailbox operations.
pub type Result<T> = std::result::Result<T, IpcError>;

/// Errors produced by the ring driver, the send path and the dispatcher.
#[derive(Debug, Error)]
pub enum IpcError {
    /// Rejected at the API boundary before touching shared memory.
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// Message longer than one ring block.
    #[error("message length {len} exceeds block size {max}")]
    InvalidLength { len: usize, max: usize },

    /// The shared-memory header violates its invariants.
    #[error("corrupt {channel} ring header: {reason}")]
    CorruptHeader { channel: Channel, reason: String },

    /// No free block after the full-probe retries.
    #[error("{channel} ring is full")]
    Full { channel: Channel },

    /// Nothing to read. The normal idle signal on the receive side.
    #[error("{channel} ring is empty")]
    Empty { channel: Channel },

    /// The low-level transport primitive refused the message.
    #[error("transport failure: {reason}")]
    Transport { reason: String },

    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    /// The subsystem has been shut down.
    #[error("ipc subsystem is shut down")]
    ShutDown,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IpcError {
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument { reason: reason.into() }
    }

    pub fn corrupt(channel: Channel, reason: impl Into<String>) -> Self {
        Self::CorruptHeader { channel, reason: reason.into() }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config { reason: reason.into() }
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport { reason: reason.into() }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full { .. })
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty { .. })
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::CorruptHeader { .. })
    }
}

impl From<toml::de::Error> for IpcError {
    fn from(e: toml::de::Error) -> Self {
        Self::config(e.to_string())
    }
}
