// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Subsystem configuration. Every struct has tuned defaults and can be
// loaded (fully or partially) from TOML.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{IpcError, Result};
use crate::message::HEADER_LEN;

/// Top-level configuration for [`AudioIpc`](crate::AudioIpc).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IpcConfig {
    pub mailbox: MailboxConfig,
    pub dispatcher: DispatcherConfig,
    pub workqueue: ThreadConfig,
    pub transport: TransportConfig,
}

impl IpcConfig {
    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        self.mailbox.validate()?;
        if self.dispatcher.batch_limit == 0 {
            return Err(IpcError::config("dispatcher.batch_limit must be non-zero"));
        }
        if self.transport.fast_msg_max == 0 {
            return Err(IpcError::config("transport.fast_msg_max must be non-zero"));
        }
        Ok(())
    }
}

/// Geometry of the two rings plus the full-probe heuristic.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailboxConfig {
    /// Slots in the AP -> DSP ring.
    pub ap_to_dsp_blocks: u32,
    /// Slots in the DSP -> AP ring.
    pub dsp_to_ap_blocks: u32,
    /// Bytes per slot; also the maximum message size.
    pub block_size: u32,
    pub full_probe: FullProbe,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            ap_to_dsp_blocks: 64,
            dsp_to_ap_blocks: 32,
            block_size: 512,
            full_probe: FullProbe::default(),
        }
    }
}

impl MailboxConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ap_to_dsp_blocks == 0 || self.dsp_to_ap_blocks == 0 {
            return Err(IpcError::config("ring block counts must be non-zero"));
        }
        if (self.block_size as usize) < HEADER_LEN {
            return Err(IpcError::config(format!(
                "block_size {} is smaller than the {HEADER_LEN}-byte message header",
                self.block_size
            )));
        }
        if self.full_probe.attempts == 0 {
            return Err(IpcError::config("full_probe.attempts must be at least 1"));
        }
        Ok(())
    }
}

/// How many times, and how far apart, `is_full` re-reads the header before
/// declaring the ring full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FullProbe {
    pub attempts: u32,
    pub interval_us: u64,
}

impl FullProbe {
    pub fn interval(&self) -> Duration {
        Duration::from_micros(self.interval_us)
    }
}

impl Default for FullProbe {
    fn default() -> Self {
        Self { attempts: 3, interval_us: 300 }
    }
}

/// Scheduling parameters for a dedicated thread.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ThreadConfig {
    pub name: String,
    /// Bit `n` set pins the thread to CPU `n`. Zero leaves affinity alone.
    pub affinity_mask: u64,
    /// SCHED_FIFO priority. `None` keeps the default policy.
    pub priority: Option<i32>,
}

impl ThreadConfig {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_owned(), affinity_mask: 0, priority: None }
    }
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self { name: "audio-ipc-wq".to_owned(), affinity_mask: 0, priority: Some(70) }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub thread: ThreadConfig,
    /// Messages handled in one drain cycle before dumping diagnostics and
    /// yielding back to the wait state.
    pub batch_limit: u32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            thread: ThreadConfig {
                name: "audio-ipc-rx".to_owned(),
                affinity_mask: 0x3,
                priority: Some(80),
            },
            batch_limit: 64,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Channel id handed to the transport primitive.
    pub channel_id: u32,
    /// Bytes forwarded on the fast notification leg of `send_async`.
    pub fast_msg_max: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { channel_id: 0, fast_msg_max: 64 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = IpcConfig::from_toml_str(
            r#"
            [mailbox]
            ap_to_dsp_blocks = 8

            [mailbox.full_probe]
            interval_us = 50

            [dispatcher.thread]
            affinity_mask = 4
            "#,
        )
        .expect("parse");
        assert_eq!(cfg.mailbox.ap_to_dsp_blocks, 8);
        assert_eq!(cfg.mailbox.dsp_to_ap_blocks, 32);
        assert_eq!(cfg.mailbox.full_probe, FullProbe { attempts: 3, interval_us: 50 });
        assert_eq!(cfg.dispatcher.thread.affinity_mask, 4);
        assert_eq!(cfg.dispatcher.thread.name, "audio-ipc-rx");
        assert_eq!(cfg.dispatcher.batch_limit, 64);
    }

    #[test]
    fn rejects_tiny_blocks() {
        let err = IpcConfig::from_toml_str("[mailbox]\nblock_size = 4\n").unwrap_err();
        assert!(matches!(err, IpcError::Config { .. }));
    }

    #[test]
    fn rejects_zero_probe_attempts() {
        let err = IpcConfig::from_toml_str("[mailbox.full_probe]\nattempts = 0\n").unwrap_err();
        assert!(matches!(err, IpcError::Config { .. }));
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = IpcConfig::from_toml_str("[mailbox\n").unwrap_err();
        assert!(matches!(err, IpcError::Config { .. }));
    }
}
