// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Escalation into the DSP reset orchestrator.

/// Diagnostic code passed on reset when the AP->DSP ring stays full.
pub const DIAG_MAILBOX_FULL: u32 = 0x4d42_0001;

/// The component that owns the remote DSP's lifecycle.
pub trait RemoteRecovery: Send + Sync {
    /// Whether a DSP reset is already in progress.
    fn is_remote_resetting(&self) -> bool;

    /// Ask for the DSP to be reset. Must not call back into the send path.
    fn trigger_remote_reset(&self, diagnostic_code: u32);
}

/// Never resets anything. For bring-up without a reset orchestrator.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRecovery;

impl RemoteRecovery for NoRecovery {
    fn is_remote_resetting(&self) -> bool {
        false
    }

    fn trigger_remote_reset(&self, diagnostic_code: u32) {
        tracing::error!("remote reset {diagnostic_code:#x} requested but no recovery is wired up");
    }
}
