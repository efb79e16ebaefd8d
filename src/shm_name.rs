// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// POSIX shm object names for the per-channel mailbox windows.

use crate::mailbox::Channel;

/// FNV-1a 64-bit hash.
pub fn fnv1a_64(data: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in data {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Maximum length for POSIX shm names. 0 disables shortening.
///
/// On macOS `PSHMNAMLEN` is 31. On Linux the limit is typically 255.
#[cfg(target_os = "macos")]
pub const SHM_NAME_MAX: usize = 31;

#[cfg(not(target_os = "macos"))]
pub const SHM_NAME_MAX: usize = 0;

/// Name of the shm object backing `channel`, e.g. `/audio_mbx_ap2dsp`.
///
/// Names that would exceed [`SHM_NAME_MAX`] keep a leading slice of the
/// prefix and replace the rest with `_<16 hex digits>` of an FNV-1a hash
/// over the full name, so distinct prefixes stay distinct.
pub fn region_name(prefix: &str, channel: Channel) -> String {
    let prefix = prefix.trim_start_matches('/');
    let full = format!("/{prefix}_{}", channel.short_name());

    if SHM_NAME_MAX == 0 || full.len() <= SHM_NAME_MAX {
        return full;
    }

    const HASH_SUFFIX_LEN: usize = 1 + 16;
    let keep = SHM_NAME_MAX.saturating_sub(HASH_SUFFIX_LEN + 1);
    let body = &full[1..];
    let keep = body
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .take_while(|&end| end <= keep)
        .last()
        .unwrap_or(0);

    format!("/{}_{:016x}", &body[..keep], fnv1a_64(full.as_bytes()))
}
