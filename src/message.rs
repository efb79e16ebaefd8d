// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// In-block message layout. Every message starts with a fixed little-endian
// header followed by `len` payload bytes:
//
//   offset  size  field
//        0     2  scene_id
//        2     2  instance_id
//        4     2  cmd_id
//        6     2  func_id
//        8     4  len        (payload bytes that follow the header)
//       12     4  result
//       16     4  source     (see `Source`)

use std::fmt;

use crate::error::IpcError;

/// Size of the encoded [`MessageHeader`].
pub const HEADER_LEN: usize = 20;

/// Logical subsystem a DSP-originated message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Source {
    /// Core audio path on the AP. Also the fallback for unknown tags.
    ApAudio = 0,
    /// Tuning/debug tools.
    Tool = 1,
    /// Voice-trigger model traffic.
    VoiceTrigger = 2,
    /// Voice-trigger wake events, delivered outside the drain loop.
    Wakeup = 3,
}

impl Source {
    pub const COUNT: usize = 4;
    pub const ALL: [Source; Self::COUNT] =
        [Source::ApAudio, Source::Tool, Source::VoiceTrigger, Source::Wakeup];

    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::ALL.get(raw as usize).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u32> for Source {
    type Error = IpcError;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        Self::from_raw(raw)
            .ok_or_else(|| IpcError::invalid_argument(format!("unknown source tag {raw}")))
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Source::ApAudio => "ap-audio",
            Source::Tool => "tool",
            Source::VoiceTrigger => "voice-trigger",
            Source::Wakeup => "wakeup",
        };
        f.write_str(name)
    }
}

/// Structured header at the start of every message block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageHeader {
    pub scene_id: u16,
    pub instance_id: u16,
    pub cmd_id: u16,
    pub func_id: u16,
    /// Payload length, excluding the header.
    pub len: u32,
    pub result: i32,
    /// Raw source tag. May be out of range on a message from the peer.
    pub source: u32,
}

impl MessageHeader {
    /// Decode the header from the first [`HEADER_LEN`] bytes.
    /// Returns `None` if `bytes` is too short.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let b = bytes.get(..HEADER_LEN)?;
        let u16_at = |o: usize| u16::from_le_bytes([b[o], b[o + 1]]);
        let u32_at = |o: usize| u32::from_le_bytes([b[o], b[o + 1], b[o + 2], b[o + 3]]);
        Some(Self {
            scene_id: u16_at(0),
            instance_id: u16_at(2),
            cmd_id: u16_at(4),
            func_id: u16_at(6),
            len: u32_at(8),
            result: u32_at(12) as i32,
            source: u32_at(16),
        })
    }

    /// Encode into the first [`HEADER_LEN`] bytes of `out`.
    pub fn write_to(&self, out: &mut [u8]) -> Result<(), IpcError> {
        let out = out.get_mut(..HEADER_LEN).ok_or_else(|| {
            IpcError::invalid_argument(format!("header needs {HEADER_LEN} bytes"))
        })?;
        out[0..2].copy_from_slice(&self.scene_id.to_le_bytes());
        out[2..4].copy_from_slice(&self.instance_id.to_le_bytes());
        out[4..6].copy_from_slice(&self.cmd_id.to_le_bytes());
        out[6..8].copy_from_slice(&self.func_id.to_le_bytes());
        out[8..12].copy_from_slice(&self.len.to_le_bytes());
        out[12..16].copy_from_slice(&self.result.to_le_bytes());
        out[16..20].copy_from_slice(&self.source.to_le_bytes());
        Ok(())
    }

    /// Header plus payload, in bytes.
    pub fn total_len(&self) -> usize {
        HEADER_LEN + self.len as usize
    }

    /// The source tag, if it names a known subsystem.
    pub fn source_tag(&self) -> Option<Source> {
        Source::from_raw(self.source)
    }
}

/// First 32-bit word of a message, used in failure logs.
pub fn leading_word(bytes: &[u8]) -> u32 {
    let mut word = [0u8; 4];
    let n = bytes.len().min(4);
    word[..n].copy_from_slice(&bytes[..n]);
    u32::from_le_bytes(word)
}

/// Builds an encoded message: header followed by payload.
///
/// ```
/// use audio_mailbox::message::{MessageBuilder, MessageHeader, Source};
///
/// let bytes = MessageBuilder::new(Source::Tool).cmd(7).payload(b"gain=3").build();
/// let hdr = MessageHeader::parse(&bytes).unwrap();
/// assert_eq!(hdr.cmd_id, 7);
/// assert_eq!(hdr.len, 6);
/// ```
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    header: MessageHeader,
    payload: Vec<u8>,
}

impl MessageBuilder {
    pub fn new(source: Source) -> Self {
        Self {
            header: MessageHeader { source: source as u32, ..MessageHeader::default() },
            payload: Vec::new(),
        }
    }

    pub fn scene(mut self, scene_id: u16) -> Self {
        self.header.scene_id = scene_id;
        self
    }

    pub fn instance(mut self, instance_id: u16) -> Self {
        self.header.instance_id = instance_id;
        self
    }

    pub fn cmd(mut self, cmd_id: u16) -> Self {
        self.header.cmd_id = cmd_id;
        self
    }

    pub fn func(mut self, func_id: u16) -> Self {
        self.header.func_id = func_id;
        self
    }

    pub fn result(mut self, result: i32) -> Self {
        self.header.result = result;
        self
    }

    /// Override the raw source tag (e.g. to model a misbehaving peer).
    pub fn raw_source(mut self, source: u32) -> Self {
        self.header.source = source;
        self
    }

    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.payload = payload.to_vec();
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut header = self.header;
        header.len = self.payload.len() as u32;
        let mut out = vec![0u8; HEADER_LEN + self.payload.len()];
        // The buffer is sized for the header above, so this cannot fail.
        let _ = header.write_to(&mut out);
        out[HEADER_LEN..].copy_from_slice(&self.payload);
        out
    }
}
