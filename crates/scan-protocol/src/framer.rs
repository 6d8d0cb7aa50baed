//! Frame codecs
//!
//! [`NotificationCodec`] treats every receive notification as one complete
//! frame. [`DelimitedCodec`] reassembles frames that end in a terminator byte
//! regardless of how the bytes were split into notifications.

use std::collections::VecDeque;

use tracing::warn;

use crate::error::FrameError;
use crate::FrameCodec;

/// Carriage return, the factory terminator on most serial scanners
pub const DEFAULT_TERMINATOR: u8 = 0x0D;

/// Default upper bound for a delimited frame, terminator included
pub const DEFAULT_MAX_FRAME_LEN: usize = 256;

/// How incoming bytes are split into frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum FramingMode {
    /// Each receive notification is one frame
    #[default]
    PerNotification,
    /// Frames end at `terminator`; bytes accumulate across notifications
    Delimited {
        /// Byte that closes a frame (kept as the frame's last byte)
        terminator: u8,
        /// Longest frame accepted, terminator included
        max_frame_len: usize,
    },
}

impl FramingMode {
    /// Delimited framing with the default terminator and length limit
    pub fn delimited() -> Self {
        Self::Delimited {
            terminator: DEFAULT_TERMINATOR,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    /// Check that the parameters can produce frames
    pub fn validate(&self) -> Result<(), FrameError> {
        match self {
            Self::PerNotification => Ok(()),
            Self::Delimited { max_frame_len, .. } if *max_frame_len == 0 => Err(
                FrameError::InvalidConfig("max_frame_len must be at least 1".into()),
            ),
            Self::Delimited { .. } => Ok(()),
        }
    }

    /// Returns a human-readable name for the mode
    pub fn name(&self) -> &'static str {
        match self {
            Self::PerNotification => "per-notification",
            Self::Delimited { .. } => "delimited",
        }
    }
}

/// One notification in, one frame out
#[derive(Debug, Default)]
pub struct NotificationCodec {
    frames: VecDeque<Vec<u8>>,
}

impl NotificationCodec {
    /// Create a new per-notification codec
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameCodec for NotificationCodec {
    fn push_bytes(&mut self, data: &[u8]) {
        self.frames.push_back(data.to_vec());
    }

    fn next_frame(&mut self) -> Option<Vec<u8>> {
        self.frames.pop_front()
    }

    fn clear(&mut self) {
        self.frames.clear();
    }
}

/// Streaming terminator-based codec
#[derive(Debug)]
pub struct DelimitedCodec {
    terminator: u8,
    max_frame_len: usize,
    buffer: Vec<u8>,
}

impl DelimitedCodec {
    /// Create a codec that closes frames at `terminator`
    ///
    /// A `max_frame_len` of zero is raised to one.
    pub fn new(terminator: u8, max_frame_len: usize) -> Self {
        let max_frame_len = max_frame_len.max(1);
        Self {
            terminator,
            max_frame_len,
            buffer: Vec::with_capacity(max_frame_len),
        }
    }

    /// Bytes waiting for a terminator
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }
}

impl Default for DelimitedCodec {
    fn default() -> Self {
        Self::new(DEFAULT_TERMINATOR, DEFAULT_MAX_FRAME_LEN)
    }
}

impl FrameCodec for DelimitedCodec {
    fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);

        // An unterminated run can never become a valid frame once it is too long
        if self.buffer.len() > self.max_frame_len && !self.buffer.contains(&self.terminator) {
            let e = FrameError::Oversized {
                len: self.buffer.len(),
                max: self.max_frame_len,
            };
            warn!("Discarding unterminated scanner data: {}", e);
            self.buffer.clear();
        }
    }

    fn next_frame(&mut self) -> Option<Vec<u8>> {
        loop {
            let term_pos = self.buffer.iter().position(|&b| b == self.terminator)?;
            let frame: Vec<u8> = self.buffer.drain(..=term_pos).collect();

            if frame.len() > self.max_frame_len {
                let e = FrameError::Oversized {
                    len: frame.len(),
                    max: self.max_frame_len,
                };
                warn!("Dropping scanner frame: {}", e);
                continue;
            }

            return Some(frame);
        }
    }

    fn clear(&mut self) {
        self.buffer.clear();
    }
}
