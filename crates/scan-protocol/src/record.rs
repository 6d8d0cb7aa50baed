//! Scan records

use std::borrow::Cow;

use crate::symbology::{Symbology, SymbologyStrategy};

/// Label portion of a frame
///
/// A frame longer than one byte ends in a delimiter (or checksum) byte that
/// is not part of the label. A single-byte or empty frame is all label.
pub fn label_bytes(frame: &[u8]) -> &[u8] {
    match frame.len() {
        0 | 1 => frame,
        n => &frame[..n - 1],
    }
}

/// Structured result of one accepted frame
///
/// Records are immutable once built. The label is always derived from the raw
/// bytes with [`label_bytes`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanRecord {
    raw: Vec<u8>,
    symbology: Symbology,
    label: Vec<u8>,
}

impl ScanRecord {
    /// Build a record from a frame, tagging it with the strategy's symbology
    pub fn from_frame(raw: Vec<u8>, strategy: &SymbologyStrategy) -> Self {
        let symbology = strategy.detect(&raw);
        Self::with_symbology(raw, symbology)
    }

    /// Build a record from a frame with a known symbology
    pub fn with_symbology(raw: Vec<u8>, symbology: Symbology) -> Self {
        let label = label_bytes(&raw).to_vec();
        Self {
            raw,
            symbology,
            label,
        }
    }

    /// Frame bytes exactly as received
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Label bytes
    pub fn label(&self) -> &[u8] {
        &self.label
    }

    /// Symbology tag
    pub fn symbology(&self) -> Symbology {
        self.symbology
    }

    /// Label rendered as text, replacing invalid UTF-8
    pub fn label_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.label)
    }

    /// Split the record into `(raw, symbology, label)`
    pub fn into_parts(self) -> (Vec<u8>, Symbology, Vec<u8>) {
        (self.raw, self.symbology, self.label)
    }
}
