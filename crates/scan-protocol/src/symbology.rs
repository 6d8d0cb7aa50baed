//! Barcode symbologies and how a frame is tagged with one

/// Barcode encoding standard of a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Symbology {
    /// EAN-13
    #[default]
    Ean13,
    /// EAN/JAN-13
    EanJan13,
    /// EAN/JAN-8
    EanJan8,
    /// UPC-A
    Upca,
    /// Code 39
    Code39,
    /// Code 93
    Code93,
    /// Code 128
    Code128,
    /// EAN-128 / GS1-128
    Ean128,
    /// Interleaved 2 of 5
    Itf,
    /// Codabar
    Codabar,
    /// GS1 DataBar
    Gs1DataBar,
    /// Anything not recognized
    Other,
}

impl Symbology {
    /// Returns a human-readable name for the symbology
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ean13 => "EAN-13",
            Self::EanJan13 => "EAN/JAN-13",
            Self::EanJan8 => "EAN/JAN-8",
            Self::Upca => "UPC-A",
            Self::Code39 => "Code 39",
            Self::Code93 => "Code 93",
            Self::Code128 => "Code 128",
            Self::Ean128 => "EAN-128",
            Self::Itf => "ITF",
            Self::Codabar => "Codabar",
            Self::Gs1DataBar => "GS1 DataBar",
            Self::Other => "Other",
        }
    }

    /// Decode the three-byte symbology code some scanners append after the label
    ///
    /// Codes of the form `(0, id, 11)` carry the 1D family, `(id, 0, 0)` the
    /// EAN/UPC family.
    pub fn from_trailer(b1: u8, b2: u8, b3: u8) -> Self {
        match (b1, b2, b3) {
            (0, 10, 11) => Self::Code39,
            (0, 13, 11) => Self::Itf,
            (0, 14, 11) => Self::Codabar,
            (0, 24, 11) => Self::Code128,
            (0, 25, 11) => Self::Code93,
            (0, 37, 11) => Self::Ean128,
            (0, 255, 11) => Self::Gs1DataBar,
            (13, 0, 0) => Self::Upca,
            (22, 0, 0) => Self::EanJan13,
            (12, 0, 0) => Self::EanJan8,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for Symbology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.name())
    }
}

/// Strategy used to pick the symbology of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", content = "value", rename_all = "snake_case"))]
pub enum SymbologyStrategy {
    /// Every frame gets the same symbology
    Fixed(Symbology),
    /// Read the trailing symbology code that starts at the first control byte
    ///
    /// Only the symbology is taken from the trailer. The label still drops just
    /// the last byte of the frame, so a three-byte trailer leaves its first two
    /// bytes in the label: `CODE\x00\x18\x0B` gives the label `CODE\x00\x18`.
    TrailingCode,
}

impl Default for SymbologyStrategy {
    fn default() -> Self {
        Self::Fixed(Symbology::Ean13)
    }
}

impl SymbologyStrategy {
    /// Determine the symbology of a raw frame
    pub fn detect(&self, frame: &[u8]) -> Symbology {
        match self {
            Self::Fixed(symbology) => *symbology,
            Self::TrailingCode => {
                // Label bytes are printable; the code starts at the first control byte
                let Some(start) = frame.iter().position(|&b| b <= 31) else {
                    return Symbology::Other;
                };
                match frame.get(start..start + 3) {
                    Some(&[b1, b2, b3]) => Symbology::from_trailer(b1, b2, b3),
                    _ => Symbology::from_trailer(frame[start], 0, 0),
                }
            }
        }
    }
}
