//! Scanner Protocol Library
//!
//! This crate turns the raw bytes a serial barcode scanner pushes at the host
//! into discrete scan records. It performs no I/O of its own.
//!
//! # Architecture
//!
//! - A [`FrameCodec`] consumes the bytes of each receive notification and
//!   yields complete frames
//! - A [`SymbologyStrategy`] tags each frame with a [`Symbology`]
//! - [`ScanRecord::from_frame`] derives the label (the frame minus its
//!   trailing delimiter byte)
//!
//! Two framing modes are available through [`FramingMode`]:
//!
//! - **PerNotification**: every notification is exactly one frame. This is
//!   what scanners that deliver a whole payload per transmission burst expect.
//! - **Delimited**: bytes accumulate across notifications and a frame ends at
//!   a terminator byte, so split and coalesced scans are handled.
//!
//! # Example
//!
//! ```rust
//! use scan_protocol::{create_frame_codec, FramingMode, ScanRecord, Symbology, SymbologyStrategy};
//!
//! let mut codec = create_frame_codec(&FramingMode::PerNotification);
//! codec.push_bytes(&[0x41, 0x42, 0x43, 0x0D]);
//!
//! let frame = codec.next_frame().unwrap();
//! let record = ScanRecord::from_frame(frame, &SymbologyStrategy::default());
//! assert_eq!(record.label(), b"ABC");
//! assert_eq!(record.symbology(), Symbology::Ean13);
//! ```

pub mod error;
pub mod framer;
pub mod record;
pub mod symbology;

pub use error::FrameError;
pub use framer::{DelimitedCodec, FramingMode, NotificationCodec};
pub use record::{label_bytes, ScanRecord};
pub use symbology::{Symbology, SymbologyStrategy};

/// Trait for framers that split scanner output into frames
///
/// Implementations are fed the bytes of each receive notification in order
/// and hand back complete frames, oldest first.
pub trait FrameCodec: Send {
    /// Push the bytes of one receive notification into the codec
    fn push_bytes(&mut self, data: &[u8]);

    /// Try to extract the next complete frame
    fn next_frame(&mut self) -> Option<Vec<u8>>;

    /// Drop any buffered bytes
    fn clear(&mut self);
}

/// Create a codec for the given framing mode
pub fn create_frame_codec(mode: &FramingMode) -> Box<dyn FrameCodec> {
    match mode {
        FramingMode::PerNotification => Box::new(NotificationCodec::new()),
        FramingMode::Delimited {
            terminator,
            max_frame_len,
        } => Box::new(DelimitedCodec::new(*terminator, *max_frame_len)),
    }
}
