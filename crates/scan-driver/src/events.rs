//! Events forwarded to the host by [`ScanEventSender`](crate::ScanEventSender)

use scan_protocol::ScanRecord;

use crate::error::ErrorKind;
use crate::state::DeviceState;

/// Everything the driver reports to the host through the event channel
#[derive(Debug, Clone)]
pub enum ScannerEvent {
    /// A label was read
    Scan(ScanRecord),

    /// The device changed state
    StateChanged {
        /// Previous state
        from: DeviceState,
        /// New state
        to: DeviceState,
    },

    /// A condition on the notification path worth surfacing
    Error {
        /// Operation that hit the condition (e.g. "read", "write", "deliver")
        context: String,
        /// Category of the condition
        kind: ErrorKind,
        /// Human-readable message
        message: String,
    },
}

impl ScannerEvent {
    /// The scan carried by this event, if any
    pub fn as_scan(&self) -> Option<&ScanRecord> {
        match self {
            Self::Scan(record) => Some(record),
            _ => None,
        }
    }

    /// Whether this is an error event of the given kind
    pub fn is_error(&self, wanted: ErrorKind) -> bool {
        matches!(self, Self::Error { kind, .. } if *kind == wanted)
    }
}
