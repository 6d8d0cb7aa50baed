//! Scan delivery
//!
//! The emitter hands each accepted record to the host's [`ScanSink`] as soon
//! as it is framed. Nothing is queued on the driver side: a sink that cannot
//! take a scan gets the record dropped and an error reported back to it.

use scan_protocol::ScanRecord;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::error::{DeliveryError, DriverError, ErrorKind};
use crate::events::ScannerEvent;
use crate::state::DeviceState;

/// Receiver of everything the driver produces
///
/// Called from the driver task. Implementations must not block.
pub trait ScanSink: Send + 'static {
    /// A label was read
    fn on_scan(&mut self, record: ScanRecord) -> Result<(), DeliveryError>;

    /// Something went wrong on a path with no caller to return an error to
    fn on_error(&mut self, context: &str, kind: ErrorKind, message: &str);

    /// The device changed state
    fn on_state_change(&mut self, from: DeviceState, to: DeviceState) {
        let _ = (from, to);
    }
}

/// Delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitterStats {
    /// Scans accepted by the sink
    pub delivered: u64,
    /// Scans the sink failed to accept
    pub delivery_failures: u64,
    /// Notifications dropped because the device was in the Error state
    pub discarded: u64,
}

/// Delivers records and diagnostics to a [`ScanSink`]
pub struct ScanEmitter<S> {
    sink: S,
    stats: EmitterStats,
}

impl<S: ScanSink> ScanEmitter<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            stats: EmitterStats::default(),
        }
    }

    /// Counters so far
    pub fn stats(&self) -> EmitterStats {
        self.stats
    }

    /// Hand one record to the sink
    pub fn deliver(&mut self, record: ScanRecord) {
        let len = record.label().len();
        match self.sink.on_scan(record) {
            Ok(()) => {
                self.stats.delivered += 1;
                debug!("Delivered scan ({} label bytes)", len);
            }
            Err(e) => {
                self.stats.delivery_failures += 1;
                warn!("Scan delivery failed: {}", e);
                self.sink.on_error("deliver", ErrorKind::Delivery, &e.to_string());
            }
        }
    }

    /// Report a notification ignored in the Error state
    pub fn discard(&mut self, data: &[u8]) {
        self.stats.discarded += 1;
        warn!(
            "Input data ignored because device is in the error state ({} bytes)",
            data.len()
        );
        self.sink.on_error(
            "data_received",
            ErrorKind::InputDiscarded,
            "input data ignored because device is in the error state",
        );
    }

    /// Report a driver error raised outside any caller request
    pub fn error(&mut self, context: &str, error: &DriverError) {
        self.sink.on_error(context, error.kind(), &error.to_string());
    }

    /// Report a state change
    pub fn state_changed(&mut self, from: DeviceState, to: DeviceState) {
        self.sink.on_state_change(from, to);
    }
}

/// [`ScanSink`] that forwards everything into a bounded channel
///
/// Scans that do not fit are reported as [`DeliveryError::Full`]; error and
/// state events that do not fit are dropped.
#[derive(Debug, Clone)]
pub struct ScanEventSender {
    tx: mpsc::Sender<ScannerEvent>,
}

impl ScanEventSender {
    pub fn new(tx: mpsc::Sender<ScannerEvent>) -> Self {
        Self { tx }
    }

    /// Create a sender together with its receiving end
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ScannerEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    fn forward(&self, event: ScannerEvent) {
        if let Err(e) = self.tx.try_send(event) {
            debug!("Dropping scanner event: {}", e);
        }
    }
}

impl ScanSink for ScanEventSender {
    fn on_scan(&mut self, record: ScanRecord) -> Result<(), DeliveryError> {
        self.tx
            .try_send(ScannerEvent::Scan(record))
            .map_err(|e| match e {
                TrySendError::Full(_) => DeliveryError::Full,
                TrySendError::Closed(_) => DeliveryError::Closed,
            })
    }

    fn on_error(&mut self, context: &str, kind: ErrorKind, message: &str) {
        self.forward(ScannerEvent::Error {
            context: context.to_string(),
            kind,
            message: message.to_string(),
        });
    }

    fn on_state_change(&mut self, from: DeviceState, to: DeviceState) {
        self.forward(ScannerEvent::StateChanged { from, to });
    }
}
