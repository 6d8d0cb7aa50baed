//! Serial barcode scanner driver
//!
//! Opens the scanner's serial channel, frames what it sends, and delivers
//! each read as a [`ScanRecord`] to the host's [`ScanSink`]. The device moves
//! between three states:
//!
//! - `Disabled` (initial): channel closed.
//! - `Enabled`: channel open, scans delivered.
//! - `Error`: an unrecoverable fault occurred; input is discarded until the
//!   host disables the device.
//!
//! # Example
//!
//! ```rust,no_run
//! use scan_driver::{ChannelConfig, ScanEventSender, ScannerDriver, ScannerEvent, SerialOpener};
//!
//! # async fn run() -> scan_driver::Result<()> {
//! let (sink, mut events) = ScanEventSender::channel(64);
//! let driver = ScannerDriver::new(ChannelConfig::new("COM5", 19200), SerialOpener, sink)?;
//! let scanner = driver.handle();
//!
//! scanner.enable().await?;
//! while let Some(event) = events.recv().await {
//!     if let ScannerEvent::Scan(record) = event {
//!         println!("{}: {}", record.symbology(), record.label_text());
//!     }
//! }
//! driver.shutdown().await
//! # }
//! ```

pub mod actor;
pub mod config;
pub mod discovery;
pub mod driver;
pub mod emitter;
pub mod error;
pub mod events;
pub mod port;
pub mod state;

pub use actor::{run_driver_actor, DriverCommand};
pub use config::ChannelConfig;
pub use discovery::{DiscoveredPort, DiscoveryConfig, PortScanner};
pub use driver::{ScannerDriver, ScannerHandle};
pub use emitter::{EmitterStats, ScanEmitter, ScanEventSender, ScanSink};
pub use error::{DeliveryError, DriverError, ErrorKind, Result};
pub use events::ScannerEvent;
pub use port::{ChannelOpener, PortManager, SerialOpener, SessionId};
pub use state::{DeviceState, StateMachine, Transition};

pub use scan_protocol::{FramingMode, ScanRecord, Symbology, SymbologyStrategy};
