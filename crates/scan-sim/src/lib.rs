//! Scanner Simulation Library
//!
//! This crate provides a simulation layer for exercising the scanner driver
//! without a physical device. It includes:
//!
//! - **VirtualPortBus**: a set of named virtual serial ports with exclusive
//!   access, which can be marked as held by another process or unplugged
//! - **VirtualScanner**: the device end of a virtual port, which emits scan
//!   payloads and can drop the line to simulate a fault
//!
//! # Example
//!
//! ```rust
//! use scan_sim::VirtualPortBus;
//! use tokio::io::AsyncReadExt;
//!
//! # #[tokio::main]
//! # async fn main() -> std::io::Result<()> {
//! let bus = VirtualPortBus::new();
//! let mut scanner = bus.add_port("COM5");
//!
//! // The driver side opens the port...
//! let mut host = bus.open("COM5").unwrap();
//!
//! // ...and the scanner pushes a scan at it
//! scanner.connected().await?;
//! scanner.scan(b"ABC").await?;
//!
//! let mut buf = [0u8; 16];
//! let n = host.read(&mut buf).await?;
//! assert_eq!(&buf[..n], b"ABC\r");
//! # Ok(())
//! # }
//! ```

pub mod port;
pub mod scanner;

pub use port::{VirtualPortBus, VirtualPortError, VirtualPortStream};
pub use scanner::VirtualScanner;
