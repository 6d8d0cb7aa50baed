//! Virtual serial ports
//!
//! Each named port hands out at most one host-side stream at a time, the way
//! an exclusively opened tty or COM port does. The device side of every open
//! is delivered to the port's [`VirtualScanner`].

use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use thiserror::Error;
use tokio::io::{duplex, AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::scanner::VirtualScanner;

/// Bytes buffered in each direction of a virtual line
const LINE_CAPACITY: usize = 1024;

/// Errors returned when opening a virtual port
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VirtualPortError {
    /// No port with this name exists (or it was unplugged)
    #[error("virtual port {0} not found")]
    NotFound(String),

    /// The port is already open, or held by another process
    #[error("virtual port {0} is busy or in use")]
    Busy(String),
}

#[derive(Debug)]
struct PortSlot {
    /// Simulates another process holding the port
    held_elsewhere: bool,
    /// Set while a host-side stream is alive
    in_use: Arc<AtomicBool>,
    /// Delivers the device end of each open to the scanner
    session_tx: mpsc::UnboundedSender<DuplexStream>,
}

/// A collection of named virtual serial ports
///
/// Cloning the bus yields another handle to the same ports.
#[derive(Debug, Clone, Default)]
pub struct VirtualPortBus {
    ports: Arc<Mutex<HashMap<String, PortSlot>>>,
}

impl VirtualPortBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    fn ports(&self) -> MutexGuard<'_, HashMap<String, PortSlot>> {
        self.ports.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Plug in a port and return the scanner attached to it
    ///
    /// Adding a name that already exists replaces the old port.
    pub fn add_port(&self, name: impl Into<String>) -> VirtualScanner {
        let name = name.into();
        let (session_tx, session_rx) = mpsc::unbounded_channel();

        self.ports().insert(
            name.clone(),
            PortSlot {
                held_elsewhere: false,
                in_use: Arc::new(AtomicBool::new(false)),
                session_tx,
            },
        );

        info!("Virtual port {} added", name);
        VirtualScanner::new(name, session_rx)
    }

    /// Unplug a port. Returns false if it did not exist.
    pub fn remove_port(&self, name: &str) -> bool {
        let removed = self.ports().remove(name).is_some();
        if removed {
            info!("Virtual port {} removed", name);
        }
        removed
    }

    /// Mark a port as held by another process
    pub fn hold(&self, name: &str) -> bool {
        self.set_held(name, true)
    }

    /// Release a port previously marked with [`hold`](Self::hold)
    pub fn release(&self, name: &str) -> bool {
        self.set_held(name, false)
    }

    fn set_held(&self, name: &str, held: bool) -> bool {
        match self.ports().get_mut(name) {
            Some(slot) => {
                slot.held_elsewhere = held;
                true
            }
            None => false,
        }
    }

    /// Whether a host-side stream for this port is currently alive
    pub fn is_in_use(&self, name: &str) -> bool {
        self.ports()
            .get(name)
            .is_some_and(|slot| slot.in_use.load(Ordering::SeqCst))
    }

    /// Names of all plugged-in ports, sorted
    pub fn port_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.ports().keys().cloned().collect();
        names.sort();
        names
    }

    /// Open a port exclusively
    pub fn open(&self, name: &str) -> Result<VirtualPortStream, VirtualPortError> {
        let ports = self.ports();
        let slot = ports
            .get(name)
            .ok_or_else(|| VirtualPortError::NotFound(name.to_string()))?;

        if slot.held_elsewhere || slot.in_use.load(Ordering::SeqCst) {
            return Err(VirtualPortError::Busy(name.to_string()));
        }

        let (host, device) = duplex(LINE_CAPACITY);
        // A dropped scanner means nothing is plugged into the port any more
        slot.session_tx
            .send(device)
            .map_err(|_| VirtualPortError::NotFound(name.to_string()))?;

        slot.in_use.store(true, Ordering::SeqCst);
        debug!("Virtual port {} opened", name);

        Ok(VirtualPortStream {
            inner: host,
            in_use: Arc::clone(&slot.in_use),
        })
    }
}

/// Host end of an open virtual port
///
/// Dropping the stream closes the port and makes it available again.
#[derive(Debug)]
pub struct VirtualPortStream {
    inner: DuplexStream,
    in_use: Arc<AtomicBool>,
}

impl Drop for VirtualPortStream {
    fn drop(&mut self) {
        self.in_use.store(false, Ordering::SeqCst);
    }
}

impl AsyncRead for VirtualPortStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for VirtualPortStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn test_open_missing_port() {
        let bus = VirtualPortBus::new();
        assert_eq!(
            bus.open("COM1").unwrap_err(),
            VirtualPortError::NotFound("COM1".to_string())
        );
    }

    #[test]
    fn test_open_is_exclusive() {
        let bus = VirtualPortBus::new();
        let _scanner = bus.add_port("COM5");

        let first = bus.open("COM5").unwrap();
        assert!(bus.is_in_use("COM5"));
        assert!(matches!(bus.open("COM5"), Err(VirtualPortError::Busy(_))));

        drop(first);
        assert!(!bus.is_in_use("COM5"));
        assert!(bus.open("COM5").is_ok());
    }

    #[test]
    fn test_held_elsewhere_is_busy() {
        let bus = VirtualPortBus::new();
        let _scanner = bus.add_port("COM5");

        assert!(bus.hold("COM5"));
        assert!(matches!(bus.open("COM5"), Err(VirtualPortError::Busy(_))));

        assert!(bus.release("COM5"));
        assert!(bus.open("COM5").is_ok());
        assert!(!bus.hold("COM9"));
    }

    #[test]
    fn test_open_after_scanner_dropped() {
        let bus = VirtualPortBus::new();
        drop(bus.add_port("COM5"));
        assert!(matches!(bus.open("COM5"), Err(VirtualPortError::NotFound(_))));
    }

    #[test]
    fn test_remove_port() {
        let bus = VirtualPortBus::new();
        let _a = bus.add_port("COM7");
        let _b = bus.add_port("COM3");
        assert_eq!(bus.port_names(), vec!["COM3".to_string(), "COM7".to_string()]);

        assert!(bus.remove_port("COM7"));
        assert!(!bus.remove_port("COM7"));
        assert_eq!(bus.port_names(), vec!["COM3".to_string()]);
    }

    #[tokio::test]
    async fn test_host_write_reaches_scanner() {
        let bus = VirtualPortBus::new();
        let mut scanner = bus.add_port("COM5");
        let mut host = bus.open("COM5").unwrap();
        scanner.connected().await.unwrap();

        host.write_all(b"\x16T\r").await.unwrap();
        host.flush().await.unwrap();

        let mut buf = [0u8; 8];
        let n = scanner.read_host(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"\x16T\r");

        scanner.scan(b"42").await.unwrap();
        let n = host.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"42\r");
    }
}
