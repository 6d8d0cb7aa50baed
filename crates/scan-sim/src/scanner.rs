//! Virtual scanner
//!
//! The device end of a virtual port. Each time the host opens the port the
//! scanner receives a fresh line; [`VirtualScanner::connected`] adopts the
//! newest one.

use std::io;

use scan_protocol::framer::DEFAULT_TERMINATOR;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use tracing::debug;

/// Simulated serial barcode scanner
#[derive(Debug)]
pub struct VirtualScanner {
    port: String,
    terminator: u8,
    session_rx: mpsc::UnboundedReceiver<DuplexStream>,
    line: Option<DuplexStream>,
    /// Payloads sent (for test verification)
    sent: Vec<Vec<u8>>,
}

impl VirtualScanner {
    pub(crate) fn new(port: String, session_rx: mpsc::UnboundedReceiver<DuplexStream>) -> Self {
        Self {
            port,
            terminator: DEFAULT_TERMINATOR,
            session_rx,
            line: None,
            sent: Vec::new(),
        }
    }

    /// Use a different byte to end each scan
    pub fn with_terminator(mut self, terminator: u8) -> Self {
        self.terminator = terminator;
        self
    }

    /// Name of the port this scanner is plugged into
    pub fn port(&self) -> &str {
        &self.port
    }

    /// Byte appended to each scan
    pub fn terminator(&self) -> u8 {
        self.terminator
    }

    /// Whether the scanner currently holds a line to the host
    pub fn is_connected(&self) -> bool {
        self.line.is_some()
    }

    /// Adopt the newest line opened by the host
    ///
    /// Waits for the host to open the port if it has not done so since the
    /// last call.
    pub async fn connected(&mut self) -> io::Result<()> {
        let mut latest = None;
        while let Ok(stream) = self.session_rx.try_recv() {
            latest = Some(stream);
        }

        let stream = match latest {
            Some(stream) => stream,
            None => self.session_rx.recv().await.ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotConnected, "virtual port removed")
            })?,
        };

        debug!("Virtual scanner on {} connected", self.port);
        self.line = Some(stream);
        Ok(())
    }

    /// Bytes the scanner sends for one read of `label`
    pub fn encode(&self, label: &[u8]) -> Vec<u8> {
        let mut payload = Vec::with_capacity(label.len() + 1);
        payload.extend_from_slice(label);
        payload.push(self.terminator);
        payload
    }

    /// Send a terminated scan of `label`
    pub async fn scan(&mut self, label: &[u8]) -> io::Result<()> {
        let payload = self.encode(label);
        self.send_raw(&payload).await
    }

    /// Send bytes exactly as given
    pub async fn send_raw(&mut self, data: &[u8]) -> io::Result<()> {
        let line = self
            .line
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "scanner not connected"))?;

        line.write_all(data).await?;
        line.flush().await?;

        debug!("Virtual scanner on {} sent {:02X?}", self.port, data);
        self.sent.push(data.to_vec());
        Ok(())
    }

    /// Read bytes the host wrote to the scanner
    pub async fn read_host(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let line = self
            .line
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "scanner not connected"))?;
        line.read(buf).await
    }

    /// Drop the line, as if the cable were pulled. Returns false if not connected.
    pub fn disconnect(&mut self) -> bool {
        let had_line = self.line.take().is_some();
        if had_line {
            debug!("Virtual scanner on {} disconnected", self.port);
        }
        had_line
    }

    /// Payloads sent so far
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }
}
