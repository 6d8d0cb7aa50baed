//! Port manager
//!
//! Owns the physical channel. Opening a channel spawns a reader task that
//! holds the I/O handle: it forwards every non-empty read to the driver actor
//! tagged with the session it belongs to, and performs queued writes bounded
//! by the configured write timeout.

use std::fmt;
use std::time::Duration;

use scan_sim::{VirtualPortBus, VirtualPortStream};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

use crate::actor::DriverCommand;
use crate::config::ChannelConfig;
use crate::error::{DriverError, Result};

/// Bytes requested from the channel per read
const READ_BUFFER_LEN: usize = 1024;

/// Writes queued for the reader task before `write` reports a fault
const WRITE_QUEUE_DEPTH: usize = 32;

/// Identifies one open of the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Source of byte channels for a port identifier
///
/// `open` may block. [`PortManager`] runs it on the blocking pool under the
/// configured write timeout, so each open gets its own clone of the opener.
pub trait ChannelOpener: Clone + Send + Sync + 'static {
    /// I/O handle of an open channel
    type Io: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Acquire the channel described by `config`
    ///
    /// Any failure to acquire the resource is reported as
    /// [`DriverError::ChannelUnavailable`].
    fn open(&self, config: &ChannelConfig) -> Result<Self::Io>;
}

/// Opens real serial ports through tokio-serial
///
/// Ports are opened for exclusive access.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialOpener;

impl ChannelOpener for SerialOpener {
    type Io = SerialStream;

    fn open(&self, config: &ChannelConfig) -> Result<SerialStream> {
        tokio_serial::new(&config.port_id, config.baud_rate)
            .timeout(config.read_timeout())
            .open_native_async()
            .map_err(|e| DriverError::channel_unavailable(&config.port_id, e.to_string()))
    }
}

impl ChannelOpener for VirtualPortBus {
    type Io = VirtualPortStream;

    fn open(&self, config: &ChannelConfig) -> Result<VirtualPortStream> {
        VirtualPortBus::open(self, &config.port_id)
            .map_err(|e| DriverError::channel_unavailable(&config.port_id, e.to_string()))
    }
}

/// I/O loop for one open session
struct ChannelReader<T> {
    io: T,
    session: SessionId,
    port: String,
    read_timeout: Duration,
    write_timeout: Duration,
    notify_tx: mpsc::Sender<DriverCommand>,
}

impl<T> ChannelReader<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Returns on shutdown, when the driver goes away, or after a channel fault.
    async fn run(
        mut self,
        mut shutdown_rx: oneshot::Receiver<()>,
        mut write_rx: mpsc::Receiver<Vec<u8>>,
    ) {
        debug!("Reader for {} session {} starting", self.port, self.session);

        let mut buffer = vec![0u8; READ_BUFFER_LEN];

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    break;
                }

                Some(data) = write_rx.recv() => {
                    let result = tokio::time::timeout(self.write_timeout, async {
                        self.io.write_all(&data).await?;
                        self.io.flush().await
                    })
                    .await;

                    let failure = match result {
                        Ok(Ok(())) => {
                            debug!("OUT ->Scanner({}) {:02X?}", self.port, data);
                            None
                        }
                        Ok(Err(e)) => Some(format!("write failed: {}", e)),
                        Err(_) => Some(format!("write timed out after {:?}", self.write_timeout)),
                    };

                    if let Some(message) = failure {
                        let notice = DriverCommand::WriteFailed {
                            session: self.session,
                            message,
                        };
                        if self.notify_tx.send(notice).await.is_err() {
                            break;
                        }
                    }
                }

                result = tokio::time::timeout(self.read_timeout, self.io.read(&mut buffer)) => {
                    let fault = match result {
                        Ok(Ok(0)) => Some("channel closed by device".to_string()),
                        Ok(Ok(n)) => {
                            let notice = DriverCommand::BytesReceived {
                                session: self.session,
                                data: buffer[..n].to_vec(),
                            };
                            if self.notify_tx.send(notice).await.is_err() {
                                break;
                            }
                            None
                        }
                        Ok(Err(e))
                            if e.kind() == std::io::ErrorKind::WouldBlock
                                || e.kind() == std::io::ErrorKind::TimedOut =>
                        {
                            None
                        }
                        Ok(Err(e)) => Some(format!("read failed: {}", e)),
                        Err(_) => None, // Timeout, continue
                    };

                    if let Some(message) = fault {
                        let _ = self
                            .notify_tx
                            .send(DriverCommand::ChannelFaulted {
                                session: self.session,
                                message,
                            })
                            .await;
                        break;
                    }
                }
            }
        }

        debug!("Reader for {} session {} stopped", self.port, self.session);
    }
}

struct OpenSession {
    id: SessionId,
    shutdown_tx: Option<oneshot::Sender<()>>,
    write_tx: mpsc::Sender<Vec<u8>>,
    task: JoinHandle<()>,
}

/// Owns the channel configuration and at most one open session
pub struct PortManager<O> {
    opener: O,
    config: ChannelConfig,
    notify_tx: mpsc::WeakSender<DriverCommand>,
    session: Option<OpenSession>,
    sessions_opened: u64,
}

impl<O: ChannelOpener> PortManager<O> {
    /// Create a manager whose reader tasks notify `notify_tx`
    ///
    /// Only a weak reference is kept; a reader holds a strong sender while its
    /// session is open.
    pub fn new(
        opener: O,
        config: ChannelConfig,
        notify_tx: mpsc::WeakSender<DriverCommand>,
    ) -> Self {
        Self {
            opener,
            config,
            notify_tx,
            session: None,
            sessions_opened: 0,
        }
    }

    /// Current parameters
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Whether a session is open
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Id of the open session, if any
    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Replace the channel parameters
    pub fn configure(&mut self, config: ChannelConfig) -> Result<()> {
        config.validate()?;
        if self.is_open() {
            return Err(DriverError::configuration(format!(
                "cannot reconfigure {} while the channel is open",
                self.config.port_id
            )));
        }
        info!(
            "Channel configured: {} @ {} baud",
            config.port_id, config.baud_rate
        );
        self.config = config;
        Ok(())
    }

    /// Open the channel; returns the existing session if already open
    ///
    /// Gives up with [`DriverError::ChannelUnavailable`] once the write timeout
    /// elapses. A handle that the opener produces after that is dropped.
    pub async fn open(&mut self) -> Result<SessionId> {
        if let Some(session) = &self.session {
            return Ok(session.id);
        }

        let notify_tx = self.notify_tx.upgrade().ok_or(DriverError::ActorStopped)?;
        let io = self.acquire().await?;

        self.sessions_opened += 1;
        let id = SessionId(self.sessions_opened);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (write_tx, write_rx) = mpsc::channel(WRITE_QUEUE_DEPTH);

        let reader = ChannelReader {
            io,
            session: id,
            port: self.config.port_id.clone(),
            read_timeout: self.config.read_timeout(),
            write_timeout: self.config.write_timeout(),
            notify_tx,
        };
        let task = tokio::spawn(reader.run(shutdown_rx, write_rx));

        info!(
            "Opened {} @ {} baud (session {})",
            self.config.port_id, self.config.baud_rate, id
        );

        self.session = Some(OpenSession {
            id,
            shutdown_tx: Some(shutdown_tx),
            write_tx,
            task,
        });
        Ok(id)
    }

    async fn acquire(&self) -> Result<O::Io> {
        let opener = self.opener.clone();
        let config = self.config.clone();
        let limit = self.config.write_timeout();
        let attempt = tokio::task::spawn_blocking(move || opener.open(&config));

        match tokio::time::timeout(limit, attempt).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(DriverError::channel_unavailable(
                &self.config.port_id,
                format!("open task failed: {}", e),
            )),
            Err(_) => {
                warn!(
                    "Opening {} did not finish within {:?}",
                    self.config.port_id, limit
                );
                Err(DriverError::channel_unavailable(
                    &self.config.port_id,
                    format!("open timed out after {:?}", limit),
                ))
            }
        }
    }

    /// Release the channel. Returns false if nothing was open.
    ///
    /// Waits at most the write timeout for the reader to stop, then aborts it.
    pub async fn close(&mut self) -> bool {
        let Some(mut session) = self.session.take() else {
            return false;
        };

        if let Some(tx) = session.shutdown_tx.take() {
            let _ = tx.send(());
        }

        match tokio::time::timeout(self.config.write_timeout(), &mut session.task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Reader for {} ended abnormally: {}", self.config.port_id, e),
            Err(_) => {
                warn!(
                    "Reader for {} did not stop within {:?}, aborting",
                    self.config.port_id,
                    self.config.write_timeout()
                );
                session.task.abort();
            }
        }

        info!("Closed {} (session {})", self.config.port_id, session.id);
        true
    }

    /// Queue bytes for the open channel
    pub fn write(&self, data: Vec<u8>) -> Result<()> {
        let session = self.session.as_ref().ok_or_else(|| {
            DriverError::channel_unavailable(&self.config.port_id, "channel is not open")
        })?;

        session.write_tx.try_send(data).map_err(|e| match e {
            TrySendError::Full(_) => DriverError::ChannelFault("write queue is full".into()),
            TrySendError::Closed(_) => {
                DriverError::channel_unavailable(&self.config.port_id, "channel is closing")
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Notifications = (mpsc::Sender<DriverCommand>, mpsc::Receiver<DriverCommand>);

    fn manager(bus: &VirtualPortBus) -> (PortManager<VirtualPortBus>, Notifications) {
        let (tx, rx) = mpsc::channel(16);
        let config = ChannelConfig::new("COM5", 19200);
        let manager = PortManager::new(bus.clone(), config, tx.downgrade());
        (manager, (tx, rx))
    }

    async fn recv(rx: &mut mpsc::Receiver<DriverCommand>) -> DriverCommand {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for notification")
            .expect("notification channel closed")
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let bus = VirtualPortBus::new();
        let _scanner = bus.add_port("COM5");
        let (mut ports, _notify) = manager(&bus);

        let first = ports.open().await.unwrap();
        let second = ports.open().await.unwrap();
        assert_eq!(first, second);
        assert!(bus.is_in_use("COM5"));

        assert!(ports.close().await);
        assert!(!ports.close().await);
        assert!(!bus.is_in_use("COM5"));

        let third = ports.open().await.unwrap();
        assert_ne!(first, third);
    }

    #[tokio::test]
    async fn test_open_missing_port_is_unavailable() {
        let bus = VirtualPortBus::new();
        let (mut ports, _notify) = manager(&bus);

        let err = ports.open().await.unwrap_err();
        assert!(matches!(err, DriverError::ChannelUnavailable { ref port, .. } if port == "COM5"));
        assert!(!ports.is_open());
    }

    #[tokio::test]
    async fn test_reads_are_tagged_with_session() {
        let bus = VirtualPortBus::new();
        let mut scanner = bus.add_port("COM5");
        let (mut ports, (_tx, mut rx)) = manager(&bus);

        let session = ports.open().await.unwrap();
        scanner.connected().await.unwrap();
        scanner.send_raw(&[0x41, 0x42, 0x43, 0x0D]).await.unwrap();

        match recv(&mut rx).await {
            DriverCommand::BytesReceived { session: s, data } => {
                assert_eq!(s, session);
                assert_eq!(data, vec![0x41, 0x42, 0x43, 0x0D]);
            }
            other => panic!("unexpected notification: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_device_hangup_is_fault() {
        let bus = VirtualPortBus::new();
        let mut scanner = bus.add_port("COM5");
        let (mut ports, (_tx, mut rx)) = manager(&bus);

        let session = ports.open().await.unwrap();
        scanner.connected().await.unwrap();
        scanner.disconnect();

        match recv(&mut rx).await {
            DriverCommand::ChannelFaulted { session: s, .. } => assert_eq!(s, session),
            other => panic!("unexpected notification: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_write_reaches_device() {
        let bus = VirtualPortBus::new();
        let mut scanner = bus.add_port("COM5");
        let (mut ports, _notify) = manager(&bus);

        assert!(matches!(
            ports.write(b"\x16T\r".to_vec()),
            Err(DriverError::ChannelUnavailable { .. })
        ));

        ports.open().await.unwrap();
        scanner.connected().await.unwrap();
        ports.write(b"\x16T\r".to_vec()).unwrap();

        let mut buf = [0u8; 8];
        let n = scanner.read_host(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"\x16T\r");
    }

    #[tokio::test]
    async fn test_configure_rejected_while_open() {
        let bus = VirtualPortBus::new();
        let _scanner = bus.add_port("COM5");
        let (mut ports, _notify) = manager(&bus);

        ports.open().await.unwrap();
        let err = ports.configure(ChannelConfig::new("COM6", 9600)).unwrap_err();
        assert!(matches!(err, DriverError::Configuration(_)));
        assert_eq!(ports.config().port_id, "COM5");

        ports.close().await;
        ports.configure(ChannelConfig::new("COM6", 9600)).unwrap();
        assert_eq!(ports.config().port_id, "COM6");
    }
}
