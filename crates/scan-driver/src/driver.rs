//! Host-facing driver API

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::actor::{run_driver_actor, DriverCommand};
use crate::config::ChannelConfig;
use crate::emitter::{EmitterStats, ScanSink};
use crate::error::{DriverError, Result};
use crate::port::{ChannelOpener, PortManager};
use crate::state::DeviceState;

/// Depth of the command channel shared by host requests and reader notifications
const COMMAND_CAPACITY: usize = 256;

/// A running scanner driver
///
/// Owns the actor task. Use [`handle`](Self::handle) to get cloneable access
/// to the device.
pub struct ScannerDriver {
    handle: ScannerHandle,
    task: JoinHandle<()>,
}

impl ScannerDriver {
    /// Spawn the driver actor for `config`
    ///
    /// The device starts disabled; nothing is opened until
    /// [`ScannerHandle::enable`]. Must be called from within a tokio runtime.
    pub fn new<O, S>(config: ChannelConfig, opener: O, sink: S) -> Result<Self>
    where
        O: ChannelOpener,
        S: ScanSink,
    {
        config.validate()?;

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CAPACITY);
        let ports = PortManager::new(opener, config, cmd_tx.downgrade());
        let task = tokio::spawn(run_driver_actor(ports, sink, cmd_rx));

        Ok(Self {
            handle: ScannerHandle { cmd_tx },
            task,
        })
    }

    /// Cloneable handle to the device
    pub fn handle(&self) -> ScannerHandle {
        self.handle.clone()
    }

    /// Close the channel, stop the actor and wait for it to finish
    pub async fn shutdown(self) -> Result<()> {
        let result = self.handle.shutdown().await;
        if let Err(e) = self.task.await {
            warn!("Scanner driver task ended abnormally: {}", e);
        }
        result
    }
}

/// Cloneable handle for talking to the driver actor
#[derive(Debug, Clone)]
pub struct ScannerHandle {
    cmd_tx: mpsc::Sender<DriverCommand>,
}

impl ScannerHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> DriverCommand,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(build(tx))
            .await
            .map_err(|_| DriverError::ActorStopped)?;
        rx.await.map_err(|_| DriverError::ActorStopped)
    }

    /// Replace the channel parameters; the device must be disabled
    pub async fn configure(&self, config: ChannelConfig) -> Result<()> {
        self.request(|response| DriverCommand::Configure { config, response })
            .await?
    }

    /// Open the channel and start delivering scans
    ///
    /// A no-op when already enabled. Fails with [`DriverError::EnableFailed`]
    /// if the channel cannot be opened (the device stays disabled) and with
    /// [`DriverError::DeviceFaulted`] in the Error state.
    pub async fn enable(&self) -> Result<()> {
        self.request(|response| DriverCommand::Enable { response })
            .await?
    }

    /// Close the channel; never fails while the driver is running
    pub async fn disable(&self) -> Result<()> {
        self.request(|response| DriverCommand::Disable { response })
            .await
    }

    pub async fn is_enabled(&self) -> Result<bool> {
        Ok(self.current_state().await? == DeviceState::Enabled)
    }

    pub async fn current_state(&self) -> Result<DeviceState> {
        self.request(|response| DriverCommand::QueryState { response })
            .await
    }

    /// Put the device into the Error state
    pub async fn report_fault(&self, reason: impl Into<String>) -> Result<()> {
        let reason = reason.into();
        self.request(|response| DriverCommand::ReportFault { reason, response })
            .await
    }

    /// Send bytes to the scanner
    ///
    /// Returns once the bytes are queued. A write that later fails or times
    /// out is reported through the sink with context `"write"`.
    pub async fn write(&self, data: impl Into<Vec<u8>>) -> Result<()> {
        let data = data.into();
        self.request(|response| DriverCommand::Write { data, response })
            .await?
    }

    /// Recompute and cache the health text
    pub async fn check_health(&self) -> Result<String> {
        self.request(|response| DriverCommand::CheckHealth { response })
            .await
    }

    /// Health text from the last [`check_health`](Self::check_health)
    pub async fn health_text(&self) -> Result<String> {
        self.request(|response| DriverCommand::HealthText { response })
            .await
    }

    pub async fn stats(&self) -> Result<EmitterStats> {
        self.request(|response| DriverCommand::QueryStats { response })
            .await
    }

    /// Close the channel and stop the actor
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|response| DriverCommand::Shutdown { response })
            .await
    }
}
