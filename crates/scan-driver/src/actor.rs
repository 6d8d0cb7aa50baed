//! Driver actor
//!
//! A single task owns the device state, the port manager and the emitter.
//! Host requests and reader notifications both arrive as [`DriverCommand`]s
//! on one bounded channel, so every transition and every open or close runs
//! to completion before the next command is looked at.
//!
//! Notifications carry the [`SessionId`] of the open that produced them.
//! Anything from a session that is no longer current is dropped, so bytes
//! read just before a close can never be turned into a scan afterwards.

use scan_protocol::{create_frame_codec, FrameCodec, ScanRecord};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::ChannelConfig;
use crate::emitter::{EmitterStats, ScanEmitter, ScanSink};
use crate::error::{DriverError, Result};
use crate::port::{ChannelOpener, PortManager, SessionId};
use crate::state::{DeviceState, EnableStep, StateMachine, Transition};

/// Longest prefix of a notification written to the debug log
const LOG_PREVIEW_LEN: usize = 64;

/// Commands processed by the driver actor
#[derive(Debug)]
pub enum DriverCommand {
    /// Replace the channel parameters (device must not be open)
    Configure {
        config: ChannelConfig,
        response: oneshot::Sender<Result<()>>,
    },

    /// Open the channel and start delivering scans
    Enable {
        response: oneshot::Sender<Result<()>>,
    },

    /// Close the channel and stop delivering scans
    Disable { response: oneshot::Sender<()> },

    /// Query the current state
    QueryState {
        response: oneshot::Sender<DeviceState>,
    },

    /// Put the device into the Error state
    ReportFault {
        reason: String,
        response: oneshot::Sender<()>,
    },

    /// Queue bytes for the scanner
    Write {
        data: Vec<u8>,
        response: oneshot::Sender<Result<()>>,
    },

    /// Recompute the health text
    CheckHealth { response: oneshot::Sender<String> },

    /// Read the cached health text
    HealthText { response: oneshot::Sender<String> },

    /// Read the delivery counters
    QueryStats {
        response: oneshot::Sender<EmitterStats>,
    },

    /// Bytes read from the channel
    BytesReceived { session: SessionId, data: Vec<u8> },

    /// The reader hit end of stream or an I/O error and has stopped
    ChannelFaulted { session: SessionId, message: String },

    /// A queued write failed or timed out
    WriteFailed { session: SessionId, message: String },

    /// Close the channel and stop the actor
    Shutdown { response: oneshot::Sender<()> },
}

struct DriverActorState<O, S> {
    ports: PortManager<O>,
    machine: StateMachine,
    emitter: ScanEmitter<S>,
    codec: Box<dyn FrameCodec>,
    health_text: String,
}

impl<O: ChannelOpener, S: ScanSink> DriverActorState<O, S> {
    fn apply(&mut self, transition: Option<Transition>) {
        if let Some(Transition { from, to }) = transition {
            info!(
                "Scanner on {} changed state: {} -> {}",
                self.ports.config().port_id,
                from,
                to
            );
            self.emitter.state_changed(from, to);
        }
    }

    fn configure(&mut self, config: ChannelConfig) -> Result<()> {
        self.ports.configure(config)?;
        self.codec = create_frame_codec(&self.ports.config().framing);
        Ok(())
    }

    async fn enable(&mut self) -> Result<()> {
        match self.machine.plan_enable()? {
            EnableStep::AlreadyEnabled => Ok(()),
            EnableStep::Open => match self.ports.open().await {
                Ok(session) => {
                    self.codec = create_frame_codec(&self.ports.config().framing);
                    debug!("Enabled with session {}", session);
                    let transition = self.machine.enabled();
                    self.apply(transition);
                    Ok(())
                }
                Err(e) => {
                    warn!("Failed to enable scanner: {}", e);
                    Err(DriverError::enable_failed(e))
                }
            },
        }
    }

    async fn disable(&mut self) {
        self.ports.close().await;
        self.codec.clear();
        let transition = self.machine.disabled();
        self.apply(transition);
    }

    fn report_fault(&mut self, reason: String) {
        warn!("Scanner fault reported: {}", reason);
        let transition = self.machine.faulted(reason);
        self.apply(transition);
    }

    fn bytes_received(&mut self, session: SessionId, data: Vec<u8>) {
        if !self.machine.accepts_input() {
            self.emitter.discard(&data);
            return;
        }

        if self.ports.session_id() != Some(session) {
            debug!(
                "Dropping {} bytes from closed session {}",
                data.len(),
                session
            );
            return;
        }

        debug!(
            "IN <-Scanner({}) {:02X?}",
            self.ports.config().port_id,
            &data[..data.len().min(LOG_PREVIEW_LEN)]
        );

        self.codec.push_bytes(&data);
        while let Some(frame) = self.codec.next_frame() {
            let record = ScanRecord::from_frame(frame, &self.ports.config().symbology);
            self.emitter.deliver(record);
        }
    }

    async fn channel_faulted(&mut self, session: SessionId, message: String) {
        if self.ports.session_id() != Some(session) {
            debug!("Ignoring fault from closed session {}: {}", session, message);
            return;
        }

        warn!(
            "Channel fault on {}: {}",
            self.ports.config().port_id,
            message
        );
        self.emitter
            .error("read", &DriverError::ChannelFault(message.clone()));
        // The reader has already stopped; release the handle.
        self.ports.close().await;
        self.codec.clear();
        let transition = self.machine.faulted(message);
        self.apply(transition);
    }

    fn write_failed(&mut self, session: SessionId, message: String) {
        if self.ports.session_id() != Some(session) {
            return;
        }
        warn!("Write to {} failed: {}", self.ports.config().port_id, message);
        self.emitter
            .error("write", &DriverError::ChannelFault(message));
    }

    fn check_health(&mut self) -> String {
        let port = &self.ports.config().port_id;
        self.health_text = match self.machine.state() {
            DeviceState::Enabled => format!("{}: OK", port),
            DeviceState::Disabled => format!("{}: disabled", port),
            DeviceState::Error => format!(
                "{}: error ({})",
                port,
                self.machine.fault_reason().unwrap_or("unknown")
            ),
        };

        let stats = self.emitter.stats();
        debug!(
            "Health {}: {} delivered, {} failed, {} discarded",
            self.health_text, stats.delivered, stats.delivery_failures, stats.discarded
        );
        self.health_text.clone()
    }
}

/// Run the driver actor
///
/// Returns after a [`DriverCommand::Shutdown`] or once every sender has been
/// dropped. The channel is closed on the way out.
///
/// # Arguments
///
/// * `ports` - Port manager whose reader tasks send to `cmd_rx`
/// * `sink` - Receiver of scans and diagnostics
/// * `cmd_rx` - Receiver for host requests and reader notifications
pub async fn run_driver_actor<O, S>(
    ports: PortManager<O>,
    sink: S,
    mut cmd_rx: mpsc::Receiver<DriverCommand>,
) where
    O: ChannelOpener,
    S: ScanSink,
{
    let codec = create_frame_codec(&ports.config().framing);
    let mut state = DriverActorState {
        ports,
        machine: StateMachine::new(),
        emitter: ScanEmitter::new(sink),
        codec,
        health_text: String::new(),
    };
    info!(
        "Scanner driver started for {}",
        state.ports.config().port_id
    );

    let mut shutdown_response = None;

    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            DriverCommand::Configure { config, response } => {
                let _ = response.send(state.configure(config));
            }

            DriverCommand::Enable { response } => {
                let _ = response.send(state.enable().await);
            }

            DriverCommand::Disable { response } => {
                state.disable().await;
                let _ = response.send(());
            }

            DriverCommand::QueryState { response } => {
                let _ = response.send(state.machine.state());
            }

            DriverCommand::ReportFault { reason, response } => {
                state.report_fault(reason);
                let _ = response.send(());
            }

            DriverCommand::Write { data, response } => {
                let _ = response.send(state.ports.write(data));
            }

            DriverCommand::CheckHealth { response } => {
                let _ = response.send(state.check_health());
            }

            DriverCommand::HealthText { response } => {
                let _ = response.send(state.health_text.clone());
            }

            DriverCommand::QueryStats { response } => {
                let _ = response.send(state.emitter.stats());
            }

            DriverCommand::BytesReceived { session, data } => {
                state.bytes_received(session, data);
            }

            DriverCommand::ChannelFaulted { session, message } => {
                state.channel_faulted(session, message).await;
            }

            DriverCommand::WriteFailed { session, message } => {
                state.write_failed(session, message);
            }

            DriverCommand::Shutdown { response } => {
                info!("Scanner driver shutting down");
                shutdown_response = Some(response);
                break;
            }
        }
    }

    state.disable().await;
    info!("Scanner driver stopped");

    if let Some(response) = shutdown_response {
        let _ = response.send(());
    }
}
