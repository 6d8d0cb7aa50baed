//! Error types for the scanner driver

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for driver operations
pub type Result<T> = std::result::Result<T, DriverError>;

/// Errors returned by driver operations
#[derive(Debug, Error)]
pub enum DriverError {
    /// Invalid channel parameters
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The physical channel could not be acquired or is not open
    #[error("channel {port} unavailable: {reason}")]
    ChannelUnavailable { port: String, reason: String },

    /// Enabling the device failed; the device stays disabled
    #[error("unable to enable device: {0}")]
    EnableFailed(#[source] Box<DriverError>),

    /// Runtime I/O fault on an open channel
    #[error("channel fault: {0}")]
    ChannelFault(String),

    /// The device is in the Error state and must be disabled first
    #[error("device is in the error state; disable it before enabling again")]
    DeviceFaulted,

    /// Serial ports could not be listed
    #[error("failed to enumerate ports: {0}")]
    EnumerationFailed(String),

    /// The driver actor is no longer running
    #[error("driver has stopped")]
    ActorStopped,
}

impl DriverError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a channel unavailable error
    pub fn channel_unavailable(port: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ChannelUnavailable {
            port: port.into(),
            reason: reason.into(),
        }
    }

    /// Wrap an open-time failure
    pub fn enable_failed(cause: DriverError) -> Self {
        Self::EnableFailed(Box::new(cause))
    }

    /// Tag used when reporting this error through a sink
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::ChannelUnavailable { .. } | Self::EnumerationFailed(_) | Self::ActorStopped => {
                ErrorKind::ChannelUnavailable
            }
            // Only enable reports a faulted device
            Self::EnableFailed(_) | Self::DeviceFaulted => ErrorKind::EnableFailed,
            Self::ChannelFault(_) => ErrorKind::ChannelFault,
        }
    }

    /// Whether the channel could not be acquired, looking through `EnableFailed`
    pub fn is_channel_unavailable(&self) -> bool {
        match self {
            Self::ChannelUnavailable { .. } => true,
            Self::EnableFailed(cause) => cause.is_channel_unavailable(),
            _ => false,
        }
    }
}

/// Failure of the caller-side sink to accept a scan
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The receiver has no room for another event
    #[error("scan receiver is full")]
    Full,

    /// The receiver has gone away
    #[error("scan receiver is closed")]
    Closed,

    /// The sink refused the scan
    #[error("scan rejected: {0}")]
    Rejected(String),
}

/// Category of a condition reported through a sink's `on_error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Invalid parameters
    Configuration,
    /// Channel could not be acquired
    ChannelUnavailable,
    /// Enable request failed
    EnableFailed,
    /// Runtime I/O fault
    ChannelFault,
    /// Sink failed to accept a scan
    Delivery,
    /// Input ignored because the device is in the Error state
    InputDiscarded,
}

impl ErrorKind {
    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::ChannelUnavailable => "channel unavailable",
            Self::EnableFailed => "enable failed",
            Self::ChannelFault => "channel fault",
            Self::Delivery => "delivery",
            Self::InputDiscarded => "input discarded",
        }
    }
}
