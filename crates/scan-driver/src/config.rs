//! Channel configuration

use std::time::Duration;

use scan_protocol::{FramingMode, SymbologyStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{DriverError, Result};

/// Port used when the host supplies none
pub const DEFAULT_PORT_ID: &str = "COM10";

/// Baud rate used when the host supplies none
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Read and write timeout used when the host supplies none
pub const DEFAULT_TIMEOUT_MS: u64 = 500;

/// Parameters of the physical channel
///
/// Fixed for the lifetime of an open channel: changing them requires the
/// device to be disabled first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Serial port path or name (e.g., /dev/ttyUSB0, COM3)
    pub port_id: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Read timeout in milliseconds
    pub read_timeout_ms: u64,
    /// Write timeout in milliseconds
    pub write_timeout_ms: u64,
    /// How incoming bytes are split into frames
    pub framing: FramingMode,
    /// How frames are tagged with a symbology
    pub symbology: SymbologyStrategy,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            port_id: DEFAULT_PORT_ID.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: DEFAULT_TIMEOUT_MS,
            write_timeout_ms: DEFAULT_TIMEOUT_MS,
            framing: FramingMode::default(),
            symbology: SymbologyStrategy::default(),
        }
    }
}

impl ChannelConfig {
    /// Configuration for a port with default timeouts and framing
    pub fn new(port_id: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_id: port_id.into(),
            baud_rate,
            ..Default::default()
        }
    }

    /// Build and validate a configuration from the host's raw values
    pub fn from_parts(
        port_id: impl Into<String>,
        baud_rate: i64,
        read_timeout_ms: u64,
        write_timeout_ms: u64,
    ) -> Result<Self> {
        let baud_rate = u32::try_from(baud_rate)
            .ok()
            .filter(|&b| b > 0)
            .ok_or_else(|| {
                DriverError::configuration(format!("baud rate {} is out of range", baud_rate))
            })?;

        let config = Self {
            port_id: port_id.into(),
            baud_rate,
            read_timeout_ms,
            write_timeout_ms,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Set the framing mode
    pub fn with_framing(mut self, framing: FramingMode) -> Self {
        self.framing = framing;
        self
    }

    /// Set the symbology strategy
    pub fn with_symbology(mut self, symbology: SymbologyStrategy) -> Self {
        self.symbology = symbology;
        self
    }

    /// Set the read timeout
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the write timeout
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Read timeout
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Write timeout
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Check that the channel can be opened with these parameters
    pub fn validate(&self) -> Result<()> {
        if self.port_id.trim().is_empty() {
            return Err(DriverError::configuration("port identifier is empty"));
        }
        if self.baud_rate == 0 {
            return Err(DriverError::configuration("baud rate must be positive"));
        }
        if self.read_timeout_ms == 0 || self.write_timeout_ms == 0 {
            return Err(DriverError::configuration("timeouts must be non-zero"));
        }
        self.framing
            .validate()
            .map_err(|e| DriverError::configuration(e.to_string()))
    }
}
