//! Error types for scanner framing

use thiserror::Error;

/// Errors that can occur while framing scanner output
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// A delimited frame exceeded the configured maximum length
    #[error("frame of {len} bytes exceeds maximum of {max} bytes")]
    Oversized { len: usize, max: usize },

    /// Framing parameters are unusable
    #[error("invalid framing configuration: {0}")]
    InvalidConfig(String),
}
