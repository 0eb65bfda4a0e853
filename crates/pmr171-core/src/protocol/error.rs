//! Protocol errors

use thiserror::Error;

/// Errors that can occur while framing or exchanging data with the radio
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed frame: missing A5A5A5A5 preamble")]
    MissingPreamble,

    #[error("Malformed frame: need {needed} bytes, only {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("Malformed frame: invalid length byte {0}")]
    InvalidLength(u8),

    #[error("CRC mismatch: expected {expected:#06x}, got {actual:#06x}")]
    CrcMismatch { expected: u16, actual: u16 },

    #[error("Serial port error: {0}")]
    SerialError(String),

    #[error("Device response timeout")]
    Timeout,

    #[error("Device channel lock poisoned")]
    GatePoisoned,

    #[error("Port not found: {0}")]
    PortNotFound(String),

    #[error("Invalid device endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ProtocolError {
    /// True for checksum, preamble and length failures on a received frame
    pub fn is_malformed_frame(&self) -> bool {
        matches!(
            self,
            ProtocolError::MissingPreamble
                | ProtocolError::Truncated { .. }
                | ProtocolError::InvalidLength(_)
                | ProtocolError::CrcMismatch { .. }
        )
    }
}
