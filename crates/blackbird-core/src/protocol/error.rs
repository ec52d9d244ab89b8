//! Protocol errors

use thiserror::Error;

/// Errors that can occur while talking to the matrix
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Serial port could not be opened or configured
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// No terminator arrived in time. `received` holds whatever was read.
    #[error("Connection timed out! Last received bytes {}", format_received(.received))]
    Timeout {
        /// Bytes read before giving up
        received: Vec<u8>,
    },

    /// TCP endpoint unreachable or refused the connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Reply frame was not ASCII
    #[error("Invalid response from matrix: {0}")]
    InvalidResponse(String),

    /// Command has no wire form in the configured variant
    #[error("Command not supported by this protocol variant: {0}")]
    UnsupportedCommand(String),

    /// Configuration failed to load or validate
    #[error("Configuration error: {0}")]
    Config(String),

    /// Underlying read or write failed
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ProtocolError {
    /// Build a timeout error carrying the partial frame
    pub fn timeout(received: &[u8]) -> Self {
        ProtocolError::Timeout {
            received: received.to_vec(),
        }
    }

    /// Whether this error is a response timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProtocolError::Timeout { .. })
    }
}

fn format_received(received: &[u8]) -> String {
    let hex: Vec<String> = received.iter().map(|b| format!("{:#04x}", b)).collect();
    format!("[{}]", hex.join(", "))
}

/// Result alias used throughout the protocol layer
pub type Result<T> = std::result::Result<T, ProtocolError>;
