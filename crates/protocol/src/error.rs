//! Protocol error types

use thiserror::Error;

/// Register protocol errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Address does not name one of the adapter's registers
    #[error("Unknown register address: {0:#04x}")]
    UnknownRegister(u8),

    /// Device answered a read with fewer bytes than requested
    #[error("Short response: expected {expected} bytes, got {actual}")]
    ShortResponse { expected: usize, actual: usize },
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;
