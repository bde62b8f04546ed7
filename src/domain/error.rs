//! Domain error types

use thiserror::Error;

/// Errors that can occur while controlling the receiver
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RigError {
    /// Transport failure. The in-flight operation's device-side outcome is unknown.
    #[error("I/O error: {0}")]
    Io(String),

    /// Page, address, routine, button or value outside its defined range.
    /// Raised before any byte reaches the wire.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid BCD byte: 0x{0:02x}")]
    InvalidBcd(u8),

    /// Unexpected or missing reply from the receiver
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Not implemented: {0}")]
    Unimplemented(String),

    #[error("Receiver not opened")]
    NotOpen,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RigError {
    /// True for failures of the serial line itself, the only kind a caller
    /// may sensibly retry from scratch.
    pub fn is_transport(&self) -> bool {
        matches!(self, RigError::Io(_))
    }
}

/// Result type alias for receiver operations
pub type RigResult<T> = Result<T, RigError>;
