//! Error types for ranging-io

use crate::core::types::AnchorId;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// ranging-io error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad channel name, unresolvable device path, unavailable hardware or
    /// unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller-supplied request cannot be framed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Timeout, bad handshake length byte, zero/short/over-long read
    #[error("Communication error: {0}")]
    Communication(String),

    /// Module reported a non-zero error code
    #[error("Device error: {0:#04x}")]
    DeviceError(u8),

    /// Response bytes do not decode consistently
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Distance queried before polling was ever started
    #[error("Polling has not been started")]
    NotPolling,

    /// Anchor is not part of the current snapshot
    #[error("Unknown tag: {0:#06x}")]
    UnknownTag(AnchorId),

    /// Poll thread panicked and could not be joined cleanly
    #[error("Poll thread panicked")]
    ThreadPanic,

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

/// Coarse error classification carried by [`crate::events::TagEvent::Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    InvalidRequest,
    Communication,
    Device,
    MalformedResponse,
    NotPolling,
    UnknownTag,
    Internal,
}

impl Error {
    /// Classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Configuration,
            Error::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Error::Communication(_) => ErrorKind::Communication,
            Error::DeviceError(_) => ErrorKind::Device,
            Error::MalformedResponse(_) => ErrorKind::MalformedResponse,
            Error::NotPolling => ErrorKind::NotPolling,
            Error::UnknownTag(_) => ErrorKind::UnknownTag,
            Error::ThreadPanic | Error::Other(_) => ErrorKind::Internal,
        }
    }

    /// Data-path errors that only cost one tick
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Communication | ErrorKind::Device | ErrorKind::MalformedResponse
        )
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(format!("Failed to parse config: {}", e))
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Config(format!("Failed to serialize config: {}", e))
    }
}
