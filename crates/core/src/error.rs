use crate::transport::TransportError;

/// Result alias that carries the custom [`DotstarError`] type.
pub type Result<T> = std::result::Result<T, DotstarError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum DotstarError {
    /// Rejected configuration. Raised while validating, before the transport
    /// is touched.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Failure reported by the transport collaborator. Never retried here.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
    /// An operation was attempted in the wrong lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Malformed configuration file.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl DotstarError {
    /// Creates a configuration error from the provided message.
    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }

    /// Returns `true` for errors raised by configuration validation.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
