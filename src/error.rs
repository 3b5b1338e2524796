use thiserror::Error;

#[derive(Debug, Error)]
pub enum TlError {
    #[error("relay unreachable: {0}")]
    NetworkUnavailable(String),
    #[error("relay rejected request (status {status}): {message}")]
    Relay { status: u16, message: String },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("no path found from {from} to {to}")]
    NoPathFound { from: String, to: String },
    #[error("extra data is not in a recognized format")]
    UnrecognizedFormat,
    #[error("signing failed: {0}")]
    SigningFailed(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl TlError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Whether the relay or the transport failed, as opposed to the caller.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::NetworkUnavailable(_) | Self::Relay { .. })
    }
}

impl From<reqwest::Error> for TlError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            TlError::Serialization(e.to_string())
        } else {
            TlError::NetworkUnavailable(e.to_string())
        }
    }
}

impl From<serde_json::Error> for TlError {
    fn from(e: serde_json::Error) -> Self {
        TlError::Serialization(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TlError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        TlError::NetworkUnavailable(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TlError>;
