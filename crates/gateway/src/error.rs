//! Gateway error types

use contracts::ContractError;
#[cfg(feature = "http")]
use contracts::{GatewayOp, TransportError, TransportErrorKind};
use thiserror::Error;

/// Gateway construction error
///
/// Per-request failures are reported as [`contracts::TransportError`] instead.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Base URL cannot be used to build request URLs
    #[error("invalid backend url '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// HTTP client could not be built (TLS backend, ...)
    #[error("failed to build http client: {message}")]
    ClientBuild { message: String },

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl GatewayError {
    pub fn invalid_url(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.into(),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Map a reqwest failure onto the transport taxonomy
#[cfg(feature = "http")]
pub(crate) fn classify(operation: GatewayOp, err: &reqwest::Error) -> TransportError {
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if err.is_decode() {
        TransportErrorKind::Decode
    } else if let Some(status) = err.status() {
        TransportErrorKind::Status(status.as_u16())
    } else {
        TransportErrorKind::Network
    };
    TransportError::new(operation, kind, err.to_string())
}

/// Body arrived but did not match the expected JSON shape
#[cfg(feature = "http")]
pub(crate) fn decode_failure(operation: GatewayOp, err: &serde_json::Error) -> TransportError {
    TransportError::new(operation, TransportErrorKind::Decode, err.to_string())
}
