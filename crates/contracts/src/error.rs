//! Layered error definitions
//!
//! Categorized by source: config / transport / sink

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Backend gateway operation, used to tag transport failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayOp {
    Start,
    Stop,
    Status,
    FetchAll,
    FetchLatest,
}

impl GatewayOp {
    /// Stable label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayOp::Start => "start",
            GatewayOp::Stop => "stop",
            GatewayOp::Status => "status",
            GatewayOp::FetchAll => "fetch_all",
            GatewayOp::FetchLatest => "fetch_latest",
        }
    }
}

impl fmt::Display for GatewayOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What went wrong on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection refused, reset, DNS failure...
    Network,
    /// No response within the configured request timeout
    Timeout,
    /// Non-success HTTP status
    Status(u16),
    /// Response body did not match the expected shape
    Decode,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::Network => f.write_str("network"),
            TransportErrorKind::Timeout => f.write_str("timeout"),
            TransportErrorKind::Status(code) => write!(f, "http status {code}"),
            TransportErrorKind::Decode => f.write_str("decode"),
        }
    }
}

/// The only error a backend gateway call can fail with. Always recoverable.
#[derive(Debug, Clone, Error)]
#[error("{operation} failed ({kind}): {message}")]
pub struct TransportError {
    pub operation: GatewayOp,
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(operation: GatewayOp, kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
        }
    }

    pub fn network(operation: GatewayOp, message: impl Into<String>) -> Self {
        Self::new(operation, TransportErrorKind::Network, message)
    }

    pub fn status(operation: GatewayOp, code: u16) -> Self {
        Self::new(
            operation,
            TransportErrorKind::Status(code),
            format!("backend answered {code}"),
        )
    }
}

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Transport Errors =====
    #[error(transparent)]
    Transport(#[from] TransportError),

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}
