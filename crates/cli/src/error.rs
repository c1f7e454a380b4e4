//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration invalid after CLI overrides
    #[error("Invalid override: {0}")]
    InvalidOverride(#[source] contracts::ContractError),

    /// Backend gateway could not be built
    #[error("Cannot reach backend at {url}: {message}")]
    Backend { url: String, message: String },

    /// Engine went away while the session still needed it
    #[error("Sync engine error: {0}")]
    Engine(#[from] sync_engine::EngineError),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn backend(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            url: url.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
