//! MonitorConfig - Config Loader output
//!
//! Describes the whole client: backend endpoint, sync engine tuning and display routing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

use crate::SyncConfig;

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete monitor configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct MonitorConfig {
    /// Config version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Simulation backend endpoint
    #[serde(default)]
    #[validate(nested)]
    pub backend: BackendConfig,

    /// Sync engine settings
    #[serde(default)]
    #[validate(nested)]
    pub sync: SyncConfig,

    /// Display routing
    #[serde(default)]
    #[validate(nested)]
    pub sinks: Vec<SinkConfig>,
}

/// Backend endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BackendConfig {
    /// Base URL of the simulation API
    #[serde(default = "default_base_url")]
    #[validate(url)]
    pub base_url: String,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    #[validate(range(min = 1))]
    pub request_timeout_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5000
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Display sink configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SinkConfig {
    /// Sink name
    #[validate(length(min = 1))]
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Sink-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Display sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// One tracing event per frame
    Log,
    /// Terminal redraw (status line + latest readings)
    Console,
    /// JSON snapshot of the latest frame on disk
    File,
}
