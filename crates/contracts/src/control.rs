//! Run/stop state and the backend's control responses.

use serde::{Deserialize, Serialize};

/// The engine's belief about whether the backend simulation is running
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Stopped,
    Running,
}

impl RunState {
    pub fn is_running(self) -> bool {
        matches!(self, RunState::Running)
    }
}

impl From<bool> for RunState {
    fn from(running: bool) -> Self {
        if running {
            RunState::Running
        } else {
            RunState::Stopped
        }
    }
}

/// Response to `start` / `stop`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlAck {
    /// Free-form backend status, e.g. "started", "already running"
    #[serde(default)]
    pub status: String,
    pub running: bool,
}

/// Response to `status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub running: bool,
    /// Backend uptime in seconds, when reported
    #[serde(default)]
    pub uptime: Option<u64>,
}
