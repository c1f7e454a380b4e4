//! DisplaySink trait - output side of the sync engine
//!
//! Sinks receive immutable snapshots; they have no way to feed back into the engine.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{ContractError, Sample};

/// Snapshot handed to display sinks on every engine-driven change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayFrame {
    /// Ordered sample window, oldest first
    pub window: Arc<[Sample]>,
    /// Most recent failure, cleared on the next success
    pub last_error: Option<String>,
    /// Running flag for the control surface
    pub running: bool,
    /// Monotonic frame counter
    pub revision: u64,
}

impl Default for DisplayFrame {
    fn default() -> Self {
        Self {
            window: Arc::from(Vec::new()),
            last_error: None,
            running: false,
            revision: 0,
        }
    }
}

impl DisplayFrame {
    /// Newest sample in the window
    pub fn latest(&self) -> Option<&Sample> {
        self.window.last()
    }
}

/// Display output trait
///
/// All display sink implementations must implement this trait.
#[trait_variant::make(DisplaySink: Send)]
pub trait LocalDisplaySink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Redraw from the given frame
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn render(&mut self, frame: &DisplayFrame) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_is_last_window_entry() {
        let frame = DisplayFrame {
            window: vec![Sample::new("t1", 1.0, 0.0), Sample::new("t2", 2.0, 0.0)].into(),
            ..Default::default()
        };
        assert_eq!(frame.latest().unwrap().timestamp.as_str(), "t2");
        assert!(DisplayFrame::default().latest().is_none());
    }
}
