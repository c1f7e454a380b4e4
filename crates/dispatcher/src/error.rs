//! Dispatcher errors

use contracts::SinkType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatcherError {
    /// A configured sink could not be opened; nothing was spawned
    #[error("cannot open {sink_type:?} sink '{name}': {reason}")]
    OpenSink {
        name: String,
        sink_type: SinkType,
        reason: String,
    },
}

impl DispatcherError {
    pub fn open_sink(name: &str, sink_type: SinkType, reason: impl ToString) -> Self {
        Self::OpenSink {
            name: name.to_string(),
            sink_type,
            reason: reason.to_string(),
        }
    }
}
