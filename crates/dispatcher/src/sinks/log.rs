//! LogSink - one tracing event per frame

use contracts::{ContractError, DisplayFrame, DisplaySink};
use tracing::{info, instrument};

/// Sink that logs frame summaries
pub struct LogSink {
    name: String,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_frame_summary(&self, frame: &DisplayFrame) {
        let latest = frame.latest();

        info!(
            sink = %self.name,
            revision = frame.revision,
            running = frame.running,
            window = frame.window.len(),
            latest_ts = latest.map(|s| s.timestamp.as_str()),
            meter_kw = latest.map(|s| s.meter),
            pv_kw = latest.map(|s| s.pv),
            net_kw = latest.map(|s| s.net),
            last_error = frame.last_error.as_deref(),
            "DisplayFrame received"
        );
    }
}

impl DisplaySink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_render",
        skip(self, frame),
        fields(sink = %self.name, revision = frame.revision)
    )]
    async fn render(&mut self, frame: &DisplayFrame) -> Result<(), ContractError> {
        self.log_frame_summary(frame);
        Ok(())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}
