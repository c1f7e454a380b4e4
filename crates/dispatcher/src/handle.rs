//! SinkHandle - one display sink behind a keep-latest slot and its own worker task

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, trace};

use contracts::{DisplayFrame, DisplaySink};

use crate::metrics::SinkMetrics;
use crate::slot::LatestFrame;

/// Handle to a running sink worker
pub struct SinkHandle {
    name: String,
    latest: Arc<LatestFrame>,
    metrics: Arc<SinkMetrics>,
    worker: JoinHandle<()>,
}

impl SinkHandle {
    /// Spawn the worker for `sink`
    pub fn spawn<S: DisplaySink + 'static>(sink: S) -> Self {
        let name = sink.name().to_string();
        let latest = Arc::new(LatestFrame::default());
        let metrics = Arc::new(SinkMetrics::new());

        let worker = tokio::spawn(render_latest(
            sink,
            Arc::clone(&latest),
            Arc::clone(&metrics),
            name.clone(),
        ));

        Self {
            name,
            latest,
            metrics,
            worker,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Hand the newest frame to the worker (non-blocking)
    ///
    /// A frame the worker has not started rendering yet is replaced and counted as coalesced.
    /// Returns false once the worker is shutting down.
    pub fn offer(&self, frame: DisplayFrame) -> bool {
        match self.latest.offer(frame) {
            Ok(Some(replaced)) => {
                self.metrics.inc_coalesced_count();
                trace!(sink = %self.name, revision = replaced.revision, "Unrendered frame replaced");
                true
            }
            Ok(None) => true,
            Err(frame) => {
                error!(sink = %self.name, revision = frame.revision, "Sink worker already closed");
                false
            }
        }
    }

    /// Whether a frame is waiting for the worker
    pub fn is_pending(&self) -> bool {
        self.latest.is_pending()
    }

    /// Let the worker render the pending frame, then flush and close the sink
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        self.latest.close();
        if let Err(e) = self.worker.await {
            error!(sink = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
    }
}

#[instrument(name = "sink_render_loop", skip(sink, latest, metrics), fields(sink = %name))]
async fn render_latest<S: DisplaySink>(
    mut sink: S,
    latest: Arc<LatestFrame>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!("Sink worker started");

    while let Some(frame) = latest.take().await {
        match sink.render(&frame).await {
            Ok(()) => {
                metrics.record_render(frame.revision);
                observability::record_frame_dispatched(&name, true);
            }
            Err(e) => {
                // 不重试：下一帧是完整快照
                metrics.inc_failure_count();
                observability::record_frame_dispatched(&name, false);
                error!(revision = frame.revision, error = %e, "Render failed");
            }
        }
    }

    if let Err(e) = sink.flush().await {
        error!(error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(error = %e, "Close failed on shutdown");
    }

    debug!("Sink worker stopped");
}
