//! Dispatcher - hands every display frame to each sink's keep-latest slot

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use contracts::{DisplayFrame, SinkConfig, SinkType};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::MetricsSnapshot;
use crate::sinks::{ConsoleSink, FileSink, LogSink};

/// Open the sink described by `config` and start its worker
#[instrument(
    name = "dispatcher_open_sink",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
pub fn open_sink(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    let name = config.name.as_str();
    let handle = match config.sink_type {
        SinkType::Log => SinkHandle::spawn(LogSink::new(name)),
        SinkType::Console => {
            let sink = ConsoleSink::stdout_from_params(name, &config.params)
                .map_err(|e| DispatcherError::open_sink(name, config.sink_type, e))?;
            SinkHandle::spawn(sink)
        }
        SinkType::File => {
            let sink = FileSink::from_params(name, &config.params)
                .map_err(|e| DispatcherError::open_sink(name, config.sink_type, e))?;
            SinkHandle::spawn(sink)
        }
    };
    debug!(sink = name, "Sink opened");
    Ok(handle)
}

/// Fans display frames out to every sink
///
/// Sinks never hold the engine back: each one renders the newest frame it has not seen yet,
/// and frames arriving out of revision order are ignored.
pub struct Dispatcher {
    sinks: Vec<SinkHandle>,
    frames: mpsc::Receiver<DisplayFrame>,
    /// Highest revision handed out so far
    revision: u64,
}

impl Dispatcher {
    pub fn new(sinks: Vec<SinkHandle>, frames: mpsc::Receiver<DisplayFrame>) -> Self {
        Self {
            sinks,
            frames,
            revision: 0,
        }
    }

    /// Open every configured sink. Fails on the first sink that cannot be opened; sinks
    /// opened before it are shut down again.
    pub async fn from_config(
        configs: &[SinkConfig],
        frames: mpsc::Receiver<DisplayFrame>,
    ) -> Result<Self, DispatcherError> {
        let mut sinks = Vec::with_capacity(configs.len());
        for config in configs {
            match open_sink(config) {
                Ok(handle) => sinks.push(handle),
                Err(e) => {
                    for opened in sinks {
                        opened.shutdown().await;
                    }
                    return Err(e);
                }
            }
        }
        Ok(Self::new(sinks, frames))
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(SinkHandle::name).collect()
    }

    /// Run until the engine drops its frame sender
    ///
    /// Every sink then renders its pending frame and closes. The returned metrics are taken
    /// after that.
    #[instrument(name = "dispatcher_run", skip(self), fields(sinks = self.sinks.len()))]
    pub async fn run(mut self) -> Vec<(String, MetricsSnapshot)> {
        info!("Dispatcher started");
        let mut delivered: u64 = 0;

        while let Some(frame) = self.frames.recv().await {
            if frame.revision <= self.revision {
                warn!(
                    revision = frame.revision,
                    latest = self.revision,
                    "Out-of-order frame ignored"
                );
                continue;
            }
            self.revision = frame.revision;
            delivered += 1;

            // 最后一个 sink 直接拿走，少一次 clone
            if let Some((last, rest)) = self.sinks.split_last() {
                for sink in rest {
                    sink.offer(frame.clone());
                }
                last.offer(frame);
            }
        }

        debug!(delivered, revision = self.revision, "Frame stream closed");

        let mut report = Vec::with_capacity(self.sinks.len());
        for sink in self.sinks {
            let name = sink.name().to_string();
            let metrics = Arc::clone(sink.metrics());
            sink.shutdown().await;
            report.push((name, metrics.snapshot()));
        }

        info!(delivered, "Dispatcher shutdown complete");
        report
    }

    pub fn spawn(self) -> JoinHandle<Vec<(String, MetricsSnapshot)>> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Sample;
    use std::collections::HashMap;

    fn frame(revision: u64) -> DisplayFrame {
        DisplayFrame {
            window: vec![Sample::new(format!("2024-05-01T12:00:{revision:02}"), 3.0, 5.0)].into(),
            last_error: None,
            running: true,
            revision,
        }
    }

    fn sink_config(name: &str, sink_type: SinkType, params: &[(&str, &str)]) -> SinkConfig {
        SinkConfig {
            name: name.to_string(),
            sink_type,
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[tokio::test]
    async fn test_every_sink_ends_on_newest_frame() {
        let (tx, rx) = mpsc::channel(10);
        let sinks = vec![
            SinkHandle::spawn(LogSink::new("first")),
            SinkHandle::spawn(LogSink::new("second")),
        ];
        let dispatcher = Dispatcher::new(sinks, rx);
        assert_eq!(dispatcher.sink_names(), vec!["first", "second"]);
        let task = dispatcher.spawn();

        for i in 1..=5 {
            tx.send(frame(i)).await.unwrap();
        }
        drop(tx);

        let report = task.await.unwrap();
        assert_eq!(report.len(), 2);
        for (_, snapshot) in report {
            assert_eq!(snapshot.last_revision, 5);
            assert_eq!(snapshot.render_count + snapshot.coalesced_count, 5);
        }
    }

    #[tokio::test]
    async fn test_out_of_order_frame_not_rendered() {
        let (tx, rx) = mpsc::channel(10);
        let task = Dispatcher::new(vec![SinkHandle::spawn(LogSink::new("log"))], rx).spawn();

        tx.send(frame(3)).await.unwrap();
        tx.send(frame(2)).await.unwrap();
        tx.send(frame(3)).await.unwrap();
        drop(tx);

        let report = task.await.unwrap();
        let (_, snapshot) = &report[0];
        assert_eq!(snapshot.render_count, 1);
        assert_eq!(snapshot.last_revision, 3);
    }

    #[tokio::test]
    async fn test_from_config_writes_snapshot_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.json");
        let path_str = path.display().to_string();
        let (tx, rx) = mpsc::channel(10);

        let configs = vec![
            sink_config("log", SinkType::Log, &[]),
            sink_config("snapshot", SinkType::File, &[("path", path_str.as_str())]),
        ];
        let task = Dispatcher::from_config(&configs, rx).await.unwrap().spawn();

        tx.send(frame(1)).await.unwrap();
        drop(tx);
        task.await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"revision\": 1"));
    }

    #[tokio::test]
    async fn test_from_config_rejects_bad_console_params() {
        let (_tx, rx) = mpsc::channel(1);
        let configs = vec![
            sink_config("log", SinkType::Log, &[]),
            sink_config("console", SinkType::Console, &[("rows", "many")]),
        ];

        let err = Dispatcher::from_config(&configs, rx).await.err().unwrap();
        assert!(matches!(
            err,
            DispatcherError::OpenSink { ref name, sink_type: SinkType::Console, .. } if name == "console"
        ));
    }
}
