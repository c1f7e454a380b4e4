//! Session orchestrator - wires gateway, sync engine, dispatcher and the control surface.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{BackendGateway, DisplayFrame, MonitorConfig};
use gateway::{spawn_simulation, MockGateway, METER_INTERVAL};
use sync_engine::{EngineHandle, LiveSync};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::control::{parse_control_line, ControlInput, HELP};
use super::{EndReason, SessionStats};
use crate::error::{self, CliError};

const FRAME_BUFFER: usize = 64;
const DISPATCHER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub monitor: MonitorConfig,

    /// Send a start request right after startup
    pub start: bool,

    /// Maximum number of display frames (None = unlimited)
    pub max_frames: Option<u64>,

    /// Session timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    /// Run against the in-process simulated backend with this meter seed
    pub mock_seed: Option<u64>,
}

/// One live monitoring session
pub struct Session {
    config: SessionConfig,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Run until quit, signal, timeout, frame limit, or engine shutdown
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<SessionStats> {
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        match self.config.mock_seed {
            Some(seed) => self.run_mock(seed, shutdown).await,
            None => self.run_http(shutdown).await,
        }
    }

    #[cfg(feature = "http")]
    async fn run_http(&self, shutdown: impl Future<Output = ()>) -> Result<SessionStats> {
        let backend = &self.config.monitor.backend;
        let gateway = gateway::HttpGateway::new(backend)
            .map_err(|e| CliError::backend(&backend.base_url, e.to_string()))?;
        info!(base_url = %backend.base_url, "Using HTTP backend");

        self.run_common(Arc::new(gateway), shutdown).await
    }

    #[cfg(not(feature = "http"))]
    async fn run_http(&self, _shutdown: impl Future<Output = ()>) -> Result<SessionStats> {
        Err(CliError::backend(
            &self.config.monitor.backend.base_url,
            "built without the `http` feature, use --mock",
        )
        .into())
    }

    async fn run_mock(&self, seed: u64, shutdown: impl Future<Output = ()>) -> Result<SessionStats> {
        info!(seed, "Running in MOCK mode (no backend required)");
        let gateway = Arc::new(MockGateway::new());
        let simulation = spawn_simulation(Arc::clone(&gateway), METER_INTERVAL, seed);

        let stats = self.run_common(gateway, shutdown).await;
        simulation.abort();
        stats
    }

    /// Common session logic shared between HTTP and mock modes
    async fn run_common<G>(&self, gateway: Arc<G>, shutdown: impl Future<Output = ()>) -> Result<SessionStats>
    where
        G: BackendGateway + Sync + 'static,
    {
        let start_time = Instant::now();
        let monitor = &self.config.monitor;

        let (display_tx, display_rx) = mpsc::channel::<DisplayFrame>(FRAME_BUFFER);
        let dispatcher = dispatcher::Dispatcher::from_config(&monitor.sinks, display_rx)
            .await
            .context("Failed to open display sinks")?;
        let dispatcher_handle = dispatcher.spawn();
        info!(sinks = monitor.sinks.len(), "Dispatcher started");

        let (frames_tx, mut frames_rx) = mpsc::channel::<DisplayFrame>(FRAME_BUFFER);
        let (driver, handle) = LiveSync::new(gateway, monitor.sync.clone(), frames_tx);
        let driver_task = tokio::spawn(driver.run());

        if self.config.start {
            info!("Requesting simulation start");
            handle.start().await.map_err(CliError::from)?;
        }

        eprintln!("{HELP}");

        let mut stdin = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;
        let deadline = self.config.timeout.map(|t| tokio::time::Instant::now() + t);
        let mut frames: u64 = 0;
        tokio::pin!(shutdown);

        let end_reason = loop {
            tokio::select! {
                frame = frames_rx.recv() => match frame {
                    Some(frame) => {
                        frames += 1;
                        forward(&display_tx, frame).await;
                        if self.config.max_frames.is_some_and(|max| frames >= max) {
                            info!(frames, "Reached max frames limit");
                            break EndReason::MaxFrames;
                        }
                    }
                    None => break EndReason::EngineClosed,
                },

                line = stdin.next_line(), if stdin_open => match line {
                    Ok(Some(line)) => {
                        if let Some(reason) = handle_control_line(&handle, &line).await? {
                            break reason;
                        }
                    }
                    Ok(None) => {
                        info!("stdin closed, control surface disabled");
                        stdin_open = false;
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read stdin, control surface disabled");
                        stdin_open = false;
                    }
                },

                _ = &mut shutdown => {
                    warn!("Received shutdown signal, stopping session...");
                    break EndReason::Signal;
                }

                _ = sleep_until(deadline) => {
                    warn!("Session timed out");
                    break EndReason::Timeout;
                }
            }
        };

        // Teardown: dispose the engine, forward whatever it still emits, then drain the sinks
        info!(reason = %end_reason, "Shutting down session...");
        if handle.dispose().await.is_err() {
            warn!("Sync engine already stopped");
        }
        while let Some(frame) = frames_rx.recv().await {
            frames += 1;
            forward(&display_tx, frame).await;
        }
        let report = driver_task.await.context("Sync engine task failed")?;

        drop(display_tx);
        let sinks = match tokio::time::timeout(DISPATCHER_DRAIN_TIMEOUT, dispatcher_handle).await {
            Ok(Ok(metrics)) => metrics,
            Ok(Err(e)) => {
                warn!(error = %e, "Dispatcher task failed");
                Vec::new()
            }
            Err(_) => {
                warn!("Dispatcher did not drain in time");
                Vec::new()
            }
        };

        let stats = SessionStats {
            frames,
            duration: start_time.elapsed(),
            end_reason,
            report,
            sinks,
        };
        info!(
            frames = stats.frames,
            duration_secs = stats.duration.as_secs_f64(),
            "Session shutdown complete"
        );
        Ok(stats)
    }
}

async fn forward(display_tx: &mpsc::Sender<DisplayFrame>, frame: DisplayFrame) {
    if display_tx.send(frame).await.is_err() {
        warn!("Dispatcher channel closed");
    }
}

/// Apply one control line; `Some` ends the session
async fn handle_control_line(handle: &EngineHandle, line: &str) -> error::Result<Option<EndReason>> {
    match parse_control_line(line) {
        ControlInput::Engine(command) => {
            info!(?command, "Control input");
            handle.send(command).await?;
        }
        ControlInput::Quit => return Ok(Some(EndReason::Quit)),
        ControlInput::Help => eprintln!("{HELP}"),
        ControlInput::Empty => {}
        ControlInput::Unknown(word) => eprintln!("unknown command '{word}' ({HELP})"),
    }
    Ok(None)
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
