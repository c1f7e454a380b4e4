//! `run` command implementation.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use contracts::{MonitorConfig, SinkConfig, SinkType};
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::session::{Session, SessionConfig};

const DEFAULT_SEED: u64 = 42;

/// Execute the `run` command
pub async fn run_session(args: &RunArgs) -> Result<()> {
    let monitor = load_monitor_config(args)?;

    info!(
        base_url = %monitor.backend.base_url,
        poll_interval_ms = monitor.sync.poll_interval_ms,
        window = monitor.sync.window_capacity,
        sinks = monitor.sinks.len(),
        mock = args.mock,
        "Configuration loaded"
    );

    let session_config = SessionConfig {
        monitor,
        start: args.start,
        max_frames: (args.max_frames > 0).then_some(args.max_frames),
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
        mock_seed: args.mock.then(|| args.seed.unwrap_or(DEFAULT_SEED)),
    };

    let stats = Session::new(session_config)
        .run(shutdown_signal())
        .await
        .context("Session failed")?;

    info!(
        frames = stats.frames,
        duration_secs = stats.duration.as_secs_f64(),
        reason = %stats.end_reason,
        "Session finished"
    );
    stats.print_summary();

    Ok(())
}

/// Config file (or built-in defaults) with CLI overrides applied and re-validated
fn load_monitor_config(args: &RunArgs) -> Result<MonitorConfig> {
    let mut monitor = match &args.config {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::config_not_found(path.display().to_string()).into());
            }
            config_loader::ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => {
            info!("No configuration file given, using defaults");
            default_monitor_config()
        }
    };

    if let Some(ref base_url) = args.base_url {
        info!(base_url = %base_url, "Overriding backend URL from CLI");
        monitor.backend.base_url = base_url.clone();
    }
    if let Some(poll_interval_ms) = args.poll_interval_ms {
        info!(poll_interval_ms, "Overriding poll interval from CLI");
        monitor.sync.poll_interval_ms = poll_interval_ms;
    }

    config_loader::ConfigLoader::validate(&monitor).map_err(CliError::InvalidOverride)?;

    if monitor.sinks.is_empty() {
        warn!("No sinks configured - display frames will be dropped");
    }

    Ok(monitor)
}

fn default_monitor_config() -> MonitorConfig {
    MonitorConfig {
        sinks: vec![SinkConfig {
            name: "console".to_string(),
            sink_type: SinkType::Console,
            params: HashMap::new(),
        }],
        ..Default::default()
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
