//! `info` command implementation.

use std::collections::HashMap;

use anyhow::{Context, Result};
use contracts::MonitorConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    backend: BackendInfo,
    sync: SyncInfo,
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct BackendInfo {
    base_url: String,
    request_timeout_ms: u64,
}

#[derive(Serialize)]
struct SyncInfo {
    poll_interval_ms: u64,
    window_capacity: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    status_refresh_ms: Option<u64>,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    params: HashMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&config, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config, args);
    }

    Ok(())
}

fn build_config_info(config: &MonitorConfig, args: &InfoArgs) -> ConfigInfo {
    let sinks = config
        .sinks
        .iter()
        .map(|s| SinkInfo {
            name: s.name.clone(),
            sink_type: format!("{:?}", s.sink_type),
            params: if args.sinks {
                s.params.clone()
            } else {
                HashMap::new()
            },
        })
        .collect();

    ConfigInfo {
        version: format!("{:?}", config.version),
        backend: BackendInfo {
            base_url: config.backend.base_url.clone(),
            request_timeout_ms: config.backend.request_timeout_ms,
        },
        sync: SyncInfo {
            poll_interval_ms: config.sync.poll_interval_ms,
            window_capacity: config.sync.window_capacity,
            status_refresh_ms: config
                .sync
                .status_refresh()
                .map(|d| d.as_millis() as u64),
        },
        sinks,
    }
}

fn print_config_info(config: &MonitorConfig, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 PV Monitor Configuration                     ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("🔌 Backend");
    println!("   ├─ Version: {:?}", config.version);
    println!("   ├─ Base URL: {}", config.backend.base_url);
    println!("   └─ Request timeout: {} ms", config.backend.request_timeout_ms);

    let sync = &config.sync;
    println!("\n⚙️  Sync Settings");
    println!("   ├─ Poll interval: {} ms", sync.poll_interval_ms);
    println!("   ├─ Window capacity: {} samples", sync.window_capacity);
    match sync.status_refresh() {
        Some(period) => println!("   └─ Status refresh: {} ms", period.as_millis()),
        None => println!("   └─ Status refresh: disabled"),
    }

    if config.sinks.is_empty() {
        println!("\n📤 Sinks: none");
    } else {
        println!("\n📤 Sinks ({})", config.sinks.len());
        for (i, sink) in config.sinks.iter().enumerate() {
            let is_last = i == config.sinks.len() - 1;
            let prefix = if is_last { "└─" } else { "├─" };
            let child_prefix = if is_last { "   " } else { "│  " };
            println!(
                "   {} {} ({:?})",
                prefix, sink.name, sink.sink_type
            );
            if args.sinks {
                let mut params: Vec<_> = sink.params.iter().collect();
                params.sort();
                for (key, value) in params {
                    println!("   {}  · {} = {}", child_prefix, key, value);
                }
            }
        }
    }

    println!();
}
