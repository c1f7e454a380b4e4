//! FileSink - keeps a JSON snapshot of the latest frame on disk

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use contracts::{ContractError, DisplayFrame, DisplaySink, Sample};
use serde::Serialize;
use tracing::{debug, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Snapshot file path
    pub path: PathBuf,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let path = params
            .get("path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./pv_monitor_frame.json"));

        Self { path }
    }
}

#[derive(Serialize)]
struct Snapshot<'a> {
    written_at: String,
    revision: u64,
    running: bool,
    last_error: Option<&'a str>,
    latest: Option<&'a Sample>,
    window: &'a [Sample],
}

/// Sink that overwrites one snapshot file per frame
///
/// The file is replaced atomically (write to a sibling temp file, then rename) so readers
/// never observe a partial snapshot.
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    tmp_path: PathBuf,
}

impl FileSink {
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = tmp_path_for(&config.path);

        Ok(Self {
            name: name.into(),
            config,
            tmp_path,
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        Self::new(name, FileSinkConfig::from_params(params))
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    fn write_snapshot(&self, frame: &DisplayFrame) -> std::io::Result<()> {
        let snapshot = Snapshot {
            written_at: Local::now().to_rfc3339(),
            revision: frame.revision,
            running: frame.running,
            last_error: frame.last_error.as_deref(),
            latest: frame.latest(),
            window: &frame.window,
        };
        let body = serde_json::to_vec_pretty(&snapshot)?;

        let mut file = fs::File::create(&self.tmp_path)?;
        file.write_all(&body)?;
        file.sync_all()?;
        fs::rename(&self.tmp_path, &self.config.path)
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

impl DisplaySink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_render",
        skip(self, frame),
        fields(sink = %self.name, revision = frame.revision)
    )]
    async fn render(&mut self, frame: &DisplayFrame) -> Result<(), ContractError> {
        self.write_snapshot(frame)
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        debug!(path = %self.config.path.display(), "Snapshot written");
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        // 中途失败时可能残留临时文件
        if self.tmp_path.exists() {
            fs::remove_file(&self.tmp_path)?;
        }
        debug!(sink = %self.name, "FileSink closed");
        Ok(())
    }
}
