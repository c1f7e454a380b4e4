//! ConsoleSink - redraws a status line and the newest readings

use std::collections::HashMap;
use std::io::{self, Stdout, Write};

use contracts::{ContractError, DisplayFrame, DisplaySink, Timestamp};
use tracing::{debug, instrument};

const DEFAULT_ROWS: usize = 10;

/// ConsoleSink 参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleSinkConfig {
    /// 表格显示的最新行数
    pub rows: usize,
    /// 每帧前清屏（ANSI）
    pub clear: bool,
}

impl Default for ConsoleSinkConfig {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            clear: false,
        }
    }
}

impl ConsoleSinkConfig {
    /// 从 sink params 解析：`rows`（正整数）、`clear`（true/false）
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, ContractError> {
        let mut config = Self::default();
        if let Some(rows) = params.get("rows") {
            config.rows = rows
                .parse::<usize>()
                .ok()
                .filter(|r| *r > 0)
                .ok_or_else(|| {
                    ContractError::config_validation("params.rows", format!("invalid row count '{rows}'"))
                })?;
        }
        if let Some(clear) = params.get("clear") {
            config.clear = clear.parse::<bool>().map_err(|_| {
                ContractError::config_validation("params.clear", format!("expected true/false, got '{clear}'"))
            })?;
        }
        Ok(config)
    }
}

/// Wall-clock label for a sample timestamp, falling back to the raw string
pub fn time_label(timestamp: &Timestamp) -> String {
    timestamp
        .parse_local()
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

/// 终端显示 sink
pub struct ConsoleSink<W> {
    name: String,
    config: ConsoleSinkConfig,
    out: W,
}

impl ConsoleSink<Stdout> {
    /// Console sink on process stdout
    pub fn stdout_from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        Ok(Self::new(name, ConsoleSinkConfig::from_params(params)?, io::stdout()))
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(name: impl Into<String>, config: ConsoleSinkConfig, out: W) -> Self {
        Self {
            name: name.into(),
            config,
            out,
        }
    }

    /// Consume the sink, returning the writer
    pub fn into_inner(self) -> W {
        self.out
    }

    fn draw(&mut self, frame: &DisplayFrame) -> io::Result<()> {
        if self.config.clear {
            write!(self.out, "\x1b[2J\x1b[H")?;
        }

        let state = if frame.running { "RUNNING" } else { "STOPPED" };
        write!(
            self.out,
            "[rev {}] {} | window {}",
            frame.revision,
            state,
            frame.window.len()
        )?;
        match frame.latest() {
            Some(s) => writeln!(
                self.out,
                " | {} meter {:.2} kW pv {:.2} kW net {:.2} kW",
                time_label(&s.timestamp),
                s.meter,
                s.pv,
                s.net
            )?,
            None => writeln!(self.out, " | no data")?,
        }

        if !frame.window.is_empty() {
            writeln!(self.out, "  {:<10}{:>10}{:>10}{:>10}", "time", "meter", "pv", "net")?;
            let skip = frame.window.len().saturating_sub(self.config.rows);
            for s in frame.window.iter().skip(skip) {
                writeln!(
                    self.out,
                    "  {:<10}{:>10.2}{:>10.2}{:>10.2}",
                    time_label(&s.timestamp),
                    s.meter,
                    s.pv,
                    s.net
                )?;
            }
        }

        if let Some(err) = &frame.last_error {
            writeln!(self.out, "  error: {err}")?;
        }
        Ok(())
    }
}

impl<W: Write + Send> DisplaySink for ConsoleSink<W> {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "console_sink_render",
        skip(self, frame),
        fields(sink = %self.name, revision = frame.revision)
    )]
    async fn render(&mut self, frame: &DisplayFrame) -> Result<(), ContractError> {
        self.draw(frame)
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        self.out
            .flush()
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(sink = %self.name, "ConsoleSink closed");
        self.flush().await
    }
}
