//! # Dispatcher
//!
//! 显示帧分发模块。
//!
//! 负责：
//! - 消费引擎输出的 `DisplayFrame`
//! - Fan-out 到多个显示 sink（日志 / 终端 / 快照文件）
//! - 每个 sink 只保留最新一帧：慢 sink 跳过中间帧，不阻塞同步引擎

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;
mod slot;

pub use contracts::{DisplayFrame, DisplaySink};
pub use dispatcher::{open_sink, Dispatcher};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{ConsoleSink, FileSink, LogSink};
