//! # Sync Engine
//!
//! 实时同步引擎：运行状态、轮询循环与窗口合并。
//!
//! 负责：
//! - Stopped/Running 状态机，并与后端状态对账
//! - 运行期间按固定周期轮询 `fetchLatest`，迟到结果丢弃
//! - 将新样本合并进有界、有序、无重复的显示窗口
//! - 输出 `DisplayFrame`
//!
//! ## 使用示例
//!
//! ```ignore
//! use std::sync::Arc;
//! use sync_engine::LiveSync;
//!
//! let (frames_tx, mut frames_rx) = tokio::sync::mpsc::channel(16);
//! let (driver, handle) = LiveSync::new(Arc::new(gateway), config.sync.clone(), frames_tx);
//! let task = tokio::spawn(driver.run());
//!
//! handle.start().await?;
//! while let Some(frame) = frames_rx.recv().await {
//!     // Redraw
//! }
//! ```

mod engine;
mod poller;
mod runtime;
mod window;

pub use engine::{
    ActionId, Effects, EngineStats, GatewayCall, GatewayReply, StatusOrigin, SyncEngine,
    LOAD_FAILED, POLL_FAILED, START_FAILED, STATUS_FAILED, STOP_FAILED,
};
pub use poller::{Discard, PollLoop, PollTicket};
pub use runtime::{
    EngineCommand, EngineError, EngineHandle, LiveSync, RunningBus, SessionReport,
};
pub use window::{MergeOutcome, SampleWindow};

// Re-export contracts types
pub use contracts::{DisplayFrame, RunState, Sample, SyncConfig};
