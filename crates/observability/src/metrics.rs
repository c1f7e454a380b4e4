//! 实时同步指标收集模块
//!
//! Prometheus 指标记录函数，以及会话级的内存统计。

use std::collections::BTreeMap;
use std::fmt;

use contracts::DisplayFrame;
use metrics::{counter, gauge, histogram};

fn status_label(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}

/// 记录一次 `fetchLatest` 轮询结果及耗时
pub fn record_poll(success: bool, latency_ms: f64) {
    counter!("pv_monitor_polls_total", "status" => status_label(success)).increment(1);
    histogram!("pv_monitor_poll_latency_ms").record(latency_ms);
}

/// 记录窗口合并 (`mode`: replace / append / noop)
pub fn record_merge(mode: &'static str, window_len: usize) {
    counter!("pv_monitor_merges_total", "mode" => mode).increment(1);
    gauge!("pv_monitor_window_len").set(window_len as f64);
}

/// 记录被丢弃的迟到结果 (`reason`: disposed / loop_stopped / stale)
pub fn record_discard(reason: &'static str) {
    counter!("pv_monitor_results_discarded_total", "reason" => reason).increment(1);
}

/// 记录 start / stop 控制操作
pub fn record_control_action(action: &'static str, success: bool) {
    counter!(
        "pv_monitor_control_actions_total",
        "action" => action,
        "status" => status_label(success)
    )
    .increment(1);
}

/// 记录状态读取 (`origin`: startup / refresh / reconcile)
pub fn record_status_read(origin: &'static str, success: bool) {
    counter!(
        "pv_monitor_status_reads_total",
        "origin" => origin,
        "status" => status_label(success)
    )
    .increment(1);
}

/// 当前运行状态 (1 = Running)
pub fn record_running(running: bool) {
    gauge!("pv_monitor_running").set(if running { 1.0 } else { 0.0 });
}

/// 记录引擎输出的显示帧
pub fn record_frame_emitted(revision: u64) {
    counter!("pv_monitor_frames_emitted_total").increment(1);
    gauge!("pv_monitor_last_revision").set(revision as f64);
}

/// 记录显示帧分发
pub fn record_frame_dispatched(sink_name: &str, success: bool) {
    counter!(
        "pv_monitor_frames_dispatched_total",
        "sink" => sink_name.to_string(),
        "status" => status_label(success)
    )
    .increment(1);
}

/// 会话指标聚合器
///
/// 在内存中聚合一次监控会话的统计，退出时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct SessionMetricsAggregator {
    /// 收到的显示帧数
    pub frames: u64,
    /// 带错误信息的帧数
    pub frames_with_error: u64,
    /// 成功轮询次数
    pub polls_ok: u64,
    /// 失败轮询次数
    pub polls_failed: u64,
    /// 按原因统计的丢弃结果
    pub discarded: BTreeMap<&'static str, u64>,
    /// 轮询耗时 (ms)
    pub poll_latency: RunningStats,
    /// 窗口长度
    pub window_len: RunningStats,
    /// 最新样本的净功率 (kW)
    pub latest_net: RunningStats,
}

impl SessionMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新帧统计
    pub fn update_frame(&mut self, frame: &DisplayFrame) {
        self.frames += 1;
        if frame.last_error.is_some() {
            self.frames_with_error += 1;
        }
        self.window_len.push(frame.window.len() as f64);
        if let Some(latest) = frame.latest() {
            self.latest_net.push(latest.net);
        }
    }

    /// 更新轮询统计
    pub fn update_poll(&mut self, success: bool, latency_ms: f64) {
        if success {
            self.polls_ok += 1;
        } else {
            self.polls_failed += 1;
        }
        self.poll_latency.push(latency_ms);
    }

    pub fn update_discard(&mut self, reason: &'static str) {
        *self.discarded.entry(reason).or_insert(0) += 1;
    }

    /// 生成摘要报告
    pub fn summary(&self) -> SessionSummary {
        let polls = self.polls_ok + self.polls_failed;
        SessionSummary {
            frames: self.frames,
            frames_with_error: self.frames_with_error,
            polls,
            poll_failure_rate: if polls > 0 {
                self.polls_failed as f64 / polls as f64 * 100.0
            } else {
                0.0
            },
            discarded: self.discarded.clone(),
            poll_latency_ms: StatsSummary::from(&self.poll_latency),
            window_len: StatsSummary::from(&self.window_len),
            latest_net_kw: StatsSummary::from(&self.latest_net),
        }
    }
}

/// 会话摘要
#[derive(Debug, Clone, Default)]
pub struct SessionSummary {
    pub frames: u64,
    pub frames_with_error: u64,
    pub polls: u64,
    pub poll_failure_rate: f64,
    pub discarded: BTreeMap<&'static str, u64>,
    pub poll_latency_ms: StatsSummary,
    pub window_len: StatsSummary,
    pub latest_net_kw: StatsSummary,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Session Metrics Summary ===")?;
        writeln!(
            f,
            "Frames: {} ({} with error)",
            self.frames, self.frames_with_error
        )?;
        writeln!(
            f,
            "Polls: {} ({:.2}% failed)",
            self.polls, self.poll_failure_rate
        )?;
        writeln!(f, "Poll latency (ms): {}", self.poll_latency_ms)?;
        writeln!(f, "Window length: {}", self.window_len)?;
        writeln!(f, "Latest net (kW): {}", self.latest_net_kw)?;

        if !self.discarded.is_empty() {
            writeln!(f, "Discarded results:")?;
            for (reason, count) in &self.discarded {
                writeln!(f, "  {reason}: {count}")?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            return write!(f, "N/A");
        }
        write!(
            f,
            "min={:.2}, max={:.2}, mean={:.2}, std={:.2} (n={})",
            self.min, self.max, self.mean, self.std_dev, self.count
        )
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
