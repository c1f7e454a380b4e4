//! Mock 后端网关
//!
//! 内存中的模拟后端，用于单元测试和无后端运行，支持注入失败、延迟和脚本化响应。

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::{
    BackendGateway, ControlAck, GatewayOp, Sample, StatusReport, TransportError,
    TransportErrorKind,
};
use tokio::time::Instant;
use tracing::{debug, instrument};

/// `GET /results/latest` cap used by the real backend
pub const DEFAULT_LATEST_LIMIT: usize = 50;

/// Mock 网关配置
#[derive(Debug, Clone)]
pub struct MockGatewayConfig {
    /// 初始运行状态
    pub running: bool,
    /// 初始数据序列
    pub series: Vec<Sample>,
    /// `fetch_latest` 返回的最大条数
    pub latest_limit: usize,
}

impl Default for MockGatewayConfig {
    fn default() -> Self {
        Self {
            running: false,
            series: Vec::new(),
            latest_limit: DEFAULT_LATEST_LIMIT,
        }
    }
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    /// `None` = fail until cleared
    remaining: Option<u32>,
    kind: TransportErrorKind,
}

#[derive(Debug)]
struct MockState {
    running: bool,
    started_at: Option<Instant>,
    series: Vec<Sample>,
    latest_limit: usize,
    scripted_latest: VecDeque<Vec<Sample>>,
    failures: HashMap<GatewayOp, InjectedFailure>,
    delays: HashMap<GatewayOp, Duration>,
    calls: Vec<GatewayOp>,
}

impl MockState {
    /// Consume one injected failure for `op`, if armed
    fn take_failure(&mut self, op: GatewayOp) -> Option<TransportError> {
        let failure = self.failures.get_mut(&op)?;
        let kind = failure.kind.clone();
        let exhausted = match failure.remaining.as_mut() {
            Some(n) => {
                *n = n.saturating_sub(1);
                *n == 0
            }
            None => false,
        };
        if exhausted {
            self.failures.remove(&op);
        }
        Some(TransportError::new(op, kind, "injected failure"))
    }

    fn latest(&mut self) -> Vec<Sample> {
        if let Some(batch) = self.scripted_latest.pop_front() {
            return batch;
        }
        let skip = self.series.len().saturating_sub(self.latest_limit);
        self.series[skip..].to_vec()
    }
}

/// Mock 后端网关
///
/// Behaves like the simulation backend: start/stop toggle a run flag, samples appended with
/// [`MockGateway::record`] are served by `fetch_all` and (capped) by `fetch_latest`.
#[derive(Debug)]
pub struct MockGateway {
    state: Mutex<MockState>,
}

impl MockGateway {
    /// 创建默认 mock 网关（已停止、无数据）
    pub fn new() -> Self {
        Self::with_config(MockGatewayConfig::default())
    }

    /// 使用配置创建 mock 网关
    pub fn with_config(config: MockGatewayConfig) -> Self {
        Self {
            state: Mutex::new(MockState {
                running: config.running,
                started_at: config.running.then(Instant::now),
                series: config.series,
                latest_limit: config.latest_limit,
                scripted_latest: VecDeque::new(),
                failures: HashMap::new(),
                delays: HashMap::new(),
                calls: Vec::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Flip the run flag behind the client's back (another operator, a crash...)
    pub fn set_running(&self, running: bool) {
        let mut state = self.state();
        state.running = running;
        state.started_at = running.then(Instant::now);
    }

    pub fn is_running(&self) -> bool {
        self.state().running
    }

    /// Append one sample to the backend series
    pub fn record(&self, sample: Sample) {
        self.state().series.push(sample);
    }

    /// Append several samples to the backend series
    pub fn extend(&self, samples: impl IntoIterator<Item = Sample>) {
        self.state().series.extend(samples);
    }

    pub fn series_len(&self) -> usize {
        self.state().series.len()
    }

    /// Serve `batch` verbatim on the next `fetch_latest` (queued in order)
    pub fn script_latest(&self, batch: Vec<Sample>) {
        self.state().scripted_latest.push_back(batch);
    }

    /// Fail the next `times` calls of `op` with a 500
    pub fn fail_next(&self, op: GatewayOp, times: u32) {
        if times == 0 {
            return;
        }
        self.fail_with(op, Some(times), TransportErrorKind::Status(500));
    }

    /// Fail every call of `op` until [`MockGateway::clear_failure`]
    pub fn fail_always(&self, op: GatewayOp, kind: TransportErrorKind) {
        self.fail_with(op, None, kind);
    }

    fn fail_with(&self, op: GatewayOp, remaining: Option<u32>, kind: TransportErrorKind) {
        self.state()
            .failures
            .insert(op, InjectedFailure { remaining, kind });
    }

    pub fn clear_failure(&self, op: GatewayOp) {
        self.state().failures.remove(&op);
    }

    /// Delay every response to `op` (honours a paused tokio clock)
    pub fn set_delay(&self, op: GatewayOp, delay: Duration) {
        self.state().delays.insert(op, delay);
    }

    /// Calls received so far, in arrival order
    pub fn calls(&self) -> Vec<GatewayOp> {
        self.state().calls.clone()
    }

    pub fn call_count(&self, op: GatewayOp) -> usize {
        self.state().calls.iter().filter(|c| **c == op).count()
    }

    /// Log the call and wait out its configured delay
    async fn arrive(&self, op: GatewayOp) {
        let delay = {
            let mut state = self.state();
            state.calls.push(op);
            state.delays.get(&op).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendGateway for MockGateway {
    fn endpoint(&self) -> &str {
        "mock://backend"
    }

    #[instrument(name = "mock_gateway_start", skip(self))]
    async fn start(&self) -> Result<ControlAck, TransportError> {
        self.arrive(GatewayOp::Start).await;
        let mut state = self.state();
        if let Some(err) = state.take_failure(GatewayOp::Start) {
            return Err(err);
        }
        let status = if state.running {
            "already running"
        } else {
            state.running = true;
            state.started_at = Some(Instant::now());
            "started"
        };
        debug!(status, "Mock simulation start");
        Ok(ControlAck {
            status: status.to_string(),
            running: true,
        })
    }

    #[instrument(name = "mock_gateway_stop", skip(self))]
    async fn stop(&self) -> Result<ControlAck, TransportError> {
        self.arrive(GatewayOp::Stop).await;
        let mut state = self.state();
        if let Some(err) = state.take_failure(GatewayOp::Stop) {
            return Err(err);
        }
        state.running = false;
        state.started_at = None;
        debug!("Mock simulation stop");
        Ok(ControlAck {
            status: "stopped".to_string(),
            running: false,
        })
    }

    async fn status(&self) -> Result<StatusReport, TransportError> {
        self.arrive(GatewayOp::Status).await;
        let mut state = self.state();
        if let Some(err) = state.take_failure(GatewayOp::Status) {
            return Err(err);
        }
        Ok(StatusReport {
            running: state.running,
            uptime: state.started_at.map(|t| t.elapsed().as_secs()),
        })
    }

    async fn fetch_all(&self) -> Result<Vec<Sample>, TransportError> {
        self.arrive(GatewayOp::FetchAll).await;
        let mut state = self.state();
        if let Some(err) = state.take_failure(GatewayOp::FetchAll) {
            return Err(err);
        }
        Ok(state.series.clone())
    }

    async fn fetch_latest(&self) -> Result<Vec<Sample>, TransportError> {
        self.arrive(GatewayOp::FetchLatest).await;
        let mut state = self.state();
        if let Some(err) = state.take_failure(GatewayOp::FetchLatest) {
            return Err(err);
        }
        Ok(state.latest())
    }
}
