//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 模拟后端 e2e 测试：MockGateway -> LiveSync -> Dispatcher -> sink
//! - 停止 / 销毁时迟到结果丢弃

#[cfg(test)]
mod contract_tests {
    use contracts::{MonitorConfig, DEFAULT_POLL_INTERVAL_MS, DEFAULT_WINDOW_CAPACITY};

    #[test]
    fn test_contract_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.version, contracts::ConfigVersion::V1);
        assert_eq!(config.sync.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(config.sync.window_capacity, DEFAULT_WINDOW_CAPACITY);
        assert!(config_loader::ConfigLoader::validate(&config).is_ok());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use contracts::{
        ContractError, DisplayFrame, DisplaySink, GatewayOp, RunState, Sample, SyncConfig,
    };
    use dispatcher::{Dispatcher, MetricsSnapshot, SinkHandle};
    use gateway::{MockGateway, MockGatewayConfig};
    use sync_engine::{EngineHandle, LiveSync, SessionReport, STOP_FAILED};
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;
    use tokio::time::sleep;

    /// Sink that keeps every frame it renders
    struct RecordingSink {
        name: String,
        frames: Arc<Mutex<Vec<DisplayFrame>>>,
    }

    impl DisplaySink for RecordingSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn render(&mut self, frame: &DisplayFrame) -> Result<(), ContractError> {
            self.frames.lock().unwrap().push(frame.clone());
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    fn ts(i: usize) -> String {
        format!("2026-05-01T10:{:02}:{:02}", i / 60, i % 60)
    }

    fn batch(range: std::ops::RangeInclusive<usize>) -> Vec<Sample> {
        range.map(|i| Sample::new(ts(i), 1.5, 4.0)).collect()
    }

    fn stamps(frame: &DisplayFrame) -> Vec<String> {
        frame
            .window
            .iter()
            .map(|s| s.timestamp.as_str().to_string())
            .collect()
    }

    struct Harness {
        gateway: Arc<MockGateway>,
        handle: EngineHandle,
        rendered: Arc<Mutex<Vec<DisplayFrame>>>,
        driver: JoinHandle<SessionReport>,
        dispatcher: JoinHandle<Vec<(String, MetricsSnapshot)>>,
    }

    struct Finished {
        report: SessionReport,
        rendered: Vec<DisplayFrame>,
        sinks: Vec<(String, MetricsSnapshot)>,
    }

    impl Harness {
        fn spawn(gateway: MockGateway, config: SyncConfig) -> Self {
            let gateway = Arc::new(gateway);
            let rendered = Arc::new(Mutex::new(Vec::new()));
            let sink = RecordingSink {
                name: "recorder".to_string(),
                frames: Arc::clone(&rendered),
            };

            let (frames_tx, frames_rx) = mpsc::channel(256);
            let dispatcher =
                Dispatcher::new(vec![SinkHandle::spawn(sink)], frames_rx).spawn();
            let (driver, handle) = LiveSync::new(Arc::clone(&gateway), config, frames_tx);

            Self {
                gateway,
                handle,
                rendered,
                driver: tokio::spawn(driver.run()),
                dispatcher,
            }
        }

        fn last_frame(&self) -> DisplayFrame {
            self.rendered.lock().unwrap().last().cloned().unwrap()
        }

        fn rendered_count(&self) -> usize {
            self.rendered.lock().unwrap().len()
        }

        async fn finish(self) -> Finished {
            self.handle.dispose().await.unwrap();
            let report = self.driver.await.unwrap();
            let sinks = self.dispatcher.await.unwrap();
            let rendered = self.rendered.lock().unwrap().clone();
            Finished {
                report,
                rendered,
                sinks,
            }
        }
    }

    async fn settle() {
        sleep(Duration::from_millis(10)).await;
    }

    fn running_with(series: Vec<Sample>) -> MockGateway {
        MockGateway::with_config(MockGatewayConfig {
            running: true,
            series,
            ..Default::default()
        })
    }

    /// A: 空窗口 + 3 个样本 -> 整体替换
    #[tokio::test(start_paused = true)]
    async fn test_first_batch_fills_empty_window() {
        let gateway = running_with(Vec::new());
        gateway.script_latest(batch(1..=3));
        let h = Harness::spawn(gateway, SyncConfig::default());

        sleep(Duration::from_millis(2100)).await;
        let frame = h.last_frame();
        assert_eq!(stamps(&frame), vec![ts(1), ts(2), ts(3)]);
        assert!(frame.running);
        assert_eq!(frame.last_error, None);

        let done = h.finish().await;
        assert_eq!(done.report.window_len, 3);
        // 初始加载（空）+ 首次轮询
        assert_eq!(done.report.engine.merges_replaced, 2);
    }

    /// B: 满窗口 + 52 个样本 -> 追加 t51, t52 并淘汰最旧的两个
    #[tokio::test(start_paused = true)]
    async fn test_tail_batch_appends_and_evicts() {
        let gateway = running_with(batch(1..=50));
        gateway.script_latest(batch(1..=52));
        let h = Harness::spawn(gateway, SyncConfig::default());

        settle().await;
        assert_eq!(h.last_frame().window.len(), 50);

        sleep(Duration::from_millis(2100)).await;
        let frame = h.last_frame();
        assert_eq!(frame.window.len(), 50);
        assert_eq!(stamps(&frame), batch(3..=52).iter().map(|s| s.timestamp.to_string()).collect::<Vec<_>>());

        let done = h.finish().await;
        assert_eq!(done.report.engine.merges_appended, 1);
    }

    /// C: 没有比游标更新的样本 -> 窗口不变，也不重绘
    #[tokio::test(start_paused = true)]
    async fn test_repeated_tail_leaves_window_unchanged() {
        let h = Harness::spawn(running_with(batch(1..=50)), SyncConfig::default());

        settle().await;
        let before = h.last_frame();
        let rendered_before = h.rendered_count();

        sleep(Duration::from_millis(4100)).await;
        assert_eq!(h.gateway.call_count(GatewayOp::FetchLatest), 2);
        assert_eq!(h.rendered_count(), rendered_before);
        assert_eq!(h.last_frame(), before);

        let done = h.finish().await;
        assert_eq!(done.report.engine.merges_unchanged, 2);
        assert_eq!(done.report.engine.polls_ok, 2);
    }

    /// D: Stopped 时 start 成功 -> Running，开始轮询，清除错误
    #[tokio::test(start_paused = true)]
    async fn test_start_activates_polling_and_clears_error() {
        let gateway = MockGateway::new();
        gateway.fail_next(GatewayOp::FetchAll, 1);
        let h = Harness::spawn(gateway, SyncConfig::default());

        settle().await;
        let frame = h.last_frame();
        assert!(!frame.running);
        assert_eq!(frame.last_error.as_deref(), Some(sync_engine::LOAD_FAILED));

        sleep(Duration::from_millis(4000)).await;
        assert_eq!(h.gateway.call_count(GatewayOp::FetchLatest), 0);

        h.handle.start().await.unwrap();
        settle().await;
        let frame = h.last_frame();
        assert!(frame.running);
        assert_eq!(frame.last_error, None);
        assert!(h.handle.is_running());

        sleep(Duration::from_millis(2000)).await;
        assert_eq!(h.gateway.call_count(GatewayOp::FetchLatest), 1);

        let done = h.finish().await;
        assert_eq!(done.report.final_state, RunState::Running);
    }

    /// E: stop 失败 -> 立即停止轮询，设置错误，随后按后端真实状态对账
    #[tokio::test(start_paused = true)]
    async fn test_failed_stop_reconciles_with_backend() {
        let gateway = running_with(batch(1..=3));
        gateway.set_delay(GatewayOp::Stop, Duration::from_millis(3000));
        gateway.fail_next(GatewayOp::Stop, 1);
        let h = Harness::spawn(gateway, SyncConfig::default());

        sleep(Duration::from_millis(2100)).await;
        assert_eq!(h.gateway.call_count(GatewayOp::FetchLatest), 1);

        h.handle.stop().await.unwrap();
        // stop 仍未返回，tick 4000ms 不应发出
        sleep(Duration::from_millis(2900)).await;
        assert_eq!(h.gateway.call_count(GatewayOp::FetchLatest), 1);

        sleep(Duration::from_millis(200)).await;
        let frame = h.last_frame();
        assert_eq!(frame.last_error.as_deref(), Some(STOP_FAILED));
        assert!(frame.running);
        assert_eq!(h.gateway.call_count(GatewayOp::Status), 2);

        // 后端仍在运行，轮询恢复；成功的轮询取代 stop 错误
        sleep(Duration::from_millis(2000)).await;
        assert_eq!(h.gateway.call_count(GatewayOp::FetchLatest), 2);
        assert_eq!(h.last_frame().last_error, None);

        let done = h.finish().await;
        assert_eq!(done.report.final_state, RunState::Running);
        assert_eq!(done.report.engine.reconciliations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_stop_after_backend_stopped() {
        let gateway = running_with(batch(1..=3));
        let h = Harness::spawn(gateway, SyncConfig::default());
        settle().await;

        // 后端其实已停止，但 stop 应答丢失
        h.gateway.set_running(false);
        h.gateway.fail_next(GatewayOp::Stop, 1);
        h.handle.stop().await.unwrap();
        settle().await;

        let frame = h.last_frame();
        assert!(!frame.running);
        assert_eq!(frame.last_error.as_deref(), Some(STOP_FAILED));
        assert!(!h.handle.is_running());

        sleep(Duration::from_millis(6000)).await;
        assert_eq!(h.gateway.call_count(GatewayOp::FetchLatest), 0);

        let done = h.finish().await;
        assert_eq!(done.report.final_state, RunState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_poll_discarded_after_stop() {
        let gateway = running_with(batch(1..=3));
        gateway.set_delay(GatewayOp::FetchLatest, Duration::from_millis(1500));
        let h = Harness::spawn(gateway, SyncConfig::default());

        sleep(Duration::from_millis(2100)).await;
        h.gateway.record(Sample::new(ts(4), 9.0, 1.0));
        h.handle.stop().await.unwrap();
        sleep(Duration::from_millis(5000)).await;

        let frame = h.last_frame();
        assert!(!frame.running);
        assert_eq!(stamps(&frame), vec![ts(1), ts(2), ts(3)]);
        assert_eq!(h.gateway.call_count(GatewayOp::FetchLatest), 1);

        let done = h.finish().await;
        assert_eq!(done.report.engine.discarded.get("loop_stopped"), Some(&1));
        assert!(done
            .rendered
            .iter()
            .all(|f| f.window.iter().all(|s| s.timestamp.as_str() != ts(4))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_drops_pending_results_and_drains_sinks() {
        let gateway = running_with(batch(1..=3));
        gateway.set_delay(GatewayOp::FetchLatest, Duration::from_millis(1500));
        let h = Harness::spawn(gateway, SyncConfig::default());

        sleep(Duration::from_millis(2100)).await;
        h.gateway.record(Sample::new(ts(4), 9.0, 1.0));
        let gateway = Arc::clone(&h.gateway);

        let done = h.finish().await;
        sleep(Duration::from_millis(5000)).await;

        assert_eq!(gateway.call_count(GatewayOp::FetchLatest), 1);
        assert_eq!(done.report.window_len, 3);
        let last = done.rendered.last().unwrap();
        assert_eq!(last.window.len(), 3);

        let (name, metrics) = &done.sinks[0];
        assert_eq!(name, "recorder");
        assert_eq!(metrics.render_count as usize, done.rendered.len());
        assert_eq!(metrics.failure_count, 0);
        assert_eq!(metrics.last_revision, last.revision);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_invariant_over_long_session() {
        let config = SyncConfig {
            window_capacity: 10,
            ..Default::default()
        };
        let h = Harness::spawn(running_with(Vec::new()), config);

        // 与轮询 tick 错开半个周期
        sleep(Duration::from_millis(500)).await;
        for i in 1..=40 {
            h.gateway.record(Sample::new(ts(i), 1.0, 2.0));
            sleep(Duration::from_millis(1000)).await;
        }

        let done = h.finish().await;
        for frame in &done.rendered {
            assert!(frame.window.len() <= 10);
            assert!(frame
                .window
                .windows(2)
                .all(|w| w[0].timestamp < w[1].timestamp));
        }
        let last = done.rendered.last().unwrap();
        assert_eq!(last.latest().unwrap().timestamp.as_str(), ts(40));
    }
}

#[cfg(test)]
mod config_driven_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{GatewayOp, Sample};
    use dispatcher::Dispatcher;
    use gateway::{MockGateway, MockGatewayConfig};
    use sync_engine::LiveSync;
    use tokio::sync::mpsc;

    /// 配置文件 -> dispatcher(log + file) -> 快照文件
    #[tokio::test(start_paused = true)]
    async fn test_session_from_toml_config() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("frame.json");
        let toml = format!(
            r#"
[backend]
base_url = "http://127.0.0.1:5000"

[sync]
poll_interval_ms = 500
window_capacity = 5

[[sinks]]
name = "log"
sink_type = "log"

[[sinks]]
name = "snapshot"
sink_type = "file"
[sinks.params]
path = "{}"
"#,
            snapshot.display()
        );
        let config = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();

        let gateway = Arc::new(MockGateway::with_config(MockGatewayConfig {
            running: true,
            ..Default::default()
        }));
        let (frames_tx, frames_rx) = mpsc::channel(64);
        let dispatcher = Dispatcher::from_config(&config.sinks, frames_rx)
            .await
            .unwrap()
            .spawn();
        let (driver, handle) = LiveSync::new(Arc::clone(&gateway), config.sync.clone(), frames_tx);
        let driver = tokio::spawn(driver.run());

        tokio::time::sleep(Duration::from_millis(250)).await;
        for i in 0..8 {
            gateway.record(Sample::new(format!("2026-05-01T09:00:{i:02}"), 2.0, 3.0));
            tokio::time::sleep(Duration::from_millis(500)).await;
        }

        handle.dispose().await.unwrap();
        let report = driver.await.unwrap();
        let sinks = dispatcher.await.unwrap();

        assert!(gateway.call_count(GatewayOp::FetchLatest) >= 7);
        assert_eq!(report.window_len, 5);
        assert_eq!(sinks.len(), 2);

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&snapshot).unwrap()).unwrap();
        assert_eq!(value["window"].as_array().unwrap().len(), 5);
        assert_eq!(value["running"], true);
        assert_eq!(value["latest"]["timestamp"], "2026-05-01T09:00:07");
    }
}
