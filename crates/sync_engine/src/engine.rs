//! Sync engine state machine.
//!
//! Sans-IO: every event returns [`Effects`] describing the gateway calls to issue, and gateway
//! results come back through [`SyncEngine::on_reply`]. All mutation of the window, cursor,
//! run state and last error happens here, on whichever task owns the engine.

use std::collections::BTreeMap;

use contracts::{
    ControlAck, DisplayFrame, GatewayOp, RunState, Sample, StatusReport, SyncConfig,
    TransportError,
};
use tracing::{debug, info, instrument, warn};

use crate::poller::{PollLoop, PollTicket};
use crate::window::{MergeOutcome, SampleWindow};

pub const START_FAILED: &str =
    "Failed to start simulation. Please check if the backend is running.";
pub const STOP_FAILED: &str = "Failed to stop simulation.";
pub const POLL_FAILED: &str = "Failed to fetch data from backend.";
pub const LOAD_FAILED: &str = "Failed to load data from backend.";
pub const STATUS_FAILED: &str = "Failed to check simulation status.";

/// Identifies one start/stop request; only the latest one's ack is applied
pub type ActionId = u64;

/// Why a status read was issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusOrigin {
    /// Once, when the engine starts
    Startup,
    /// Periodic out-of-band check
    Refresh,
    /// After a failed start/stop
    Reconcile,
}

impl StatusOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusOrigin::Startup => "startup",
            StatusOrigin::Refresh => "refresh",
            StatusOrigin::Reconcile => "reconcile",
        }
    }
}

/// Gateway call requested by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    FetchAll,
    FetchLatest(PollTicket),
    Start(ActionId),
    Stop(ActionId),
    /// `generation` is the engine's state generation at issue time
    Status {
        origin: StatusOrigin,
        generation: u64,
    },
}

impl GatewayCall {
    pub fn op(&self) -> GatewayOp {
        match self {
            GatewayCall::FetchAll => GatewayOp::FetchAll,
            GatewayCall::FetchLatest(_) => GatewayOp::FetchLatest,
            GatewayCall::Start(_) => GatewayOp::Start,
            GatewayCall::Stop(_) => GatewayOp::Stop,
            GatewayCall::Status { .. } => GatewayOp::Status,
        }
    }
}

/// Completed gateway call, tagged like the call that produced it
#[derive(Debug, Clone)]
pub enum GatewayReply {
    FetchAll(Result<Vec<Sample>, TransportError>),
    FetchLatest(PollTicket, Result<Vec<Sample>, TransportError>),
    Start(ActionId, Result<ControlAck, TransportError>),
    Stop(ActionId, Result<ControlAck, TransportError>),
    Status {
        origin: StatusOrigin,
        generation: u64,
        result: Result<StatusReport, TransportError>,
    },
}

/// What the owner of the engine must do after an event
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Effects {
    /// Gateway calls to issue, in order
    pub calls: Vec<GatewayCall>,
    /// Value to emit on the runningChanged stream
    pub publish: Option<bool>,
    /// Schedule [`SyncEngine::on_reconcile_due`] for this action after one poll period
    pub retry_reconcile: Option<ActionId>,
    /// A result was dropped (metric label)
    pub discarded: Option<&'static str>,
}

impl Effects {
    fn call(call: GatewayCall) -> Self {
        Self {
            calls: vec![call],
            ..Default::default()
        }
    }

    fn publish(running: bool) -> Self {
        Self {
            publish: Some(running),
            ..Default::default()
        }
    }

    fn discarded(reason: &'static str) -> Self {
        Self {
            discarded: Some(reason),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorSite {
    Start,
    Stop,
    Status,
    Poll,
    InitialLoad,
}

#[derive(Debug, Clone, Copy)]
struct LastError {
    site: ErrorSite,
    message: &'static str,
}

/// Engine counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub polls_ok: u64,
    pub polls_failed: u64,
    pub merges_replaced: u64,
    pub merges_appended: u64,
    pub merges_unchanged: u64,
    pub reconciliations: u64,
    /// Ticks that found the previous fetch still outstanding
    pub ticks_skipped: u64,
    pub frames: u64,
    pub discarded: BTreeMap<&'static str, u64>,
}

impl EngineStats {
    fn count_merge(&mut self, outcome: MergeOutcome) {
        match outcome {
            MergeOutcome::Unchanged => self.merges_unchanged += 1,
            MergeOutcome::Replaced { .. } => self.merges_replaced += 1,
            MergeOutcome::Appended { .. } => self.merges_appended += 1,
        }
    }

    pub fn total_discarded(&self) -> u64 {
        self.discarded.values().sum()
    }
}

/// Live synchronization engine
#[derive(Debug)]
pub struct SyncEngine {
    config: SyncConfig,
    window: SampleWindow,
    poll: PollLoop,
    run_state: RunState,
    last_error: Option<LastError>,
    /// Latest start/stop request
    action: ActionId,
    /// Bumped by every control request and every applied control ack
    generation: u64,
    /// Set while a stop is unresolved; polling must not resume underneath it
    stop_guard: Option<ActionId>,
    initial_load_done: bool,
    disposed: bool,
    dirty: bool,
    revision: u64,
    stats: EngineStats,
}

impl SyncEngine {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            window: SampleWindow::new(config.window_capacity),
            config,
            poll: PollLoop::new(),
            run_state: RunState::Stopped,
            last_error: None,
            action: 0,
            generation: 0,
            stop_guard: None,
            initial_load_done: false,
            disposed: false,
            dirty: true,
            revision: 0,
            stats: EngineStats::default(),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn is_polling(&self) -> bool {
        self.poll.is_active()
    }

    /// Changes whenever the polling loop is (re)activated
    pub fn poll_epoch(&self) -> u64 {
        self.poll.epoch()
    }

    pub fn window(&self) -> &SampleWindow {
        &self.window
    }

    pub fn last_error(&self) -> Option<&'static str> {
        self.last_error.map(|e| e.message)
    }

    pub fn initial_load_done(&self) -> bool {
        self.initial_load_done
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Initial full load plus one status read
    #[instrument(name = "engine_startup", skip(self), fields(capacity = self.config.window_capacity))]
    pub fn startup(&mut self) -> Effects {
        if self.disposed {
            return Effects::default();
        }
        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            "Sync engine starting"
        );
        Effects {
            calls: vec![
                GatewayCall::FetchAll,
                self.status_call(StatusOrigin::Startup),
            ],
            ..Default::default()
        }
    }

    #[instrument(name = "engine_request_start", skip(self))]
    pub fn request_start(&mut self) -> Effects {
        if self.disposed {
            return Effects::default();
        }
        let id = self.next_action();
        self.stop_guard = None;
        info!(action = id, "Start requested");
        Effects::call(GatewayCall::Start(id))
    }

    /// Deactivates polling before the stop call goes out
    #[instrument(name = "engine_request_stop", skip(self))]
    pub fn request_stop(&mut self) -> Effects {
        if self.disposed {
            return Effects::default();
        }
        if self.poll.deactivate() {
            debug!("Polling loop deactivated ahead of stop");
        }
        let id = self.next_action();
        self.stop_guard = Some(id);
        info!(action = id, "Stop requested");
        Effects::call(GatewayCall::Stop(id))
    }

    /// Unsolicited runningChanged notification
    pub fn on_running_changed(&mut self, running: bool) -> Effects {
        if self.disposed {
            return Effects::default();
        }
        debug!(running, "runningChanged received");
        self.apply_run_state(RunState::from(running));
        Effects::default()
    }

    /// Polling period elapsed
    pub fn on_tick(&mut self) -> Effects {
        if self.disposed || !self.initial_load_done {
            return Effects::default();
        }
        if let Some(outstanding) = self.poll.in_flight() {
            self.stats.ticks_skipped += 1;
            debug!(seq = outstanding.seq(), "Previous fetch outstanding; tick skipped");
            return Effects::default();
        }
        match self.poll.issue() {
            Some(ticket) => Effects::call(GatewayCall::FetchLatest(ticket)),
            None => Effects::default(),
        }
    }

    /// Periodic status check
    pub fn on_status_refresh(&mut self) -> Effects {
        if self.disposed {
            return Effects::default();
        }
        Effects::call(self.status_call(StatusOrigin::Refresh))
    }

    /// Retry of a failed reconciliation read; ignored once a newer action exists
    pub fn on_reconcile_due(&mut self, action: ActionId) -> Effects {
        if self.disposed || action != self.action {
            debug!(action, latest = self.action, "Reconcile retry dropped");
            return Effects::default();
        }
        self.stats.reconciliations += 1;
        Effects::call(self.status_call(StatusOrigin::Reconcile))
    }

    /// Feed back a completed gateway call
    pub fn on_reply(&mut self, reply: GatewayReply) -> Effects {
        if self.disposed {
            return self.discard("disposed");
        }
        match reply {
            GatewayReply::FetchAll(result) => self.on_initial_load(result),
            GatewayReply::FetchLatest(ticket, result) => self.on_poll(ticket, result),
            GatewayReply::Start(id, result) => self.on_start_ack(id, result),
            GatewayReply::Stop(id, result) => self.on_stop_ack(id, result),
            GatewayReply::Status {
                origin,
                generation,
                result,
            } => self.on_status(origin, generation, result),
        }
    }

    /// Teardown; every later reply is discarded
    #[instrument(name = "engine_dispose", skip(self))]
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.poll.dispose();
        self.stop_guard = None;
        info!(window_len = self.window.len(), "Sync engine disposed");
    }

    /// Snapshot for display sinks, if anything visible changed since the last one
    pub fn take_frame(&mut self) -> Option<DisplayFrame> {
        if !self.dirty || self.disposed {
            return None;
        }
        self.dirty = false;
        self.revision += 1;
        self.stats.frames += 1;
        observability::record_frame_emitted(self.revision);
        Some(DisplayFrame {
            window: self.window.snapshot(),
            last_error: self.last_error().map(str::to_string),
            running: self.run_state.is_running(),
            revision: self.revision,
        })
    }
}

impl SyncEngine {
    fn next_action(&mut self) -> ActionId {
        self.action += 1;
        self.generation += 1;
        self.action
    }

    fn status_call(&self, origin: StatusOrigin) -> GatewayCall {
        GatewayCall::Status {
            origin,
            generation: self.generation,
        }
    }

    fn discard(&mut self, reason: &'static str) -> Effects {
        *self.stats.discarded.entry(reason).or_insert(0) += 1;
        observability::record_discard(reason);
        Effects::discarded(reason)
    }

    fn on_initial_load(&mut self, result: Result<Vec<Sample>, TransportError>) -> Effects {
        if self.initial_load_done {
            return self.discard("stale");
        }
        self.initial_load_done = true;
        self.dirty = true;

        match result {
            Ok(batch) => {
                let received = batch.len();
                let outcome = self.window.replace(batch);
                self.stats.count_merge(outcome);
                observability::record_merge(outcome.mode(), self.window.len());
                info!(received, kept = self.window.len(), "Initial load complete");
                self.clear_error(ErrorSite::InitialLoad);
            }
            Err(err) => {
                warn!(error = %err, "Initial load failed");
                self.set_error(ErrorSite::InitialLoad, LOAD_FAILED);
            }
        }
        Effects::default()
    }

    fn on_poll(
        &mut self,
        ticket: PollTicket,
        result: Result<Vec<Sample>, TransportError>,
    ) -> Effects {
        if let Err(reason) = self.poll.accept(ticket) {
            debug!(
                epoch = ticket.epoch(),
                seq = ticket.seq(),
                reason = reason.as_str(),
                "Poll result discarded"
            );
            return self.discard(reason.as_str());
        }

        match result {
            Ok(batch) => {
                self.stats.polls_ok += 1;
                let received = batch.len();
                let outcome = self.window.merge(batch);
                self.stats.count_merge(outcome);
                observability::record_merge(outcome.mode(), self.window.len());
                if outcome.changed() {
                    self.dirty = true;
                }
                debug!(
                    received,
                    mode = outcome.mode(),
                    window_len = self.window.len(),
                    "Poll merged"
                );
                self.clear_error(ErrorSite::Poll);
            }
            Err(err) => {
                self.stats.polls_failed += 1;
                warn!(error = %err, "Poll failed; window unchanged");
                self.set_error(ErrorSite::Poll, POLL_FAILED);
            }
        }
        Effects::default()
    }

    fn on_start_ack(&mut self, id: ActionId, result: Result<ControlAck, TransportError>) -> Effects {
        if id != self.action {
            debug!(action = id, latest = self.action, "Stale start ack");
            return self.discard("stale");
        }
        match result {
            Ok(ack) => {
                observability::record_control_action("start", true);
                info!(status = %ack.status, running = ack.running, "Start acknowledged");
                self.generation += 1;
                self.clear_error(ErrorSite::Start);
                self.apply_run_state(RunState::from(ack.running));
                Effects::publish(ack.running)
            }
            Err(err) => {
                observability::record_control_action("start", false);
                warn!(error = %err, "Start failed; reconciling with backend");
                self.set_error(ErrorSite::Start, START_FAILED);
                self.stats.reconciliations += 1;
                Effects::call(self.status_call(StatusOrigin::Reconcile))
            }
        }
    }

    fn on_stop_ack(&mut self, id: ActionId, result: Result<ControlAck, TransportError>) -> Effects {
        if id != self.action {
            debug!(action = id, latest = self.action, "Stale stop ack");
            return self.discard("stale");
        }
        match result {
            Ok(ack) => {
                observability::record_control_action("stop", true);
                info!(status = %ack.status, running = ack.running, "Stop acknowledged");
                self.generation += 1;
                self.stop_guard = None;
                self.clear_error(ErrorSite::Stop);
                self.apply_run_state(RunState::from(ack.running));
                Effects::publish(ack.running)
            }
            Err(err) => {
                observability::record_control_action("stop", false);
                warn!(error = %err, "Stop failed; polling stays off, reconciling with backend");
                self.set_error(ErrorSite::Stop, STOP_FAILED);
                self.stats.reconciliations += 1;
                Effects::call(self.status_call(StatusOrigin::Reconcile))
            }
        }
    }

    fn on_status(
        &mut self,
        origin: StatusOrigin,
        generation: u64,
        result: Result<StatusReport, TransportError>,
    ) -> Effects {
        if generation != self.generation {
            debug!(
                origin = origin.as_str(),
                generation,
                latest = self.generation,
                "Stale status read"
            );
            return self.discard("stale");
        }
        match result {
            Ok(report) => {
                observability::record_status_read(origin.as_str(), true);
                debug!(
                    origin = origin.as_str(),
                    running = report.running,
                    uptime = ?report.uptime,
                    "Status read"
                );
                if origin == StatusOrigin::Reconcile {
                    info!(running = report.running, "RunState reconciled with backend");
                    self.stop_guard = None;
                }
                self.clear_error(ErrorSite::Status);
                self.apply_run_state(RunState::from(report.running));
                Effects::publish(report.running)
            }
            Err(err) => {
                observability::record_status_read(origin.as_str(), false);
                warn!(origin = origin.as_str(), error = %err, "Status read failed");
                self.set_error(ErrorSite::Status, STATUS_FAILED);
                if origin == StatusOrigin::Reconcile {
                    Effects {
                        retry_reconcile: Some(self.action),
                        ..Default::default()
                    }
                } else {
                    Effects::default()
                }
            }
        }
    }

    /// Single write path for RunState; keeps the polling loop in step with it
    fn apply_run_state(&mut self, state: RunState) {
        if self.run_state != state {
            info!(from = ?self.run_state, to = ?state, "RunState changed");
            self.run_state = state;
            self.dirty = true;
            observability::record_running(state.is_running());
        }

        if !state.is_running() {
            if self.poll.deactivate() {
                info!("Polling loop deactivated");
            }
        } else if let Some(action) = self.stop_guard {
            debug!(action, "Stop unresolved; polling stays off");
        } else if self.poll.activate() {
            info!(epoch = self.poll.epoch(), "Polling loop activated");
        }
    }

    fn set_error(&mut self, site: ErrorSite, message: &'static str) {
        if self.last_error.map(|e| e.message) != Some(message) {
            self.dirty = true;
        }
        self.last_error = Some(LastError { site, message });
    }

    /// Status reads only clear errors raised by status reads
    fn clear_error(&mut self, site: ErrorSite) {
        let clears = match self.last_error {
            None => false,
            Some(current) => site != ErrorSite::Status || current.site == ErrorSite::Status,
        };
        if clears {
            self.last_error = None;
            self.dirty = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(i: usize) -> String {
        format!("2026-05-01T10:{:02}:{:02}", i / 60, i % 60)
    }

    fn batch(range: std::ops::RangeInclusive<usize>) -> Vec<Sample> {
        range.map(|i| Sample::new(ts(i), 2.0, 5.0)).collect()
    }

    fn refused(op: GatewayOp) -> TransportError {
        TransportError::network(op, "connection refused")
    }

    fn ack(running: bool) -> ControlAck {
        ControlAck {
            status: if running { "started" } else { "stopped" }.to_string(),
            running,
        }
    }

    fn status_generation(effects: &Effects) -> u64 {
        match effects.calls.as_slice() {
            [GatewayCall::Status { generation, .. }] => *generation,
            other => panic!("expected a single status call, got {other:?}"),
        }
    }

    fn ticket(effects: &Effects) -> PollTicket {
        match effects.calls.as_slice() {
            [GatewayCall::FetchLatest(ticket)] => *ticket,
            other => panic!("expected a single fetch_latest call, got {other:?}"),
        }
    }

    /// Engine past startup: window loaded from `initial`, run state from the startup read
    fn started(initial: Vec<Sample>, running: bool) -> SyncEngine {
        let mut engine = SyncEngine::new(SyncConfig::default());
        let effects = engine.startup();
        let generation = match effects.calls[1] {
            GatewayCall::Status { generation, .. } => generation,
            _ => unreachable!(),
        };
        engine.on_reply(GatewayReply::FetchAll(Ok(initial)));
        engine.on_reply(GatewayReply::Status {
            origin: StatusOrigin::Startup,
            generation,
            result: Ok(StatusReport {
                running,
                uptime: None,
            }),
        });
        engine
    }

    fn poll_once(engine: &mut SyncEngine, result: Result<Vec<Sample>, TransportError>) -> Effects {
        let t = ticket(&engine.on_tick());
        engine.on_reply(GatewayReply::FetchLatest(t, result))
    }

    fn window_stamps(engine: &SyncEngine) -> Vec<String> {
        engine
            .window()
            .iter()
            .map(|s| s.timestamp.to_string())
            .collect()
    }

    #[test]
    fn test_startup_issues_load_and_status_read() {
        let mut engine = SyncEngine::new(SyncConfig::default());
        let effects = engine.startup();

        assert_eq!(effects.calls.len(), 2);
        assert_eq!(effects.calls[0], GatewayCall::FetchAll);
        assert!(matches!(
            effects.calls[1],
            GatewayCall::Status {
                origin: StatusOrigin::Startup,
                ..
            }
        ));
        assert_eq!(engine.run_state(), RunState::Stopped);
    }

    #[test]
    fn test_initial_load_truncates_to_capacity() {
        let engine = started(batch(1..=70), false);

        assert_eq!(engine.window().len(), 50);
        assert_eq!(window_stamps(&engine).first(), Some(&ts(21)));
        assert_eq!(engine.window().cursor().map(|c| c.to_string()), Some(ts(70)));
    }

    #[test]
    fn test_initial_load_failure_sets_error_only() {
        let mut engine = SyncEngine::new(SyncConfig::default());
        engine.startup();
        engine.on_reply(GatewayReply::FetchAll(Err(refused(GatewayOp::FetchAll))));

        assert_eq!(engine.last_error(), Some(LOAD_FAILED));
        assert!(engine.initial_load_done());
        assert_eq!(engine.run_state(), RunState::Stopped);
        assert!(engine.window().is_empty());
    }

    #[test]
    fn test_initial_load_failure_keeps_polling_when_running() {
        let mut engine = SyncEngine::new(SyncConfig::default());
        let generation = match engine.startup().calls[1] {
            GatewayCall::Status { generation, .. } => generation,
            _ => unreachable!(),
        };
        engine.on_reply(GatewayReply::FetchAll(Err(refused(GatewayOp::FetchAll))));
        engine.on_reply(GatewayReply::Status {
            origin: StatusOrigin::Startup,
            generation,
            result: Ok(StatusReport {
                running: true,
                uptime: None,
            }),
        });

        assert!(engine.is_polling());
        assert_eq!(engine.last_error(), Some(LOAD_FAILED));

        poll_once(&mut engine, Ok(batch(1..=3)));
        assert_eq!(engine.window().len(), 3);
        assert_eq!(engine.last_error(), None);
    }

    #[test]
    fn test_startup_status_running_activates_polling() {
        let engine = started(Vec::new(), true);

        assert_eq!(engine.run_state(), RunState::Running);
        assert!(engine.is_polling());
    }

    #[test]
    fn test_ticks_wait_for_initial_load() {
        let mut engine = SyncEngine::new(SyncConfig::default());
        engine.startup();
        engine.on_running_changed(true);

        assert!(engine.on_tick().is_empty());

        engine.on_reply(GatewayReply::FetchAll(Ok(Vec::new())));
        assert_eq!(engine.on_tick().calls.len(), 1);
    }

    #[test]
    fn test_stopped_engine_does_not_poll() {
        let mut engine = started(Vec::new(), false);
        assert!(engine.on_tick().is_empty());
    }

    #[test]
    fn test_scenario_a_first_batch_fills_window() {
        let mut engine = started(Vec::new(), true);
        poll_once(&mut engine, Ok(batch(1..=3)));

        assert_eq!(window_stamps(&engine), vec![ts(1), ts(2), ts(3)]);
        assert_eq!(engine.window().cursor().map(|c| c.to_string()), Some(ts(3)));
    }

    #[test]
    fn test_scenario_b_tail_batch_appends_and_truncates() {
        let mut engine = started(batch(1..=50), true);
        poll_once(&mut engine, Ok(batch(1..=52)));

        let stamps = window_stamps(&engine);
        assert_eq!(stamps.len(), 50);
        assert_eq!(stamps.first(), Some(&ts(3)));
        assert_eq!(stamps.last(), Some(&ts(52)));
    }

    #[test]
    fn test_scenario_c_unchanged_tail_emits_no_frame() {
        let mut engine = started(batch(1..=50), true);
        engine.take_frame();

        poll_once(&mut engine, Ok(batch(1..=50)));

        assert_eq!(engine.window().len(), 50);
        assert!(engine.take_frame().is_none());
        assert_eq!(engine.stats().merges_unchanged, 1);
    }

    #[test]
    fn test_scenario_d_start_acknowledged_running() {
        let mut engine = started(Vec::new(), false);
        assert!(!engine.is_polling());

        let effects = engine.request_start();
        let id = match effects.calls.as_slice() {
            [GatewayCall::Start(id)] => *id,
            other => panic!("unexpected calls {other:?}"),
        };
        let effects = engine.on_reply(GatewayReply::Start(id, Ok(ack(true))));

        assert_eq!(effects.publish, Some(true));
        assert_eq!(engine.run_state(), RunState::Running);
        assert!(engine.is_polling());
        assert_eq!(engine.last_error(), None);
    }

    #[test]
    fn test_start_failure_sets_error_and_reconciles() {
        let mut engine = started(Vec::new(), false);
        let id = match engine.request_start().calls[0] {
            GatewayCall::Start(id) => id,
            _ => unreachable!(),
        };

        let effects = engine.on_reply(GatewayReply::Start(id, Err(refused(GatewayOp::Start))));

        assert_eq!(engine.last_error(), Some(START_FAILED));
        assert!(matches!(
            effects.calls.as_slice(),
            [GatewayCall::Status {
                origin: StatusOrigin::Reconcile,
                ..
            }]
        ));
    }

    #[test]
    fn test_scenario_e_failed_stop_reconciles_to_backend_truth() {
        for backend_running in [true, false] {
            let mut engine = started(batch(1..=3), true);
            let outstanding = ticket(&engine.on_tick());

            let effects = engine.request_stop();
            assert!(!engine.is_polling(), "loop must stop before the stop call");
            let id = match effects.calls.as_slice() {
                [GatewayCall::Stop(id)] => *id,
                other => panic!("unexpected calls {other:?}"),
            };

            let effects = engine.on_reply(GatewayReply::Stop(id, Err(refused(GatewayOp::Stop))));
            assert_eq!(engine.last_error(), Some(STOP_FAILED));
            assert!(!engine.is_polling());
            let generation = status_generation(&effects);

            let late = engine.on_reply(GatewayReply::FetchLatest(outstanding, Ok(batch(1..=9))));
            assert_eq!(late.discarded, Some("loop_stopped"));
            assert_eq!(engine.window().len(), 3);

            let effects = engine.on_reply(GatewayReply::Status {
                origin: StatusOrigin::Reconcile,
                generation,
                result: Ok(StatusReport {
                    running: backend_running,
                    uptime: Some(30),
                }),
            });

            assert_eq!(effects.publish, Some(backend_running));
            assert_eq!(engine.run_state(), RunState::from(backend_running));
            assert_eq!(engine.is_polling(), backend_running);
            assert_eq!(engine.last_error(), Some(STOP_FAILED));
        }
    }

    #[test]
    fn test_successful_stop_clears_error() {
        let mut engine = started(Vec::new(), true);
        poll_once(&mut engine, Err(refused(GatewayOp::FetchLatest)));
        assert_eq!(engine.last_error(), Some(POLL_FAILED));

        let id = match engine.request_stop().calls[0] {
            GatewayCall::Stop(id) => id,
            _ => unreachable!(),
        };
        let effects = engine.on_reply(GatewayReply::Stop(id, Ok(ack(false))));

        assert_eq!(effects.publish, Some(false));
        assert_eq!(engine.run_state(), RunState::Stopped);
        assert_eq!(engine.last_error(), None);
    }

    #[test]
    fn test_poll_failure_leaves_window_and_next_success_clears() {
        let mut engine = started(batch(1..=3), true);

        poll_once(&mut engine, Err(refused(GatewayOp::FetchLatest)));
        assert_eq!(engine.last_error(), Some(POLL_FAILED));
        assert_eq!(engine.window().len(), 3);
        assert!(engine.is_polling());

        poll_once(&mut engine, Ok(batch(1..=4)));
        assert_eq!(engine.last_error(), None);
        assert_eq!(engine.window().len(), 4);
    }

    #[test]
    fn test_tick_skipped_while_fetch_outstanding() {
        let mut engine = started(Vec::new(), true);
        let first = ticket(&engine.on_tick());
        assert!(engine.on_tick().is_empty());
        assert!(engine.on_tick().is_empty());
        assert_eq!(engine.stats().ticks_skipped, 2);

        let effects = engine.on_reply(GatewayReply::FetchLatest(first, Ok(batch(1..=2))));
        assert!(effects.discarded.is_none());
        assert_eq!(engine.window().len(), 2);

        let second = ticket(&engine.on_tick());
        engine.on_reply(GatewayReply::FetchLatest(second, Ok(batch(1..=3))));
        assert_eq!(engine.window().len(), 3);
    }

    #[test]
    fn test_failed_fetch_releases_next_tick() {
        let mut engine = started(Vec::new(), true);
        let first = ticket(&engine.on_tick());
        engine.on_reply(GatewayReply::FetchLatest(
            first,
            Err(TransportError::new(
                GatewayOp::FetchLatest,
                contracts::TransportErrorKind::Timeout,
                "no response within 2000 ms",
            )),
        ));
        assert_eq!(engine.last_error(), Some(POLL_FAILED));

        assert!(!engine.on_tick().is_empty());
    }

    #[test]
    fn test_stale_start_ack_ignored_after_stop_request() {
        let mut engine = started(Vec::new(), false);
        let start_id = match engine.request_start().calls[0] {
            GatewayCall::Start(id) => id,
            _ => unreachable!(),
        };
        engine.request_stop();

        let effects = engine.on_reply(GatewayReply::Start(start_id, Ok(ack(true))));

        assert_eq!(effects.discarded, Some("stale"));
        assert_eq!(engine.run_state(), RunState::Stopped);
        assert!(!engine.is_polling());
    }

    #[test]
    fn test_refresh_racing_start_ack_is_stale() {
        let mut engine = started(Vec::new(), false);
        let start_id = match engine.request_start().calls[0] {
            GatewayCall::Start(id) => id,
            _ => unreachable!(),
        };
        let refresh_generation = status_generation(&engine.on_status_refresh());

        engine.on_reply(GatewayReply::Start(start_id, Ok(ack(true))));
        let effects = engine.on_reply(GatewayReply::Status {
            origin: StatusOrigin::Refresh,
            generation: refresh_generation,
            result: Ok(StatusReport {
                running: false,
                uptime: None,
            }),
        });

        assert_eq!(effects.discarded, Some("stale"));
        assert_eq!(engine.run_state(), RunState::Running);
    }

    #[test]
    fn test_refresh_during_pending_stop_keeps_polling_off() {
        let mut engine = started(Vec::new(), true);
        engine.request_stop();
        let generation = status_generation(&engine.on_status_refresh());

        engine.on_reply(GatewayReply::Status {
            origin: StatusOrigin::Refresh,
            generation,
            result: Ok(StatusReport {
                running: true,
                uptime: None,
            }),
        });
        engine.on_running_changed(true);

        assert!(!engine.is_polling());
    }

    #[test]
    fn test_unsolicited_notification_toggles_polling() {
        let mut engine = started(Vec::new(), false);

        engine.on_running_changed(true);
        assert!(engine.is_polling());
        let epoch = engine.poll_epoch();

        engine.on_running_changed(true);
        assert_eq!(engine.poll_epoch(), epoch);

        engine.on_running_changed(false);
        assert!(!engine.is_polling());
        assert_eq!(engine.run_state(), RunState::Stopped);
    }

    #[test]
    fn test_reconcile_failure_schedules_retry_until_new_action() {
        let mut engine = started(Vec::new(), true);
        let id = match engine.request_stop().calls[0] {
            GatewayCall::Stop(id) => id,
            _ => unreachable!(),
        };
        let effects = engine.on_reply(GatewayReply::Stop(id, Err(refused(GatewayOp::Stop))));
        let generation = status_generation(&effects);

        let effects = engine.on_reply(GatewayReply::Status {
            origin: StatusOrigin::Reconcile,
            generation,
            result: Err(refused(GatewayOp::Status)),
        });
        assert_eq!(effects.retry_reconcile, Some(id));
        assert_eq!(engine.last_error(), Some(STATUS_FAILED));

        assert_eq!(engine.on_reconcile_due(id).calls.len(), 1);

        engine.request_start();
        assert!(engine.on_reconcile_due(id).is_empty());
    }

    #[test]
    fn test_status_success_clears_only_status_errors() {
        let mut engine = started(Vec::new(), false);
        let generation = status_generation(&engine.on_status_refresh());
        engine.on_reply(GatewayReply::Status {
            origin: StatusOrigin::Refresh,
            generation,
            result: Err(refused(GatewayOp::Status)),
        });
        assert_eq!(engine.last_error(), Some(STATUS_FAILED));

        let generation = status_generation(&engine.on_status_refresh());
        engine.on_reply(GatewayReply::Status {
            origin: StatusOrigin::Refresh,
            generation,
            result: Ok(StatusReport {
                running: false,
                uptime: None,
            }),
        });
        assert_eq!(engine.last_error(), None);
    }

    #[test]
    fn test_dispose_discards_everything() {
        let mut engine = started(batch(1..=3), true);
        let outstanding = ticket(&engine.on_tick());
        engine.take_frame();

        engine.dispose();

        let effects = engine.on_reply(GatewayReply::FetchLatest(outstanding, Ok(batch(1..=9))));
        assert_eq!(effects.discarded, Some("disposed"));
        assert!(!engine.is_polling());
        assert!(engine.request_start().is_empty());
        assert!(engine.on_tick().is_empty());
        assert!(engine.take_frame().is_none());
        assert_eq!(engine.window().len(), 3);
    }

    #[test]
    fn test_frames_carry_revision_and_state() {
        let mut engine = started(batch(1..=2), true);

        let frame = engine.take_frame().unwrap();
        assert_eq!(frame.revision, 1);
        assert!(frame.running);
        assert_eq!(frame.window.len(), 2);
        assert!(engine.take_frame().is_none());

        poll_once(&mut engine, Err(refused(GatewayOp::FetchLatest)));
        let frame = engine.take_frame().unwrap();
        assert_eq!(frame.revision, 2);
        assert_eq!(frame.last_error.as_deref(), Some(POLL_FAILED));

        poll_once(&mut engine, Err(refused(GatewayOp::FetchLatest)));
        assert!(engine.take_frame().is_none());
    }
}
