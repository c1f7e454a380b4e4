//! Async driver for [`SyncEngine`].
//!
//! One task owns the engine. Gateway calls run on a `JoinSet` and their results are fed back
//! in completion order; commands, runningChanged notifications, poll ticks and status refresh
//! ticks are multiplexed with a biased `select!`.

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use contracts::{BackendGateway, DisplayFrame, RunState, SyncConfig};
use observability::{SessionMetricsAggregator, SessionSummary};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::engine::{ActionId, EngineStats, Effects, GatewayCall, GatewayReply, SyncEngine};

const COMMAND_QUEUE: usize = 32;

/// Control Surface intents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    Start,
    Stop,
    RefreshStatus,
    Dispose,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("sync engine has shut down")]
    Closed,
}

/// The runningChanged stream
///
/// The engine publishes every authoritative run flag here and reacts to values published by
/// anyone else.
#[derive(Debug, Clone)]
pub struct RunningBus {
    tx: Arc<watch::Sender<bool>>,
}

impl RunningBus {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(watch::Sender::new(false)),
        }
    }

    pub fn publish(&self, running: bool) {
        self.tx.send_replace(running);
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for RunningBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable handle used by the Control Surface
#[derive(Debug, Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<EngineCommand>,
    bus: RunningBus,
}

impl EngineHandle {
    pub async fn start(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::Start).await
    }

    pub async fn stop(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::Stop).await
    }

    pub async fn refresh_status(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::RefreshStatus).await
    }

    pub async fn dispose(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::Dispose).await
    }

    pub async fn send(&self, command: EngineCommand) -> Result<(), EngineError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| EngineError::Closed)
    }

    /// Running flag as last published by the engine
    pub fn is_running(&self) -> bool {
        self.bus.current()
    }

    pub fn bus(&self) -> &RunningBus {
        &self.bus
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// Summary returned when the driver ends
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub final_state: RunState,
    pub last_error: Option<String>,
    pub window_len: usize,
    pub engine: EngineStats,
    pub metrics: SessionSummary,
}

enum Completion {
    Reply {
        reply: GatewayReply,
        elapsed: Duration,
    },
    ReconcileDue(ActionId),
}

/// Live synchronization driver over a backend gateway
pub struct LiveSync<G> {
    gateway: Arc<G>,
    engine: SyncEngine,
    commands: mpsc::Receiver<EngineCommand>,
    bus: RunningBus,
    running_rx: watch::Receiver<bool>,
    frames: mpsc::Sender<DisplayFrame>,
    tasks: JoinSet<Completion>,
    aggregator: SessionMetricsAggregator,
}

impl<G> LiveSync<G>
where
    G: BackendGateway + Sync + 'static,
{
    /// Build the driver and its handle; frames are delivered on `frames`
    pub fn new(
        gateway: Arc<G>,
        config: SyncConfig,
        frames: mpsc::Sender<DisplayFrame>,
    ) -> (Self, EngineHandle) {
        Self::with_bus(gateway, config, frames, RunningBus::new())
    }

    /// Same as [`LiveSync::new`] but attached to an existing runningChanged stream
    pub fn with_bus(
        gateway: Arc<G>,
        config: SyncConfig,
        frames: mpsc::Sender<DisplayFrame>,
        bus: RunningBus,
    ) -> (Self, EngineHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
        let mut running_rx = bus.subscribe();
        running_rx.borrow_and_update();

        let driver = Self {
            gateway,
            engine: SyncEngine::new(config),
            commands: rx,
            bus: bus.clone(),
            running_rx,
            frames,
            tasks: JoinSet::new(),
            aggregator: SessionMetricsAggregator::new(),
        };
        let handle = EngineHandle { commands: tx, bus };
        (driver, handle)
    }

    /// Run until disposed or every handle is dropped
    #[instrument(name = "live_sync", skip(self), fields(endpoint = %self.gateway.endpoint()))]
    pub async fn run(mut self) -> SessionReport {
        let poll_period = self.engine.config().poll_interval();
        let mut ticker = periodic(poll_period);
        let mut ticker_epoch = self.engine.poll_epoch();
        let mut refresh = self.engine.config().status_refresh().map(periodic);

        let effects = self.engine.startup();
        self.apply(effects, poll_period).await;

        loop {
            if self.engine.poll_epoch() != ticker_epoch {
                ticker.reset();
                ticker_epoch = self.engine.poll_epoch();
            }
            let polling = self.engine.is_polling();

            let effects = tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(EngineCommand::Start) => self.engine.request_start(),
                    Some(EngineCommand::Stop) => self.engine.request_stop(),
                    Some(EngineCommand::RefreshStatus) => self.engine.on_status_refresh(),
                    Some(EngineCommand::Dispose) | None => break,
                },

                Ok(()) = self.running_rx.changed() => {
                    let running = *self.running_rx.borrow_and_update();
                    self.engine.on_running_changed(running)
                }

                Some(joined) = self.tasks.join_next() => match joined {
                    Ok(Completion::Reply { reply, elapsed }) => {
                        self.observe(&reply, elapsed);
                        self.engine.on_reply(reply)
                    }
                    Ok(Completion::ReconcileDue(action)) => self.engine.on_reconcile_due(action),
                    Err(err) => {
                        warn!(error = %err, "Gateway task failed");
                        Effects::default()
                    }
                },

                _ = ticker.tick(), if polling => self.engine.on_tick(),

                _ = next_refresh(&mut refresh) => self.engine.on_status_refresh(),
            };

            self.apply(effects, poll_period).await;
        }

        self.shutdown().await
    }

    async fn apply(&mut self, effects: Effects, poll_period: Duration) {
        if let Some(reason) = effects.discarded {
            self.aggregator.update_discard(reason);
        }
        if let Some(running) = effects.publish {
            self.bus.publish(running);
            self.running_rx.borrow_and_update();
        }
        for call in effects.calls {
            self.spawn_call(call);
        }
        if let Some(action) = effects.retry_reconcile {
            debug!(action, "Reconciliation retry scheduled");
            self.tasks.spawn(async move {
                tokio::time::sleep(poll_period).await;
                Completion::ReconcileDue(action)
            });
        }
        if let Some(frame) = self.engine.take_frame() {
            self.aggregator.update_frame(&frame);
            if self.frames.send(frame).await.is_err() {
                debug!("Display receiver dropped");
            }
        }
    }

    fn spawn_call(&mut self, call: GatewayCall) {
        debug!(op = %call.op(), "Gateway call issued");
        let gateway = Arc::clone(&self.gateway);
        self.tasks.spawn(async move {
            let started = Instant::now();
            let reply = match call {
                GatewayCall::FetchAll => GatewayReply::FetchAll(gateway.fetch_all().await),
                GatewayCall::FetchLatest(ticket) => {
                    GatewayReply::FetchLatest(ticket, gateway.fetch_latest().await)
                }
                GatewayCall::Start(id) => GatewayReply::Start(id, gateway.start().await),
                GatewayCall::Stop(id) => GatewayReply::Stop(id, gateway.stop().await),
                GatewayCall::Status { origin, generation } => GatewayReply::Status {
                    origin,
                    generation,
                    result: gateway.status().await,
                },
            };
            Completion::Reply {
                reply,
                elapsed: started.elapsed(),
            }
        });
    }

    fn observe(&mut self, reply: &GatewayReply, elapsed: Duration) {
        if let GatewayReply::FetchLatest(_, result) = reply {
            let latency_ms = elapsed.as_secs_f64() * 1000.0;
            observability::record_poll(result.is_ok(), latency_ms);
            self.aggregator.update_poll(result.is_ok(), latency_ms);
        }
    }

    /// Dispose the engine and drop every pending gateway result
    async fn shutdown(mut self) -> SessionReport {
        self.engine.dispose();
        let pending = self.tasks.len();
        self.tasks.shutdown().await;
        info!(pending, "Live sync stopped");

        SessionReport {
            final_state: self.engine.run_state(),
            last_error: self.engine.last_error().map(str::to_string),
            window_len: self.engine.window().len(),
            engine: self.engine.stats().clone(),
            metrics: self.aggregator.summary(),
        }
    }
}

/// Interval whose first tick is one full period away
fn periodic(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn next_refresh(refresh: &mut Option<Interval>) {
    match refresh {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending::<()>().await,
    }
}
