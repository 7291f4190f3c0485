//! # engine::actor
//!
//! Single owner of all mutable strategy state.
//!
//! Every input (tick, prediction, heartbeat request, observer attach,
//! scripted entry, clock tick) reaches the active [`Strategy`] as a
//! [`StrategyCommand`] through one `mpsc` queue, so commands are handled
//! strictly in arrival order and no two handlers ever interleave.  Handlers
//! are synchronous; publication to the [`Broadcaster`] happens after the
//! mutation step has completed.
//!
//! Everything that carries a [`StrategyState`] (events, heartbeats, the
//! snapshot a new observer starts from) is published from here, so each
//! observer sees `seq` in non-decreasing order.
//!
//! ```text
//!  routes / poller / heartbeat / scenario
//!            │  StrategyHandle (mpsc)
//!            ▼
//!  ┌──────────────────────┐   Transition   ┌─────────────┐
//!  │ StrategyActor        │ ─────────────▶ │ Broadcaster │ ──▶ observers
//!  │ ├─ Box<dyn Strategy> │   (event id    └─────────────┘
//!  │ ├─ latest_tick       │    assigned     heartbeats,
//!  │ └─ EventIds          │    unless muted) snapshots
//!  └──────────────────────┘
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::broadcast::{Broadcaster, Frame, ObserverId};
use crate::engine::strategy::Strategy;
use crate::error::AppError;
use crate::events::{EventIds, Heartbeat, OutboundMessage, PredictionUpdate, Transition};
use crate::models::{Horizon, Prediction, StrategyState, Tick};

// ─── Commands ─────────────────────────────────────────────────────────────────

/// Reply to [`StrategyCommand::Snapshot`].
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotReply {
    /// Frozen while the variant is offline.
    pub state:      StrategyState,
    pub suppressed: bool,
}

#[derive(Debug)]
pub enum StrategyCommand {
    /// A market tick.  `relay` re-broadcasts it as a `trade` message and
    /// records it as the latest tick; simulated ticks set it to `false`.
    TickArrived { tick: Tick, relay: bool },

    PredictionArrived(Prediction),

    /// Publish a heartbeat; replies `false` if it was suppressed.
    HeartbeatTick(oneshot::Sender<bool>),

    /// Register an observer whose channel starts with the current snapshot
    /// (unless suppressed).
    Attach(oneshot::Sender<(ObserverId, mpsc::Receiver<Frame>)>),

    Snapshot(oneshot::Sender<SnapshotReply>),

    /// Scripted entry; replies with the stamped snapshot if a position opened.
    ScriptedEntry(oneshot::Sender<Option<StrategyState>>),

    /// Re-evaluate time-based rules without a tick.
    ClockTick,

    Shutdown,
}

// ─── Actor ────────────────────────────────────────────────────────────────────

pub struct StrategyActor {
    rx:              mpsc::Receiver<StrategyCommand>,
    strategy:        Box<dyn Strategy>,
    latest_tick:     Option<Tick>,
    ids:             EventIds,
    broadcaster:     Arc<Broadcaster>,
    trigger_horizon: Horizon,
    instance_id:     String,
}

impl StrategyActor {
    pub fn new(
        rx: mpsc::Receiver<StrategyCommand>,
        strategy: Box<dyn Strategy>,
        broadcaster: Arc<Broadcaster>,
        trigger_horizon: Horizon,
        instance_id: String,
    ) -> Self {
        let ids = EventIds::new(strategy.name());
        Self {
            rx,
            strategy,
            latest_tick: None,
            ids,
            broadcaster,
            trigger_horizon,
            instance_id,
        }
    }

    /// Process commands until `Shutdown` or until every handle is dropped.
    pub async fn run(mut self) {
        info!(instance = self.ids.instance_name(), "Strategy actor started");

        while let Some(cmd) = self.rx.recv().await {
            if matches!(cmd, StrategyCommand::Shutdown) {
                info!("Strategy actor shutting down");
                break;
            }
            self.handle(cmd, Utc::now());
        }

        debug!("Strategy actor stopped");
    }

    /// Handle one command at `now`.
    pub fn handle(&mut self, cmd: StrategyCommand, now: DateTime<Utc>) {
        match cmd {
            StrategyCommand::TickArrived { tick, relay } => {
                let transition = self.strategy.on_tick(&tick, now);
                if relay {
                    self.latest_tick = Some(tick);
                    self.broadcaster.publish(&OutboundMessage::Trade(tick));
                }
                self.emit(transition, now);
            }

            StrategyCommand::PredictionArrived(prediction) => {
                let transition = if prediction.horizon == self.trigger_horizon {
                    self.strategy.on_prediction(&prediction, self.latest_tick.as_ref(), now)
                } else {
                    debug!(horizon = %prediction.horizon, "Prediction relayed only");
                    None
                };
                self.broadcaster.publish(&OutboundMessage::Prediction(Box::new(
                    PredictionUpdate::unenriched(prediction),
                )));
                self.emit(transition, now);
            }

            StrategyCommand::HeartbeatTick(reply) => {
                let _ = reply.send(self.beat(now));
            }

            StrategyCommand::Attach(reply) => {
                let snapshot = if self.strategy.should_suppress_broadcast(now) {
                    None
                } else {
                    Some(OutboundMessage::StrategySnapshot(self.strategy.state(now)))
                };
                let _ = reply.send(self.broadcaster.subscribe_with(snapshot.as_ref()));
            }

            StrategyCommand::Snapshot(reply) => {
                let suppressed = self.strategy.should_suppress_broadcast(now);
                let state = self.strategy.state(now);
                let _ = reply.send(SnapshotReply { state, suppressed });
            }

            StrategyCommand::ScriptedEntry(reply) => {
                let transition = self.strategy.on_scripted_entry(self.latest_tick.as_ref(), now);
                let _ = reply.send(transition.as_ref().map(|t| t.state.clone()));
                self.emit(transition, now);
            }

            StrategyCommand::ClockTick => {
                let transition = self.strategy.on_clock(now);
                self.emit(transition, now);
            }

            StrategyCommand::Shutdown => {}
        }
    }

    fn beat(&mut self, now: DateTime<Utc>) -> bool {
        if self.strategy.should_suppress_broadcast(now) {
            debug!("🔇 Heartbeat suppressed — offline window");
            return false;
        }

        let beat = Heartbeat {
            instance_name:  self.ids.instance_name().to_string(),
            instance_id:    self.instance_id.clone(),
            heartbeat_at:   now,
            strategy_state: self.strategy.state(now),
        };
        let seq = beat.strategy_state.seq;
        let delivered = self.broadcaster.publish(&OutboundMessage::StrategyHeartbeat(beat));
        debug!(delivered, seq, "💓 Heartbeat sent");
        true
    }

    /// Publish `transition` unless the variant is muted.  A muted transition
    /// gets no event id.
    fn emit(&mut self, transition: Option<Transition>, now: DateTime<Utc>) {
        let Some(transition) = transition else { return };

        if self.strategy.should_suppress_broadcast(now) {
            debug!(
                reason = transition.kind.reason(),
                seq    = transition.state.seq,
                "🔇 Event suppressed — offline window"
            );
            return;
        }

        let event = self.ids.issue(transition, now);
        info!(
            event_id = %event.event_id,
            position = ?event.position,
            reason   = event.kind.reason(),
            seq      = event.strategy_state.seq,
            "📣 Strategy event"
        );
        self.broadcaster.publish(&OutboundMessage::StrategyEvent(Box::new(event)));
    }
}

// ─── Handle ───────────────────────────────────────────────────────────────────

/// Cloneable sender side of the actor.  Every method fails with
/// [`AppError::EngineUnavailable`] once the actor has stopped.
#[derive(Clone)]
pub struct StrategyHandle {
    tx: mpsc::Sender<StrategyCommand>,
}

impl StrategyHandle {
    async fn send(&self, cmd: StrategyCommand) -> Result<(), AppError> {
        self.tx.send(cmd).await.map_err(|_| AppError::EngineUnavailable)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> StrategyCommand,
    ) -> Result<T, AppError> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx)).await?;
        rx.await.map_err(|_| AppError::EngineUnavailable)
    }

    /// Market tick: relayed to observers and recorded as the latest price.
    pub async fn tick(&self, tick: Tick) -> Result<(), AppError> {
        self.send(StrategyCommand::TickArrived { tick, relay: true }).await
    }

    /// Simulated tick: drives the strategy only.
    pub async fn simulated_tick(&self, tick: Tick) -> Result<(), AppError> {
        self.send(StrategyCommand::TickArrived { tick, relay: false }).await
    }

    pub async fn prediction(&self, prediction: Prediction) -> Result<(), AppError> {
        self.send(StrategyCommand::PredictionArrived(prediction)).await
    }

    /// `Ok(false)` when the beat was suppressed.
    pub async fn heartbeat(&self) -> Result<bool, AppError> {
        self.request(StrategyCommand::HeartbeatTick).await
    }

    /// New observer channel, primed with the current snapshot.
    pub async fn attach_observer(&self) -> Result<(ObserverId, mpsc::Receiver<Frame>), AppError> {
        self.request(StrategyCommand::Attach).await
    }

    pub async fn snapshot(&self) -> Result<SnapshotReply, AppError> {
        self.request(StrategyCommand::Snapshot).await
    }

    pub async fn scripted_entry(&self) -> Result<Option<StrategyState>, AppError> {
        self.request(StrategyCommand::ScriptedEntry).await
    }

    pub async fn clock_tick(&self) -> Result<(), AppError> {
        self.send(StrategyCommand::ClockTick).await
    }

    pub async fn shutdown(&self) -> Result<(), AppError> {
        self.send(StrategyCommand::Shutdown).await
    }
}

/// Spawn the actor on the runtime.
pub fn spawn_strategy_actor(
    strategy: Box<dyn Strategy>,
    broadcaster: Arc<Broadcaster>,
    trigger_horizon: Horizon,
    instance_id: String,
    capacity: usize,
) -> (StrategyHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity);
    let actor = StrategyActor::new(rx, strategy, broadcaster, trigger_horizon, instance_id);
    let join = tokio::spawn(actor.run());
    (StrategyHandle { tx }, join)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SimulationConfig, StrategyConfig};
    use crate::engine::simulated::SimulatedStrategy;
    use crate::engine::strategy::LiveStrategy;
    use chrono::TimeZone;
    use serde_json::Value;

    fn in_session() -> DateTime<Utc> {
        // Monday 08:30 New York
        Utc.with_ymd_and_hms(2026, 3, 2, 13, 30, 0).unwrap()
    }

    fn make_prediction(horizon: Horizon) -> Prediction {
        Prediction {
            id: None,
            prediction_price: 100000.0,
            predicted_price: 100700.0,
            prediction_time: in_session(),
            predicted_time: in_session() + chrono::Duration::hours(horizon.hours() as i64),
            horizon,
        }
    }

    fn drain(rx: &mut mpsc::Receiver<Arc<str>>) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            out.push(serde_json::from_str(&frame).unwrap());
        }
        out
    }

    fn make_live_actor(broadcaster: Arc<Broadcaster>) -> StrategyActor {
        let (_tx, rx) = mpsc::channel(8);
        let strategy = LiveStrategy::new("IPC", &StrategyConfig::default());
        StrategyActor::new(rx, Box::new(strategy), broadcaster, Horizon::TwoHours, "host-1-0".to_string())
    }

    fn make_test_actor(broadcaster: Arc<Broadcaster>) -> StrategyActor {
        let (_tx, rx) = mpsc::channel(8);
        let strategy = SimulatedStrategy::new("TestStrategy", &SimulationConfig::default());
        StrategyActor::new(rx, Box::new(strategy), broadcaster, Horizon::TwoHours, "host-1-0".to_string())
    }

    fn seq_of(msg: &Value) -> Option<u64> {
        match msg["type"].as_str()? {
            "strategy_event" | "strategy_heartbeat" => msg["data"]["strategy_state"]["seq"].as_u64(),
            "strategy_snapshot" => msg["data"]["seq"].as_u64(),
            _ => None,
        }
    }

    fn events_of(msgs: &[Value]) -> Vec<Value> {
        msgs.iter()
            .filter(|m| m["type"] == "strategy_event")
            .map(|m| m["data"].clone())
            .collect()
    }

    #[test]
    fn test_scenario_event_stream() {
        let broadcaster = Arc::new(Broadcaster::new(64));
        let (_, mut rx) = broadcaster.subscribe();
        let mut actor = make_live_actor(broadcaster.clone());
        let now = in_session();

        let tick = |price| StrategyCommand::TickArrived { tick: Tick::new(price, now), relay: true };
        actor.handle(tick(100000.0), now);
        actor.handle(StrategyCommand::PredictionArrived(make_prediction(Horizon::TwoHours)), now);
        actor.handle(tick(101000.0), now);
        actor.handle(tick(100050.0), now);

        let events: Vec<Value> = drain(&mut rx)
            .into_iter()
            .filter(|m| m["type"] == "strategy_event")
            .map(|m| m["data"].clone())
            .collect();

        assert_eq!(events.len(), 3);
        assert_eq!(events[0]["position"], "OPEN");
        assert_eq!(events[0]["reason"], "SIGNAL_DETECTED");
        assert_eq!(events[0]["strategy_state"]["seq"], 1);
        assert_eq!(events[1]["reason"], "TRAILING_STOP_ACTIVATED");
        assert_eq!(events[1]["strategy_state"]["SL"], 100100.0);
        assert_eq!(events[2]["position"], "CLOSE");
        assert_eq!(events[2]["reason"], "STOP_LOSS_HIT");
        assert_eq!(events[2]["event_data"]["pnl"], 50.0);
        assert_eq!(events[2]["strategy_state"], serde_json::json!({ "seq": 3 }));

        let ms = now.timestamp_millis();
        assert_eq!(events[0]["event_id"], format!("IPC_1_{ms}"));
        assert_eq!(events[2]["event_id"], format!("IPC_3_{ms}"));
    }

    #[test]
    fn test_ticks_and_predictions_are_relayed() {
        let broadcaster = Arc::new(Broadcaster::new(64));
        let (_, mut rx) = broadcaster.subscribe();
        let mut actor = make_live_actor(broadcaster.clone());
        let now = in_session();

        actor.handle(StrategyCommand::TickArrived { tick: Tick::new(100000.0, now), relay: true }, now);
        actor.handle(StrategyCommand::PredictionArrived(make_prediction(Horizon::OneHour)), now);

        let msgs = drain(&mut rx);
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0]["type"], "trade");
        assert_eq!(msgs[0]["data"]["price"], 100000.0);
        assert_eq!(msgs[1]["type"], "prediction");
        assert_eq!(msgs[1]["data"]["newly_enriched"], serde_json::json!([]));
        assert_eq!(msgs[1]["data"]["latest_prediction"]["prediction_timeframe"], "1");
    }

    #[test]
    fn test_non_trigger_horizon_never_opens() {
        let broadcaster = Arc::new(Broadcaster::new(64));
        let mut actor = make_live_actor(broadcaster);
        let now = in_session();

        actor.handle(StrategyCommand::TickArrived { tick: Tick::new(100000.0, now), relay: true }, now);
        actor.handle(StrategyCommand::PredictionArrived(make_prediction(Horizon::FourHours)), now);

        let (tx, mut rx) = oneshot::channel();
        actor.handle(StrategyCommand::Snapshot(tx), now);
        let reply = rx.try_recv().unwrap();
        assert_eq!(reply.state.seq, 0);
        assert!(!reply.suppressed);
    }

    #[test]
    fn test_simulated_ticks_are_not_relayed() {
        let broadcaster = Arc::new(Broadcaster::new(64));
        let (_, mut rx) = broadcaster.subscribe();
        let mut actor = make_live_actor(broadcaster.clone());
        let now = in_session();

        actor.handle(StrategyCommand::TickArrived { tick: Tick::new(100000.0, now), relay: false }, now);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_offline_window_mutes_events_and_heartbeats() {
        let broadcaster = Arc::new(Broadcaster::new(64));
        let (_, mut obs) = broadcaster.subscribe();
        let mut actor = make_test_actor(broadcaster.clone());

        let t0 = in_session();
        let at = |s| t0 + chrono::Duration::seconds(s);

        let (tx, mut reply) = oneshot::channel();
        actor.handle(StrategyCommand::ScriptedEntry(tx), t0);
        assert_eq!(reply.try_recv().unwrap().map(|s| s.seq), Some(1));

        // Offline at +10s: activation at +12s is applied but not published.
        let (tx, mut hb) = oneshot::channel();
        actor.handle(StrategyCommand::HeartbeatTick(tx), at(10));
        assert!(!hb.try_recv().unwrap());
        actor.handle(
            StrategyCommand::TickArrived { tick: Tick::new(51_000.0, at(12)), relay: false },
            at(12),
        );

        // Back online at +20s: heartbeat carries the live seq.
        let (tx, mut hb) = oneshot::channel();
        actor.handle(StrategyCommand::HeartbeatTick(tx), at(20));
        assert!(hb.try_recv().unwrap());

        // Next published event takes id 2: the muted one consumed none.
        actor.handle(
            StrategyCommand::TickArrived { tick: Tick::new(51_500.0, at(21)), relay: false },
            at(21),
        );

        let msgs = drain(&mut obs);
        let beats: Vec<&Value> = msgs.iter().filter(|m| m["type"] == "strategy_heartbeat").collect();
        assert_eq!(beats.len(), 1);
        assert_eq!(beats[0]["data"]["strategy_state"]["seq"], 2);
        assert_eq!(beats[0]["data"]["instance_id"], "host-1-0");
        assert_eq!(beats[0]["data"]["instance_name"], "TestStrategy");

        let events = events_of(&msgs);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["reason"], "SIGNAL_DETECTED");
        assert_eq!(events[1]["reason"], "TRAILING_STOP_UPDATED");
        assert_eq!(events[1]["strategy_state"]["seq"], 3);
        assert_eq!(events[1]["event_id"], format!("TestStrategy_2_{}", at(21).timestamp_millis()));
    }

    #[test]
    fn test_close_inside_offline_window_stays_muted() {
        let broadcaster = Arc::new(Broadcaster::new(64));
        let (_, mut obs) = broadcaster.subscribe();
        let mut actor = make_test_actor(broadcaster.clone());

        let t0 = in_session();
        let at = |s| t0 + chrono::Duration::seconds(s);

        let (tx, _) = oneshot::channel();
        actor.handle(StrategyCommand::ScriptedEntry(tx), t0);

        // First read inside the window freezes seq 1.
        let (tx, mut snap) = oneshot::channel();
        actor.handle(StrategyCommand::Snapshot(tx), at(11));
        assert_eq!(snap.try_recv().unwrap().state.seq, 1);

        // Stop hit at +12s clears the position while offline.
        actor.handle(
            StrategyCommand::TickArrived { tick: Tick::new(47_000.0, at(12)), relay: true },
            at(12),
        );

        // Still offline at +13s: no heartbeat, frozen snapshot.
        let (tx, mut hb) = oneshot::channel();
        actor.handle(StrategyCommand::HeartbeatTick(tx), at(13));
        assert!(!hb.try_recv().unwrap());

        let (tx, mut snap) = oneshot::channel();
        actor.handle(StrategyCommand::Snapshot(tx), at(13));
        let reply = snap.try_recv().unwrap();
        assert!(reply.suppressed);
        assert_eq!(reply.state.seq, 1);
        assert!(reply.state.has_position());

        // Back online at +20s with the closed state.
        let (tx, mut hb) = oneshot::channel();
        actor.handle(StrategyCommand::HeartbeatTick(tx), at(20));
        assert!(hb.try_recv().unwrap());

        let msgs = drain(&mut obs);
        let events = events_of(&msgs);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["reason"], "SIGNAL_DETECTED");

        let beat = msgs.iter().find(|m| m["type"] == "strategy_heartbeat").unwrap();
        assert_eq!(beat["data"]["strategy_state"], serde_json::json!({ "seq": 2 }));
    }

    #[test]
    fn test_seq_never_decreases_across_events_and_heartbeats() {
        let broadcaster = Arc::new(Broadcaster::new(4096));
        let (_, mut obs) = broadcaster.subscribe();
        let mut actor = make_live_actor(broadcaster.clone());
        let now = in_session();

        let tick = |price| StrategyCommand::TickArrived { tick: Tick::new(price, now), relay: true };
        actor.handle(tick(100000.0), now);
        actor.handle(StrategyCommand::PredictionArrived(make_prediction(Horizon::TwoHours)), now);

        for burst in 0..20 {
            let (tx, _) = oneshot::channel();
            actor.handle(StrategyCommand::HeartbeatTick(tx), now);
            for i in 0..50 {
                actor.handle(tick(101000.0 + (burst * 50 + i) as f64), now);
            }
        }
        let (tx, _) = oneshot::channel();
        actor.handle(StrategyCommand::HeartbeatTick(tx), now);

        let seqs: Vec<u64> = drain(&mut obs).iter().filter_map(seq_of).collect();
        assert_eq!(seqs.len(), 1 + 1000 + 21);
        assert!(seqs.windows(2).all(|w| w[0] <= w[1]), "seq went backwards: {seqs:?}");
        assert_eq!(seqs.last().copied(), Some(1001));
    }

    #[test]
    fn test_attach_primes_channel_with_snapshot() {
        let broadcaster = Arc::new(Broadcaster::new(64));
        let mut actor = make_live_actor(broadcaster.clone());
        let now = in_session();

        actor.handle(StrategyCommand::TickArrived { tick: Tick::new(100000.0, now), relay: true }, now);
        actor.handle(StrategyCommand::PredictionArrived(make_prediction(Horizon::TwoHours)), now);

        let (tx, mut reply) = oneshot::channel();
        actor.handle(StrategyCommand::Attach(tx), now);
        let (_, mut obs) = reply.try_recv().unwrap();
        assert_eq!(broadcaster.observer_count(), 1);

        actor.handle(StrategyCommand::TickArrived { tick: Tick::new(101000.0, now), relay: true }, now);

        let msgs = drain(&mut obs);
        assert_eq!(msgs[0]["type"], "strategy_snapshot");
        assert_eq!(msgs[0]["data"]["seq"], 1);
        assert_eq!(msgs[1]["type"], "trade");
        assert_eq!(msgs[2]["data"]["reason"], "TRAILING_STOP_ACTIVATED");
        assert_eq!(msgs[2]["data"]["strategy_state"]["seq"], 2);
    }

    #[test]
    fn test_attach_while_offline_has_no_snapshot() {
        let broadcaster = Arc::new(Broadcaster::new(64));
        let mut actor = make_test_actor(broadcaster.clone());
        let t0 = in_session();

        let (tx, _) = oneshot::channel();
        actor.handle(StrategyCommand::ScriptedEntry(tx), t0);

        let (tx, mut reply) = oneshot::channel();
        actor.handle(StrategyCommand::Attach(tx), t0 + chrono::Duration::seconds(15));
        let (_, mut obs) = reply.try_recv().unwrap();
        assert!(drain(&mut obs).is_empty());
    }

    #[tokio::test]
    async fn test_handle_roundtrip_and_shutdown() {
        let broadcaster = Arc::new(Broadcaster::new(64));
        let strategy = LiveStrategy::new("IPC", &StrategyConfig::default());
        let (handle, join) = spawn_strategy_actor(
            Box::new(strategy),
            broadcaster,
            Horizon::TwoHours,
            "host-1-0".to_string(),
            16,
        );

        handle.tick(Tick::new(100000.0, Utc::now())).await.unwrap();
        handle.prediction(make_prediction(Horizon::TwoHours)).await.unwrap();

        let reply = handle.snapshot().await.unwrap();
        assert_eq!(reply.state.seq, 1);
        assert_eq!(reply.state.entry, Some(100000.0));
        assert!(handle.heartbeat().await.unwrap());

        handle.shutdown().await.unwrap();
        join.await.unwrap();
        assert!(matches!(handle.snapshot().await, Err(AppError::EngineUnavailable)));
    }
}
