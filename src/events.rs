//! # events
//!
//! Everything the server pushes to observers over the WebSocket.
//!
//! * [`EventKind`] is the transition itself: one variant per
//!   `(position, reason)` pair, each with an explicit payload.
//! * [`Event`] wraps a transition with its id, time, instance tags and the
//!   [`StrategyState`] stamped for it.  Write-once.
//! * [`OutboundMessage`] is the `{"type": …, "data": …}` envelope the UI
//!   dispatches on.
//!
//! Messages are serialized once per publish and fanned out as `Arc<str>`,
//! see [`crate::broadcast`].

use chrono::{DateTime, Utc};
use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;

use crate::models::{Direction, Prediction, StrategyState, Tick};

// ─── Position Action ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionAction {
    Open,
    Update,
    Close,
}

// ─── Payloads ─────────────────────────────────────────────────────────────────

/// `OPEN / SIGNAL_DETECTED`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenData {
    pub signal_direction:          Direction,
    pub entry_price:               f64,
    pub predicted_price:           f64,
    pub stop_loss_price:           f64,
    pub trailing_activation_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction_data:           Option<Prediction>,
}

/// `UPDATE / TRAILING_STOP_*`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrailingData {
    pub direction:               Direction,
    pub entry_price:             f64,
    pub stop_loss_price:         f64,
    pub peak_price:              f64,
    pub trailing_stop_activated: bool,
    pub current_price:           f64,
}

/// `CLOSE / *`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CloseData {
    pub direction:       Direction,
    pub entry_price:     f64,
    pub stop_loss_price: f64,
    /// Exit price.
    pub current_price:   f64,
    pub pnl:             f64,
    pub pnl_percentage:  f64,
}

// ─── EventKind ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    SignalDetected(OpenData),
    TrailingStopActivated(TrailingData),
    TrailingStopUpdated(TrailingData),
    StopLossHit(CloseData),
    PositionTimeLimitHit(CloseData),
}

impl EventKind {
    pub fn position(&self) -> PositionAction {
        match self {
            EventKind::SignalDetected(_) => PositionAction::Open,
            EventKind::TrailingStopActivated(_) | EventKind::TrailingStopUpdated(_) => {
                PositionAction::Update
            }
            EventKind::StopLossHit(_) | EventKind::PositionTimeLimitHit(_) => PositionAction::Close,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            EventKind::SignalDetected(_)        => "SIGNAL_DETECTED",
            EventKind::TrailingStopActivated(_) => "TRAILING_STOP_ACTIVATED",
            EventKind::TrailingStopUpdated(_)   => "TRAILING_STOP_UPDATED",
            EventKind::StopLossHit(_)           => "STOP_LOSS_HIT",
            EventKind::PositionTimeLimitHit(_)  => "POSITION_TIME_LIMIT_HIT",
        }
    }

    fn payload(&self) -> Payload<'_> {
        match self {
            EventKind::SignalDetected(d) => Payload::Open(d),
            EventKind::TrailingStopActivated(d) | EventKind::TrailingStopUpdated(d) => {
                Payload::Trailing(d)
            }
            EventKind::StopLossHit(d) | EventKind::PositionTimeLimitHit(d) => Payload::Close(d),
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum Payload<'a> {
    Open(&'a OpenData),
    Trailing(&'a TrailingData),
    Close(&'a CloseData),
}

/// `event_data` on the wire: the payload fields plus the stamped state.
#[derive(Serialize)]
struct EventData<'a> {
    #[serde(flatten)]
    payload:        Payload<'a>,
    strategy_state: &'a StrategyState,
}

/// A transition produced by a strategy handler together with the snapshot
/// stamped for it.  The actor turns it into an [`Event`] at publish time.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub kind:  EventKind,
    pub state: StrategyState,
}

// ─── Event ────────────────────────────────────────────────────────────────────

/// Serialized flat, with the stamped state both at the top level and inside
/// `event_data`:
///
/// ```text
/// { event_id, event_time, strategy_instance_id, instance_name,
///   position, reason, event_data: { ..payload, strategy_state }, strategy_state }
/// ```
#[derive(Debug, Clone)]
pub struct Event {
    pub event_id:             String,
    pub event_time:           DateTime<Utc>,
    pub strategy_instance_id: String,
    pub instance_name:        String,
    pub position:             PositionAction,
    pub kind:                 EventKind,
    pub strategy_state:       StrategyState,
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Event", 8)?;
        s.serialize_field("event_id", &self.event_id)?;
        s.serialize_field("event_time", &self.event_time)?;
        s.serialize_field("strategy_instance_id", &self.strategy_instance_id)?;
        s.serialize_field("instance_name", &self.instance_name)?;
        s.serialize_field("position", &self.position)?;
        s.serialize_field("reason", self.kind.reason())?;
        s.serialize_field(
            "event_data",
            &EventData { payload: self.kind.payload(), strategy_state: &self.strategy_state },
        )?;
        s.serialize_field("strategy_state", &self.strategy_state)?;
        s.end()
    }
}

/// Issues `"{instance}_{counter}_{unix_millis}"` ids.
#[derive(Debug)]
pub struct EventIds {
    instance_name: String,
    counter:       u64,
}

impl EventIds {
    pub fn new(instance_name: impl Into<String>) -> Self {
        Self { instance_name: instance_name.into(), counter: 0 }
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    /// Wrap `transition` into an [`Event`], consuming the next id.
    pub fn issue(&mut self, transition: Transition, now: DateTime<Utc>) -> Event {
        self.counter += 1;
        Event {
            event_id: format!("{}_{}_{}", self.instance_name, self.counter, now.timestamp_millis()),
            event_time: now,
            strategy_instance_id: self.instance_name.clone(),
            instance_name: self.instance_name.clone(),
            position: transition.kind.position(),
            kind: transition.kind,
            strategy_state: transition.state,
        }
    }
}

// ─── Heartbeat ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Heartbeat {
    pub instance_name:  String,
    pub instance_id:    String,
    pub heartbeat_at:   DateTime<Utc>,
    pub strategy_state: StrategyState,
}

// ─── Prediction Relay ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct PredictionUpdate {
    pub latest_prediction: Prediction,
    /// Enrichment is not implemented; always empty.
    pub newly_enriched:    Vec<Prediction>,
}

impl PredictionUpdate {
    pub fn unenriched(prediction: Prediction) -> Self {
        Self { latest_prediction: prediction, newly_enriched: Vec::new() }
    }
}

// ─── Envelope ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OutboundMessage {
    StrategyEvent(Box<Event>),
    StrategyHeartbeat(Heartbeat),
    /// Sent once to a freshly connected observer.
    StrategySnapshot(StrategyState),
    Trade(Tick),
    Prediction(Box<PredictionUpdate>),
}

impl OutboundMessage {
    /// Serialize for the WebSocket text frame.
    #[inline]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"type":"serialization_error"}"#.to_string())
    }
}
