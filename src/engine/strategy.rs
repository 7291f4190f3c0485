//! # engine::strategy
//!
//! [`Strategy`] is the capability set the actor drives.  Two variants exist:
//!
//! | Variant | Entry | Extras |
//! |---------|-------|--------|
//! | [`LiveStrategy`] | prediction-driven ([`SignalGenerator`]) | none |
//! | [`SimulatedStrategy`](crate::engine::simulated::SimulatedStrategy) | scripted | offline overlay |
//!
//! The variant is picked once at startup and boxed; handlers are synchronous
//! and return at most one [`Transition`] each.

use chrono::{DateTime, Utc};

use crate::config::StrategyConfig;
use crate::engine::manager::PositionManager;
use crate::engine::signal::SignalGenerator;
use crate::events::Transition;
use crate::models::{Prediction, StrategyState, Tick};

pub trait Strategy: Send {
    /// Instance name used in event ids and heartbeats.
    fn name(&self) -> &str;

    fn on_tick(&mut self, tick: &Tick, now: DateTime<Utc>) -> Option<Transition>;

    fn on_prediction(
        &mut self,
        prediction: &Prediction,
        latest_tick: Option<&Tick>,
        now: DateTime<Utc>,
    ) -> Option<Transition>;

    /// Current snapshot as observers should see it.  Takes `&mut self`
    /// because a variant may freeze what it reports.
    fn state(&mut self, now: DateTime<Utc>) -> StrategyState;

    /// `true` while heartbeats and events must not leave the process.
    fn should_suppress_broadcast(&self, now: DateTime<Utc>) -> bool;

    /// Scripted entry; only the simulated variant acts on it.
    fn on_scripted_entry(&mut self, _latest_tick: Option<&Tick>, _now: DateTime<Utc>) -> Option<Transition> {
        None
    }

    /// Clock-only evaluation (time limit without a fresh tick).
    fn on_clock(&mut self, _now: DateTime<Utc>) -> Option<Transition> {
        None
    }
}

// ─── Live Variant ─────────────────────────────────────────────────────────────

pub struct LiveStrategy {
    name:    String,
    signals: SignalGenerator,
    manager: PositionManager,
}

impl LiveStrategy {
    pub fn new(name: impl Into<String>, config: &StrategyConfig) -> Self {
        Self {
            name:    name.into(),
            signals: SignalGenerator::new(config),
            manager: PositionManager::new(config.stops, config.max_position_duration),
        }
    }
}

impl Strategy for LiveStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_tick(&mut self, tick: &Tick, now: DateTime<Utc>) -> Option<Transition> {
        self.manager.on_tick(tick, now)
    }

    fn on_prediction(
        &mut self,
        prediction: &Prediction,
        latest_tick: Option<&Tick>,
        now: DateTime<Utc>,
    ) -> Option<Transition> {
        self.signals.on_prediction(&mut self.manager, prediction, latest_tick, now)
    }

    fn state(&mut self, _now: DateTime<Utc>) -> StrategyState {
        self.manager.latest_state().clone()
    }

    fn should_suppress_broadcast(&self, _now: DateTime<Utc>) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::models::Horizon;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        // Monday 08:30 New York
        Utc.with_ymd_and_hms(2026, 3, 2, 13, 30, 0).unwrap()
    }

    fn make_prediction() -> Prediction {
        Prediction {
            id: None,
            prediction_price: 100000.0,
            predicted_price: 100700.0,
            prediction_time: t0(),
            predicted_time: t0() + chrono::Duration::hours(2),
            horizon: Horizon::TwoHours,
        }
    }

    /// OPEN → TRAILING_STOP_ACTIVATED → STOP_LOSS_HIT with the default knobs.
    #[test]
    fn test_end_to_end_long() {
        let mut s = LiveStrategy::new("IPC", &StrategyConfig::default());
        let first = Tick::new(100000.0, t0());
        assert!(s.on_tick(&first, t0()).is_none());

        let open = s.on_prediction(&make_prediction(), Some(&first), t0()).unwrap();
        assert!(matches!(open.kind, EventKind::SignalDetected(_)));
        assert_eq!(open.state.seq, 1);
        assert_eq!(open.state.stop_loss, Some(98000.0));
        assert_eq!(open.state.trailing_activation, Some(101000.0));
        assert_eq!(open.state.target, Some(100700.0));

        let t1 = t0() + chrono::Duration::minutes(1);
        let armed = s.on_tick(&Tick::new(101000.0, t1), t1).unwrap();
        assert!(matches!(armed.kind, EventKind::TrailingStopActivated(_)));
        assert_eq!(armed.state.seq, 2);
        assert_eq!(armed.state.stop_loss, Some(100100.0));
        assert_eq!(armed.state.trailing_stop_active, Some(true));

        let t2 = t1 + chrono::Duration::minutes(1);
        let closed = s.on_tick(&Tick::new(100050.0, t2), t2).unwrap();
        match &closed.kind {
            EventKind::StopLossHit(d) => {
                assert_eq!(d.pnl, 50.0);
                assert!((d.pnl_percentage - 0.05).abs() < 1e-9);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(closed.state.seq, 3);
        assert!(!closed.state.has_position());
        assert_eq!(s.state(t2), closed.state);
    }

    #[test]
    fn test_live_never_suppresses() {
        let mut s = LiveStrategy::new("IPC", &StrategyConfig::default());
        assert!(!s.should_suppress_broadcast(t0()));
        assert!(s.on_scripted_entry(None, t0()).is_none());
        assert!(s.on_clock(t0()).is_none());
        assert_eq!(s.state(t0()).seq, 0);
    }
}
