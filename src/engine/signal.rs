//! # engine::signal
//!
//! **Signal Generator**: turns a qualifying prediction into an OPEN.
//!
//! A prediction opens a position only when all hold:
//! * no position is currently held,
//! * `|predicted - prediction| > delta_threshold` (strict),
//! * the session filter (if enabled) accepts `prediction_time`,
//! * a latest tick exists to price the entry.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::StrategyConfig;
use crate::engine::manager::PositionManager;
use crate::engine::session::SessionWindow;
use crate::events::{EventKind, OpenData, Transition};
use crate::models::{Direction, Position, Prediction, StopParams, Tick};

#[derive(Debug, Clone)]
pub struct SignalGenerator {
    delta_threshold: f64,
    session:         Option<SessionWindow>,
    stops:           StopParams,
}

impl SignalGenerator {
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            delta_threshold: config.delta_threshold,
            session:         config.session,
            stops:           config.stops,
        }
    }

    /// Direction for `prediction`, or `None` if it does not qualify.
    pub fn qualify(&self, prediction: &Prediction) -> Option<Direction> {
        let diff = prediction.price_diff();
        if diff.abs() <= self.delta_threshold {
            debug!(diff, threshold = self.delta_threshold, "Prediction below delta threshold");
            return None;
        }

        if let Some(session) = &self.session {
            if !session.contains(prediction.prediction_time) {
                debug!(prediction_time = %prediction.prediction_time, "Prediction outside trading session");
                return None;
            }
        }

        Some(Direction::from_price_diff(diff))
    }

    /// Open a position on `manager` if `prediction` qualifies.
    pub fn on_prediction(
        &self,
        manager: &mut PositionManager,
        prediction: &Prediction,
        latest_tick: Option<&Tick>,
        now: DateTime<Utc>,
    ) -> Option<Transition> {
        // ── 1. Guard: at most one position ───────────────────────────────────
        if !manager.is_flat() {
            return None;
        }

        // ── 2. Threshold + session ───────────────────────────────────────────
        let direction = self.qualify(prediction)?;

        // ── 3. Entry at the latest traded price ──────────────────────────────
        let Some(tick) = latest_tick else {
            debug!("No tick received yet — signal skipped");
            return None;
        };
        let entry_price = tick.price;

        let position = Position::open(
            direction,
            entry_price,
            prediction.predicted_price,
            now,
            &self.stops,
        );
        let data = OpenData {
            signal_direction:          direction,
            entry_price,
            predicted_price:           prediction.predicted_price,
            stop_loss_price:           position.stop_loss,
            trailing_activation_price: position.trailing_activation_price,
            prediction_data:           Some(prediction.clone()),
        };

        let state = manager.open(position)?;
        info!(
            direction = %direction,
            entry_price,
            stop_loss = data.stop_loss_price,
            trailing_activation = data.trailing_activation_price,
            horizon = %prediction.horizon,
            "🎯 SIGNAL DETECTED — position opened"
        );

        Some(Transition { kind: EventKind::SignalDetected(data), state })
    }
}
