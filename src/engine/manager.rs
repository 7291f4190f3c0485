//! # engine::manager
//!
//! **Position Manager**: owns the single [`Position`] slot and the
//! [`Sequencer`], and runs the per-tick exit/trailing rules.
//!
//! Rule order on every tick (first match wins):
//!
//! 1. time limit: `now - entry_time > max_duration` → `CLOSE / POSITION_TIME_LIMIT_HIT`
//! 2. stop loss: LONG `price <= SL`, SHORT `price >= SL` → `CLOSE / STOP_LOSS_HIT`
//! 3. trailing: arm on activation, then follow new favorable extremes
//!
//! Every branch that mutates the position stamps a new snapshot before the
//! transition leaves this module.  A tick that matches no rule changes
//! nothing, `seq` included.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::engine::sequencer::Sequencer;
use crate::events::{CloseData, EventKind, Transition, TrailingData};
use crate::models::{Position, StopParams, StrategyState, Tick};

#[derive(Debug)]
pub struct PositionManager {
    params:       StopParams,
    max_duration: chrono::Duration,
    position:     Option<Position>,
    sequencer:    Sequencer,
}

impl PositionManager {
    pub fn new(params: StopParams, max_duration: chrono::Duration) -> Self {
        Self {
            params,
            max_duration,
            position: None,
            sequencer: Sequencer::new(),
        }
    }

    pub fn params(&self) -> &StopParams {
        &self.params
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    /// Most recently stamped snapshot.
    pub fn latest_state(&self) -> &StrategyState {
        self.sequencer.latest()
    }

    /// Install `position` and stamp it.  Returns `None` (and drops
    /// `position`) if one is already held.
    pub fn open(&mut self, position: Position) -> Option<StrategyState> {
        if let Some(existing) = &self.position {
            debug!(direction = %existing.direction, "Position already open — entry ignored");
            return None;
        }
        let state = self.sequencer.stamp(Some(&position));
        self.position = Some(position);
        Some(state)
    }

    // ─── Tick Handling ────────────────────────────────────────────────────────

    pub fn on_tick(&mut self, tick: &Tick, now: DateTime<Utc>) -> Option<Transition> {
        let price = tick.price;
        if !price.is_finite() {
            warn!(price, "Non-finite tick price ignored");
            return None;
        }

        // ── 1. Time limit ─────────────────────────────────────────────────────
        if let Some(transition) = self.expire(price, now) {
            return Some(transition);
        }

        let position = self.position.as_mut()?;

        // ── 2. Stop loss ──────────────────────────────────────────────────────
        if position.stop_hit(price) {
            info!(price, stop_loss = position.stop_loss, "🛑 Stop loss hit");
            return self.close(price, EventKind::StopLossHit);
        }

        // ── 3. Trailing ───────────────────────────────────────────────────────
        let distance = self.params.trailing_stop_distance;
        let kind: fn(TrailingData) -> EventKind = if !position.trailing_active {
            if !position.activation_reached(price) {
                return None;
            }
            position.trailing_active = true;
            position.trail_to(price, distance);
            info!(price, stop_loss = position.stop_loss, "Trailing stop activated");
            EventKind::TrailingStopActivated
        } else if position.is_new_extreme(price) {
            position.trail_to(price, distance);
            debug!(peak = price, stop_loss = position.stop_loss, "Trailing stop updated");
            EventKind::TrailingStopUpdated
        } else {
            return None;
        };

        let data = TrailingData {
            direction:               position.direction,
            entry_price:             position.entry_price,
            stop_loss_price:         position.stop_loss,
            peak_price:              position.peak_price,
            trailing_stop_activated: true,
            current_price:           price,
        };
        let state = self.sequencer.stamp(Some(position));
        Some(Transition { kind: kind(data), state })
    }

    /// Close at `price` if the position has outlived the time limit.
    pub fn expire(&mut self, price: f64, now: DateTime<Utc>) -> Option<Transition> {
        let position = self.position.as_ref()?;
        if now - position.entry_time <= self.max_duration {
            return None;
        }
        info!(
            price,
            held_secs = (now - position.entry_time).num_seconds(),
            "⏱ Position time limit hit"
        );
        self.close(price, EventKind::PositionTimeLimitHit)
    }

    /// Clear the slot and stamp the empty snapshot in one step.
    fn close(&mut self, price: f64, kind: fn(CloseData) -> EventKind) -> Option<Transition> {
        let p = self.position.take()?;
        let state = self.sequencer.stamp(None);
        let (pnl, pnl_percentage) = p.pnl_at(price);
        info!(direction = %p.direction, entry = p.entry_price, exit = price, pnl, "Position closed");

        let data = CloseData {
            direction:       p.direction,
            entry_price:     p.entry_price,
            stop_loss_price: p.stop_loss,
            current_price:   price,
            pnl,
            pnl_percentage,
        };
        Some(Transition { kind: kind(data), state })
    }
}
