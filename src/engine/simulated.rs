//! # engine::simulated
//!
//! Test variant for UI development: a scripted trade with simulated price
//! movement and an optional offline window.
//!
//! ```text
//!  trigger ──entry_delay──▶ OPEN ──price path (every price_interval)──▶ time limit CLOSE
//!                            │◀─ offline_start ─▶│◀── offline_duration ──▶│
//!                                                 heartbeats + events muted,
//!                                                 snapshot frozen
//! ```
//!
//! While offline the position keeps trailing and `seq` keeps advancing; only
//! what observers see is held back.  The window is timed from the scripted
//! OPEN, so a close inside it is muted too.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{OfflineWindow, SimulationConfig};
use crate::engine::actor::StrategyHandle;
use crate::engine::manager::PositionManager;
use crate::engine::strategy::Strategy;
use crate::events::{EventKind, OpenData, Transition};
use crate::models::{Direction, Position, Prediction, StopParams, StrategyState, Tick};

/// Entry price when no tick has been seen yet.
pub const FALLBACK_ENTRY_PRICE: f64 = 50_000.0;

/// Margin past the time limit for the closing clock tick.
const CLOCK_MARGIN: Duration = Duration::from_millis(50);

// ─── Strategy ─────────────────────────────────────────────────────────────────

pub struct SimulatedStrategy {
    name:          String,
    direction:     Direction,
    manager:       PositionManager,
    offline:       Option<OfflineWindow>,
    current_price: Option<f64>,
    /// Time of the last scripted OPEN; the offline window is measured from it.
    opened_at:     Option<DateTime<Utc>>,
    frozen:        Option<StrategyState>,
}

impl SimulatedStrategy {
    pub fn new(name: impl Into<String>, config: &SimulationConfig) -> Self {
        let max_duration = chrono::Duration::from_std(config.exit_delay)
            .unwrap_or_else(|_| chrono::Duration::hours(2));
        Self {
            name:          name.into(),
            direction:     config.direction,
            manager:       PositionManager::new(config.stops, max_duration),
            offline:       config.offline,
            current_price: None,
            opened_at:     None,
            frozen:        None,
        }
    }

    /// `true` inside `[open + start_delay, open + start_delay + duration)`,
    /// whether or not the position is still held.
    fn in_offline_window(&self, now: DateTime<Utc>) -> bool {
        let (Some(window), Some(opened_at)) = (self.offline, self.opened_at) else {
            return false;
        };
        let Ok(elapsed) = (now - opened_at).to_std() else {
            return false;
        };
        elapsed >= window.start_delay && elapsed < window.start_delay + window.duration
    }

    fn target_for(&self, entry: f64) -> f64 {
        let stop = self.manager.params().initial_stop_loss_points;
        match self.direction {
            Direction::Long  => entry + stop,
            Direction::Short => entry - stop,
        }
    }
}

impl Strategy for SimulatedStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_tick(&mut self, tick: &Tick, now: DateTime<Utc>) -> Option<Transition> {
        if tick.price.is_finite() {
            if self.current_price.is_none() {
                info!(price = tick.price, "📡 First tick received");
            }
            self.current_price = Some(tick.price);
        }
        self.manager.on_tick(tick, now)
    }

    /// Predictions never drive the scripted trade.
    fn on_prediction(
        &mut self,
        _prediction: &Prediction,
        _latest_tick: Option<&Tick>,
        _now: DateTime<Utc>,
    ) -> Option<Transition> {
        None
    }

    fn state(&mut self, now: DateTime<Utc>) -> StrategyState {
        if self.in_offline_window(now) {
            let latest = self.manager.latest_state();
            let frozen = self.frozen.get_or_insert_with(|| {
                info!(seq = latest.seq, "📴 Offline window — freezing state");
                latest.clone()
            });
            return frozen.clone();
        }

        if self.frozen.take().is_some() {
            info!(seq = self.manager.latest_state().seq, "📶 Back online");
        }
        self.manager.latest_state().clone()
    }

    fn should_suppress_broadcast(&self, now: DateTime<Utc>) -> bool {
        self.in_offline_window(now)
    }

    fn on_scripted_entry(&mut self, latest_tick: Option<&Tick>, now: DateTime<Utc>) -> Option<Transition> {
        if !self.manager.is_flat() {
            debug!("Scripted entry ignored — position already open");
            return None;
        }

        let entry_price = self
            .current_price
            .or_else(|| latest_tick.map(|t| t.price))
            .unwrap_or(FALLBACK_ENTRY_PRICE);
        let target = self.target_for(entry_price);
        let params: StopParams = *self.manager.params();
        let position = Position::open(self.direction, entry_price, target, now, &params);

        let data = OpenData {
            signal_direction:          self.direction,
            entry_price,
            predicted_price:           target,
            stop_loss_price:           position.stop_loss,
            trailing_activation_price: position.trailing_activation_price,
            prediction_data:           None,
        };
        let state = self.manager.open(position)?;
        self.opened_at = Some(now);
        self.frozen = None;

        info!(
            direction = %self.direction,
            entry_price,
            stop_loss = data.stop_loss_price,
            target,
            "✅ Scripted entry"
        );
        Some(Transition { kind: EventKind::SignalDetected(data), state })
    }

    fn on_clock(&mut self, now: DateTime<Utc>) -> Option<Transition> {
        let price = self
            .current_price
            .or_else(|| self.manager.position().map(|p| p.entry_price))?;
        self.manager.expire(price, now)
    }
}

// ─── Price Path ───────────────────────────────────────────────────────────────

/// Simulated prices from `entry` to 10% of the stop distance past `target`,
/// one per `interval` over `exit_delay`.  The first element is one step past
/// `entry`; the last is the overshoot.
pub fn price_path(
    direction: Direction,
    entry: f64,
    target: f64,
    initial_stop_loss_points: f64,
    exit_delay: Duration,
    interval: Duration,
) -> Vec<f64> {
    let overshoot = initial_stop_loss_points * 0.1;
    let end = match direction {
        Direction::Long  => target + overshoot,
        Direction::Short => target - overshoot,
    };

    let steps = if interval.is_zero() {
        1
    } else {
        ((exit_delay.as_secs_f64() / interval.as_secs_f64()) as usize).max(1)
    };
    let step = (end - entry) / steps as f64;

    (1..=steps).map(|i| entry + step * i as f64).collect()
}

// ─── Scenario Driver ──────────────────────────────────────────────────────────

/// Drive one scripted trade through `handle`: wait, enter, feed the price
/// path, then close on the time limit.  Returns early on cancellation or if
/// the actor is gone.
pub async fn run_scenario(handle: StrategyHandle, config: SimulationConfig, token: CancellationToken) {
    info!(
        entry_delay = ?config.entry_delay,
        exit_delay  = ?config.exit_delay,
        direction   = %config.direction,
        simulate_price = config.simulate_price,
        offline     = ?config.offline,
        "🚀 Test scenario started"
    );

    // ── 1. Entry delay ────────────────────────────────────────────────────────
    tokio::select! {
        _ = token.cancelled() => return,
        _ = sleep(config.entry_delay) => {}
    }

    // ── 2. Scripted entry ─────────────────────────────────────────────────────
    let started = Instant::now();
    let state = match handle.scripted_entry().await {
        Ok(Some(state)) => state,
        Ok(None) => {
            info!("Position already open — scenario skipped");
            return;
        }
        Err(e) => {
            warn!(error = %e, "Scenario aborted");
            return;
        }
    };

    // ── 3. Price path ─────────────────────────────────────────────────────────
    if config.simulate_price {
        if let (Some(entry), Some(target)) = (state.entry, state.target) {
            let path = price_path(
                config.direction,
                entry,
                target,
                config.stops.initial_stop_loss_points,
                config.exit_delay,
                config.price_interval,
            );
            info!(steps = path.len(), from = entry, to = path.last().copied(), "💫 Simulating price movement");

            for price in path {
                if handle.simulated_tick(Tick::new(price, Utc::now())).await.is_err() {
                    return;
                }
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = sleep(config.price_interval) => {}
                }
            }
        }
    }

    // ── 4. Time limit ─────────────────────────────────────────────────────────
    tokio::select! {
        _ = token.cancelled() => return,
        _ = sleep_until(started + config.exit_delay + CLOCK_MARGIN) => {}
    }
    if let Err(e) = handle.clock_tick().await {
        warn!(error = %e, "Closing clock tick not delivered");
        return;
    }

    info!(elapsed = ?started.elapsed(), "🏁 Test scenario finished");
}
