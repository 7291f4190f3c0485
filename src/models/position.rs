//! # models::position
//!
//! Defines [`Position`], the single hypothetical trade the engine tracks.
//!
//! Nothing here is an exchange order.  A `Position` exists only while a
//! signal is active and is cleared (set to `None` by its owner) on close.
//! All direction-dependent arithmetic lives on this type so the signal
//! generator and the position manager never mirror signs by hand.

use chrono::{DateTime, Utc};
use serde::Serialize;

// ─── Direction ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// LONG when the forecast is above the price it was made at.
    pub fn from_price_diff(diff: f64) -> Self {
        if diff > 0.0 { Direction::Long } else { Direction::Short }
    }

    /// +1 for LONG, -1 for SHORT.  Favorable moves are `sign * Δprice > 0`.
    #[inline]
    fn sign(self) -> f64 {
        match self {
            Direction::Long  => 1.0,
            Direction::Short => -1.0,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long  => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

// ─── Risk Parameters ──────────────────────────────────────────────────────────

/// Point distances applied when a position is opened and trailed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopParams {
    pub initial_stop_loss_points:   f64,
    pub trailing_activation_offset: f64,
    pub trailing_stop_distance:     f64,
}

// ─── Position ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub direction:   Direction,
    pub entry_price: f64,
    pub entry_time:  DateTime<Utc>,
    /// Tightens only, once trailing is armed.
    pub stop_loss:   f64,
    /// Informational; never used as an exit rule.
    pub target:      f64,
    /// Fixed at entry.
    pub trailing_activation_price: f64,
    pub trailing_active: bool,
    /// Best price seen since entry (since arming, once trailing is active).
    pub peak_price:  f64,
}

impl Position {
    /// Open at `entry_price` with the initial stop and activation level
    /// derived from `params`.
    pub fn open(
        direction: Direction,
        entry_price: f64,
        target: f64,
        entry_time: DateTime<Utc>,
        params: &StopParams,
    ) -> Self {
        let s = direction.sign();
        Self {
            direction,
            entry_price,
            entry_time,
            stop_loss: entry_price - s * params.initial_stop_loss_points,
            target,
            trailing_activation_price: entry_price + s * params.trailing_activation_offset,
            trailing_active: false,
            peak_price: entry_price,
        }
    }

    /// `true` when `price` has reached the stop (LONG `<=`, SHORT `>=`).
    #[inline]
    pub fn stop_hit(&self, price: f64) -> bool {
        match self.direction {
            Direction::Long  => price <= self.stop_loss,
            Direction::Short => price >= self.stop_loss,
        }
    }

    /// `true` when `price` has reached the activation level (LONG `>=`,
    /// SHORT `<=`).
    #[inline]
    pub fn activation_reached(&self, price: f64) -> bool {
        match self.direction {
            Direction::Long  => price >= self.trailing_activation_price,
            Direction::Short => price <= self.trailing_activation_price,
        }
    }

    /// `true` when `price` strictly beats the current peak.
    #[inline]
    pub fn is_new_extreme(&self, price: f64) -> bool {
        match self.direction {
            Direction::Long  => price > self.peak_price,
            Direction::Short => price < self.peak_price,
        }
    }

    /// Move the peak to `price` and re-derive the stop from it.
    ///
    /// Callers only pass a price that beats the peak (or the activation
    /// price on arming), which keeps the stop monotonic.
    pub fn trail_to(&mut self, price: f64, distance: f64) {
        self.peak_price = price;
        self.stop_loss = price - self.direction.sign() * distance;
    }

    /// Realised PnL if closed at `exit_price`: `(points, percent of entry)`.
    pub fn pnl_at(&self, exit_price: f64) -> (f64, f64) {
        let pnl = self.direction.sign() * (exit_price - self.entry_price);
        (pnl, pnl / self.entry_price * 100.0)
    }
}
