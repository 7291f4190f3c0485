//! # heartbeat
//!
//! Periodic liveness beacon.  This task only keeps time: each period it asks
//! the strategy actor to publish a `strategy_heartbeat`, which the actor
//! builds and sends in line with its events.  Observers that missed events
//! resynchronise from it; a beat is skipped while the strategy is muted.

use std::time::Duration;

use chrono::Utc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::actor::StrategyHandle;

/// `{hostname}-{pid}-{unix_secs}`, falling back to `local` for the host.
pub fn instance_id() -> String {
    let host = std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| "local".to_string());
    format!("{host}-{}-{}", std::process::id(), Utc::now().timestamp())
}

pub async fn run_heartbeat(handle: StrategyHandle, period: Duration, token: CancellationToken) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(?period, "💓 Heartbeat started");

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match handle.heartbeat().await {
            Ok(true) => {}
            Ok(false) => debug!("Heartbeat skipped"),
            Err(e) => {
                warn!(error = %e, "Heartbeat stopped — strategy engine gone");
                break;
            }
        }
    }

    info!("💓 Heartbeat stopped");
}
