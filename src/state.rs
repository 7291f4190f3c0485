//! # state
//!
//! Shared state injected into every Axum handler.  Strategy state itself is
//! not here: it lives inside the actor and is reached through
//! [`StrategyHandle`].

use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::broadcast::Broadcaster;
use crate::config::Config;
use crate::engine::actor::StrategyHandle;

pub struct AppState {
    // ── Strategy ──────────────────────────────────────────────────────────────
    pub handle:        StrategyHandle,
    /// Name stamped on events and heartbeats (`IPC` / `TestStrategy`).
    pub instance_name: String,
    /// Per-process id carried by heartbeats.
    pub instance_id:   String,

    // ── Monitor / WebSocket ───────────────────────────────────────────────────
    pub broadcaster: Arc<Broadcaster>,

    // ── Runtime ───────────────────────────────────────────────────────────────
    pub config: Arc<Config>,
    /// Cancels every background loop on shutdown.
    pub token:  CancellationToken,
    /// Set while a test scenario is in flight.
    pub scenario_running: AtomicBool,

    // ── Metrics ───────────────────────────────────────────────────────────────
    pub tick_count: AtomicU64,
}

impl AppState {
    pub fn new(
        handle: StrategyHandle,
        broadcaster: Arc<Broadcaster>,
        config: Arc<Config>,
        instance_id: String,
        token: CancellationToken,
    ) -> Self {
        Self {
            handle,
            instance_name: config.mode.instance_name().to_string(),
            instance_id,
            broadcaster,
            config,
            token,
            scenario_running: AtomicBool::new(false),
            tick_count: AtomicU64::new(0),
        }
    }
}

/// Convenience type alias
pub type SharedState = Arc<AppState>;
