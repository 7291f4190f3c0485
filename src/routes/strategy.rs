//! # routes::strategy
//!
//! Strategy introspection for the chart UI.
//!
//! | Method | Path                        | Description                                |
//! |--------|-----------------------------|--------------------------------------------|
//! | GET    | `/api/mode`                 | server mode                                |
//! | GET    | `/api/strategy_instances`   | `["IPC"]` or `["TestStrategy"]`            |
//! | GET    | `/api/strategy-events`      | `[]`; in test mode also starts the scenario |
//! | GET    | `/api/strategy/state`       | current (possibly frozen) snapshot         |
//! | GET    | `/api/health`               | observers, ticks, instance id              |

use std::sync::atomic::Ordering;

use axum::{extract::State, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::{
    config::StrategyMode,
    engine::simulated::run_scenario,
    error::AppError,
    state::SharedState,
};

/// GET /api/mode
pub async fn get_mode(State(state): State<SharedState>) -> impl IntoResponse {
    Json(json!({
        "mode":          state.config.mode.to_string(),
        "simulation":    state.config.mode == StrategyMode::Test,
        "instance_name": state.instance_name,
        "timestamp":     Utc::now(),
    }))
}

/// GET /api/strategy_instances
pub async fn get_instances(State(state): State<SharedState>) -> impl IntoResponse {
    Json(json!([state.instance_name]))
}

/// GET /api/strategy-events: no history is kept.  In test mode the first
/// call (and any call after a scenario has finished) starts the scenario.
pub async fn get_strategy_events(State(state): State<SharedState>) -> impl IntoResponse {
    if state.config.mode == StrategyMode::Test
        && state
            .scenario_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    {
        info!("📡 /api/strategy-events — starting test scenario");
        let state = state.clone();
        tokio::spawn(async move {
            run_scenario(
                state.handle.clone(),
                state.config.simulation.clone(),
                state.token.child_token(),
            )
            .await;
            state.scenario_running.store(false, Ordering::Release);
        });
    }

    Json(json!([]))
}

/// GET /api/strategy/state
pub async fn get_state(State(state): State<SharedState>) -> Result<impl IntoResponse, AppError> {
    let reply = state.handle.snapshot().await?;
    let has_position = reply.state.has_position();
    Ok(Json(json!({
        "ok":             true,
        "offline":        reply.suppressed,
        "has_position":   has_position,
        "strategy_state": reply.state,
    })))
}

/// GET /api/health
pub async fn health_check(State(state): State<SharedState>) -> impl IntoResponse {
    Json(json!({
        "ok":               true,
        "mode":             state.config.mode.to_string(),
        "instance_id":      state.instance_id,
        "observers":        state.broadcaster.observer_count(),
        "tick_count":       state.tick_count.load(Ordering::Relaxed),
        "scenario_running": state.scenario_running.load(Ordering::Relaxed),
    }))
}
