pub mod feed;
pub mod monitor;
pub mod strategy;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::SharedState;

use feed::{post_prediction, post_tick};
use monitor::ws_observer;
use strategy::{get_instances, get_mode, get_state, get_strategy_events, health_check};

pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Inbound feeds ─────────────────────────────────────────────────────
        .route("/api/feed/tick",          post(post_tick))
        .route("/api/feed/prediction",    post(post_prediction))
        // ── Observers ─────────────────────────────────────────────────────────
        .route("/ws",                     get(ws_observer))
        // ── Strategy ──────────────────────────────────────────────────────────
        .route("/api/mode",               get(get_mode))
        .route("/api/strategy_instances", get(get_instances))
        .route("/api/strategy-events",    get(get_strategy_events))
        .route("/api/strategy/state",     get(get_state))
        .route("/api/health",             get(health_check))
        // ── Middleware ────────────────────────────────────────────────────────
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
