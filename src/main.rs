//! # IPC Strategy Server
//!
//! ```text
//!  ┌──────────────┐ POST /api/feed/tick        ┌──────────────────────────┐
//!  │ trade relay  │ ─────────────────────────▶ │ StrategyActor            │
//!  └──────────────┘                            │ ├─ Box<dyn Strategy>     │
//!  ┌──────────────┐ POST /api/feed/prediction  │ │   (live │ test)        │
//!  │ predictions  │ ─────────────────────────▶ │ ├─ Position + seq        │
//!  │ (or poller)  │                            │ └─ EventIds              │
//!  └──────────────┘                            └────────────┬─────────────┘
//!  ┌──────────────┐                                         │ events
//!  │ heartbeat    │ ── every 5s: snapshot ───────────────▶ Broadcaster
//!  └──────────────┘                                         │
//!  ┌──────────────┐  ws://host/ws  ◀───────────────────────┘
//!  │ chart UI     │  GET /api/strategy/*
//!  └──────────────┘
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod broadcast;
mod config;
mod engine;
mod error;
mod events;
mod feeds;
mod heartbeat;
mod models;
mod routes;
mod state;

use broadcast::Broadcaster;
use config::{Config, StrategyMode};
use engine::{actor::spawn_strategy_actor, build_strategy};
use feeds::poller::run_poller;
use heartbeat::{instance_id, run_heartbeat};
use state::AppState;

/// Command queue depth of the strategy actor.
const ACTOR_QUEUE: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Load .env ──────────────────────────────────────────────────────────
    dotenvy::dotenv().ok();

    // ── 2. Structured logging ─────────────────────────────────────────────────
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("ipc_strategy_server=debug".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    // ── 3. Config ─────────────────────────────────────────────────────────────
    let config = Arc::new(Config::from_env()?);
    info!(
        mode     = %config.mode,
        addr     = %config.bind_addr,
        delta    = config.strategy.delta_threshold,
        session  = ?config.strategy.session,
        horizon  = %config.strategy.trigger_horizon,
        poller   = config.poller.is_some(),
        "IPC strategy server configured"
    );

    // ── 4. Strategy actor + broadcaster ───────────────────────────────────────
    let token = CancellationToken::new();
    let instance_id = instance_id();
    let broadcaster = Arc::new(Broadcaster::new(config.observer_buffer));
    let (handle, actor_join) = spawn_strategy_actor(
        build_strategy(&config),
        broadcaster.clone(),
        config.strategy.trigger_horizon,
        instance_id.clone(),
        ACTOR_QUEUE,
    );

    let state = Arc::new(AppState::new(
        handle.clone(),
        broadcaster,
        config.clone(),
        instance_id,
        token.clone(),
    ));

    // ── 5. Background loops ───────────────────────────────────────────────────
    tokio::spawn(run_heartbeat(handle.clone(), config.heartbeat_period, token.child_token()));

    match (&config.poller, config.mode) {
        (Some(poller), StrategyMode::Live) => {
            tokio::spawn(run_poller(handle.clone(), poller.clone(), token.child_token()));
        }
        (Some(_), StrategyMode::Test) => {
            info!("Prediction poller disabled in test mode");
        }
        (None, _) => {
            info!("PREDICTION_API_URL not set — predictions via POST /api/feed/prediction only");
        }
    }

    if config.mode == StrategyMode::Test {
        info!("🧪 Test mode — scenario starts on GET /api/strategy-events");
    }

    // ── 6. Router ─────────────────────────────────────────────────────────────
    let app = routes::build_router(state.clone());

    // ── 7. Bind & Serve ───────────────────────────────────────────────────────
    info!(addr = %config.bind_addr, "🚀 IPC strategy server starting");
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;

    let shutdown = token.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Ctrl-C received — shutting down"),
                _ = shutdown.cancelled() => {}
            }
            shutdown.cancel();
        })
        .await?;

    // ── 8. Drain ──────────────────────────────────────────────────────────────
    token.cancel();
    if handle.shutdown().await.is_err() {
        warn!("Strategy actor already stopped");
    }
    actor_join.await?;
    info!("Server stopped");

    Ok(())
}
