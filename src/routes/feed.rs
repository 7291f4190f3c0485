//! # routes::feed
//!
//! Inbound relays for market ticks and predictions.
//!
//! | Method | Path                   | Body                                         |
//! |--------|------------------------|----------------------------------------------|
//! | POST   | `/api/feed/tick`       | `{"price"\|"p", "timestamp"\|"T"}`           |
//! | POST   | `/api/feed/prediction` | prediction JSON (see [`Prediction::parse`])  |
//!
//! A malformed frame is logged and answered with 400; the strategy actor
//! never sees it.

use std::sync::atomic::Ordering;

use axum::{extract::State, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;

use crate::{
    error::AppError,
    models::{Prediction, Tick},
    state::SharedState,
};

// ─── POST /api/feed/tick ──────────────────────────────────────────────────────

pub async fn post_tick(
    State(state): State<SharedState>,
    Json(raw): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let tick = Tick::parse(&raw, Utc::now()).map_err(|e| {
        warn!(error = %e, "Malformed tick rejected");
        e
    })?;

    state.tick_count.fetch_add(1, Ordering::Relaxed);
    state.handle.tick(tick).await?;

    Ok(Json(json!({
        "ok":    true,
        "price": tick.price,
    })))
}

// ─── POST /api/feed/prediction ────────────────────────────────────────────────

pub async fn post_prediction(
    State(state): State<SharedState>,
    Json(raw): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let prediction = Prediction::parse(&raw).map_err(|e| {
        warn!(error = %e, "Malformed prediction rejected");
        e
    })?;

    let horizon = prediction.horizon.to_string();
    state.handle.prediction(prediction).await?;

    Ok(Json(json!({
        "ok":      true,
        "horizon": horizon,
    })))
}
