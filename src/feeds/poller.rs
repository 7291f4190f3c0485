//! # feeds::poller
//!
//! Pulls the newest prediction per horizon from an oracle-style HTTP API and
//! forwards each one to the strategy actor exactly once.
//!
//! ```text
//! GET {url}?token=BTC&model=v2&timeframe=2&startTime=…&endTime=…
//! → {"success": true, "predictions": [{"predictionMadeTime": 1772458200,
//!     "priceAtPrediction": 100000.0, "predictionTime": 1772465400,
//!     "predictedPrice": 100700.0}, …]}
//! ```
//!
//! Times are unix seconds; rows are oldest first.  A row is new when its
//! `predictionTime` differs from the last one forwarded for that horizon.
//! Errors are logged and the next cycle retries.

use std::collections::HashMap;

use anyhow::{bail, Context};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PollerConfig;
use crate::engine::actor::StrategyHandle;
use crate::models::{Horizon, Prediction};

/// Look-back window of each query.
const QUERY_WINDOW_HOURS: i64 = 2;

#[derive(Debug, Deserialize)]
struct OracleResponse {
    #[serde(default)]
    success:     bool,
    #[serde(default)]
    predictions: Vec<OracleRow>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OracleRow {
    prediction_made_time: Option<f64>,
    price_at_prediction:  Option<f64>,
    prediction_time:      Option<f64>,
    predicted_price:      Option<f64>,
}

impl OracleRow {
    /// `None` if any field is missing or out of range.
    fn into_prediction(self, horizon: Horizon) -> Option<Prediction> {
        let made = unix_secs(self.prediction_made_time?)?;
        let target = unix_secs(self.prediction_time?)?;
        let prediction_price = self.price_at_prediction.filter(|p| p.is_finite())?;
        let predicted_price = self.predicted_price.filter(|p| p.is_finite())?;

        Some(Prediction {
            id: Some(made.timestamp().to_string()),
            prediction_price,
            predicted_price,
            prediction_time: made,
            predicted_time: target,
            horizon,
        })
    }
}

fn unix_secs(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    Utc.timestamp_millis_opt((secs * 1000.0) as i64).single()
}

/// Remembers the last `predicted_time` forwarded per horizon.
#[derive(Debug, Default)]
pub struct Deduper {
    last_seen: HashMap<Horizon, DateTime<Utc>>,
}

impl Deduper {
    /// `true` (and remembered) if `prediction` is new for its horizon.
    pub fn accept(&mut self, prediction: &Prediction) -> bool {
        match self.last_seen.insert(prediction.horizon, prediction.predicted_time) {
            Some(previous) => previous != prediction.predicted_time,
            None => true,
        }
    }
}

/// Query one horizon and return its newest row.
async fn fetch_latest(
    client: &reqwest::Client,
    config: &PollerConfig,
    horizon: Horizon,
    now: DateTime<Utc>,
) -> anyhow::Result<Option<Prediction>> {
    let start = (now - chrono::Duration::hours(QUERY_WINDOW_HOURS)).to_rfc3339();
    let end = now.to_rfc3339();
    let timeframe = horizon.hours().to_string();

    let resp: OracleResponse = client
        .get(&config.url)
        .query(&[
            ("token", config.token.as_str()),
            ("model", config.model.as_str()),
            ("timeframe", timeframe.as_str()),
            ("startTime", start.as_str()),
            ("endTime", end.as_str()),
        ])
        .timeout(std::time::Duration::from_secs(10))
        .send()
        .await
        .context("Prediction API unreachable")?
        .error_for_status()
        .context("Prediction API returned an error status")?
        .json()
        .await
        .context("Failed to parse prediction response")?;

    if !resp.success {
        bail!("Prediction API reported success=false");
    }

    Ok(resp
        .predictions
        .into_iter()
        .last()
        .and_then(|row| row.into_prediction(horizon)))
}

pub async fn run_poller(handle: StrategyHandle, config: PollerConfig, token: CancellationToken) {
    let client = reqwest::Client::new();
    let mut dedupe = Deduper::default();
    let mut ticker = interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(url = %config.url, interval = ?config.interval, "🔮 Prediction poller started");

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let now = Utc::now();
        let mut forwarded = 0;
        for horizon in Horizon::ALL {
            let prediction = match fetch_latest(&client, &config, horizon, now).await {
                Ok(Some(p)) => p,
                Ok(None) => continue,
                Err(e) => {
                    warn!(%horizon, error = %e, "Prediction fetch failed");
                    continue;
                }
            };

            if !dedupe.accept(&prediction) {
                continue;
            }

            info!(
                %horizon,
                predicted_price = prediction.predicted_price,
                predicted_time  = %prediction.predicted_time,
                "New prediction"
            );
            if handle.prediction(prediction).await.is_err() {
                warn!("Prediction poller stopped — strategy engine gone");
                return;
            }
            forwarded += 1;
        }

        if forwarded == 0 {
            debug!("No new predictions this cycle");
        }
    }

    info!("🔮 Prediction poller stopped");
}
