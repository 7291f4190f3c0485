//! # models::tick
//!
//! Defines [`Tick`], the market pulse relayed from the upstream trade stream
//! to `POST /api/feed/tick`.
//!
//! Upstream relays are not uniform: a Binance-style trade frame carries the
//! price as a string under `p` and the trade time in unix milliseconds under
//! `T`, while our own relay sends `price` / `timestamp`.  [`Tick::parse`]
//! accepts both so the boundary can reject malformed frames without ever
//! handing a half-parsed value to the engine.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FeedError;

/// A single trade price observed on the market.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Last traded price.
    pub price: f64,

    /// UTC time of the trade.
    pub timestamp: DateTime<Utc>,
}

impl Tick {
    pub fn new(price: f64, timestamp: DateTime<Utc>) -> Self {
        Self { price, timestamp }
    }

    /// Parse a loosely-shaped JSON frame into a [`Tick`].
    ///
    /// A frame without any timestamp is stamped with `received_at`.
    pub fn parse(raw: &Value, received_at: DateTime<Utc>) -> Result<Self, FeedError> {
        let price_value = raw
            .get("price")
            .or_else(|| raw.get("p"))
            .ok_or(FeedError::MissingField("price"))?;
        let price = number_field(price_value, "price")?;

        if !price.is_finite() || price <= 0.0 {
            return Err(FeedError::InvalidField {
                field:  "price",
                reason: format!("{price} is not a positive finite price"),
            });
        }

        let timestamp = match raw.get("timestamp").or_else(|| raw.get("T")) {
            Some(ts) => timestamp_field(ts, "timestamp")?,
            None => received_at,
        };

        Ok(Self { price, timestamp })
    }
}

/// Read a number that upstream may have encoded as a JSON string.
pub(crate) fn number_field(value: &Value, field: &'static str) -> Result<f64, FeedError> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| FeedError::InvalidField {
            field,
            reason: format!("{n} is not representable as f64"),
        }),
        Value::String(s) => s.trim().parse::<f64>().map_err(|e| FeedError::InvalidField {
            field,
            reason: format!("'{s}': {e}"),
        }),
        other => Err(FeedError::InvalidField {
            field,
            reason: format!("expected number, got {other}"),
        }),
    }
}

/// Read an RFC 3339 string (a trailing `Z` is fine) or unix milliseconds.
pub(crate) fn timestamp_field(value: &Value, field: &'static str) -> Result<DateTime<Utc>, FeedError> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| FeedError::InvalidField {
                field,
                reason: format!("'{s}': {e}"),
            }),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .ok_or_else(|| FeedError::InvalidField {
                field,
                reason: format!("{n} is not a unix-millis timestamp"),
            }),
        other => Err(FeedError::InvalidField {
            field,
            reason: format!("expected timestamp, got {other}"),
        }),
    }
}
