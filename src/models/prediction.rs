//! # models::prediction
//!
//! Defines [`Prediction`], one forecast row from the prediction feed, and
//! [`Horizon`], the forward distance that row targets.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::FeedError;
use crate::models::tick::{number_field, timestamp_field};

// ─── Horizon ──────────────────────────────────────────────────────────────────

/// Forward time distance a prediction targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Horizon {
    OneHour,
    TwoHours,
    FourHours,
}

impl Horizon {
    pub const ALL: [Horizon; 3] = [Horizon::OneHour, Horizon::TwoHours, Horizon::FourHours];

    pub fn hours(self) -> u32 {
        match self {
            Horizon::OneHour   => 1,
            Horizon::TwoHours  => 2,
            Horizon::FourHours => 4,
        }
    }

    pub fn from_hours(hours: u32) -> Option<Self> {
        match hours {
            1 => Some(Horizon::OneHour),
            2 => Some(Horizon::TwoHours),
            4 => Some(Horizon::FourHours),
            _ => None,
        }
    }
}

impl std::fmt::Display for Horizon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}h", self.hours())
    }
}

/// The UI expects the timeframe as a string, e.g. `"2"`.
impl Serialize for Horizon {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.hours().to_string())
    }
}

// ─── Prediction ───────────────────────────────────────────────────────────────

/// A single price forecast.
///
/// `prediction_price` is the market price when the forecast was made,
/// `predicted_price` the forecast for `predicted_time`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Upstream row id, when the feed provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub prediction_price: f64,
    pub predicted_price: f64,
    pub prediction_time: DateTime<Utc>,
    pub predicted_time: DateTime<Utc>,
    #[serde(rename = "prediction_timeframe")]
    pub horizon: Horizon,
}

impl Prediction {
    /// `predicted_price - prediction_price`; the sign gives the direction.
    #[inline]
    pub fn price_diff(&self) -> f64 {
        self.predicted_price - self.prediction_price
    }

    /// Parse a prediction pushed to `POST /api/feed/prediction`.
    ///
    /// The horizon is read from `horizon` or `prediction_timeframe`, either
    /// as a number or a numeric string.
    pub fn parse(raw: &Value) -> Result<Self, FeedError> {
        let field = |name: &'static str| raw.get(name).ok_or(FeedError::MissingField(name));

        let prediction_price = number_field(field("prediction_price")?, "prediction_price")?;
        let predicted_price  = number_field(field("predicted_price")?, "predicted_price")?;

        for (name, value) in [("prediction_price", prediction_price), ("predicted_price", predicted_price)] {
            if !value.is_finite() {
                return Err(FeedError::InvalidField {
                    field:  name,
                    reason: format!("{value} is not finite"),
                });
            }
        }

        let prediction_time = timestamp_field(field("prediction_time")?, "prediction_time")?;
        let predicted_time  = timestamp_field(field("predicted_time")?, "predicted_time")?;

        let horizon_value = raw
            .get("horizon")
            .or_else(|| raw.get("prediction_timeframe"))
            .ok_or(FeedError::MissingField("horizon"))?;
        let hours = number_field(horizon_value, "horizon")?;
        let whole_hours = (hours.fract() == 0.0 && hours > 0.0).then_some(hours as u32);
        let horizon = whole_hours
            .and_then(Horizon::from_hours)
            .ok_or_else(|| FeedError::InvalidField {
                field:  "horizon",
                reason: format!("{hours} is not one of 1, 2, 4"),
            })?;

        let id = raw.get("id").and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

        Ok(Self {
            id,
            prediction_price,
            predicted_price,
            prediction_time,
            predicted_time,
            horizon,
        })
    }
}
