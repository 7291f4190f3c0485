//! # models::state
//!
//! [`StrategyState`]: the sequenced, read-only snapshot observers adopt.
//!
//! The JSON keys (`SL`, `TP`, `ENTRY`, `TSA`, `TRAILING_STOP_ACTIVE`, `seq`)
//! are what the chart UI reads; with no position the snapshot is just
//! `{"seq": n}`.

use serde::{Deserialize, Serialize};

use crate::models::Position;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyState {
    #[serde(rename = "SL", skip_serializing_if = "Option::is_none", default)]
    pub stop_loss: Option<f64>,

    #[serde(rename = "TP", skip_serializing_if = "Option::is_none", default)]
    pub target: Option<f64>,

    #[serde(rename = "ENTRY", skip_serializing_if = "Option::is_none", default)]
    pub entry: Option<f64>,

    #[serde(rename = "TSA", skip_serializing_if = "Option::is_none", default)]
    pub trailing_activation: Option<f64>,

    #[serde(rename = "TRAILING_STOP_ACTIVE", skip_serializing_if = "Option::is_none", default)]
    pub trailing_stop_active: Option<bool>,

    pub seq: u64,
}

impl StrategyState {
    /// Snapshot of `position` (or of "no position") at `seq`.
    pub fn capture(seq: u64, position: Option<&Position>) -> Self {
        match position {
            None => Self { seq, ..Self::default() },
            Some(p) => Self {
                stop_loss:            Some(p.stop_loss),
                target:               Some(p.target),
                entry:                Some(p.entry_price),
                trailing_activation:  Some(p.trailing_activation_price),
                trailing_stop_active: Some(p.trailing_active),
                seq,
            },
        }
    }

    pub fn has_position(&self) -> bool {
        self.entry.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_snapshot_is_seq_only() {
        let v = serde_json::to_value(StrategyState::capture(7, None)).unwrap();
        assert_eq!(v, json!({ "seq": 7 }));
    }

    #[test]
    fn test_full_snapshot_keys() {
        let state = StrategyState {
            stop_loss:            Some(98000.0),
            target:               Some(100700.0),
            entry:                Some(100000.0),
            trailing_activation:  Some(101000.0),
            trailing_stop_active: Some(false),
            seq:                  1,
        };
        let v = serde_json::to_value(&state).unwrap();
        assert_eq!(
            v,
            json!({
                "SL": 98000.0, "TP": 100700.0, "ENTRY": 100000.0,
                "TSA": 101000.0, "TRAILING_STOP_ACTIVE": false, "seq": 1
            })
        );
    }
}
