//! # engine::sequencer
//!
//! Assigns the monotonically increasing `seq` to every state mutation.
//!
//! `seq` is the authoritative ordering for observers: a snapshot with a lower
//! `seq` than the one already held is stale and must be discarded.

use crate::models::{Position, StrategyState};

/// `(current_seq + 1, snapshot of position)`.  Unconditional: the transition
/// to "no position" is stamped like any other.
pub fn stamp(current_seq: u64, position: Option<&Position>) -> (u64, StrategyState) {
    let seq = current_seq + 1;
    (seq, StrategyState::capture(seq, position))
}

/// Holds the counter and the most recently stamped snapshot.
#[derive(Debug, Default)]
pub struct Sequencer {
    seq:    u64,
    latest: StrategyState,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp a mutation and remember the result as the latest snapshot.
    pub fn stamp(&mut self, position: Option<&Position>) -> StrategyState {
        let (seq, state) = stamp(self.seq, position);
        self.seq = seq;
        self.latest = state.clone();
        state
    }

    /// Last stamped snapshot; `{"seq": 0}` before the first mutation.
    pub fn latest(&self) -> &StrategyState {
        &self.latest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Direction, StopParams};
    use chrono::Utc;

    fn make_position() -> Position {
        let params = StopParams {
            initial_stop_loss_points:   2000.0,
            trailing_activation_offset: 1000.0,
            trailing_stop_distance:     900.0,
        };
        Position::open(Direction::Long, 100000.0, 100700.0, Utc::now(), &params)
    }

    #[test]
    fn test_stamp_increments() {
        let (seq, state) = stamp(4, None);
        assert_eq!(seq, 5);
        assert_eq!(state.seq, 5);
        assert!(!state.has_position());
    }

    #[test]
    fn test_sequencer_is_monotonic_across_clear() {
        let position = make_position();
        let mut seqr = Sequencer::new();
        assert_eq!(seqr.latest().seq, 0);

        let open = seqr.stamp(Some(&position));
        let close = seqr.stamp(None);

        assert_eq!(open.seq, 1);
        assert_eq!(open.entry, Some(100000.0));
        assert_eq!(close.seq, 2);
        assert!(!close.has_position());
        assert_eq!(seqr.latest(), &close);
    }
}
