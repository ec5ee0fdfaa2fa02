//! Checkpoint ring for long-window TWAP reconstruction.
//!
//! A checkpoint records the all-time cumulative `price x time` at a moment.
//! The average over any window that starts at or after a checkpoint is:
//!
//! ```text
//! avg = (cumulative_now - checkpoint.cumulative) / (now - checkpoint.timestamp)
//! ```
//!
//! The ring holds at most [`MAX_CHECKPOINTS`] entries and evicts the oldest
//! first. With one checkpoint per [`CHECKPOINT_INTERVAL_MS`] this covers
//! roughly 140 days of history.

use std::collections::VecDeque;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use futarchy_types::SEVEN_DAYS_MS;

use crate::OracleError;

/// Maximum number of retained checkpoints.
pub const MAX_CHECKPOINTS: usize = 20;

/// Minimum spacing between checkpoints (7 days).
pub const CHECKPOINT_INTERVAL_MS: u64 = SEVEN_DAYS_MS;

/// A snapshot of the all-time accumulator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// When the snapshot was taken (ms).
    pub timestamp: u64,
    /// All-time cumulative `price x ms` at `timestamp`.
    pub cumulative: BigUint,
}

/// Bounded FIFO of checkpoints, oldest first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCheckpointRing")]
pub struct CheckpointRing {
    entries: VecDeque<Checkpoint>,
}

#[derive(Deserialize)]
struct RawCheckpointRing {
    entries: VecDeque<Checkpoint>,
}

impl TryFrom<RawCheckpointRing> for CheckpointRing {
    type Error = OracleError;

    fn try_from(raw: RawCheckpointRing) -> Result<Self, Self::Error> {
        if raw.entries.len() > MAX_CHECKPOINTS {
            return Err(OracleError::TooManyCheckpoints {
                count: raw.entries.len(),
                max: MAX_CHECKPOINTS,
            });
        }
        let ordered = raw
            .entries
            .iter()
            .zip(raw.entries.iter().skip(1))
            .all(|(a, b)| a.timestamp < b.timestamp && a.cumulative <= b.cumulative);
        if !ordered {
            return Err(OracleError::InvalidState("checkpoints out of order"));
        }
        Ok(Self {
            entries: raw.entries,
        })
    }
}

impl CheckpointRing {
    /// Create an empty ring.
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(MAX_CHECKPOINTS),
        }
    }

    /// Append a checkpoint, evicting the oldest entry when full.
    pub fn push(&mut self, checkpoint: Checkpoint) {
        if self.entries.len() == MAX_CHECKPOINTS {
            self.entries.pop_front();
        }
        self.entries.push_back(checkpoint);
    }

    /// Newest checkpoint with `timestamp <= target`.
    ///
    /// Scans backwards from the newest entry; bounded by [`MAX_CHECKPOINTS`].
    pub fn at_or_before(&self, target: u64) -> Option<&Checkpoint> {
        self.entries.iter().rev().find(|c| c.timestamp <= target)
    }

    /// Most recent checkpoint.
    pub fn latest(&self) -> Option<&Checkpoint> {
        self.entries.back()
    }

    /// Oldest retained checkpoint.
    pub fn oldest(&self) -> Option<&Checkpoint> {
        self.entries.front()
    }

    /// Number of retained checkpoints.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ring is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Checkpoint> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cp(timestamp: u64, cumulative: u64) -> Checkpoint {
        Checkpoint {
            timestamp,
            cumulative: BigUint::from(cumulative),
        }
    }

    #[test]
    fn test_push_evicts_oldest() {
        let mut ring = CheckpointRing::new();
        for i in 0..(MAX_CHECKPOINTS as u64 + 5) {
            ring.push(cp(i * 10, i));
        }
        assert_eq!(ring.len(), MAX_CHECKPOINTS);
        assert_eq!(ring.oldest().map(|c| c.timestamp), Some(50));
        assert_eq!(ring.latest().map(|c| c.timestamp), Some(240));
    }

    #[test]
    fn test_at_or_before() {
        let mut ring = CheckpointRing::new();
        ring.push(cp(100, 1));
        ring.push(cp(200, 2));
        ring.push(cp(300, 3));

        assert_eq!(ring.at_or_before(99), None);
        assert_eq!(ring.at_or_before(100).map(|c| c.timestamp), Some(100));
        assert_eq!(ring.at_or_before(250).map(|c| c.timestamp), Some(200));
        assert_eq!(ring.at_or_before(10_000).map(|c| c.timestamp), Some(300));
    }

    #[test]
    fn test_deserialize_enforces_capacity_and_order() {
        let mut ring = CheckpointRing::new();
        ring.push(cp(100, 1));
        ring.push(cp(200, 2));
        let json = serde_json::to_string(&ring).expect("serialize");
        let parsed: CheckpointRing = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed, ring);

        let oversized: Vec<Checkpoint> =
            (0..=MAX_CHECKPOINTS as u64).map(|i| cp(i * 10, i)).collect();
        let json = serde_json::json!({ "entries": oversized });
        let err = serde_json::from_value::<CheckpointRing>(json).unwrap_err();
        assert!(err.to_string().contains("too many checkpoints"));

        let json = serde_json::json!({ "entries": [cp(200, 2), cp(100, 1)] });
        let err = serde_json::from_value::<CheckpointRing>(json).unwrap_err();
        assert!(err.to_string().contains("out of order"));
    }

    #[test]
    fn test_empty_ring() {
        let ring = CheckpointRing::default();
        assert!(ring.is_empty());
        assert!(ring.latest().is_none());
        assert!(ring.at_or_before(u64::MAX).is_none());
    }
}
