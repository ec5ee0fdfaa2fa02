//! # futarchy-oracle
//!
//! Manipulation-resistant price oracle for spot and conditional markets.
//!
//! Each pool embeds a [`twap::SimpleTwap`]: a windowed time-weighted average
//! whose finalized value can move at most a fixed fraction of itself per
//! update call, plus a ring of weekly checkpoints that lets callers
//! reconstruct averages over long trailing windows (90 days).
//!
//! ## Modules
//!
//! - [`twap`] — Percent-capped windowed TWAP accumulator
//! - [`checkpoint`] — Bounded checkpoint ring for long-window reconstruction

pub mod checkpoint;
pub mod twap;

pub use checkpoint::{Checkpoint, CheckpointRing};
pub use twap::{SimpleTwap, TwapConfig};

/// Error types for oracle operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    /// Window size must be non-zero.
    #[error("invalid window size: {0} ms")]
    InvalidWindowSize(u64),

    /// Movement cap must lie strictly between 0 and 1,000,000 ppm.
    #[error("invalid max movement: {0} ppm")]
    InvalidMaxMovement(u64),

    /// Price is zero where a positive price is required.
    #[error("invalid price: {0}")]
    InvalidPrice(u128),

    /// Update timestamp is earlier than the last accepted update.
    #[error("timestamp regression: {now} < {last_update}")]
    TimestampRegression {
        /// The rejected timestamp.
        now: u64,
        /// The last accepted timestamp.
        last_update: u64,
    },

    /// The oracle has not been seeded with a price yet.
    #[error("oracle not initialized")]
    NotInitialized,

    /// Backfill period is empty or inverted.
    #[error("invalid backfill period: start {start}, end {end}")]
    InvalidBackfillPeriod {
        /// Period start.
        start: u64,
        /// Period end.
        end: u64,
    },

    /// Backfill period does not begin where the oracle left off.
    #[error("non-contiguous backfill: period starts at {period_start}, oracle last updated at {last_update}")]
    NonContiguousBackfill {
        /// Start of the offered period.
        period_start: u64,
        /// The oracle's last update.
        last_update: u64,
    },

    /// More checkpoints than the ring retains.
    #[error("too many checkpoints: {count} > {max}")]
    TooManyCheckpoints {
        /// Checkpoints offered.
        count: usize,
        /// Ring capacity.
        max: usize,
    },

    /// Restored oracle state breaks an internal invariant.
    #[error("invalid oracle state: {0}")]
    InvalidState(&'static str),

    /// Arithmetic overflow in fixed-point movement-cap math.
    #[error("arithmetic overflow in oracle calculation")]
    Overflow,
}

/// Convenience result type for oracle operations.
pub type Result<T> = std::result::Result<T, OracleError>;
