//! # futarchy-noarb
//!
//! No-arbitrage band between the spot pool and the conditional pools of an
//! active proposal.
//!
//! Every spot token backs one conditional token of every outcome, so the
//! spot price must stay within the range of conditional prices: if spot
//! trades below the cheapest outcome, buying spot and selling every outcome
//! is free money; if it trades above the most expensive outcome, buying
//! every outcome and redeeming into spot is. Fees make small gaps
//! unprofitable, so the band is widened by the fees paid on both legs.
//!
//! ## Modules
//!
//! - [`band`] — Band computation and the spot-in-band guard

pub mod band;

pub use band::{compute_noarb_band, ensure_spot_in_band, NoArbBand};

use futarchy_amm::AmmError;
use futarchy_types::Price;

/// Error types for no-arb checks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NoArbError {
    /// The conditional pool set is empty.
    #[error("no conditional pools provided")]
    NoPoolsProvided,

    /// Spot price lies outside the band.
    #[error("spot price {spot} outside no-arb band [{floor}, {ceiling}]")]
    SpotOutOfBand {
        /// Spot price.
        spot: Price,
        /// Band floor.
        floor: Price,
        /// Band ceiling.
        ceiling: Price,
    },

    /// A pool fee of 100% or more makes the band undefined.
    #[error("invalid pool fee: {0} bps")]
    InvalidFee(u16),

    /// The cheapest outcome is priced so low that the floor rounds to zero.
    #[error("conditional price {0} too low for a positive band floor")]
    PriceTooLow(Price),

    /// Arithmetic overflow.
    #[error("arithmetic overflow in band calculation")]
    Overflow,

    /// Pool read failure (for example an empty pool).
    #[error(transparent)]
    Pool(#[from] AmmError),
}

/// Convenience result type for no-arb checks.
pub type Result<T> = std::result::Result<T, NoArbError>;
