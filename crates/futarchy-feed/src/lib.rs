//! # futarchy-feed
//!
//! External-facing price feed that unifies the spot and conditional markets.
//!
//! The feed owns no state: every reading is a pure function of the spot
//! pool, the conditional pools of the active proposal and the clock. When a
//! proposal holds at least half of the liquidity, the spot pool is too thin
//! to trust and the feed reads the conditional markets instead.
//!
//! ## Modules
//!
//! - [`unified`] — Source switching and TWAP readings

pub mod unified;

pub use unified::{
    get_current_twap, get_geometric_governance_twap, is_twap_available, price_source,
    PriceSource, CONDITIONAL_LIQUIDITY_THRESHOLD_BPS,
};

use futarchy_amm::AmmError;
use futarchy_oracle::OracleError;

/// Error types for feed readings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    /// The conditional source was selected but no conditional pools exist.
    #[error("no conditional oracles available")]
    NoOracles,

    /// No long-window TWAP can be answered yet.
    #[error("long-window TWAP not ready")]
    TwapNotReady,

    /// Oracle failure.
    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// Pool failure.
    #[error(transparent)]
    Pool(#[from] AmmError),
}

/// Convenience result type for feed readings.
pub type Result<T> = std::result::Result<T, FeedError>;
