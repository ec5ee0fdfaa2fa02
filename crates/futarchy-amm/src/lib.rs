//! # futarchy-amm
//!
//! Constant-product pools for futarchy markets.
//!
//! A DAO has one [`spot::UnifiedSpotPool`] for its base asset. While a
//! proposal is under consideration part of the spot liquidity backs one
//! [`conditional::LiquidityPool`] per outcome. Every pool embeds its own
//! [`SimpleTwap`] oracle.
//!
//! Swaps only move reserves. The oracle is fed once per batch through
//! `update_twap`, so that the cost of oracle maintenance follows the number
//! of batches rather than the number of swaps.
//!
//! ## Modules
//!
//! - [`curve`] — Constant-product reserves, swap and liquidity math
//! - [`conditional`] — Per-outcome conditional pool
//! - [`spot`] — Base-asset spot pool with proposal lock

use serde::{Deserialize, Serialize};

use futarchy_oracle::{OracleError, SimpleTwap};
use futarchy_types::Price;

pub mod conditional;
pub mod curve;
pub mod spot;

pub use conditional::LiquidityPool;
pub use curve::ConstantProduct;
pub use spot::UnifiedSpotPool;

/// Direction of a swap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwapDirection {
    /// Sell asset, receive stable.
    AssetToStable,
    /// Sell stable, receive asset.
    StableToAsset,
}

impl SwapDirection {
    /// The opposite direction.
    pub fn reverse(self) -> Self {
        match self {
            SwapDirection::AssetToStable => SwapDirection::StableToAsset,
            SwapDirection::StableToAsset => SwapDirection::AssetToStable,
        }
    }
}

impl std::fmt::Display for SwapDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Read-only view of a pool used by price consumers.
pub trait PricedPool {
    /// `(asset_reserve, stable_reserve)`.
    fn reserves(&self) -> (u64, u64);

    /// Instant reserve-ratio price, scaled by `PRICE_SCALE`.
    fn current_price(&self) -> Result<Price>;

    /// Trading fee in basis points.
    fn fee_bps(&self) -> u16;

    /// The pool's oracle.
    fn embedded_twap_oracle(&self) -> &SimpleTwap;
}

/// Error types for pool operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmmError {
    /// Amount is zero.
    #[error("amount is zero")]
    ZeroAmount,

    /// A reserve is zero, so no price or swap is possible.
    #[error("pool has no liquidity")]
    EmptyPool,

    /// Reserves are inconsistent (exactly one side is zero).
    #[error("invalid reserves: asset {asset}, stable {stable}")]
    InvalidReserves {
        /// Asset reserve.
        asset: u64,
        /// Stable reserve.
        stable: u64,
    },

    /// Fee must be below 100%.
    #[error("invalid fee: {0} bps")]
    InvalidFee(u16),

    /// Output below the caller's minimum.
    #[error("slippage exceeded: minimum {min_out}, actual {actual}")]
    SlippageExceeded {
        /// Requested minimum output.
        min_out: u64,
        /// Output the swap would produce.
        actual: u64,
    },

    /// Not enough reserves or LP supply for the request.
    #[error("insufficient liquidity: requested {requested}, available {available}")]
    InsufficientLiquidity {
        /// Requested amount.
        requested: u64,
        /// Available amount.
        available: u64,
    },

    /// Constant product decreased across a swap.
    #[error("constant-product invariant violated: k {before} -> {after}")]
    InvariantViolated {
        /// k before the swap.
        before: u128,
        /// k after the swap.
        after: u128,
    },

    /// Liquidity ratio must be at most 10,000 bps.
    #[error("invalid liquidity ratio: {0} bps")]
    InvalidRatio(u16),

    /// Spot pool is already locked for a proposal.
    #[error("spot pool already locked for a proposal")]
    AlreadyLocked,

    /// Spot pool is not locked.
    #[error("spot pool is not locked for a proposal")]
    NotLocked,

    /// Liquidity cannot change while a proposal holds the spot pool.
    #[error("spot pool is locked for a proposal")]
    PoolLocked,

    /// Arithmetic overflow.
    #[error("arithmetic overflow in pool calculation")]
    Overflow,

    /// Oracle failure.
    #[error(transparent)]
    Oracle(#[from] OracleError),
}

/// Convenience result type for pool operations.
pub type Result<T> = std::result::Result<T, AmmError>;
