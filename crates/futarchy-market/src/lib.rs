//! # futarchy-market
//!
//! Orchestration of one DAO's spot market and its proposal markets.
//!
//! [`FutarchyMarket`] owns the spot pool and, while a proposal is open, one
//! conditional pool per outcome. Trading happens inside a [`SwapSession`]:
//! swaps move reserves only, and [`SwapSession::commit`] feeds every oracle
//! once and then enforces the no-arbitrage band. A session that fails to
//! commit, or is dropped without committing, leaves the market exactly as it
//! was before the session began.
//!
//! ## Modules
//!
//! - [`arbitrage`] — Spot-vs-conditional round-trip arbitrage
//! - [`market`] — Market state and proposal lifecycle
//! - [`session`] — Batched swap sessions with commit/rollback

pub mod arbitrage;
pub mod market;
pub mod session;

pub use arbitrage::{
    arbitrage_after_conditional_swap, arbitrage_after_spot_swap, ArbitrageOutcome,
    ARBITRAGE_SEARCH_STEPS,
};
pub use market::{FutarchyMarket, MarketState, Proposal, Resolution};
pub use session::{ConditionalSwapReceipt, SessionReceipt, SpotSwapReceipt, SwapSession};

use futarchy_amm::AmmError;
use futarchy_feed::FeedError;
use futarchy_noarb::NoArbError;
use futarchy_oracle::OracleError;
use futarchy_types::OutcomeIndex;

/// Error types for market operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarketError {
    /// The operation needs an open proposal.
    #[error("no active proposal")]
    NoActiveProposal,

    /// A proposal is already open.
    #[error("a proposal is already active")]
    ProposalActive,

    /// Outcome index out of range.
    #[error("invalid outcome {outcome} (proposal has {outcomes} outcomes)")]
    InvalidOutcome {
        /// Requested outcome.
        outcome: OutcomeIndex,
        /// Number of outcomes.
        outcomes: usize,
    },

    /// A proposal needs at least two outcomes.
    #[error("a proposal needs at least 2 outcomes, got {0}")]
    TooFewOutcomes(usize),

    /// The moved liquidity cannot back the conditional pools.
    #[error("conditional backing is empty (asset {asset}, stable {stable})")]
    EmptyBacking {
        /// Asset moved out of spot.
        asset: u64,
        /// Stable moved out of spot.
        stable: u64,
    },

    /// Pool failure.
    #[error(transparent)]
    Amm(#[from] AmmError),

    /// Oracle failure.
    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// No-arb band failure.
    #[error(transparent)]
    NoArb(#[from] NoArbError),

    /// Price feed failure.
    #[error(transparent)]
    Feed(#[from] FeedError),
}

/// Convenience result type for market operations.
pub type Result<T> = std::result::Result<T, MarketError>;
