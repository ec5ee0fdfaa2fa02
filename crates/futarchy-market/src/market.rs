//! Market state and proposal lifecycle.
//!
//! ```text
//!            begin_proposal                 resolve(winner)
//!   Spot ───────────────────▶ Proposal ───────────────────▶ Spot
//!   spot oracle live          spot locked, oracle frozen     winner reserves returned,
//!                             conditional oracles forked     spot oracle backfilled
//! ```

use serde::{Deserialize, Serialize};

use futarchy_amm::curve::LiquidityDeposit;
use futarchy_amm::{LiquidityPool, PricedPool, UnifiedSpotPool};
use futarchy_noarb::{compute_noarb_band, NoArbBand};
use futarchy_oracle::OracleError;
use futarchy_types::{OutcomeIndex, Price};

use crate::session::SwapSession;
use crate::{MarketError, Result};

/// An open proposal and its conditional markets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// One pool per outcome, indexed by outcome.
    pub pools: Vec<LiquidityPool>,
    /// When the proposal opened and the spot pool was locked.
    pub started_at: u64,
    /// Spot liquidity moved into the conditional markets `(asset, stable)`.
    pub backing: (u64, u64),
}

/// Whether a proposal is open.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketState {
    /// Only the spot market trades.
    Spot,
    /// A proposal's conditional markets trade alongside spot.
    Proposal(Proposal),
}

/// Summary of a resolved proposal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Winning outcome.
    pub winner: OutcomeIndex,
    /// Asset returned to spot from the winning pool.
    pub asset_returned: u64,
    /// Stable returned to spot from the winning pool.
    pub stable_returned: u64,
    /// Start of the backfilled period.
    pub period_start: u64,
    /// End of the backfilled period.
    pub period_end: u64,
    /// Winning market's finalized TWAP at resolution.
    pub final_twap: Price,
}

/// A DAO's spot market plus the conditional markets of its open proposal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FutarchyMarket {
    pub(crate) spot: UnifiedSpotPool,
    pub(crate) state: MarketState,
}

impl FutarchyMarket {
    /// Wrap a spot pool with no proposal open.
    pub fn new(spot: UnifiedSpotPool) -> Self {
        Self {
            spot,
            state: MarketState::Spot,
        }
    }

    /// Open a proposal with `outcomes` conditional markets.
    ///
    /// Locks the spot pool, moves `ratio_bps` of its reserves into
    /// conditional backing and seeds every outcome pool with the full
    /// moved amount, since each backing unit mints one conditional unit per
    /// outcome. Every outcome oracle is forked from the spot oracle.
    ///
    /// On error the market is left unchanged.
    ///
    /// # Errors
    ///
    /// - [`MarketError::ProposalActive`] if a proposal is already open
    /// - [`MarketError::TooFewOutcomes`] if `outcomes < 2`
    /// - [`MarketError::EmptyBacking`] if the moved share rounds to zero
    /// - [`MarketError::Amm`] if the spot pool cannot be locked or `fee_bps` is invalid
    pub fn begin_proposal(
        &mut self,
        outcomes: usize,
        ratio_bps: u16,
        fee_bps: u16,
        now: u64,
    ) -> Result<()> {
        if matches!(self.state, MarketState::Proposal(_)) {
            return Err(MarketError::ProposalActive);
        }
        if outcomes < 2 {
            return Err(MarketError::TooFewOutcomes(outcomes));
        }

        let snapshot = self.clone();
        let result = self.open_proposal(outcomes, ratio_bps, fee_bps, now);
        if result.is_err() {
            *self = snapshot;
        }
        result
    }

    fn open_proposal(
        &mut self,
        outcomes: usize,
        ratio_bps: u16,
        fee_bps: u16,
        now: u64,
    ) -> Result<()> {
        let (asset, stable) = self.spot.lock_for_proposal(ratio_bps, now)?;
        if asset == 0 || stable == 0 {
            return Err(MarketError::EmptyBacking { asset, stable });
        }
        let oracle = self.spot.embedded_twap_oracle().fork()?;
        let pools = (0..outcomes)
            .map(|outcome| LiquidityPool::new(outcome, asset, stable, fee_bps, oracle.clone()))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        self.state = MarketState::Proposal(Proposal {
            pools,
            started_at: now,
            backing: (asset, stable),
        });
        tracing::info!(outcomes, ratio_bps, fee_bps, asset, stable, now, "proposal opened");
        Ok(())
    }

    /// Resolve the open proposal in favour of `winner`.
    ///
    /// Brings every conditional oracle up to `now`, returns the winning
    /// pool's reserves to spot, unlocks it and splices the winning market's
    /// price history over the proposal period into the spot oracle.
    ///
    /// On error the market is left unchanged.
    ///
    /// # Errors
    ///
    /// - [`MarketError::NoActiveProposal`] if no proposal is open
    /// - [`MarketError::InvalidOutcome`] if `winner` is out of range
    /// - [`MarketError::Oracle`] if `now` is before an oracle's last update
    pub fn resolve(&mut self, winner: OutcomeIndex, now: u64) -> Result<Resolution> {
        let outcomes = match &self.state {
            MarketState::Proposal(proposal) => proposal.pools.len(),
            MarketState::Spot => return Err(MarketError::NoActiveProposal),
        };
        if winner >= outcomes {
            return Err(MarketError::InvalidOutcome {
                outcome: winner,
                outcomes,
            });
        }

        let snapshot = self.clone();
        let result = self.close_proposal(winner, now);
        if result.is_err() {
            *self = snapshot;
        }
        result
    }

    fn close_proposal(&mut self, winner: OutcomeIndex, now: u64) -> Result<Resolution> {
        let mut proposal = match std::mem::replace(&mut self.state, MarketState::Spot) {
            MarketState::Proposal(proposal) => proposal,
            MarketState::Spot => return Err(MarketError::NoActiveProposal),
        };
        for pool in proposal.pools.iter_mut() {
            pool.update_twap(now)?;
        }
        let winning = proposal
            .pools
            .get(winner)
            .ok_or(MarketError::InvalidOutcome {
                outcome: winner,
                outcomes: proposal.pools.len(),
            })?;

        let spot_oracle = self.spot.embedded_twap_oracle();
        let period_start = spot_oracle.last_update();
        let baseline = spot_oracle.cumulative_total().clone();
        let winner_oracle = winning.embedded_twap_oracle();
        let winner_total = winner_oracle.projected_cumulative(now).ok_or(
            OracleError::TimestampRegression {
                now,
                last_update: winner_oracle.last_update(),
            },
        )?;
        if winner_total < baseline {
            return Err(MarketError::Oracle(OracleError::Overflow));
        }
        let period_cumulative = winner_total - baseline;
        let final_twap = winning.twap()?;
        let (asset, stable) = winning.reserves();
        let (fee_asset, fee_stable) = winning.curve().protocol_fees();

        self.spot.unlock_after_proposal(asset, stable)?;
        self.spot
            .curve_mut()
            .credit_protocol_fees(fee_asset, fee_stable);
        if now > period_start {
            self.spot
                .backfill_twap(period_start, now, &period_cumulative, final_twap)?;
        }

        tracing::info!(
            winner,
            asset,
            stable,
            period_start,
            period_end = now,
            final_twap,
            "proposal resolved"
        );
        Ok(Resolution {
            winner,
            asset_returned: asset,
            stable_returned: stable,
            period_start,
            period_end: now,
            final_twap,
        })
    }

    /// Start a batch of swaps at `now`.
    pub fn begin_session(&mut self, now: u64) -> SwapSession<'_> {
        SwapSession::new(self, now)
    }

    /// Deposit spot liquidity.
    ///
    /// # Errors
    ///
    /// - [`MarketError::Amm`] with `PoolLocked` while a proposal is open
    pub fn add_spot_liquidity(&mut self, asset: u64, stable: u64) -> Result<LiquidityDeposit> {
        Ok(self.spot.add_liquidity(asset, stable)?)
    }

    /// Withdraw spot liquidity.
    ///
    /// # Errors
    ///
    /// - [`MarketError::Amm`] with `PoolLocked` while a proposal is open
    pub fn remove_spot_liquidity(&mut self, lp: u64) -> Result<(u64, u64)> {
        Ok(self.spot.remove_liquidity(lp)?)
    }

    /// The spot pool.
    pub fn spot(&self) -> &UnifiedSpotPool {
        &self.spot
    }

    /// Lifecycle state.
    pub fn state(&self) -> &MarketState {
        &self.state
    }

    /// The open proposal, if any.
    pub fn proposal(&self) -> Option<&Proposal> {
        match &self.state {
            MarketState::Proposal(proposal) => Some(proposal),
            MarketState::Spot => None,
        }
    }

    /// Conditional pools of the open proposal; empty when none is open.
    pub fn conditional_pools(&self) -> &[LiquidityPool] {
        match &self.state {
            MarketState::Proposal(proposal) => &proposal.pools,
            MarketState::Spot => &[],
        }
    }

    /// Current no-arb band.
    ///
    /// # Errors
    ///
    /// - [`MarketError::NoActiveProposal`] if no proposal is open
    pub fn band(&self) -> Result<NoArbBand> {
        let pools = self.conditional_pools();
        if pools.is_empty() {
            return Err(MarketError::NoActiveProposal);
        }
        Ok(compute_noarb_band(&self.spot, pools)?)
    }

    /// Feed price from [`futarchy_feed::get_current_twap`].
    pub fn current_twap(&self) -> Result<Price> {
        Ok(futarchy_feed::get_current_twap(
            &self.spot,
            self.conditional_pools(),
        )?)
    }

    /// Feed price from [`futarchy_feed::get_geometric_governance_twap`].
    pub fn governance_twap(&self, now: u64) -> Result<Price> {
        Ok(futarchy_feed::get_geometric_governance_twap(
            &self.spot,
            self.conditional_pools(),
            now,
        )?)
    }

    /// Whether the spot long-horizon TWAP is available.
    pub fn is_twap_available(&self, seconds: u64, now: u64) -> bool {
        futarchy_feed::is_twap_available(&self.spot, seconds, now)
    }
}
