//! Batched swap sessions.
//!
//! A [`SwapSession`] holds the market exclusively for one batch of swaps.
//! Swaps only move reserves; [`SwapSession::commit`] then runs one oracle
//! update per pool and the no-arb guard. If the commit fails, or the session
//! is dropped without committing, the market is restored to its state at
//! [`FutarchyMarket::begin_session`].

use serde::{Deserialize, Serialize};

use futarchy_amm::{PricedPool, SwapDirection};
use futarchy_noarb::{ensure_spot_in_band, NoArbBand};
use futarchy_types::{OutcomeIndex, Price};

use crate::arbitrage::{
    arbitrage_after_conditional_swap, arbitrage_after_spot_swap, ArbitrageOutcome,
};
use crate::market::{FutarchyMarket, MarketState};
use crate::{MarketError, Result};

/// Result of a spot swap inside a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotSwapReceipt {
    /// Tokens paid out to the trader.
    pub amount_out: u64,
    /// Arbitrage run after the swap, if a proposal is open.
    pub arbitrage: Option<ArbitrageOutcome>,
}

/// Result of a conditional swap inside a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalSwapReceipt {
    /// Tokens paid out to the trader.
    pub amount_out: u64,
    /// Arbitrage of spot against the outcome pools after the swap.
    pub arbitrage: ArbitrageOutcome,
}

/// Result of a committed session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReceipt {
    /// Commit timestamp.
    pub now: u64,
    /// Swaps executed in the session.
    pub swaps: usize,
    /// Spot price after the session.
    pub spot_price: Price,
    /// Band the spot price was checked against, if a proposal is open.
    pub band: Option<NoArbBand>,
}

/// Exclusive batch of swaps against a [`FutarchyMarket`].
pub struct SwapSession<'a> {
    market: &'a mut FutarchyMarket,
    snapshot: Option<FutarchyMarket>,
    now: u64,
    swaps: usize,
}

impl<'a> SwapSession<'a> {
    pub(crate) fn new(market: &'a mut FutarchyMarket, now: u64) -> Self {
        let snapshot = Some(market.clone());
        Self {
            market,
            snapshot,
            now,
            swaps: 0,
        }
    }

    /// Swap on the spot pool.
    ///
    /// While a proposal is open, the swap is followed by an arbitrage pass
    /// that pulls spot back toward the conditional markets.
    pub fn swap_spot(
        &mut self,
        amount_in: u64,
        direction: SwapDirection,
        min_out: u64,
    ) -> Result<SpotSwapReceipt> {
        let market = &mut *self.market;
        let amount_out = market.spot.swap(amount_in, direction, min_out)?;
        let arbitrage = match &mut market.state {
            MarketState::Proposal(proposal) => Some(arbitrage_after_spot_swap(
                &mut market.spot,
                &mut proposal.pools,
                amount_out,
                direction,
            )?),
            MarketState::Spot => None,
        };
        self.swaps += 1;
        Ok(SpotSwapReceipt {
            amount_out,
            arbitrage,
        })
    }

    /// Swap on the conditional pool of `outcome`.
    ///
    /// The swap is followed by an arbitrage pass that moves spot toward the
    /// outcome pools when every outcome has moved past it.
    ///
    /// # Errors
    ///
    /// - [`MarketError::NoActiveProposal`] if no proposal is open
    /// - [`MarketError::InvalidOutcome`] if `outcome` is out of range
    pub fn swap_conditional(
        &mut self,
        outcome: OutcomeIndex,
        amount_in: u64,
        direction: SwapDirection,
        min_out: u64,
    ) -> Result<ConditionalSwapReceipt> {
        let market = &mut *self.market;
        let pools = match &mut market.state {
            MarketState::Proposal(proposal) => &mut proposal.pools,
            MarketState::Spot => return Err(MarketError::NoActiveProposal),
        };
        let outcomes = pools.len();
        let pool = pools
            .get_mut(outcome)
            .ok_or(MarketError::InvalidOutcome { outcome, outcomes })?;
        let amount_out = pool.swap(amount_in, direction, min_out)?;
        let arbitrage =
            arbitrage_after_conditional_swap(&mut market.spot, pools, amount_out, direction)?;
        self.swaps += 1;
        Ok(ConditionalSwapReceipt {
            amount_out,
            arbitrage,
        })
    }

    /// Read-only view of the market mid-session.
    pub fn market(&self) -> &FutarchyMarket {
        &*self.market
    }

    /// Swaps executed so far.
    pub fn swap_count(&self) -> usize {
        self.swaps
    }

    /// Feed every oracle once and enforce the no-arb band.
    ///
    /// # Errors
    ///
    /// - [`MarketError::Amm`] if an oracle update fails
    /// - [`MarketError::NoArb`] if the spot price ends outside the band
    ///
    /// The market is rolled back on any error.
    pub fn commit(mut self) -> Result<SessionReceipt> {
        let result = self.finish();
        match result {
            Ok(receipt) => {
                self.snapshot = None;
                tracing::debug!(now = receipt.now, swaps = receipt.swaps, "swap session committed");
                Ok(receipt)
            }
            // Drop restores the snapshot.
            Err(e) => {
                tracing::warn!(error = %e, swaps = self.swaps, "swap session commit failed");
                Err(e)
            }
        }
    }

    fn finish(&mut self) -> Result<SessionReceipt> {
        let now = self.now;
        let market = &mut *self.market;
        market.spot.update_twap(now)?;
        let band = match &mut market.state {
            MarketState::Proposal(proposal) => {
                for pool in proposal.pools.iter_mut() {
                    pool.update_twap(now)?;
                }
                Some(ensure_spot_in_band(&market.spot, &proposal.pools)?)
            }
            MarketState::Spot => None,
        };
        Ok(SessionReceipt {
            now,
            swaps: self.swaps,
            spot_price: market.spot.current_price()?,
            band,
        })
    }
}

impl Drop for SwapSession<'_> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.market = snapshot;
            tracing::warn!(swaps = self.swaps, now = self.now, "swap session rolled back");
        }
    }
}
