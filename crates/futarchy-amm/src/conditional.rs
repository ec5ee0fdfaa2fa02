//! Per-outcome conditional pool.
//!
//! Each outcome of an active proposal trades in its own constant-product
//! pool of conditional asset against conditional stable. The pool's oracle
//! is forked from the spot oracle when the proposal opens, so its TWAP and
//! checkpoint history continue the spot history.

use serde::{Deserialize, Serialize};

use futarchy_oracle::SimpleTwap;
use futarchy_types::{OutcomeIndex, Price};

use crate::curve::{ConstantProduct, LiquidityDeposit};
use crate::{PricedPool, Result, SwapDirection};

/// Conditional AMM for one proposal outcome.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityPool {
    outcome: OutcomeIndex,
    curve: ConstantProduct,
    oracle: SimpleTwap,
}

impl LiquidityPool {
    /// Create a pool for `outcome` with initial reserves and an oracle.
    pub fn new(
        outcome: OutcomeIndex,
        asset_reserve: u64,
        stable_reserve: u64,
        fee_bps: u16,
        oracle: SimpleTwap,
    ) -> Result<Self> {
        let curve = ConstantProduct::new(asset_reserve, stable_reserve, fee_bps)?;
        Ok(Self {
            outcome,
            curve,
            oracle,
        })
    }

    /// Outcome this pool trades.
    pub fn outcome(&self) -> OutcomeIndex {
        self.outcome
    }

    /// Quote a swap at the pool fee.
    pub fn quote(&self, amount_in: u64, direction: SwapDirection) -> Result<u64> {
        self.curve.quote(amount_in, direction)
    }

    /// Sell conditional asset for conditional stable.
    pub fn swap_asset_to_stable(&mut self, amount_in: u64, min_out: u64) -> Result<u64> {
        self.swap(amount_in, SwapDirection::AssetToStable, min_out)
    }

    /// Sell conditional stable for conditional asset.
    pub fn swap_stable_to_asset(&mut self, amount_in: u64, min_out: u64) -> Result<u64> {
        self.swap(amount_in, SwapDirection::StableToAsset, min_out)
    }

    /// Swap in either direction at the pool fee.
    pub fn swap(&mut self, amount_in: u64, direction: SwapDirection, min_out: u64) -> Result<u64> {
        let out = self.curve.swap(amount_in, direction, min_out)?;
        tracing::debug!(
            outcome = self.outcome,
            %direction,
            amount_in,
            amount_out = out,
            "conditional swap"
        );
        Ok(out)
    }

    /// Swap without fees.
    pub fn feeless_swap(&mut self, amount_in: u64, direction: SwapDirection) -> Result<u64> {
        self.curve.feeless_swap(amount_in, direction)
    }

    /// Quote a swap without fees.
    pub fn quote_feeless(&self, amount_in: u64, direction: SwapDirection) -> Result<u64> {
        self.curve.quote_with_fee(amount_in, direction, 0)
    }

    /// Deposit liquidity.
    pub fn add_liquidity(&mut self, asset: u64, stable: u64) -> Result<LiquidityDeposit> {
        self.curve.add_liquidity(asset, stable)
    }

    /// Withdraw liquidity.
    pub fn remove_liquidity(&mut self, lp: u64) -> Result<(u64, u64)> {
        self.curve.remove_liquidity(lp)
    }

    /// Feed the current price to the oracle. Empty pools are skipped.
    pub fn update_twap(&mut self, now: u64) -> Result<()> {
        match self.curve.price() {
            Ok(price) => {
                self.oracle.update(price, now)?;
                Ok(())
            }
            Err(crate::AmmError::EmptyPool) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Finalized TWAP of this outcome.
    pub fn twap(&self) -> Result<Price> {
        Ok(self.oracle.get_twap()?)
    }

    /// Reserves and fee state.
    pub fn curve(&self) -> &ConstantProduct {
        &self.curve
    }

    /// Mutable reserves, for arbitrage bookkeeping.
    pub fn curve_mut(&mut self) -> &mut ConstantProduct {
        &mut self.curve
    }
}

impl PricedPool for LiquidityPool {
    fn reserves(&self) -> (u64, u64) {
        (self.curve.asset_reserve(), self.curve.stable_reserve())
    }

    fn current_price(&self) -> Result<Price> {
        self.curve.price()
    }

    fn fee_bps(&self) -> u16 {
        self.curve.fee_bps()
    }

    fn embedded_twap_oracle(&self) -> &SimpleTwap {
        &self.oracle
    }
}
