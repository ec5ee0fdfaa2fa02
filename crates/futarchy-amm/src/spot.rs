//! Base-asset spot pool.
//!
//! The spot pool is the DAO's permanent market. When a proposal opens, a
//! share of its reserves (`conditional_liquidity_ratio_bps`) moves into the
//! conditional pools and the spot pool is locked for the proposal:
//!
//! - LP deposits and withdrawals are rejected.
//! - Swaps against the remaining reserves are still allowed.
//! - [`UnifiedSpotPool::update_twap`] is a no-op, so the oracle's
//!   `last_update` stays at the lock time and the winning conditional
//!   market's history can be backfilled contiguously at resolution.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use futarchy_oracle::{SimpleTwap, TwapConfig};
use futarchy_types::math::mul_div_floor;
use futarchy_types::{Price, MAX_BPS};

use crate::curve::{ConstantProduct, LiquidityDeposit};
use crate::{AmmError, PricedPool, Result, SwapDirection};

/// The DAO's base-asset constant-product pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnifiedSpotPool {
    curve: ConstantProduct,
    oracle: SimpleTwap,
    locked_for_proposal: bool,
    conditional_liquidity_ratio_bps: u16,
}

impl UnifiedSpotPool {
    /// Create a spot pool and seed its oracle from the reserve ratio.
    ///
    /// An empty pool gets an uninitialized oracle that is seeded by the
    /// first [`update_twap`](Self::update_twap) after liquidity arrives.
    pub fn new(
        asset_reserve: u64,
        stable_reserve: u64,
        fee_bps: u16,
        config: TwapConfig,
        now: u64,
    ) -> Result<Self> {
        let curve = ConstantProduct::new(asset_reserve, stable_reserve, fee_bps)?;
        let oracle = match curve.price() {
            Ok(price) => SimpleTwap::with_config(price, config, now)?,
            Err(AmmError::EmptyPool) => SimpleTwap::uninitialized(config)?,
            Err(e) => return Err(e),
        };
        tracing::info!(asset_reserve, stable_reserve, fee_bps, "spot pool created");
        Ok(Self {
            curve,
            oracle,
            locked_for_proposal: false,
            conditional_liquidity_ratio_bps: 0,
        })
    }

    /// Quote a swap at the pool fee.
    pub fn quote(&self, amount_in: u64, direction: SwapDirection) -> Result<u64> {
        self.curve.quote(amount_in, direction)
    }

    /// Sell asset for stable.
    pub fn swap_asset_to_stable(&mut self, amount_in: u64, min_out: u64) -> Result<u64> {
        self.swap(amount_in, SwapDirection::AssetToStable, min_out)
    }

    /// Sell stable for asset.
    pub fn swap_stable_to_asset(&mut self, amount_in: u64, min_out: u64) -> Result<u64> {
        self.swap(amount_in, SwapDirection::StableToAsset, min_out)
    }

    /// Swap in either direction at the pool fee.
    pub fn swap(&mut self, amount_in: u64, direction: SwapDirection, min_out: u64) -> Result<u64> {
        let out = self.curve.swap(amount_in, direction, min_out)?;
        tracing::debug!(%direction, amount_in, amount_out = out, "spot swap");
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
    ///
    /// # Errors
    ///
    /// - [`AmmError::PoolLocked`] while a proposal is active
    pub fn add_liquidity(&mut self, asset: u64, stable: u64) -> Result<LiquidityDeposit> {
        if self.locked_for_proposal {
            return Err(AmmError::PoolLocked);
        }
        self.curve.add_liquidity(asset, stable)
    }

    /// Withdraw liquidity.
    ///
    /// # Errors
    ///
    /// - [`AmmError::PoolLocked`] while a proposal is active
    pub fn remove_liquidity(&mut self, lp: u64) -> Result<(u64, u64)> {
        if self.locked_for_proposal {
            return Err(AmmError::PoolLocked);
        }
        self.curve.remove_liquidity(lp)
    }

    /// Feed the current price to the long-horizon oracle.
    ///
    /// Skipped while locked or while the pool is empty.
    pub fn update_twap(&mut self, now: u64) -> Result<()> {
        if self.locked_for_proposal {
            return Ok(());
        }
        match self.curve.price() {
            Ok(price) => {
                self.oracle.update(price, now)?;
                Ok(())
            }
            Err(AmmError::EmptyPool) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Lock the pool for a proposal and carve out the conditional share.
    ///
    /// Brings the oracle up to `now` first, then removes
    /// `ratio_bps / 10_000` of each reserve. Returns the removed
    /// `(asset, stable)` amounts that back the conditional markets.
    ///
    /// # Errors
    ///
    /// - [`AmmError::AlreadyLocked`] if a proposal already holds the pool
    /// - [`AmmError::InvalidRatio`] if `ratio_bps > 10_000`
    /// - [`AmmError::EmptyPool`] if the pool has no liquidity
    pub fn lock_for_proposal(&mut self, ratio_bps: u16, now: u64) -> Result<(u64, u64)> {
        if self.locked_for_proposal {
            return Err(AmmError::AlreadyLocked);
        }
        if u64::from(ratio_bps) > MAX_BPS {
            return Err(AmmError::InvalidRatio(ratio_bps));
        }
        let price = self.curve.price()?;
        self.oracle.update(price, now)?;

        let asset = share(self.curve.asset_reserve(), ratio_bps)?;
        let stable = share(self.curve.stable_reserve(), ratio_bps)?;
        self.curve.withdraw_reserves(asset, stable)?;
        self.locked_for_proposal = true;
        self.conditional_liquidity_ratio_bps = ratio_bps;

        tracing::info!(ratio_bps, asset, stable, now, "spot pool locked for proposal");
        Ok((asset, stable))
    }

    /// Return resolved liquidity and unlock the pool.
    ///
    /// # Errors
    ///
    /// - [`AmmError::NotLocked`] if no proposal holds the pool
    pub fn unlock_after_proposal(&mut self, asset: u64, stable: u64) -> Result<()> {
        if !self.locked_for_proposal {
            return Err(AmmError::NotLocked);
        }
        self.curve.deposit_reserves(asset, stable)?;
        self.locked_for_proposal = false;
        self.conditional_liquidity_ratio_bps = 0;
        tracing::info!(asset, stable, "spot pool unlocked");
        Ok(())
    }

    /// Splice a resolved conditional period into the spot oracle.
    pub fn backfill_twap(
        &mut self,
        period_start: u64,
        period_end: u64,
        period_cumulative: &BigUint,
        period_final_price: Price,
    ) -> Result<()> {
        self.oracle.backfill_from_conditional(
            period_start,
            period_end,
            period_cumulative,
            period_final_price,
        )?;
        Ok(())
    }

    /// Whether the 90-day TWAP can be answered at `now`.
    pub fn is_twap_ready(&self, now: u64) -> bool {
        self.oracle.get_ninety_day_twap(now).is_some()
    }

    /// 90-day TWAP of the spot market.
    pub fn long_horizon_twap(&self, now: u64) -> Option<Price> {
        self.oracle.get_ninety_day_twap(now)
    }

    /// Whether a proposal currently holds the pool.
    pub fn is_locked_for_proposal(&self) -> bool {
        self.locked_for_proposal
    }

    /// Share of liquidity moved to conditional markets, in bps.
    pub fn conditional_liquidity_ratio_bps(&self) -> u16 {
        self.conditional_liquidity_ratio_bps
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

fn share(reserve: u64, ratio_bps: u16) -> Result<u64> {
    mul_div_floor(reserve as u128, ratio_bps as u128, MAX_BPS as u128)
        .and_then(|v| u64::try_from(v).ok())
        .ok_or(AmmError::Overflow)
}

impl PricedPool for UnifiedSpotPool {
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
