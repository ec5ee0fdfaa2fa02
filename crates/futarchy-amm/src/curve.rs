//! Constant-product reserves.
//!
//! ```text
//! price      = stable_reserve * PRICE_SCALE / asset_reserve
//! in_net     = amount_in * (10_000 - fee_bps) / 10_000
//! amount_out = in_net * reserve_out / (reserve_in + in_net)
//! ```
//!
//! The full `amount_in` is added to the input reserve, so the fee stays in
//! the pool and `k = asset * stable` never decreases across a swap.

use serde::{Deserialize, Serialize};

use futarchy_types::math::{isqrt, mul_div_floor};
use futarchy_types::{Price, MAX_BPS, PRICE_SCALE};

use crate::{AmmError, Result, SwapDirection};

/// Outcome of a liquidity deposit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityDeposit {
    /// LP units minted.
    pub lp_minted: u64,
    /// Asset actually taken.
    pub asset_used: u64,
    /// Stable actually taken.
    pub stable_used: u64,
}

/// Reserves and fee configuration of a constant-product pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawConstantProduct")]
pub struct ConstantProduct {
    asset_reserve: u64,
    stable_reserve: u64,
    fee_bps: u16,
    lp_supply: u64,
    protocol_fee_asset: u64,
    protocol_fee_stable: u64,
}

#[derive(Deserialize)]
struct RawConstantProduct {
    asset_reserve: u64,
    stable_reserve: u64,
    fee_bps: u16,
    lp_supply: u64,
    protocol_fee_asset: u64,
    protocol_fee_stable: u64,
}

impl TryFrom<RawConstantProduct> for ConstantProduct {
    type Error = AmmError;

    fn try_from(raw: RawConstantProduct) -> Result<Self> {
        check_parameters(raw.asset_reserve, raw.stable_reserve, raw.fee_bps)?;
        Ok(Self {
            asset_reserve: raw.asset_reserve,
            stable_reserve: raw.stable_reserve,
            fee_bps: raw.fee_bps,
            lp_supply: raw.lp_supply,
            protocol_fee_asset: raw.protocol_fee_asset,
            protocol_fee_stable: raw.protocol_fee_stable,
        })
    }
}

fn check_parameters(asset_reserve: u64, stable_reserve: u64, fee_bps: u16) -> Result<()> {
    if u64::from(fee_bps) >= MAX_BPS {
        return Err(AmmError::InvalidFee(fee_bps));
    }
    if (asset_reserve == 0) != (stable_reserve == 0) {
        return Err(AmmError::InvalidReserves {
            asset: asset_reserve,
            stable: stable_reserve,
        });
    }
    Ok(())
}

impl ConstantProduct {
    /// Create a pool with initial reserves.
    ///
    /// Both reserves zero yields an empty pool awaiting its first deposit.
    ///
    /// # Errors
    ///
    /// - [`AmmError::InvalidFee`] if `fee_bps >= 10_000`
    /// - [`AmmError::InvalidReserves`] if exactly one reserve is zero
    pub fn new(asset_reserve: u64, stable_reserve: u64, fee_bps: u16) -> Result<Self> {
        check_parameters(asset_reserve, stable_reserve, fee_bps)?;
        let lp_supply = isqrt(asset_reserve as u128 * stable_reserve as u128) as u64;
        Ok(Self {
            asset_reserve,
            stable_reserve,
            fee_bps,
            lp_supply,
            protocol_fee_asset: 0,
            protocol_fee_stable: 0,
        })
    }

    /// Instant price.
    ///
    /// # Errors
    ///
    /// - [`AmmError::EmptyPool`] if either reserve is zero
    pub fn price(&self) -> Result<Price> {
        if self.asset_reserve == 0 || self.stable_reserve == 0 {
            return Err(AmmError::EmptyPool);
        }
        mul_div_floor(
            self.stable_reserve as u128,
            PRICE_SCALE,
            self.asset_reserve as u128,
        )
        .ok_or(AmmError::Overflow)
    }

    /// Product of the reserves.
    pub fn k(&self) -> u128 {
        self.asset_reserve as u128 * self.stable_reserve as u128
    }

    fn io_reserves(&self, direction: SwapDirection) -> (u64, u64) {
        match direction {
            SwapDirection::AssetToStable => (self.asset_reserve, self.stable_reserve),
            SwapDirection::StableToAsset => (self.stable_reserve, self.asset_reserve),
        }
    }

    /// Output for `amount_in` at `fee_bps` without changing state.
    pub fn quote_with_fee(
        &self,
        amount_in: u64,
        direction: SwapDirection,
        fee_bps: u16,
    ) -> Result<u64> {
        if amount_in == 0 {
            return Err(AmmError::ZeroAmount);
        }
        let (reserve_in, reserve_out) = self.io_reserves(direction);
        if reserve_in == 0 || reserve_out == 0 {
            return Err(AmmError::EmptyPool);
        }
        let keep = MAX_BPS - u64::from(fee_bps);
        let in_net = mul_div_floor(amount_in as u128, keep as u128, MAX_BPS as u128)
            .ok_or(AmmError::Overflow)?;
        let denominator = (reserve_in as u128)
            .checked_add(in_net)
            .ok_or(AmmError::Overflow)?;
        let out = mul_div_floor(in_net, reserve_out as u128, denominator)
            .ok_or(AmmError::Overflow)?;
        // out < reserve_out always holds since in_net / (reserve_in + in_net) < 1
        Ok(out as u64)
    }

    /// Output for `amount_in` at the pool fee.
    pub fn quote(&self, amount_in: u64, direction: SwapDirection) -> Result<u64> {
        self.quote_with_fee(amount_in, direction, self.fee_bps)
    }

    /// Execute a swap at the pool fee.
    ///
    /// # Errors
    ///
    /// - [`AmmError::ZeroAmount`] if `amount_in` is zero
    /// - [`AmmError::EmptyPool`] if either reserve is zero
    /// - [`AmmError::SlippageExceeded`] if the output is below `min_out`
    /// - [`AmmError::InvariantViolated`] if k would decrease
    /// - [`AmmError::Overflow`] if the input reserve would overflow
    pub fn swap(&mut self, amount_in: u64, direction: SwapDirection, min_out: u64) -> Result<u64> {
        let out = self.quote(amount_in, direction)?;
        if out < min_out {
            return Err(AmmError::SlippageExceeded {
                min_out,
                actual: out,
            });
        }
        self.apply(amount_in, out, direction)?;
        Ok(out)
    }

    /// Execute a swap without fees (used by arbitrage).
    pub fn feeless_swap(&mut self, amount_in: u64, direction: SwapDirection) -> Result<u64> {
        let out = self.quote_with_fee(amount_in, direction, 0)?;
        self.apply(amount_in, out, direction)?;
        Ok(out)
    }

    fn apply(&mut self, amount_in: u64, amount_out: u64, direction: SwapDirection) -> Result<()> {
        let k_before = self.k();
        let (reserve_in, reserve_out) = match direction {
            SwapDirection::AssetToStable => (&mut self.asset_reserve, &mut self.stable_reserve),
            SwapDirection::StableToAsset => (&mut self.stable_reserve, &mut self.asset_reserve),
        };
        let new_in = reserve_in
            .checked_add(amount_in)
            .ok_or(AmmError::Overflow)?;
        let new_out = reserve_out
            .checked_sub(amount_out)
            .ok_or(AmmError::InsufficientLiquidity {
                requested: amount_out,
                available: *reserve_out,
            })?;
        if (new_in as u128) * (new_out as u128) < k_before {
            return Err(AmmError::InvariantViolated {
                before: k_before,
                after: new_in as u128 * new_out as u128,
            });
        }
        *reserve_in = new_in;
        *reserve_out = new_out;
        Ok(())
    }

    /// Deposit liquidity at the current ratio.
    ///
    /// The first deposit sets the price and mints `isqrt(asset * stable)`.
    /// Later deposits take the largest proportional amounts not exceeding
    /// the offered `asset` and `stable`.
    ///
    /// # Errors
    ///
    /// - [`AmmError::ZeroAmount`] if either amount is zero or nothing would be minted
    /// - [`AmmError::Overflow`] on reserve overflow
    pub fn add_liquidity(&mut self, asset: u64, stable: u64) -> Result<LiquidityDeposit> {
        if asset == 0 || stable == 0 {
            return Err(AmmError::ZeroAmount);
        }
        let deposit = if self.lp_supply == 0 || self.asset_reserve == 0 || self.stable_reserve == 0
        {
            let minted = isqrt(asset as u128 * stable as u128) as u64;
            LiquidityDeposit {
                lp_minted: minted,
                asset_used: asset,
                stable_used: stable,
            }
        } else {
            let supply = self.lp_supply as u128;
            let by_asset = mul_div_floor(asset as u128, supply, self.asset_reserve as u128)
                .ok_or(AmmError::Overflow)?;
            let by_stable = mul_div_floor(stable as u128, supply, self.stable_reserve as u128)
                .ok_or(AmmError::Overflow)?;
            let minted = by_asset.min(by_stable);
            let asset_used = mul_div_ceil_u64(minted, self.asset_reserve, self.lp_supply)?;
            let stable_used = mul_div_ceil_u64(minted, self.stable_reserve, self.lp_supply)?;
            LiquidityDeposit {
                lp_minted: u64::try_from(minted).map_err(|_| AmmError::Overflow)?,
                asset_used: asset_used.min(asset),
                stable_used: stable_used.min(stable),
            }
        };
        if deposit.lp_minted == 0 {
            return Err(AmmError::ZeroAmount);
        }

        let asset_reserve = self
            .asset_reserve
            .checked_add(deposit.asset_used)
            .ok_or(AmmError::Overflow)?;
        let stable_reserve = self
            .stable_reserve
            .checked_add(deposit.stable_used)
            .ok_or(AmmError::Overflow)?;
        let lp_supply = self
            .lp_supply
            .checked_add(deposit.lp_minted)
            .ok_or(AmmError::Overflow)?;
        self.asset_reserve = asset_reserve;
        self.stable_reserve = stable_reserve;
        self.lp_supply = lp_supply;
        Ok(deposit)
    }

    /// Burn `lp` units for a proportional share of both reserves.
    ///
    /// # Errors
    ///
    /// - [`AmmError::ZeroAmount`] if `lp` is zero
    /// - [`AmmError::InsufficientLiquidity`] if `lp` exceeds the supply
    pub fn remove_liquidity(&mut self, lp: u64) -> Result<(u64, u64)> {
        if lp == 0 {
            return Err(AmmError::ZeroAmount);
        }
        if lp > self.lp_supply {
            return Err(AmmError::InsufficientLiquidity {
                requested: lp,
                available: self.lp_supply,
            });
        }
        let asset_out = (lp as u128 * self.asset_reserve as u128 / self.lp_supply as u128) as u64;
        let stable_out = (lp as u128 * self.stable_reserve as u128 / self.lp_supply as u128) as u64;
        self.asset_reserve -= asset_out;
        self.stable_reserve -= stable_out;
        self.lp_supply -= lp;
        Ok((asset_out, stable_out))
    }

    /// Move reserves out without burning LP units.
    pub fn withdraw_reserves(&mut self, asset: u64, stable: u64) -> Result<()> {
        let asset_reserve =
            self.asset_reserve
                .checked_sub(asset)
                .ok_or(AmmError::InsufficientLiquidity {
                    requested: asset,
                    available: self.asset_reserve,
                })?;
        let stable_reserve =
            self.stable_reserve
                .checked_sub(stable)
                .ok_or(AmmError::InsufficientLiquidity {
                    requested: stable,
                    available: self.stable_reserve,
                })?;
        self.asset_reserve = asset_reserve;
        self.stable_reserve = stable_reserve;
        Ok(())
    }

    /// Return reserves moved out by [`withdraw_reserves`](Self::withdraw_reserves).
    pub fn deposit_reserves(&mut self, asset: u64, stable: u64) -> Result<()> {
        let asset_reserve = self
            .asset_reserve
            .checked_add(asset)
            .ok_or(AmmError::Overflow)?;
        let stable_reserve = self
            .stable_reserve
            .checked_add(stable)
            .ok_or(AmmError::Overflow)?;
        self.asset_reserve = asset_reserve;
        self.stable_reserve = stable_reserve;
        Ok(())
    }

    /// Credit arbitrage profit to the protocol balances.
    pub fn credit_protocol_fees(&mut self, asset: u64, stable: u64) {
        self.protocol_fee_asset = self.protocol_fee_asset.saturating_add(asset);
        self.protocol_fee_stable = self.protocol_fee_stable.saturating_add(stable);
    }

    /// Asset reserve.
    pub fn asset_reserve(&self) -> u64 {
        self.asset_reserve
    }

    /// Stable reserve.
    pub fn stable_reserve(&self) -> u64 {
        self.stable_reserve
    }

    /// Fee in basis points.
    pub fn fee_bps(&self) -> u16 {
        self.fee_bps
    }

    /// Outstanding LP units.
    pub fn lp_supply(&self) -> u64 {
        self.lp_supply
    }

    /// Protocol balances `(asset, stable)`.
    pub fn protocol_fees(&self) -> (u64, u64) {
        (self.protocol_fee_asset, self.protocol_fee_stable)
    }
}

fn mul_div_ceil_u64(a: u128, b: u64, denominator: u64) -> Result<u64> {
    futarchy_types::math::mul_div_ceil(a, b as u128, denominator as u128)
        .and_then(|v| u64::try_from(v).ok())
        .ok_or(AmmError::Overflow)
}
