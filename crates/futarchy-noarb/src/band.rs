//! Fee-adjusted no-arb band.
//!
//! For conditional prices `p_i` with fees `f_i` and a spot fee `f_s`
//! (fractions of 10,000 bps):
//!
//! ```text
//! floor   = min_i( p_i * (1 - f_i) ) * (1 - f_s)      rounded down
//! ceiling = max_i( p_i / (1 - f_i) ) / (1 - f_s)      rounded up
//! ```
//!
//! Below `floor`, buying spot and selling every outcome pays more than both
//! fees; above `ceiling`, buying every outcome and selling spot does. This
//! is the single place where fees enter the band.

use serde::{Deserialize, Serialize};

use futarchy_amm::PricedPool;
use futarchy_types::math::{apply_fee_floor, remove_fee_ceil};
use futarchy_types::{Price, MAX_BPS};

use crate::{NoArbError, Result};

/// Acceptable spot price range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoArbBand {
    /// Lowest spot price without profitable arbitrage.
    pub floor: Price,
    /// Highest spot price without profitable arbitrage.
    pub ceiling: Price,
}

impl NoArbBand {
    /// Whether `price` lies within `[floor, ceiling]`.
    pub fn contains(&self, price: Price) -> bool {
        price >= self.floor && price <= self.ceiling
    }

    /// `ceiling - floor`.
    pub fn width(&self) -> Price {
        self.ceiling - self.floor
    }
}

fn check_fee(fee_bps: u16) -> Result<()> {
    if u64::from(fee_bps) >= MAX_BPS {
        return Err(NoArbError::InvalidFee(fee_bps));
    }
    Ok(())
}

/// Compute the band implied by the conditional pools.
///
/// # Errors
///
/// - [`NoArbError::NoPoolsProvided`] if `conditionals` is empty
/// - [`NoArbError::Pool`] if a pool has no price
/// - [`NoArbError::InvalidFee`] if a fee is 100% or more
/// - [`NoArbError::PriceTooLow`] if the cheapest outcome rounds to a zero floor
/// - [`NoArbError::Overflow`] on fixed-point overflow
pub fn compute_noarb_band<S, C>(spot: &S, conditionals: &[C]) -> Result<NoArbBand>
where
    S: PricedPool + ?Sized,
    C: PricedPool,
{
    if conditionals.is_empty() {
        return Err(NoArbError::NoPoolsProvided);
    }

    let mut cheapest: Price = Price::MAX;
    let mut lowest: Option<Price> = None;
    let mut highest: Option<Price> = None;
    for pool in conditionals {
        let price = pool.current_price()?;
        cheapest = cheapest.min(price);
        let fee = pool.fee_bps();
        check_fee(fee)?;
        let low = apply_fee_floor(price, fee).ok_or(NoArbError::Overflow)?;
        let high = remove_fee_ceil(price, fee).ok_or(NoArbError::Overflow)?;
        lowest = Some(lowest.map_or(low, |l| l.min(low)));
        highest = Some(highest.map_or(high, |h| h.max(high)));
    }
    let (lowest, highest) = match (lowest, highest) {
        (Some(l), Some(h)) => (l, h),
        _ => return Err(NoArbError::NoPoolsProvided),
    };

    let spot_fee = spot.fee_bps();
    check_fee(spot_fee)?;
    let band = NoArbBand {
        floor: apply_fee_floor(lowest, spot_fee).ok_or(NoArbError::Overflow)?,
        ceiling: remove_fee_ceil(highest, spot_fee).ok_or(NoArbError::Overflow)?,
    };
    if band.floor == 0 {
        return Err(NoArbError::PriceTooLow(cheapest));
    }

    tracing::trace!(
        floor = band.floor,
        ceiling = band.ceiling,
        pools = conditionals.len(),
        "no-arb band computed"
    );
    Ok(band)
}

/// Fail unless the spot price lies within the no-arb band.
///
/// Meant to run once per batch of swaps, after any auto-arbitrage has
/// pulled the spot price back toward the conditional markets.
///
/// # Errors
///
/// - [`NoArbError::SpotOutOfBand`] if the spot price is outside the band
/// - Any error from [`compute_noarb_band`]
pub fn ensure_spot_in_band<S, C>(spot: &S, conditionals: &[C]) -> Result<NoArbBand>
where
    S: PricedPool + ?Sized,
    C: PricedPool,
{
    let band = compute_noarb_band(spot, conditionals)?;
    let spot_price = spot.current_price()?;
    if !band.contains(spot_price) {
        tracing::warn!(
            spot = spot_price,
            floor = band.floor,
            ceiling = band.ceiling,
            "spot price outside no-arb band"
        );
        return Err(NoArbError::SpotOutOfBand {
            spot: spot_price,
            floor: band.floor,
            ceiling: band.ceiling,
        });
    }
    Ok(band)
}
