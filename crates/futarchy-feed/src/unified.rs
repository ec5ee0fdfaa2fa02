//! Spot/conditional source switching.

use futarchy_amm::{PricedPool, UnifiedSpotPool};
use futarchy_types::Price;

use crate::{FeedError, Result};

/// Conditional share of liquidity at which the feed switches source (50%).
pub const CONDITIONAL_LIQUIDITY_THRESHOLD_BPS: u16 = 5_000;

/// Which market the feed reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PriceSource {
    /// The spot pool.
    Spot,
    /// The conditional pools of the active proposal.
    Conditional,
}

/// Select the source for the current spot pool state.
pub fn price_source(spot: &UnifiedSpotPool) -> PriceSource {
    if spot.is_locked_for_proposal()
        && spot.conditional_liquidity_ratio_bps() >= CONDITIONAL_LIQUIDITY_THRESHOLD_BPS
    {
        PriceSource::Conditional
    } else {
        PriceSource::Spot
    }
}

/// Current reference price.
///
/// Conditional source: the highest finalized TWAP across outcomes.
/// Spot source: the spot pool's instant reserve-ratio price.
///
/// # Errors
///
/// - [`FeedError::NoOracles`] if the conditional source is selected and `conditionals` is empty
/// - [`FeedError::Oracle`] if a conditional oracle is not initialized
/// - [`FeedError::Pool`] if the spot pool is empty
pub fn get_current_twap<C: PricedPool>(
    spot: &UnifiedSpotPool,
    conditionals: &[C],
) -> Result<Price> {
    let source = price_source(spot);
    let price = match source {
        PriceSource::Conditional => {
            let mut best: Option<Price> = None;
            for pool in conditionals {
                let twap = pool.embedded_twap_oracle().get_twap()?;
                best = Some(best.map_or(twap, |b| b.max(twap)));
            }
            best.ok_or(FeedError::NoOracles)?
        }
        PriceSource::Spot => spot.current_price()?,
    };
    tracing::trace!(?source, price, "current twap read");
    Ok(price)
}

/// Long-horizon governance price.
///
/// Conditional source: the highest 90-day windowed TWAP across outcomes.
/// Spot source: the spot pool's own 90-day TWAP.
///
/// # Errors
///
/// - [`FeedError::NoOracles`] if the conditional source is selected and `conditionals` is empty
/// - [`FeedError::TwapNotReady`] if no 90-day window can be answered
pub fn get_geometric_governance_twap<C: PricedPool>(
    spot: &UnifiedSpotPool,
    conditionals: &[C],
    now: u64,
) -> Result<Price> {
    match price_source(spot) {
        PriceSource::Conditional => {
            if conditionals.is_empty() {
                return Err(FeedError::NoOracles);
            }
            conditionals
                .iter()
                .filter_map(|pool| pool.embedded_twap_oracle().get_ninety_day_twap(now))
                .max()
                .ok_or(FeedError::TwapNotReady)
        }
        PriceSource::Spot => spot.long_horizon_twap(now).ok_or(FeedError::TwapNotReady),
    }
}

/// Whether the spot pool's long-horizon TWAP is available.
///
/// `_seconds` is accepted for interface compatibility and ignored: readiness
/// is always the fixed 90-day history requirement.
pub fn is_twap_available(spot: &UnifiedSpotPool, _seconds: u64, now: u64) -> bool {
    spot.is_twap_ready(now)
}

#[cfg(test)]
mod tests {
    use futarchy_amm::LiquidityPool;
    use futarchy_oracle::{SimpleTwap, TwapConfig};
    use futarchy_types::{MS_PER_DAY, NINETY_DAYS_MS, PRICE_SCALE};

    use super::*;

    fn spot() -> UnifiedSpotPool {
        UnifiedSpotPool::new(1_000_000_000, 1_000_000_000, 30, TwapConfig::default(), 0)
            .expect("spot")
    }

    fn conditional(outcome: usize, stable: u64, twap: Price) -> LiquidityPool {
        let oracle = SimpleTwap::new_default(twap, 0).expect("oracle");
        LiquidityPool::new(outcome, 1_000_000, stable, 30, oracle).expect("pool")
    }

    #[test]
    fn test_unlocked_spot_uses_instant_price() {
        let s = spot();
        let pools = vec![conditional(0, 3_000_000, 3 * PRICE_SCALE)];
        assert_eq!(price_source(&s), PriceSource::Spot);
        assert_eq!(get_current_twap(&s, &pools).expect("price"), PRICE_SCALE);
    }

    #[test]
    fn test_below_threshold_uses_spot() {
        let mut s = spot();
        s.lock_for_proposal(4_999, 0).expect("lock");
        let pools = vec![conditional(0, 3_000_000, 3 * PRICE_SCALE)];
        assert_eq!(price_source(&s), PriceSource::Spot);
        assert_eq!(get_current_twap(&s, &pools).expect("price"), PRICE_SCALE);
    }

    #[test]
    fn test_at_threshold_uses_max_conditional_twap() {
        let mut s = spot();
        s.lock_for_proposal(CONDITIONAL_LIQUIDITY_THRESHOLD_BPS, 0).expect("lock");
        let pools = vec![
            conditional(0, 1_000_000, 2 * PRICE_SCALE),
            conditional(1, 1_000_000, 5 * PRICE_SCALE),
        ];
        assert_eq!(price_source(&s), PriceSource::Conditional);
        assert_eq!(get_current_twap(&s, &pools).expect("price"), 5 * PRICE_SCALE);
    }

    #[test]
    fn test_conditional_source_without_pools() {
        let mut s = spot();
        s.lock_for_proposal(8_000, 0).expect("lock");
        let none: Vec<LiquidityPool> = Vec::new();
        assert_eq!(get_current_twap(&s, &none).unwrap_err(), FeedError::NoOracles);
        assert_eq!(
            get_geometric_governance_twap(&s, &none, 0).unwrap_err(),
            FeedError::NoOracles
        );
    }

    #[test]
    fn test_spot_governance_twap_needs_ninety_days() {
        let mut s = spot();
        let none: Vec<LiquidityPool> = Vec::new();
        assert_eq!(
            get_geometric_governance_twap(&s, &none, MS_PER_DAY).unwrap_err(),
            FeedError::TwapNotReady
        );
        assert!(!is_twap_available(&s, 3_600, MS_PER_DAY));

        s.update_twap(NINETY_DAYS_MS).expect("update");
        assert_eq!(
            get_geometric_governance_twap(&s, &none, NINETY_DAYS_MS).expect("twap"),
            PRICE_SCALE
        );
        assert!(is_twap_available(&s, 0, NINETY_DAYS_MS));
        assert!(is_twap_available(&s, u64::MAX, NINETY_DAYS_MS));
    }

    #[test]
    fn test_conditional_governance_twap_uses_forked_history() {
        let mut s = spot();
        s.update_twap(NINETY_DAYS_MS).expect("history");
        let now = NINETY_DAYS_MS + MS_PER_DAY;
        s.lock_for_proposal(9_000, now).expect("lock");

        let forked = s.embedded_twap_oracle().fork().expect("fork");
        let mut high = LiquidityPool::new(0, 1_000_000, 2_000_000, 30, forked.clone())
            .expect("pool");
        let low = LiquidityPool::new(1, 1_000_000, 1_000_000, 30, forked).expect("pool");
        high.update_twap(now).expect("update");

        let later = now + MS_PER_DAY;
        let twap = get_geometric_governance_twap(&s, &[high, low], later).expect("twap");
        // 91 days at 1.0 then one day at 2.0 in the high outcome, measured
        // from the checkpoint at day 0.
        let expected = (PRICE_SCALE * 91 + 2 * PRICE_SCALE) / 92;
        assert_eq!(twap, expected);
    }
}
