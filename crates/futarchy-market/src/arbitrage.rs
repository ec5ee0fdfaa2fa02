//! Spot-vs-conditional round-trip arbitrage.
//!
//! A swap on either side pushes the spot price away from the conditional
//! markets. The trade that profits from the gap runs the round trip in the
//! other order on the side the user did not touch:
//!
//! ```text
//! user buys asset on spot:         sell x asset on spot -> s stable
//!                                  buy asset with s in every outcome pool
//!                                  merge min_i(out_i) asset
//!                                  profit = min_i(out_i) - x
//!
//! user buys asset on an outcome:   split x asset, sell it in every outcome pool
//!                                  merge min_i(out_i) stable
//!                                  buy asset on spot with it
//!                                  profit = spot_out - x
//! ```
//!
//! The best `x` is searched on a grid of [`ARBITRAGE_SEARCH_STEPS`] equal
//! steps up to the user's output, stopping at the first step that does not
//! improve the profit. The chosen trade runs without fees. The profit is
//! paid in the user's output token and goes to the spot pool's protocol
//! balance; each outcome's leftover above the merged minimum goes to that
//! outcome pool's protocol balance.

use serde::{Deserialize, Serialize};

use futarchy_amm::{ConstantProduct, LiquidityPool, SwapDirection, UnifiedSpotPool};

use crate::Result;

/// Grid resolution of the arbitrage size search.
pub const ARBITRAGE_SEARCH_STEPS: u64 = 100;

/// Result of one arbitrage pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbitrageOutcome {
    /// Amount fed into the first leg (zero when no profitable size exists).
    pub input: u64,
    /// Profit credited to the spot pool.
    pub spot_profit: u64,
    /// Leftover credited to each outcome pool, by outcome index.
    pub outcome_profits: Vec<u64>,
}

impl ArbitrageOutcome {
    /// Whether any trade ran.
    pub fn executed(&self) -> bool {
        self.input > 0
    }
}

/// Which market the round trip enters first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Route {
    /// Spot leg, then split into every outcome and merge.
    SpotFirst,
    /// Split, trade every outcome and merge, then the spot leg.
    ConditionalsFirst,
}

impl Route {
    /// `(spot leg, conditional leg)` directions for a user's swap direction.
    fn directions(self, user_direction: SwapDirection) -> (SwapDirection, SwapDirection) {
        match self {
            Route::SpotFirst => (user_direction.reverse(), user_direction),
            Route::ConditionalsFirst => (user_direction, user_direction.reverse()),
        }
    }
}

/// Quote the round trip for `input` against the current reserves.
fn round_trip_profit(
    spot: &UnifiedSpotPool,
    pools: &[LiquidityPool],
    input: u64,
    route: Route,
    user_direction: SwapDirection,
) -> Option<i128> {
    let (spot_direction, conditional_direction) = route.directions(user_direction);
    let merge = |amount: u64| -> Option<u64> {
        let mut merged: Option<u64> = None;
        for pool in pools {
            let out = pool.quote_feeless(amount, conditional_direction).ok()?;
            merged = Some(merged.map_or(out, |m| m.min(out)));
        }
        merged
    };
    let output = match route {
        Route::SpotFirst => merge(spot.quote_feeless(input, spot_direction).ok()?)?,
        Route::ConditionalsFirst => spot.quote_feeless(merge(input)?, spot_direction).ok()?,
    };
    Some(i128::from(output) - i128::from(input))
}

fn best_input(
    spot: &UnifiedSpotPool,
    pools: &[LiquidityPool],
    max_input: u64,
    route: Route,
    user_direction: SwapDirection,
) -> u64 {
    let step_size = max_input / ARBITRAGE_SEARCH_STEPS;
    if step_size == 0 || pools.is_empty() {
        return 0;
    }
    let mut best_profit: i128 = 0;
    let mut best_input: u64 = 0;
    for i in 1..=ARBITRAGE_SEARCH_STEPS {
        let input = i * step_size;
        let Some(profit) = round_trip_profit(spot, pools, input, route, user_direction) else {
            break;
        };
        if profit > best_profit {
            best_profit = profit;
            best_input = input;
        } else {
            break;
        }
    }
    best_input
}

/// Credit `amount` of the output token of a `direction` swap.
fn credit_output(curve: &mut ConstantProduct, direction: SwapDirection, amount: u64) {
    match direction {
        SwapDirection::StableToAsset => curve.credit_protocol_fees(amount, 0),
        SwapDirection::AssetToStable => curve.credit_protocol_fees(0, amount),
    }
}

fn run(
    spot: &mut UnifiedSpotPool,
    pools: &mut [LiquidityPool],
    max_input: u64,
    route: Route,
    user_direction: SwapDirection,
) -> Result<ArbitrageOutcome> {
    let input = best_input(spot, pools, max_input, route, user_direction);
    if input == 0 {
        return Ok(ArbitrageOutcome::default());
    }

    let (spot_direction, conditional_direction) = route.directions(user_direction);
    let conditional_input = match route {
        Route::SpotFirst => spot.feeless_swap(input, spot_direction)?,
        Route::ConditionalsFirst => input,
    };
    let mut outputs = Vec::with_capacity(pools.len());
    for pool in pools.iter_mut() {
        outputs.push(pool.feeless_swap(conditional_input, conditional_direction)?);
    }
    let merged = outputs.iter().copied().min().unwrap_or(0);
    let final_output = match route {
        Route::SpotFirst => merged,
        Route::ConditionalsFirst => spot.feeless_swap(merged, spot_direction)?,
    };
    let spot_profit = final_output.saturating_sub(input);

    let outcome_profits: Vec<u64> = outputs.iter().map(|out| out - merged).collect();
    credit_output(spot.curve_mut(), user_direction, spot_profit);
    for (pool, leftover) in pools.iter_mut().zip(&outcome_profits) {
        credit_output(pool.curve_mut(), conditional_direction, *leftover);
    }

    tracing::debug!(
        ?route,
        %user_direction,
        input,
        spot_profit,
        outcomes = pools.len(),
        "arbitrage executed"
    );
    Ok(ArbitrageOutcome {
        input,
        spot_profit,
        outcome_profits,
    })
}

/// Arbitrage the conditional pools against spot after a user's spot swap.
///
/// `max_input` is the user's output and bounds the search; `user_direction`
/// is the direction of the user's swap.
///
/// # Errors
///
/// Propagates pool errors from the feeless execution. The search itself
/// never fails: a size that cannot be quoted ends the search.
pub fn arbitrage_after_spot_swap(
    spot: &mut UnifiedSpotPool,
    pools: &mut [LiquidityPool],
    max_input: u64,
    user_direction: SwapDirection,
) -> Result<ArbitrageOutcome> {
    run(spot, pools, max_input, Route::SpotFirst, user_direction)
}

/// Arbitrage spot against the conditional pools after a user's swap on one
/// outcome.
///
/// Only pays when every outcome has moved past spot, since the merge is
/// bounded by the least favourable outcome.
///
/// # Errors
///
/// Propagates pool errors from the feeless execution.
pub fn arbitrage_after_conditional_swap(
    spot: &mut UnifiedSpotPool,
    pools: &mut [LiquidityPool],
    max_input: u64,
    user_direction: SwapDirection,
) -> Result<ArbitrageOutcome> {
    run(spot, pools, max_input, Route::ConditionalsFirst, user_direction)
}

#[cfg(test)]
mod tests {
    use futarchy_amm::PricedPool;
    use futarchy_oracle::{SimpleTwap, TwapConfig};

    use super::*;

    fn spot(asset: u64, stable: u64) -> UnifiedSpotPool {
        UnifiedSpotPool::new(asset, stable, 30, TwapConfig::default(), 0).expect("spot")
    }

    fn pools(n: usize, asset: u64, stable: u64) -> Vec<LiquidityPool> {
        let oracle = SimpleTwap::new_default(stable as u128 * 1_000_000_000_000 / asset as u128, 0)
            .expect("oracle");
        (0..n)
            .map(|i| LiquidityPool::new(i, asset, stable, 30, oracle.clone()).expect("pool"))
            .collect()
    }

    #[test]
    fn test_aligned_markets_do_not_trade() {
        let mut s = spot(500_000_000, 500_000_000);
        let mut p = pools(2, 500_000_000, 500_000_000);
        let result =
            arbitrage_after_spot_swap(&mut s, &mut p, 1_000_000, SwapDirection::StableToAsset)
                .expect("arb");
        assert!(!result.executed());
        assert_eq!(s.reserves(), (500_000_000, 500_000_000));
    }

    #[test]
    fn test_tiny_input_skips_search() {
        let mut s = spot(500_000_000, 600_000_000);
        let mut p = pools(2, 500_000_000, 500_000_000);
        let result = arbitrage_after_spot_swap(&mut s, &mut p, 99, SwapDirection::StableToAsset)
            .expect("arb");
        assert_eq!(result, ArbitrageOutcome::default());
    }

    #[test]
    fn test_buy_pressure_is_arbitraged_back() {
        let mut s = spot(500_000_000, 500_000_000);
        let mut p = pools(3, 500_000_000, 500_000_000);
        let out = s.swap_stable_to_asset(10_000_000, 0).expect("user swap");
        let pushed = s.current_price().expect("price");
        let k_before: Vec<u128> = p.iter().map(|pool| pool.curve().k()).collect();

        let result = arbitrage_after_spot_swap(&mut s, &mut p, out, SwapDirection::StableToAsset)
            .expect("arb");

        assert!(result.executed());
        assert!(result.spot_profit > 0);
        assert_eq!(result.outcome_profits, vec![0, 0, 0]);
        assert_eq!(s.curve().protocol_fees(), (result.spot_profit, 0));

        let pulled = s.current_price().expect("price");
        assert!(pulled < pushed);
        for (pool, k) in p.iter().zip(k_before) {
            assert!(pool.current_price().expect("price") > 1_000_000_000_000);
            assert!(pool.curve().k() >= k);
        }
    }

    #[test]
    fn test_sell_pressure_credits_stable() {
        let mut s = spot(500_000_000, 500_000_000);
        let mut p = pools(2, 500_000_000, 500_000_000);
        let out = s.swap_asset_to_stable(10_000_000, 0).expect("user swap");

        let result = arbitrage_after_spot_swap(&mut s, &mut p, out, SwapDirection::AssetToStable)
            .expect("arb");

        assert!(result.executed());
        assert_eq!(s.curve().protocol_fees(), (0, result.spot_profit));
    }

    #[test]
    fn test_dispersed_outcomes_leave_leftovers() {
        let mut s = spot(500_000_000, 500_000_000);
        let mut p = vec![
            LiquidityPool::new(
                0,
                500_000_000,
                500_000_000,
                30,
                SimpleTwap::new_default(1_000_000_000_000, 0).expect("oracle"),
            )
            .expect("pool"),
            LiquidityPool::new(
                1,
                400_000_000,
                400_000_000,
                30,
                SimpleTwap::new_default(1_000_000_000_000, 0).expect("oracle"),
            )
            .expect("pool"),
        ];
        let out = s.swap_stable_to_asset(10_000_000, 0).expect("user swap");
        let result = arbitrage_after_spot_swap(&mut s, &mut p, out, SwapDirection::StableToAsset)
            .expect("arb");

        assert!(result.executed());
        // The deeper pool returns more asset for the same stable.
        assert!(result.outcome_profits[0] > 0);
        assert_eq!(result.outcome_profits[1], 0);
        assert_eq!(p[0].curve().protocol_fees().0, result.outcome_profits[0]);
    }

    #[test]
    fn test_single_outcome_move_is_not_arbitraged() {
        let mut s = spot(500_000_000, 500_000_000);
        let mut p = pools(2, 500_000_000, 500_000_000);
        let out = p[0].swap(10_000_000, SwapDirection::StableToAsset, 0).expect("user swap");

        // The untouched outcome still prices at spot, so the merge loses.
        let result =
            arbitrage_after_conditional_swap(&mut s, &mut p, out, SwapDirection::StableToAsset)
                .expect("arb");
        assert!(!result.executed());
        assert_eq!(s.reserves(), (500_000_000, 500_000_000));
    }

    #[test]
    fn test_every_outcome_moved_pulls_spot_along() {
        let mut s = spot(500_000_000, 500_000_000);
        let mut p = pools(2, 500_000_000, 500_000_000);
        p[0].swap(10_000_000, SwapDirection::StableToAsset, 0).expect("user swap");
        let out = p[1].swap(10_000_000, SwapDirection::StableToAsset, 0).expect("user swap");
        let pushed: Vec<u128> = p.iter().map(|pool| pool.current_price().expect("price")).collect();

        let result =
            arbitrage_after_conditional_swap(&mut s, &mut p, out, SwapDirection::StableToAsset)
                .expect("arb");

        assert!(result.executed());
        assert!(result.spot_profit > 0);
        // Both outcomes traded identically, so nothing is left over.
        assert_eq!(result.outcome_profits, vec![0, 0]);
        assert_eq!(s.curve().protocol_fees(), (result.spot_profit, 0));
        assert!(s.current_price().expect("price") > 1_000_000_000_000);
        for (pool, before) in p.iter().zip(pushed) {
            assert!(pool.current_price().expect("price") < before);
        }
    }
}
