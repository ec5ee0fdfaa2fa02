//! Scenario runner.
//!
//! Each batch advances a [`ManualClock`] by `batch_interval_ms`, applies the
//! proposal schedule, then draws `swaps_per_batch` random swaps into one
//! [`SwapSession`](futarchy_market::SwapSession) and commits it. A batch
//! whose commit fails is rolled back and recorded as such.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use futarchy_amm::{PricedPool, SwapDirection, UnifiedSpotPool};
use futarchy_feed::{price_source, PriceSource};
use futarchy_market::{FutarchyMarket, MarketError, Resolution, SwapSession};
use futarchy_noarb::NoArbBand;
use futarchy_types::clock::{Clock, ManualClock};
use futarchy_types::{OutcomeIndex, Price, MAX_BPS};

use crate::config::SimConfig;
use crate::events::{EventBus, MarketEvent};
use crate::shared::SharedMarket;
use crate::Result;

/// State of the market after one batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Batch number, starting at 1.
    pub batch: u64,
    /// Simulated time.
    pub at: u64,
    /// Whether the session committed.
    pub committed: bool,
    /// Swaps executed in the session.
    pub swaps: usize,
    /// Swaps the pools rejected.
    pub rejected_swaps: u32,
    /// Spot instant price.
    pub spot_price: Option<Price>,
    /// Feed price.
    pub feed_price: Option<Price>,
    /// Whether the feed read the conditional markets.
    pub conditional_feed: bool,
    /// 90-day governance TWAP.
    pub governance_twap: Option<Price>,
    /// No-arb band while a proposal is open.
    pub band: Option<NoArbBand>,
}

/// Full record of a scenario run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// RNG seed.
    pub seed: u64,
    /// Per-batch records.
    pub batches: Vec<BatchReport>,
    /// Sessions committed.
    pub committed_batches: u64,
    /// Sessions rolled back.
    pub rolled_back_batches: u64,
    /// Swaps the pools rejected.
    pub rejected_swaps: u64,
    /// Proposal resolution, if it happened.
    pub resolution: Option<Resolution>,
    /// Spot price at the end.
    pub final_spot_price: Option<Price>,
    /// Spot oracle's finalized TWAP at the end.
    pub final_spot_twap: Option<Price>,
    /// Spot protocol balances `(asset, stable)` at the end.
    pub protocol_fees: (u64, u64),
}

#[derive(Clone, Copy, Debug)]
enum Venue {
    Spot,
    Outcome(OutcomeIndex),
}

struct Order {
    venue: Venue,
    direction: SwapDirection,
    amount_in: u64,
}

/// Run the configured scenario to completion.
///
/// # Errors
///
/// - [`SimError::InvalidConfig`](crate::SimError::InvalidConfig) or
///   [`SimError::Oracle`](crate::SimError::Oracle) for a bad config
/// - [`SimError::Market`](crate::SimError::Market) if the market cannot be
///   created, or the proposal cannot be opened or resolved
///
/// Failed swaps and rolled-back sessions are recorded, not returned.
pub async fn run_scenario(config: &SimConfig, bus: &EventBus) -> Result<ScenarioReport> {
    config.validate()?;

    let clock = ManualClock::new(0);
    let spot = UnifiedSpotPool::new(
        config.spot.asset_reserve,
        config.spot.stable_reserve,
        config.spot.fee_bps,
        config.oracle,
        clock.now_ms(),
    )
    .map_err(MarketError::from)?;
    let shared = SharedMarket::new(FutarchyMarket::new(spot));
    let mut rng = StdRng::seed_from_u64(config.flow.seed);

    let proposal = &config.proposal;
    let resolve_batch = proposal.start_batch.saturating_add(proposal.duration_batches);
    tracing::info!(
        seed = config.flow.seed,
        batches = config.flow.batches,
        start_batch = proposal.start_batch,
        resolve_batch,
        "scenario started"
    );

    let mut report = ScenarioReport {
        seed: config.flow.seed,
        batches: Vec::new(),
        committed_batches: 0,
        rolled_back_batches: 0,
        rejected_swaps: 0,
        resolution: None,
        final_spot_price: None,
        final_spot_twap: None,
        protocol_fees: (0, 0),
    };

    for batch in 1..=config.flow.batches {
        let now = clock.advance(config.flow.batch_interval_ms);
        let mut market = shared.lock().await;

        if batch == proposal.start_batch && market.proposal().is_none() {
            market.begin_proposal(
                proposal.outcomes,
                proposal.conditional_liquidity_ratio_bps,
                proposal.fee_bps,
                now,
            )?;
            bus.emit(MarketEvent::ProposalOpened {
                at: now,
                outcomes: proposal.outcomes,
                conditional_liquidity_ratio_bps: proposal.conditional_liquidity_ratio_bps,
            });
        }
        if batch == resolve_batch && market.proposal().is_some() {
            let resolution = market.resolve(proposal.winner, now)?;
            bus.emit(MarketEvent::ProposalResolved {
                at: now,
                winner: resolution.winner,
                final_twap: resolution.final_twap,
            });
            report.resolution = Some(resolution);
        }

        let mut session = market.begin_session(now);
        let mut rejected = 0u32;
        for _ in 0..config.flow.swaps_per_batch {
            let Some(order) = draw_order(&mut rng, session.market(), config) else {
                continue;
            };
            if let Err(e) = execute(&mut session, &order) {
                tracing::debug!(batch, venue = ?order.venue, error = %e, "swap rejected");
                rejected += 1;
            }
        }
        let swaps = session.swap_count();
        let committed = match session.commit() {
            Ok(receipt) => {
                report.committed_batches += 1;
                bus.emit(MarketEvent::BatchCommitted {
                    batch,
                    at: now,
                    swaps: receipt.swaps,
                    spot_price: receipt.spot_price,
                });
                true
            }
            Err(e) => {
                report.rolled_back_batches += 1;
                bus.emit(MarketEvent::BatchRolledBack {
                    batch,
                    at: now,
                    reason: e.to_string(),
                });
                false
            }
        };
        report.rejected_swaps += u64::from(rejected);
        report
            .batches
            .push(batch_report(&market, batch, now, committed, swaps, rejected));

        drop(market);
        tokio::task::yield_now().await;
    }

    let market = shared.snapshot().await;
    report.final_spot_price = market.spot().current_price().ok();
    report.final_spot_twap = market.spot().embedded_twap_oracle().get_twap().ok();
    report.protocol_fees = market.spot().curve().protocol_fees();
    tracing::info!(
        committed = report.committed_batches,
        rolled_back = report.rolled_back_batches,
        rejected_swaps = report.rejected_swaps,
        "scenario finished"
    );
    Ok(report)
}

fn draw_order(rng: &mut StdRng, market: &FutarchyMarket, config: &SimConfig) -> Option<Order> {
    let outcomes = market.conditional_pools().len();
    let venue = if outcomes == 0 {
        Venue::Spot
    } else {
        match rng.gen_range(0..=outcomes) {
            0 => Venue::Spot,
            i => Venue::Outcome(i - 1),
        }
    };

    let buy_probability = match venue {
        Venue::Outcome(i) if i == config.proposal.winner => {
            f64::from(config.flow.winner_buy_bps) / MAX_BPS as f64
        }
        _ => 0.5,
    };
    let direction = if rng.gen_bool(buy_probability) {
        SwapDirection::StableToAsset
    } else {
        SwapDirection::AssetToStable
    };

    let (asset, stable) = match venue {
        Venue::Spot => market.spot().reserves(),
        Venue::Outcome(i) => market.conditional_pools().get(i)?.reserves(),
    };
    let reserve_in = match direction {
        SwapDirection::AssetToStable => asset,
        SwapDirection::StableToAsset => stable,
    };
    let size_bps = rng.gen_range(1..=config.flow.max_swap_bps);
    let amount_in = u64::try_from(reserve_in as u128 * u128::from(size_bps) / MAX_BPS as u128).ok()?;
    if amount_in == 0 {
        return None;
    }
    Some(Order {
        venue,
        direction,
        amount_in,
    })
}

fn execute(session: &mut SwapSession<'_>, order: &Order) -> std::result::Result<u64, MarketError> {
    match order.venue {
        Venue::Spot => session
            .swap_spot(order.amount_in, order.direction, 0)
            .map(|receipt| receipt.amount_out),
        Venue::Outcome(i) => session
            .swap_conditional(i, order.amount_in, order.direction, 0)
            .map(|receipt| receipt.amount_out),
    }
}

fn batch_report(
    market: &FutarchyMarket,
    batch: u64,
    now: u64,
    committed: bool,
    swaps: usize,
    rejected_swaps: u32,
) -> BatchReport {
    BatchReport {
        batch,
        at: now,
        committed,
        swaps,
        rejected_swaps,
        spot_price: market.spot().current_price().ok(),
        feed_price: market.current_twap().ok(),
        conditional_feed: price_source(market.spot()) == PriceSource::Conditional,
        governance_twap: market.governance_twap(now).ok(),
        band: market.band().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_config() -> SimConfig {
        let mut config = SimConfig::default();
        config.flow.batches = 12;
        config.proposal.start_batch = 3;
        config.proposal.duration_batches = 6;
        config
    }

    #[tokio::test]
    async fn test_scenario_runs_full_lifecycle() {
        let config = short_config();
        let bus = EventBus::new(256);
        let mut rx = bus.subscribe();

        let report = run_scenario(&config, &bus).await.expect("scenario");

        assert_eq!(report.batches.len(), 12);
        assert_eq!(report.committed_batches + report.rolled_back_batches, 12);
        let resolution = report.resolution.as_ref().expect("resolved");
        assert_eq!(resolution.winner, 0);
        assert_eq!(resolution.period_end, 9 * config.flow.batch_interval_ms);

        for record in &report.batches[2..8] {
            assert!(record.band.is_some(), "batch {} has a band", record.batch);
            assert!(record.conditional_feed);
        }
        assert!(report.batches[8].band.is_none());
        assert!(!report.batches[8].conditional_feed);

        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            names.push(event.name());
        }
        assert!(names.contains(&"ProposalOpened"));
        assert!(names.contains(&"ProposalResolved"));
        assert_eq!(bus.sequence(), 12 + 2);
    }

    #[tokio::test]
    async fn test_same_seed_replays_identically() {
        let config = short_config();
        let first = run_scenario(&config, &EventBus::new(64)).await.expect("first");
        let second = run_scenario(&config, &EventBus::new(64)).await.expect("second");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_committed_batches_respect_band() {
        let mut config = short_config();
        config.flow.swaps_per_batch = 8;
        let report = run_scenario(&config, &EventBus::new(64)).await.expect("scenario");
        for record in report.batches.iter().filter(|b| b.committed) {
            if let (Some(band), Some(spot)) = (record.band, record.spot_price) {
                assert!(band.contains(spot), "batch {} spot in band", record.batch);
            }
        }
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut config = SimConfig::default();
        config.proposal.outcomes = 1;
        assert!(matches!(
            run_scenario(&config, &EventBus::new(4)).await,
            Err(crate::SimError::InvalidConfig(_))
        ));
    }
}
