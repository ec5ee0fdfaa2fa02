//! Percent-capped windowed TWAP.
//!
//! Prices are accumulated as `price x elapsed_ms` into two accumulators:
//! one for the open window and one all-time total. Whenever an update
//! crosses one or more window boundaries the finalized TWAP takes a single
//! step toward the prevailing price:
//!
//! ```text
//! cap      = last_window_twap * max_movement_ppm / 1_000_000
//! step     = min(|last_price - last_window_twap|, cap)
//! ```
//!
//! Only one capped step is taken per call regardless of how many windows
//! elapsed, so the cost of an update is O(1) and a single block can move the
//! TWAP by at most `max_movement_ppm` of its previous value. Catching up after
//! a long gap takes repeated updates; the cap compounds between calls.
//!
//! Long trailing windows are answered from the [`CheckpointRing`] without
//! the cap: see [`SimpleTwap::get_window_twap`].

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use futarchy_types::math::mul_div_floor;
use futarchy_types::{Price, MS_PER_MINUTE, NINETY_DAYS_MS, PPM_DENOMINATOR};

use crate::checkpoint::{Checkpoint, CheckpointRing, CHECKPOINT_INTERVAL_MS};
use crate::{OracleError, Result};

/// Default window size (1 minute).
pub const DEFAULT_WINDOW_SIZE_MS: u64 = MS_PER_MINUTE;

/// Default movement cap per update (10,000 ppm = 1%).
pub const DEFAULT_MAX_MOVEMENT_PPM: u64 = 10_000;

/// Oracle parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwapConfig {
    /// Window length in milliseconds.
    #[serde(default = "default_window_size_ms")]
    pub window_size_ms: u64,
    /// Maximum TWAP movement per update, in parts per million.
    #[serde(default = "default_max_movement_ppm")]
    pub max_movement_ppm: u64,
}

fn default_window_size_ms() -> u64 {
    DEFAULT_WINDOW_SIZE_MS
}

fn default_max_movement_ppm() -> u64 {
    DEFAULT_MAX_MOVEMENT_PPM
}

impl Default for TwapConfig {
    fn default() -> Self {
        Self {
            window_size_ms: DEFAULT_WINDOW_SIZE_MS,
            max_movement_ppm: DEFAULT_MAX_MOVEMENT_PPM,
        }
    }
}

impl TwapConfig {
    /// Check the configuration invariants.
    ///
    /// # Errors
    ///
    /// - [`OracleError::InvalidWindowSize`] if `window_size_ms` is zero
    /// - [`OracleError::InvalidMaxMovement`] if `max_movement_ppm` is not in `(0, 1_000_000)`
    pub fn validate(&self) -> Result<()> {
        if self.window_size_ms == 0 {
            return Err(OracleError::InvalidWindowSize(self.window_size_ms));
        }
        if self.max_movement_ppm == 0 || self.max_movement_ppm >= PPM_DENOMINATOR {
            return Err(OracleError::InvalidMaxMovement(self.max_movement_ppm));
        }
        Ok(())
    }
}

/// Per-market oracle state.
///
/// Deserialization runs the same checks as the constructors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSimpleTwap")]
pub struct SimpleTwap {
    last_window_twap: Price,
    cumulative_price: BigUint,
    window_start: u64,
    last_update: u64,
    window_size_ms: u64,
    max_movement_ppm: u64,
    initialized: bool,
    cumulative_total: BigUint,
    last_price: Price,
    initialized_at: u64,
    checkpoints: CheckpointRing,
    last_checkpoint_at: u64,
}

/// Unchecked wire form of [`SimpleTwap`].
#[derive(Deserialize)]
struct RawSimpleTwap {
    last_window_twap: Price,
    cumulative_price: BigUint,
    window_start: u64,
    last_update: u64,
    window_size_ms: u64,
    max_movement_ppm: u64,
    initialized: bool,
    cumulative_total: BigUint,
    last_price: Price,
    initialized_at: u64,
    checkpoints: CheckpointRing,
    last_checkpoint_at: u64,
}

impl TryFrom<RawSimpleTwap> for SimpleTwap {
    type Error = OracleError;

    fn try_from(raw: RawSimpleTwap) -> Result<Self> {
        TwapConfig {
            window_size_ms: raw.window_size_ms,
            max_movement_ppm: raw.max_movement_ppm,
        }
        .validate()?;
        if raw.initialized {
            if raw.last_window_twap == 0 {
                return Err(OracleError::InvalidPrice(raw.last_window_twap));
            }
            if raw.last_price == 0 {
                return Err(OracleError::InvalidPrice(raw.last_price));
            }
        }
        if raw.window_start > raw.last_update
            || raw.initialized_at > raw.last_update
            || raw.last_checkpoint_at > raw.last_update
        {
            return Err(OracleError::InvalidState("timestamps after last update"));
        }
        if raw.cumulative_price > raw.cumulative_total {
            return Err(OracleError::InvalidState("window accumulator exceeds total"));
        }
        if raw
            .checkpoints
            .latest()
            .is_some_and(|c| c.timestamp > raw.last_update || c.cumulative > raw.cumulative_total)
        {
            return Err(OracleError::InvalidState("checkpoint ahead of the accumulator"));
        }
        Ok(Self {
            last_window_twap: raw.last_window_twap,
            cumulative_price: raw.cumulative_price,
            window_start: raw.window_start,
            last_update: raw.last_update,
            window_size_ms: raw.window_size_ms,
            max_movement_ppm: raw.max_movement_ppm,
            initialized: raw.initialized,
            cumulative_total: raw.cumulative_total,
            last_price: raw.last_price,
            initialized_at: raw.initialized_at,
            checkpoints: raw.checkpoints,
            last_checkpoint_at: raw.last_checkpoint_at,
        })
    }
}

impl SimpleTwap {
    /// Create an oracle seeded with `initial_price` at `now`.
    ///
    /// Records an immediate checkpoint so that long-window queries can be
    /// answered once enough time has passed.
    ///
    /// # Errors
    ///
    /// - [`OracleError::InvalidWindowSize`] if `window_size_ms` is zero
    /// - [`OracleError::InvalidMaxMovement`] if `max_movement_ppm` is not in `(0, 1_000_000)`
    /// - [`OracleError::InvalidPrice`] if `initial_price` is zero
    ///
    /// # Examples
    ///
    /// ```
    /// use futarchy_oracle::SimpleTwap;
    ///
    /// let twap = SimpleTwap::new(1_000_000_000_000, 60_000, 10_000, 0).unwrap();
    /// assert_eq!(twap.get_twap().unwrap(), 1_000_000_000_000);
    /// ```
    pub fn new(
        initial_price: Price,
        window_size_ms: u64,
        max_movement_ppm: u64,
        now: u64,
    ) -> Result<Self> {
        Self::with_config(
            initial_price,
            TwapConfig {
                window_size_ms,
                max_movement_ppm,
            },
            now,
        )
    }

    /// Create an oracle with the default 1-minute window and 1% cap.
    pub fn new_default(initial_price: Price, now: u64) -> Result<Self> {
        Self::with_config(initial_price, TwapConfig::default(), now)
    }

    /// Create a seeded oracle from a [`TwapConfig`].
    pub fn with_config(initial_price: Price, config: TwapConfig, now: u64) -> Result<Self> {
        if initial_price == 0 {
            return Err(OracleError::InvalidPrice(initial_price));
        }
        let mut twap = Self::uninitialized(config)?;
        twap.seed(initial_price, now);
        Ok(twap)
    }

    /// Create an oracle that has no price yet.
    ///
    /// The first [`update`](Self::update) seeds it; until then
    /// [`get_twap`](Self::get_twap) fails with [`OracleError::NotInitialized`].
    pub fn uninitialized(config: TwapConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            last_window_twap: 0,
            cumulative_price: BigUint::default(),
            window_start: 0,
            last_update: 0,
            window_size_ms: config.window_size_ms,
            max_movement_ppm: config.max_movement_ppm,
            initialized: false,
            cumulative_total: BigUint::default(),
            last_price: 0,
            initialized_at: 0,
            checkpoints: CheckpointRing::new(),
            last_checkpoint_at: 0,
        })
    }

    fn seed(&mut self, price: Price, now: u64) {
        self.last_window_twap = price;
        self.last_price = price;
        self.window_start = now;
        self.last_update = now;
        self.initialized_at = now;
        self.initialized = true;
        self.checkpoints.push(Checkpoint {
            timestamp: now,
            cumulative: self.cumulative_total.clone(),
        });
        self.last_checkpoint_at = now;
        tracing::debug!(price, now, "twap oracle seeded");
    }

    /// Copy this oracle's state and history for a new market.
    ///
    /// Conditional markets fork the spot oracle when a proposal opens so that
    /// they inherit its TWAP and checkpoint history.
    ///
    /// # Errors
    ///
    /// - [`OracleError::NotInitialized`] if the oracle has not been seeded
    pub fn fork(&self) -> Result<Self> {
        if !self.initialized {
            return Err(OracleError::NotInitialized);
        }
        Ok(self.clone())
    }

    /// Record a new observed price at `now`.
    ///
    /// An uninitialized oracle is seeded with `price`. A repeated timestamp
    /// only replaces the prevailing price, since no time has elapsed.
    ///
    /// # Errors
    ///
    /// - [`OracleError::TimestampRegression`] if `now` is before the last update
    /// - [`OracleError::InvalidPrice`] if seeding with a zero price
    /// - [`OracleError::Overflow`] if the movement cap overflows
    pub fn update(&mut self, price: Price, now: u64) -> Result<()> {
        if !self.initialized {
            if price == 0 {
                return Err(OracleError::InvalidPrice(price));
            }
            self.seed(price, now);
            return Ok(());
        }
        if now < self.last_update {
            return Err(OracleError::TimestampRegression {
                now,
                last_update: self.last_update,
            });
        }
        if now == self.last_update {
            self.last_price = price;
            return Ok(());
        }

        let num_windows = (now - self.window_start) / self.window_size_ms;
        // Computed before any mutation so a failure leaves the oracle untouched.
        let cap = if num_windows > 0 {
            Some(self.movement_cap()?)
        } else {
            None
        };

        let elapsed = now - self.last_update;
        let contribution = BigUint::from(self.last_price) * elapsed;
        self.cumulative_price += &contribution;
        self.cumulative_total += contribution;
        self.last_update = now;

        if let Some(cap) = cap {
            let previous = self.last_window_twap;
            self.last_window_twap = capped_step(previous, self.last_price, cap);
            self.window_start += num_windows * self.window_size_ms;
            let remainder = now - self.window_start;
            self.cumulative_price = BigUint::from(self.last_price) * remainder;
            tracing::debug!(
                windows = num_windows,
                previous,
                twap = self.last_window_twap,
                "twap windows finalized"
            );
        }

        self.last_price = price;
        self.maybe_checkpoint(now);
        Ok(())
    }

    /// Splice a resolved conditional market's history into this oracle.
    ///
    /// `period_cumulative` is the conditional market's `price x ms`
    /// accumulated over `[period_start, period_end]`. The finalized TWAP
    /// moves toward `period_final_price` by at most one cap per whole window
    /// in the period, and a fresh window opens at `period_end`.
    ///
    /// # Errors
    ///
    /// - [`OracleError::NotInitialized`] if the oracle has not been seeded
    /// - [`OracleError::InvalidBackfillPeriod`] if `period_end <= period_start`
    /// - [`OracleError::NonContiguousBackfill`] if `period_start` is not the last update
    /// - [`OracleError::InvalidPrice`] if `period_final_price` is zero
    /// - [`OracleError::Overflow`] if the scaled cap overflows
    pub fn backfill_from_conditional(
        &mut self,
        period_start: u64,
        period_end: u64,
        period_cumulative: &BigUint,
        period_final_price: Price,
    ) -> Result<()> {
        if !self.initialized {
            return Err(OracleError::NotInitialized);
        }
        if period_end <= period_start {
            return Err(OracleError::InvalidBackfillPeriod {
                start: period_start,
                end: period_end,
            });
        }
        if period_start != self.last_update {
            return Err(OracleError::NonContiguousBackfill {
                period_start,
                last_update: self.last_update,
            });
        }
        if period_final_price == 0 {
            return Err(OracleError::InvalidPrice(period_final_price));
        }

        let num_windows = (period_end - period_start) / self.window_size_ms;
        let cap = self
            .movement_cap()?
            .checked_mul(num_windows as u128)
            .ok_or(OracleError::Overflow)?;

        let previous = self.last_window_twap;
        self.cumulative_total += period_cumulative;
        self.last_window_twap = capped_step(previous, period_final_price, cap);
        self.last_price = period_final_price;
        self.last_update = period_end;
        self.window_start = period_end;
        self.cumulative_price = BigUint::default();
        self.maybe_checkpoint(period_end);

        tracing::info!(
            period_start,
            period_end,
            windows = num_windows,
            previous,
            twap = self.last_window_twap,
            "twap backfilled from conditional market"
        );
        Ok(())
    }

    /// The finalized, capped TWAP.
    ///
    /// # Errors
    ///
    /// - [`OracleError::NotInitialized`] if the oracle has not been seeded
    pub fn get_twap(&self) -> Result<Price> {
        if !self.initialized {
            return Err(OracleError::NotInitialized);
        }
        Ok(self.last_window_twap)
    }

    /// Whether at least one full window has elapsed since seeding.
    pub fn is_ready(&self, now: u64) -> bool {
        self.initialized && now.saturating_sub(self.initialized_at) >= self.window_size_ms
    }

    /// Average price over the trailing `window_ms` ending at `now`.
    ///
    /// Uses the newest checkpoint at or before `now - window_ms`, so the
    /// effective window may be longer than requested by up to one checkpoint
    /// interval. Returns `None` when no such checkpoint exists or `now` is
    /// before the last update.
    pub fn get_window_twap(&self, window_ms: u64, now: u64) -> Option<Price> {
        if !self.initialized || window_ms == 0 {
            return None;
        }
        let target = now.checked_sub(window_ms)?;
        let checkpoint = self.checkpoint_at_or_before(target)?;
        let duration = now - checkpoint.timestamp;
        let projected = self.projected_cumulative(now)?;
        if projected < checkpoint.cumulative {
            return None;
        }
        let average = (projected - &checkpoint.cumulative) / duration;
        Price::try_from(&average).ok()
    }

    /// Average price over the trailing 90 days.
    pub fn get_ninety_day_twap(&self, now: u64) -> Option<Price> {
        self.get_window_twap(NINETY_DAYS_MS, now)
    }

    /// Newest checkpoint with `timestamp <= target_timestamp`.
    pub fn checkpoint_at_or_before(&self, target_timestamp: u64) -> Option<&Checkpoint> {
        self.checkpoints.at_or_before(target_timestamp)
    }

    /// All-time cumulative extended to `now` at the prevailing price.
    ///
    /// `None` if `now` is before the last update: the accumulator already
    /// covers time past `now` and cannot be rewound.
    pub fn projected_cumulative(&self, now: u64) -> Option<BigUint> {
        let pending = now.checked_sub(self.last_update)?;
        Some(&self.cumulative_total + BigUint::from(self.last_price) * pending)
    }

    /// Uncapped average of the open window up to `now`.
    pub fn current_window_average(&self, now: u64) -> Option<Price> {
        if !self.initialized {
            return None;
        }
        let pending = now.checked_sub(self.last_update)?;
        let duration = now.saturating_sub(self.window_start);
        if duration == 0 {
            return Some(self.last_price);
        }
        let window_cumulative =
            &self.cumulative_price + BigUint::from(self.last_price) * pending;
        Price::try_from(&(window_cumulative / duration)).ok()
    }

    fn movement_cap(&self) -> Result<Price> {
        mul_div_floor(
            self.last_window_twap,
            self.max_movement_ppm as u128,
            PPM_DENOMINATOR as u128,
        )
        .ok_or(OracleError::Overflow)
    }

    fn maybe_checkpoint(&mut self, now: u64) {
        if now.saturating_sub(self.last_checkpoint_at) < CHECKPOINT_INTERVAL_MS {
            return;
        }
        self.checkpoints.push(Checkpoint {
            timestamp: now,
            cumulative: self.cumulative_total.clone(),
        });
        self.last_checkpoint_at = now;
        tracing::debug!(now, count = self.checkpoints.len(), "twap checkpoint recorded");
    }

    /// Oracle parameters.
    pub fn config(&self) -> TwapConfig {
        TwapConfig {
            window_size_ms: self.window_size_ms,
            max_movement_ppm: self.max_movement_ppm,
        }
    }

    /// Whether the oracle has been seeded.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Finalized TWAP without the initialization check.
    pub fn last_window_twap(&self) -> Price {
        self.last_window_twap
    }

    /// Most recently observed price.
    pub fn last_price(&self) -> Price {
        self.last_price
    }

    /// Timestamp of the last accepted update.
    pub fn last_update(&self) -> u64 {
        self.last_update
    }

    /// Start of the open window.
    pub fn window_start(&self) -> u64 {
        self.window_start
    }

    /// Window length in milliseconds.
    pub fn window_size_ms(&self) -> u64 {
        self.window_size_ms
    }

    /// Movement cap in ppm.
    pub fn max_movement_ppm(&self) -> u64 {
        self.max_movement_ppm
    }

    /// When the oracle was seeded.
    pub fn initialized_at(&self) -> u64 {
        self.initialized_at
    }

    /// Open-window accumulator.
    pub fn cumulative_price(&self) -> &BigUint {
        &self.cumulative_price
    }

    /// All-time accumulator.
    pub fn cumulative_total(&self) -> &BigUint {
        &self.cumulative_total
    }

    /// Retained checkpoints.
    pub fn checkpoints(&self) -> &CheckpointRing {
        &self.checkpoints
    }

    /// Timestamp of the most recent checkpoint.
    pub fn last_checkpoint_at(&self) -> u64 {
        self.last_checkpoint_at
    }
}

/// Move `current` toward `target` by at most `cap`.
pub fn capped_step(current: Price, target: Price, cap: Price) -> Price {
    if target >= current {
        current + (target - current).min(cap)
    } else {
        current - (current - target).min(cap)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use futarchy_types::{MS_PER_DAY, SEVEN_DAYS_MS};

    use super::*;
    use crate::checkpoint::MAX_CHECKPOINTS;

    const ONE: Price = 1_000_000_000_000;

    fn oracle() -> SimpleTwap {
        SimpleTwap::new(ONE, 60_000, 10_000, 0).expect("valid oracle")
    }

    #[test]
    fn test_new_rejects_zero_window() {
        let err = SimpleTwap::new(ONE, 0, 10_000, 0).unwrap_err();
        assert_eq!(err, OracleError::InvalidWindowSize(0));
    }

    #[test]
    fn test_new_rejects_out_of_range_movement() {
        assert_eq!(
            SimpleTwap::new(ONE, 60_000, 0, 0).unwrap_err(),
            OracleError::InvalidMaxMovement(0)
        );
        assert_eq!(
            SimpleTwap::new(ONE, 60_000, 1_000_000, 0).unwrap_err(),
            OracleError::InvalidMaxMovement(1_000_000)
        );
        assert!(SimpleTwap::new(ONE, 60_000, 999_999, 0).is_ok());
    }

    #[test]
    fn test_new_rejects_zero_price() {
        assert_eq!(
            SimpleTwap::new_default(0, 0).unwrap_err(),
            OracleError::InvalidPrice(0)
        );
    }

    #[test]
    fn test_new_seeds_state_and_checkpoint() {
        let twap = SimpleTwap::new_default(ONE, 5_000).expect("oracle");
        assert!(twap.is_initialized());
        assert_eq!(twap.get_twap().expect("twap"), ONE);
        assert_eq!(twap.last_price(), ONE);
        assert_eq!(twap.window_size_ms(), DEFAULT_WINDOW_SIZE_MS);
        assert_eq!(twap.max_movement_ppm(), DEFAULT_MAX_MOVEMENT_PPM);
        assert_eq!(twap.checkpoints().len(), 1);
        assert_eq!(twap.checkpoint_at_or_before(5_000).map(|c| c.timestamp), Some(5_000));
    }

    #[test]
    fn test_timestamp_regression_rejected() {
        let mut twap = oracle();
        twap.update(ONE, 10_000).expect("update");
        let before = twap.clone();

        let err = twap.update(2 * ONE, 9_999).unwrap_err();
        assert_eq!(
            err,
            OracleError::TimestampRegression {
                now: 9_999,
                last_update: 10_000
            }
        );
        assert_eq!(twap, before);
    }

    #[test]
    fn test_zero_elapsed_update_only_sets_last_price() {
        let mut twap = oracle();
        twap.update(ONE, 120_000).expect("update");
        let twap_before = twap.last_window_twap();
        let cumulative_before = twap.cumulative_total().clone();

        twap.update(3 * ONE, 120_000).expect("same-timestamp update");
        twap.update(5 * ONE, 120_000).expect("same-timestamp update");

        assert_eq!(twap.last_window_twap(), twap_before);
        assert_eq!(twap.cumulative_total(), &cumulative_before);
        assert_eq!(twap.last_price(), 5 * ONE);
    }

    #[test]
    fn test_spike_moves_one_capped_step_per_call() {
        let mut twap = oracle();

        // Spike observed 1 ms in; the first window is still open.
        twap.update(2 * ONE, 1).expect("spike");
        assert_eq!(twap.get_twap().expect("twap"), ONE);

        // Ten windows later only a single 1% step is applied.
        twap.update(2 * ONE, 600_000).expect("after ten windows");
        assert_eq!(twap.get_twap().expect("twap"), ONE + ONE / 100);
        assert_eq!(twap.window_start(), 600_000);

        // The cap compounds from the new TWAP.
        twap.update(2 * ONE, 660_000).expect("next window");
        let expected = 1_010_000_000_000 + 10_100_000_000;
        assert_eq!(twap.get_twap().expect("twap"), expected);
    }

    #[test]
    fn test_small_gap_reached_exactly() {
        let mut twap = oracle();
        let target = ONE + ONE / 1_000; // 0.1% above
        twap.update(target, 1).expect("update");
        twap.update(target, 60_001).expect("update");
        assert_eq!(twap.get_twap().expect("twap"), target);
    }

    #[test]
    fn test_downward_move_capped() {
        let mut twap = oracle();
        twap.update(ONE / 2, 1).expect("drop");
        twap.update(ONE / 2, 60_001).expect("window");
        assert_eq!(twap.get_twap().expect("twap"), ONE - ONE / 100);
    }

    #[test]
    fn test_window_accumulator_reset_to_remainder() {
        let mut twap = oracle();
        // Window [0, 60_000) closes at 90_000 with 30_000 ms of remainder.
        twap.update(ONE, 90_000).expect("update");
        assert_eq!(twap.window_start(), 60_000);
        assert_eq!(twap.cumulative_price(), &(BigUint::from(ONE) * 30_000u64));
        assert_eq!(twap.cumulative_total(), &(BigUint::from(ONE) * 90_000u64));
    }

    #[test]
    fn test_current_window_average() {
        let mut twap = oracle();
        twap.update(3 * ONE, 30_000).expect("update");
        // 30s at 1.0 then 30s at 3.0 within the first window.
        assert_eq!(twap.current_window_average(60_000 - 1), Some((ONE * 30_000 + 3 * ONE * 29_999) / 59_999));
        assert_eq!(twap.current_window_average(30_000), Some(ONE));
        // Before the last update the open window cannot be reconstructed.
        assert_eq!(twap.current_window_average(29_999), None);
    }

    #[test]
    fn test_movement_never_exceeds_cap() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut twap = oracle();
        let mut now = 0u64;

        for _ in 0..2_000 {
            now += rng.gen_range(0..240_000);
            let price = rng.gen_range(ONE / 10..ONE * 10);
            let before = twap.last_window_twap();
            twap.update(price, now).expect("update");
            let after = twap.last_window_twap();
            let cap = before * 10_000 / 1_000_000;
            assert!(before.abs_diff(after) <= cap, "moved {} > cap {}", before.abs_diff(after), cap);
        }
    }

    #[test]
    fn test_is_ready_after_one_window() {
        let twap = SimpleTwap::new(ONE, 60_000, 10_000, 1_000).expect("oracle");
        assert!(!twap.is_ready(1_000));
        assert!(!twap.is_ready(60_999));
        assert!(twap.is_ready(61_000));
    }

    #[test]
    fn test_uninitialized_oracle() {
        let mut twap = SimpleTwap::uninitialized(TwapConfig::default()).expect("oracle");
        assert_eq!(twap.get_twap().unwrap_err(), OracleError::NotInitialized);
        assert!(!twap.is_ready(u64::MAX));
        assert_eq!(twap.get_window_twap(1, 10), None);
        assert_eq!(twap.fork().unwrap_err(), OracleError::NotInitialized);
        assert_eq!(twap.update(0, 10).unwrap_err(), OracleError::InvalidPrice(0));

        twap.update(ONE, 10).expect("seed");
        assert_eq!(twap.get_twap().expect("twap"), ONE);
        assert_eq!(twap.initialized_at(), 10);
        assert_eq!(twap.checkpoints().len(), 1);
    }

    #[test]
    fn test_checkpoint_ring_bounded() {
        let mut twap = oracle();
        for day in 1..=400u64 {
            twap.update(ONE, day * MS_PER_DAY).expect("daily update");
        }
        assert_eq!(twap.checkpoints().len(), MAX_CHECKPOINTS);
        let latest = twap.checkpoints().latest().map(|c| c.timestamp);
        assert_eq!(latest, Some(twap.last_checkpoint_at()));
    }

    #[test]
    fn test_checkpoints_spaced_seven_days() {
        let mut twap = oracle();
        for day in 1..=21u64 {
            twap.update(ONE, day * MS_PER_DAY).expect("daily update");
        }
        let stamps: Vec<u64> = twap.checkpoints().iter().map(|c| c.timestamp).collect();
        assert_eq!(stamps, vec![0, SEVEN_DAYS_MS, 2 * SEVEN_DAYS_MS, 3 * SEVEN_DAYS_MS]);
    }

    #[test]
    fn test_window_twap_from_checkpoints() {
        let mut twap = SimpleTwap::new(1_000, 60_000, 10_000, 0).expect("oracle");
        twap.update(3_000, SEVEN_DAYS_MS).expect("week one");
        twap.update(3_000, 2 * SEVEN_DAYS_MS).expect("week two");

        assert_eq!(twap.get_window_twap(SEVEN_DAYS_MS, 2 * SEVEN_DAYS_MS), Some(3_000));
        assert_eq!(twap.get_window_twap(2 * SEVEN_DAYS_MS, 2 * SEVEN_DAYS_MS), Some(2_000));
        // Falls back to the older checkpoint at 0.
        assert_eq!(twap.get_window_twap(10 * MS_PER_DAY, 2 * SEVEN_DAYS_MS), Some(2_000));
        // Projection past the last update at the prevailing price.
        assert_eq!(twap.get_window_twap(SEVEN_DAYS_MS, 3 * SEVEN_DAYS_MS), Some(3_000));
        // Not enough history.
        assert_eq!(twap.get_window_twap(3 * SEVEN_DAYS_MS, 2 * SEVEN_DAYS_MS), None);
    }

    #[test]
    fn test_ninety_day_twap_requires_history() {
        let mut twap = oracle();
        for day in 1..=89u64 {
            twap.update(ONE, day * MS_PER_DAY).expect("daily update");
        }
        assert_eq!(twap.get_ninety_day_twap(89 * MS_PER_DAY), None);

        twap.update(ONE, NINETY_DAYS_MS).expect("day 90");
        assert_eq!(twap.get_ninety_day_twap(NINETY_DAYS_MS), Some(ONE));
        assert_eq!(twap.get_ninety_day_twap(NINETY_DAYS_MS + MS_PER_DAY), Some(ONE));
    }

    #[test]
    fn test_backfill_validation() {
        let mut twap = oracle();
        twap.update(ONE, 1_000).expect("update");
        let cumulative = BigUint::from(ONE) * 1_000u64;

        assert_eq!(
            twap.backfill_from_conditional(1_000, 1_000, &cumulative, ONE).unwrap_err(),
            OracleError::InvalidBackfillPeriod { start: 1_000, end: 1_000 }
        );
        assert_eq!(
            twap.backfill_from_conditional(500, 2_000, &cumulative, ONE).unwrap_err(),
            OracleError::NonContiguousBackfill { period_start: 500, last_update: 1_000 }
        );
        assert_eq!(
            twap.backfill_from_conditional(1_000, 2_000, &cumulative, 0).unwrap_err(),
            OracleError::InvalidPrice(0)
        );

        let mut fresh = SimpleTwap::uninitialized(TwapConfig::default()).expect("oracle");
        assert_eq!(
            fresh.backfill_from_conditional(0, 1, &cumulative, ONE).unwrap_err(),
            OracleError::NotInitialized
        );
    }

    #[test]
    fn test_backfill_scales_cap_by_windows() {
        let mut twap = oracle();
        let period = BigUint::from(2 * ONE) * 600_000u64;

        twap.backfill_from_conditional(0, 600_000, &period, 2 * ONE).expect("backfill");

        // Ten windows at 1% each.
        assert_eq!(twap.get_twap().expect("twap"), ONE + ONE / 10);
        assert_eq!(twap.last_price(), 2 * ONE);
        assert_eq!(twap.last_update(), 600_000);
        assert_eq!(twap.window_start(), 600_000);
        assert_eq!(twap.cumulative_total(), &period);
        assert_eq!(twap.cumulative_price(), &BigUint::default());
    }

    #[test]
    fn test_backfill_reaches_close_target() {
        let mut twap = oracle();
        let final_price = ONE + ONE / 20;
        let period = BigUint::from(final_price) * 600_000u64;
        twap.backfill_from_conditional(0, 600_000, &period, final_price).expect("backfill");
        assert_eq!(twap.get_twap().expect("twap"), final_price);

        // Subsequent updates continue from the backfilled state.
        twap.update(final_price, 660_000).expect("update");
        assert_eq!(twap.get_twap().expect("twap"), final_price);
    }

    #[test]
    fn test_fork_inherits_history() {
        let mut spot = oracle();
        spot.update(ONE, SEVEN_DAYS_MS).expect("update");
        let fork = spot.fork().expect("fork");
        assert_eq!(fork.checkpoints(), spot.checkpoints());
        assert_eq!(fork.cumulative_total(), spot.cumulative_total());
        assert_eq!(fork.get_twap().expect("twap"), spot.get_twap().expect("twap"));
    }

    #[test]
    fn test_capped_step() {
        assert_eq!(capped_step(100, 150, 10), 110);
        assert_eq!(capped_step(100, 50, 10), 90);
        assert_eq!(capped_step(100, 105, 10), 105);
        assert_eq!(capped_step(100, 100, 10), 100);
    }

    #[test]
    fn test_state_serializes() {
        let twap = oracle();
        let json = serde_json::to_string(&twap).expect("serialize");
        let parsed: SimpleTwap = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed, twap);
    }

    fn with_field(twap: &SimpleTwap, field: &str, value: serde_json::Value) -> serde_json::Value {
        let mut json = serde_json::to_value(twap).expect("serialize");
        json[field] = value;
        json
    }

    #[test]
    fn test_deserialize_rejects_invalid_config() {
        let twap = oracle();

        let json = with_field(&twap, "window_size_ms", 0.into());
        assert!(serde_json::from_value::<SimpleTwap>(json).is_err());

        let json = with_field(&twap, "max_movement_ppm", 1_000_000.into());
        assert!(serde_json::from_value::<SimpleTwap>(json).is_err());
    }

    #[test]
    fn test_deserialize_rejects_inconsistent_state() {
        let mut twap = oracle();
        twap.update(ONE, 120_000).expect("update");

        let json = with_field(&twap, "last_window_twap", 0.into());
        assert!(serde_json::from_value::<SimpleTwap>(json).is_err());

        let json = with_field(&twap, "window_start", 500_000.into());
        assert!(serde_json::from_value::<SimpleTwap>(json).is_err());

        let json = with_field(&twap, "last_checkpoint_at", 500_000.into());
        assert!(serde_json::from_value::<SimpleTwap>(json).is_err());
    }

    #[test]
    fn test_queries_before_last_update_return_none() {
        let mut twap = SimpleTwap::new(1_000, 60_000, 10_000, 0).expect("oracle");
        twap.update(1_000, SEVEN_DAYS_MS).expect("week one");
        twap.update(1_000, 2 * SEVEN_DAYS_MS).expect("week two");

        // The accumulator already covers 14 days; a 10-day read cannot rewind it.
        assert_eq!(twap.get_window_twap(SEVEN_DAYS_MS, 10 * MS_PER_DAY), None);
        assert_eq!(twap.projected_cumulative(10 * MS_PER_DAY), None);
        assert_eq!(twap.get_ninety_day_twap(10 * MS_PER_DAY), None);

        assert_eq!(twap.get_window_twap(SEVEN_DAYS_MS, 2 * SEVEN_DAYS_MS), Some(1_000));
        assert_eq!(
            twap.projected_cumulative(2 * SEVEN_DAYS_MS),
            Some(BigUint::from(1_000u64) * (2 * SEVEN_DAYS_MS))
        );
    }
}
