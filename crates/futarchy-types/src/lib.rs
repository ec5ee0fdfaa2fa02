//! # futarchy-types
//!
//! Shared constants and primitives used across the futarchy workspace.
//!
//! Prices are `u128` fixed-point values scaled by [`PRICE_SCALE`] and express
//! stable units per asset unit. Timestamps are Unix milliseconds.
//!
//! ## Modules
//!
//! - [`clock`] — Time source consumed by oracles and markets
//! - [`math`] — Checked fixed-point helpers

pub mod clock;
pub mod math;

/// Fixed-point price scale (1.0 = 1e12).
pub const PRICE_SCALE: u128 = 1_000_000_000_000;

/// Basis point denominator (100% = 10,000 bps).
pub const MAX_BPS: u64 = 10_000;

/// Parts-per-million denominator (100% = 1,000,000 ppm).
pub const PPM_DENOMINATOR: u64 = 1_000_000;

/// One minute in milliseconds.
pub const MS_PER_MINUTE: u64 = 60_000;

/// One day in milliseconds.
pub const MS_PER_DAY: u64 = 86_400_000;

/// Seven days in milliseconds.
pub const SEVEN_DAYS_MS: u64 = 7 * MS_PER_DAY;

/// Ninety days in milliseconds (7,776,000,000).
pub const NINETY_DAYS_MS: u64 = 90 * MS_PER_DAY;

/// Fixed-point price (stable per asset, scaled by [`PRICE_SCALE`]).
pub type Price = u128;

/// Timestamp in Unix milliseconds.
pub type TimestampMs = u64;

/// Index of a proposal outcome (0-based).
pub type OutcomeIndex = usize;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ninety_days_constant() {
        assert_eq!(NINETY_DAYS_MS, 7_776_000_000);
    }

    #[test]
    fn test_seven_days_constant() {
        assert_eq!(SEVEN_DAYS_MS, 604_800_000);
    }
}
