//! Checked fixed-point helpers.
//!
//! All helpers return `None` on overflow or division by zero so that callers
//! can map the failure onto their own error type.

use crate::MAX_BPS;

/// `a * b / denominator`, rounded down.
pub fn mul_div_floor(a: u128, b: u128, denominator: u128) -> Option<u128> {
    if denominator == 0 {
        return None;
    }
    a.checked_mul(b).map(|n| n / denominator)
}

/// `a * b / denominator`, rounded up.
pub fn mul_div_ceil(a: u128, b: u128, denominator: u128) -> Option<u128> {
    if denominator == 0 {
        return None;
    }
    let numerator = a.checked_mul(b)?;
    let quotient = numerator / denominator;
    if numerator % denominator == 0 {
        Some(quotient)
    } else {
        quotient.checked_add(1)
    }
}

/// Scale `value` by `(MAX_BPS - fee_bps) / MAX_BPS`, rounded down.
///
/// Returns `None` if `fee_bps >= MAX_BPS`.
pub fn apply_fee_floor(value: u128, fee_bps: u16) -> Option<u128> {
    let keep = MAX_BPS.checked_sub(u64::from(fee_bps)).filter(|k| *k > 0)?;
    mul_div_floor(value, keep as u128, MAX_BPS as u128)
}

/// Scale `value` by `MAX_BPS / (MAX_BPS - fee_bps)`, rounded up.
///
/// Returns `None` if `fee_bps >= MAX_BPS`.
pub fn remove_fee_ceil(value: u128, fee_bps: u16) -> Option<u128> {
    let keep = MAX_BPS.checked_sub(u64::from(fee_bps)).filter(|k| *k > 0)?;
    mul_div_ceil(value, MAX_BPS as u128, keep as u128)
}

/// Integer square root, rounded down (Newton's method).
pub fn isqrt(value: u128) -> u128 {
    if value < 2 {
        return value;
    }
    let mut x = value;
    let mut y = (x >> 1) + (x & 1);
    while y < x {
        x = y;
        y = (x + value / x) / 2;
    }
    x
}
