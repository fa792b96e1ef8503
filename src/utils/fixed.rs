//! Fixed-point and basis-point arithmetic for value accounting.
//!
//! All accounting runs on checked `u128` math so that share prices, APRs and
//! loss figures are exactly reproducible. `Decimal` only appears at the edges
//! (config fractions, human-readable reporting).

use crate::error::AllocError;
use crate::types::Amount;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Denominator for basis-point values (1 bp = 0.01%).
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Scale of [`SharePrice`]; a price of 1.0 is `1_000_000`.
pub const SHARE_PRICE_PRECISION: u128 = 1_000_000;

/// Scale of [`Apr`]; `100_000` is 100% per year.
pub const APR_PRECISION: u128 = 100_000;

pub const SECONDS_PER_YEAR: u128 = 365 * 24 * 60 * 60;

/// Unsigned fixed-point number stored as `raw / SCALE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fixed<const SCALE: u128>(u128);

pub type SharePrice = Fixed<SHARE_PRICE_PRECISION>;
pub type Apr = Fixed<APR_PRECISION>;

impl<const SCALE: u128> Fixed<SCALE> {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(SCALE);

    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u128 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// `numerator / denominator`, rounded down. A zero denominator yields zero.
    pub fn from_ratio(numerator: u128, denominator: u128) -> Result<Self, AllocError> {
        if denominator == 0 {
            return Ok(Self::ZERO);
        }
        mul_div(numerator, SCALE, denominator).map(Self)
    }

    /// Multiply an amount by this value, rounding down.
    pub fn apply(self, amount: Amount) -> Result<Amount, AllocError> {
        mul_div(amount, self.0, SCALE)
    }

    /// Lossy conversion for logs and reports.
    pub fn to_decimal(self) -> Decimal {
        match (Decimal::from_u128(self.0), Decimal::from_u128(SCALE)) {
            (Some(raw), Some(scale)) => raw.checked_div(scale).unwrap_or(Decimal::MAX),
            _ => Decimal::MAX,
        }
    }
}

impl<const SCALE: u128> fmt::Display for Fixed<SCALE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

impl Apr {
    /// APR expressed in percent (e.g. `12.5` for 12.5%).
    pub fn as_percent(self) -> Decimal {
        self.to_decimal() * Decimal::ONE_HUNDRED
    }
}

/// `a * b / denominator` with overflow and division-by-zero checks, rounded down.
pub fn mul_div(a: u128, b: u128, denominator: u128) -> Result<u128, AllocError> {
    if denominator == 0 {
        return Err(AllocError::Overflow);
    }
    a.checked_mul(b)
        .map(|product| product / denominator)
        .ok_or(AllocError::Overflow)
}

/// Same as [`mul_div`] but rounded up.
pub fn mul_div_up(a: u128, b: u128, denominator: u128) -> Result<u128, AllocError> {
    if denominator == 0 {
        return Err(AllocError::Overflow);
    }
    let product = a.checked_mul(b).ok_or(AllocError::Overflow)?;
    Ok(product.div_ceil(denominator))
}

/// Portion of `amount` represented by `bps` basis points, rounded down.
pub fn bps_of(amount: Amount, bps: u32) -> Result<Amount, AllocError> {
    mul_div(amount, u128::from(bps), u128::from(BPS_DENOMINATOR))
}

/// True when `loss` is strictly above `bps` basis points of `base`.
pub fn exceeds_bps(loss: Amount, base: Amount, bps: u32) -> Result<bool, AllocError> {
    let lhs = loss
        .checked_mul(u128::from(BPS_DENOMINATOR))
        .ok_or(AllocError::Overflow)?;
    let rhs = base
        .checked_mul(u128::from(bps))
        .ok_or(AllocError::Overflow)?;
    Ok(lhs > rhs)
}

/// Annualized return of `earned` over `tvl` during `seconds`.
///
/// Returns zero when either `tvl` or `seconds` is zero.
pub fn compute_apr(tvl: Amount, earned: Amount, seconds: u64) -> Result<Apr, AllocError> {
    if tvl == 0 || seconds == 0 {
        return Ok(Apr::ZERO);
    }
    let numerator = earned
        .checked_mul(SECONDS_PER_YEAR)
        .and_then(|v| v.checked_mul(APR_PRECISION))
        .ok_or(AllocError::Overflow)?;
    let denominator = tvl
        .checked_mul(u128::from(seconds))
        .ok_or(AllocError::Overflow)?;
    Ok(Apr::from_raw(numerator / denominator))
}

/// Convert a fraction in `0..=1` into basis points.
pub fn fraction_to_bps(fraction: Decimal) -> Option<u32> {
    if fraction < Decimal::ZERO || fraction > Decimal::ONE {
        return None;
    }
    (fraction * Decimal::from(BPS_DENOMINATOR)).round().to_u32()
}

/// Convert basis points to a decimal fraction.
pub fn bps_to_fraction(bps: u32) -> Decimal {
    Decimal::from(bps) / Decimal::from(BPS_DENOMINATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const DAY: u64 = 24 * 60 * 60;
    const YEAR: u64 = 365 * DAY;
    const E18: u128 = 1_000_000_000_000_000_000;

    #[test]
    fn test_compute_apr_reference_values() {
        assert_eq!(compute_apr(100, 10, YEAR).unwrap().raw(), 10_000);
        assert_eq!(compute_apr(100, 10, DAY).unwrap().raw(), 3_650_000);
        assert_eq!(
            compute_apr(1234 * E18, 5 * E18 / 100, DAY).unwrap().raw(),
            1_478
        );
        assert_eq!(compute_apr(0, 100, DAY).unwrap(), Apr::ZERO);
        assert_eq!(compute_apr(100, 100, 0).unwrap(), Apr::ZERO);
    }

    #[test]
    fn test_apr_as_percent() {
        assert_eq!(Apr::from_raw(10_000).as_percent(), dec!(10));
        assert_eq!(Apr::from_raw(150).as_percent(), dec!(0.15));
    }

    #[test]
    fn test_share_price_ratio_rounds_down() {
        let price = SharePrice::from_ratio(1_999_000, 2_000_000).unwrap();
        assert_eq!(price.raw(), 999_500);
        assert_eq!(SharePrice::from_ratio(2, 3).unwrap().raw(), 666_666);
        assert_eq!(SharePrice::from_ratio(5, 0).unwrap(), SharePrice::ZERO);
        assert_eq!(SharePrice::ONE.apply(1234).unwrap(), 1234);
    }

    #[test]
    fn test_bps_helpers() {
        assert_eq!(bps_of(1_000_000, 30).unwrap(), 3_000);
        assert_eq!(bps_of(999, 1).unwrap(), 0);
        assert!(exceeds_bps(11, 1_000, 100).unwrap());
        assert!(!exceeds_bps(10, 1_000, 100).unwrap());
        assert_eq!(mul_div_up(10, 1, 3).unwrap(), 4);
        assert!(matches!(mul_div(u128::MAX, 2, 1), Err(AllocError::Overflow)));
    }

    #[test]
    fn test_fraction_conversion() {
        assert_eq!(fraction_to_bps(dec!(0.003)), Some(30));
        assert_eq!(fraction_to_bps(dec!(1)), Some(10_000));
        assert_eq!(fraction_to_bps(dec!(1.5)), None);
        assert_eq!(fraction_to_bps(dec!(-0.1)), None);
        assert_eq!(bps_to_fraction(50), dec!(0.005));
    }
}
