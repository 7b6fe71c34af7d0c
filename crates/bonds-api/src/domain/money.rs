//! Currency-agnostic monetary values.
//!
//! Amounts are stored as integer minor units tagged with their currency.
//! Arithmetic never mixes currencies; conversions happen at the edges.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Basis points in one whole (100%).
pub const BPS_SCALE: i64 = 10_000;

/// ISO 4217 currencies supported by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    /// West African CFA franc (no minor unit).
    #[serde(rename = "XOF")]
    Xof,
    #[serde(rename = "USD")]
    Usd,
    #[serde(rename = "EUR")]
    Eur,
}

impl Currency {
    /// Number of decimal places of the minor unit.
    pub fn exponent(&self) -> u32 {
        match self {
            Currency::Xof => 0,
            Currency::Usd | Currency::Eur => 2,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Xof => "XOF",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error raised by monetary arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: Currency, right: Currency },
    #[error("monetary overflow")]
    Overflow,
}

/// An amount of money in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in minor units of `currency`.
    pub amount: i64,
    pub currency: Currency,
}

impl Money {
    pub const fn new(amount: i64, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub const fn zero(currency: Currency) -> Self {
        Self::new(0, currency)
    }

    pub fn is_negative(&self) -> bool {
        self.amount < 0
    }

    fn same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                left: self.currency,
                right: other.currency,
            });
        }
        Ok(())
    }

    pub fn checked_add(&self, other: Money) -> Result<Money, MoneyError> {
        self.same_currency(&other)?;
        self.amount
            .checked_add(other.amount)
            .map(|amount| Money::new(amount, self.currency))
            .ok_or(MoneyError::Overflow)
    }

    pub fn checked_sub(&self, other: Money) -> Result<Money, MoneyError> {
        self.same_currency(&other)?;
        self.amount
            .checked_sub(other.amount)
            .map(|amount| Money::new(amount, self.currency))
            .ok_or(MoneyError::Overflow)
    }

    /// Fraction of this amount expressed in basis points, rounded half up
    /// to the nearest minor unit.
    pub fn basis_points(&self, bps: u32) -> Result<Money, MoneyError> {
        let scaled = (self.amount as i128) * (bps as i128);
        let half = (BPS_SCALE / 2) as i128;
        let rounded = if scaled >= 0 {
            (scaled + half) / BPS_SCALE as i128
        } else {
            (scaled - half) / BPS_SCALE as i128
        };
        i64::try_from(rounded)
            .map(|amount| Money::new(amount, self.currency))
            .map_err(|_| MoneyError::Overflow)
    }

    /// Ratio of two amounts in the same currency.
    pub fn ratio(&self, other: Money) -> Result<f64, MoneyError> {
        self.same_currency(&other)?;
        Ok(self.amount as f64 / other.amount as f64)
    }

    /// Multiply by a float factor, rounding to the nearest minor unit.
    pub fn scale(&self, factor: f64) -> Money {
        Money::new((self.amount as f64 * factor).round() as i64, self.currency)
    }

    /// Value in major units (e.g. dollars), for display only.
    pub fn to_major(&self) -> f64 {
        self.amount as f64 / 10f64.powi(self.currency.exponent() as i32)
    }

    pub fn max(self, other: Money) -> Money {
        if other.currency == self.currency && other.amount > self.amount {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let exp = self.currency.exponent() as usize;
        if exp == 0 {
            write!(f, "{} {}", self.amount, self.currency)
        } else {
            write!(f, "{:.*} {}", exp, self.to_major(), self.currency)
        }
    }
}

/// Shorthand for an XOF amount.
pub const fn xof(amount: i64) -> Money {
    Money::new(amount, Currency::Xof)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fee_half_percent() {
        let fee = xof(65_000).basis_points(50).unwrap();
        assert_eq!(fee, xof(325));
    }

    #[test]
    fn test_fee_rounds_half_up() {
        // 0.5% of 100 = 0.5 -> 1
        assert_eq!(xof(100).basis_points(50).unwrap(), xof(1));
        // 0.5% of 99 = 0.495 -> 0
        assert_eq!(xof(99).basis_points(50).unwrap(), xof(0));
    }

    #[test]
    fn test_currency_mismatch() {
        let usd = Money::new(100, Currency::Usd);
        let err = xof(100).checked_add(usd).unwrap_err();
        assert!(matches!(err, MoneyError::CurrencyMismatch { .. }));
    }

    #[test]
    fn test_display_uses_exponent() {
        assert_eq!(xof(65_325).to_string(), "65325 XOF");
        assert_eq!(Money::new(12_345, Currency::Usd).to_string(), "123.45 USD");
    }

    #[test]
    fn test_max_only_raises() {
        assert_eq!(xof(10).max(xof(20)), xof(20));
        assert_eq!(xof(30).max(xof(20)), xof(30));
    }

    #[test]
    fn test_serialization_shape() {
        let json = serde_json::to_value(xof(325)).unwrap();
        assert_eq!(json["amount"], 325);
        assert_eq!(json["currency"], "XOF");
    }

    proptest! {
        #[test]
        fn prop_fee_never_exceeds_amount(amount in 0i64..1_000_000_000_000, bps in 0u32..=10_000) {
            let fee = xof(amount).basis_points(bps).unwrap();
            prop_assert!(fee.amount >= 0);
            prop_assert!(fee.amount <= amount);
        }
    }
}
