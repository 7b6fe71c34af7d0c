//! Sovereign bond records.

use super::money::{Currency, Money, MoneyError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

pub type BondId = u32;

/// A listed bond. Supplies are value-denominated in the bond's currency.
///
/// Invariant: `0 <= available_supply <= total_supply`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bond {
    pub id: BondId,
    pub country: String,
    pub issuer: String,
    pub symbol: String,
    pub name: String,
    pub description: String,
    /// Annual coupon in percent
    pub coupon_rate: f64,
    pub maturity: NaiveDate,
    pub face_value: Money,
    pub current_price: Money,
    pub total_supply: Money,
    pub available_supply: Money,
    pub rating: String,
    pub rating_agency: String,
    pub minimum_investment: Money,
    pub contract_address: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bond {
    pub fn currency(&self) -> Currency {
        self.current_price.currency
    }

    /// Token quantity bought by `amount` at the current price.
    pub fn tokens_for(&self, amount: Money) -> Result<f64, MoneyError> {
        amount.ratio(self.current_price)
    }

    /// `available / total * 100`, one decimal.
    pub fn availability_percentage(&self) -> f64 {
        if self.total_supply.amount == 0 {
            return 0.0;
        }
        let pct = self.available_supply.amount as f64 / self.total_supply.amount as f64 * 100.0;
        (pct * 10.0).round() / 10.0
    }

    /// Whether an investment of `amount` (worth `tokens`) fits what remains.
    pub fn can_cover(&self, amount: Money, tokens: f64) -> bool {
        amount.currency == self.available_supply.currency
            && amount.amount <= self.available_supply.amount
            && tokens <= self.available_supply.amount as f64
    }
}
