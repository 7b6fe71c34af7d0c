//! Bond catalog queries and derived market metrics.

use crate::domain::pricing::{
    accrued_interest, days_to_maturity, price_history, round_to, yield_to_maturity, PricePoint,
};
use crate::domain::{Bond, BondId, BondsError, BondsResult, Currency, Money, Transaction};
use crate::ports::{BondRepository, Clock, TransactionRepository};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Transactions shown on a bond's detail page.
pub const RECENT_TRANSACTIONS: usize = 10;

/// `GET /api/bonds` query. `active` defaults to `true`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BondFilter {
    pub country: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BondListing {
    #[serde(flatten)]
    pub bond: Bond,
    pub availability_percentage: f64,
    /// `null` once matured
    pub yield_to_maturity: Option<f64>,
    pub days_to_maturity: i64,
}

impl BondListing {
    fn new(bond: Bond, now: DateTime<Utc>) -> Self {
        Self {
            availability_percentage: bond.availability_percentage(),
            yield_to_maturity: yield_to_maturity(&bond, now),
            days_to_maturity: days_to_maturity(&bond, now),
            bond,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BondDetail {
    #[serde(flatten)]
    pub listing: BondListing,
    pub accrued_interest: Money,
    pub price_history: Vec<PricePoint>,
    pub recent_transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketOverview {
    pub total_bonds: usize,
    pub total_value: Money,
    pub total_available: Money,
    pub average_coupon_rate: f64,
    pub countries: Vec<String>,
    pub total_transactions: usize,
    pub active_investors: usize,
}

pub struct BondCatalog {
    bonds: Arc<dyn BondRepository>,
    transactions: Arc<dyn TransactionRepository>,
    clock: Arc<dyn Clock>,
}

impl BondCatalog {
    pub fn new(
        bonds: Arc<dyn BondRepository>,
        transactions: Arc<dyn TransactionRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            bonds,
            transactions,
            clock,
        }
    }

    /// Bonds matching `filter`, annotated with availability and yield.
    ///
    /// The country filter is a case-insensitive substring match.
    pub fn list(&self, filter: &BondFilter) -> BondsResult<Vec<BondListing>> {
        let now = self.clock.now();
        let country = filter
            .country
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_lowercase);
        let active_only = filter.active.unwrap_or(true);

        Ok(self
            .bonds
            .list()?
            .into_iter()
            .filter(|b| !active_only || b.is_active)
            .filter(|b| {
                country
                    .as_deref()
                    .map_or(true, |c| b.country.to_lowercase().contains(c))
            })
            .map(|b| BondListing::new(b, now))
            .collect())
    }

    pub fn get(&self, id: BondId) -> BondsResult<BondDetail> {
        let bond = self.bonds.find(id)?.ok_or(BondsError::NotFound("bond"))?;
        let now = self.clock.now();
        let recent_transactions = self.transactions.list_for_bond(id, RECENT_TRANSACTIONS)?;
        let accrued = accrued_interest(&bond, now);
        let history = price_history(&bond, now, &mut rand::thread_rng());

        Ok(BondDetail {
            listing: BondListing::new(bond, now),
            accrued_interest: accrued,
            price_history: history,
            recent_transactions,
        })
    }

    /// Aggregates across the whole catalog, active or not.
    pub fn overview(&self) -> BondsResult<MarketOverview> {
        let bonds = self.bonds.list()?;
        let currency = bonds.first().map_or(Currency::Xof, Bond::currency);

        let mut total_value = Money::zero(currency);
        let mut total_available = Money::zero(currency);
        for bond in &bonds {
            total_value = total_value.checked_add(bond.total_supply)?;
            total_available = total_available.checked_add(bond.available_supply)?;
        }
        let average_coupon_rate = if bonds.is_empty() {
            0.0
        } else {
            round_to(
                bonds.iter().map(|b| b.coupon_rate).sum::<f64>() / bonds.len() as f64,
                2,
            )
        };
        let countries: BTreeSet<String> = bonds.iter().map(|b| b.country.clone()).collect();

        Ok(MarketOverview {
            total_bonds: bonds.len(),
            total_value,
            total_available,
            average_coupon_rate,
            countries: countries.into_iter().collect(),
            total_transactions: self.transactions.count()?,
            active_investors: self.transactions.investor_count()?,
        })
    }
}
