//! Derived bond metrics.
//!
//! All functions take `now` explicitly so results are reproducible under a
//! manual clock.

use super::bond::Bond;
use super::money::Money;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use rand::Rng;
use serde::Serialize;

const SECONDS_PER_DAY: i64 = 86_400;
const DAYS_PER_YEAR: f64 = 365.0;

/// Points in the synthetic price history (today and the 30 days before).
pub const PRICE_HISTORY_POINTS: i64 = 31;

fn maturity_instant(bond: &Bond) -> DateTime<Utc> {
    bond.maturity.and_time(NaiveTime::MIN).and_utc()
}

/// Round to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Whole days until maturity, floored. Negative once matured.
pub fn days_to_maturity(bond: &Bond, now: DateTime<Utc>) -> i64 {
    (maturity_instant(bond) - now)
        .num_seconds()
        .div_euclid(SECONDS_PER_DAY)
}

/// `(face - price) / price / years * 100`, two decimals.
///
/// `None` once the bond has matured or when the result is not finite.
pub fn yield_to_maturity(bond: &Bond, now: DateTime<Utc>) -> Option<f64> {
    let seconds = (maturity_instant(bond) - now).num_seconds();
    if seconds <= 0 {
        return None;
    }
    let years = seconds as f64 / (SECONDS_PER_DAY as f64 * DAYS_PER_YEAR);
    let price = bond.current_price.amount as f64;
    let face = bond.face_value.amount as f64;
    let ytm = (face - price) / price / years * 100.0;
    ytm.is_finite().then(|| round_to(ytm, 2))
}

/// `face * coupon/100 * days_since_issuance/365`, rounded to the minor unit.
pub fn accrued_interest(bond: &Bond, now: DateTime<Utc>) -> Money {
    let days = (now - bond.created_at).num_seconds().max(0) as f64 / SECONDS_PER_DAY as f64;
    bond.face_value.scale(bond.coupon_rate / 100.0 * days / DAYS_PER_YEAR)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricePoint {
    /// `YYYY-MM-DD`
    pub date: String,
    pub price: Money,
}

/// Synthetic daily series ending today: ±1% noise around the current price,
/// never below 90% of it.
pub fn price_history<R: Rng + ?Sized>(
    bond: &Bond,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<PricePoint> {
    let base = bond.current_price;
    let floor = base.scale(0.9);
    (0..PRICE_HISTORY_POINTS)
        .rev()
        .map(|days_ago| {
            let noise: f64 = rng.gen_range(-0.01..=0.01);
            let price = base.scale(1.0 + noise).max(floor);
            PricePoint {
                date: (now - Duration::days(days_ago)).format("%Y-%m-%d").to_string(),
                price,
            }
        })
        .collect()
}
