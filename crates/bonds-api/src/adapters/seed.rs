//! Demo catalog and accounts loaded when `seed_demo_data` is set.

use crate::domain::config::LimitsConfig;
use crate::domain::money::{xof, Currency};
use crate::domain::user::{KycDocuments, KycRecord, NotificationPreferences};
use crate::domain::{
    Bond, BondsResult, InvestmentTier, KycStatus, Money, NewTransaction, TransactionType,
    TwoFactor, User, UserId,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

/// Password shared by the demo accounts.
pub const DEMO_PASSWORD: &str = "password123";

/// TOTP secret of the 2FA-enabled demo account.
pub const DEMO_TOTP_SECRET: &str = "JBSWY3DPEHPK3PXP";

fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

#[allow(clippy::too_many_arguments)]
fn bond(
    id: u32,
    country: &str,
    issuer: &str,
    symbol: &str,
    coupon_rate: f64,
    maturity: NaiveDate,
    price: i64,
    total: i64,
    available: i64,
    rating: (&str, &str),
    created_at: DateTime<Utc>,
    description: &str,
) -> Bond {
    Bond {
        id,
        country: country.to_string(),
        issuer: issuer.to_string(),
        symbol: symbol.to_string(),
        name: format!("{country} {} Bond", symbol.get(2..).unwrap_or(symbol)),
        description: description.to_string(),
        coupon_rate,
        maturity,
        face_value: xof(650_000),
        current_price: xof(price),
        total_supply: xof(total),
        available_supply: xof(available),
        rating: rating.0.to_string(),
        rating_agency: rating.1.to_string(),
        minimum_investment: xof(65_000),
        contract_address: format!("0x{:040x}", id),
        is_active: true,
        created_at,
        updated_at: created_at,
    }
}

pub fn demo_bonds() -> Vec<Bond> {
    vec![
        bond(
            1,
            "Burkina Faso",
            "Republic of Burkina Faso",
            "BF2027",
            6.5,
            date(2027, 12, 31),
            646_750,
            6_500_000_000,
            4_875_000_000,
            ("B+", "Moody's"),
            utc(2025, 1, 15),
            "Sovereign bond financing Burkina Faso infrastructure",
        ),
        bond(
            2,
            "Côte d'Ivoire",
            "Republic of Côte d'Ivoire",
            "CI2028",
            5.8,
            date(2028, 6, 15),
            659_750,
            9_750_000_000,
            7_800_000_000,
            ("BB-", "S&P"),
            utc(2025, 2, 1),
            "Financing the economic development of Côte d'Ivoire",
        ),
        bond(
            3,
            "Senegal",
            "Republic of Senegal",
            "SN2029",
            5.2,
            date(2029, 3, 20),
            669_500,
            5_200_000_000,
            3_575_000_000,
            ("BB", "Fitch"),
            utc(2025, 3, 10),
            "Bonds for the Plan Sénégal Émergent 2035",
        ),
    ]
}

/// Two verified demo investors. The first has 2FA enabled and verified KYC.
pub fn demo_users(password_hash: &str, limits: &LimitsConfig) -> Vec<User> {
    let jean = User {
        id: Uuid::new_v4(),
        email: "jean.dupont@email.com".into(),
        wallet_address: Some("0x1234567890123456789012345678901234567890".into()),
        name: "Jean Dupont".into(),
        country: "France".into(),
        phone: Some("+33123456789".into()),
        password_hash: Some(password_hash.to_string()),
        kyc: KycRecord {
            status: KycStatus::Verified,
            submitted_at: Some(utc(2025, 1, 20)),
            verified_at: Some(utc(2025, 1, 25)),
            documents: None,
        },
        date_of_birth: Some(date(1985, 3, 15)),
        email_verified: true,
        two_factor: TwoFactor::Enabled {
            secret: DEMO_TOTP_SECRET.into(),
        },
        registered_at: utc(2025, 1, 15),
        last_login: Some(utc(2025, 7, 29)),
        is_active: true,
        investment_limit: limits.limit_for(InvestmentTier::KycVerified),
        total_invested: Money::zero(limits.currency),
        preferred_currency: Currency::Xof,
        notifications: NotificationPreferences::default(),
    };

    let marie = User {
        id: Uuid::new_v4(),
        email: "marie.kouame@email.com".into(),
        wallet_address: Some("0x0987654321098765432109876543210987654321".into()),
        name: "Marie Kouame".into(),
        country: "Côte d'Ivoire".into(),
        phone: Some("+22501234567".into()),
        password_hash: Some(password_hash.to_string()),
        kyc: KycRecord {
            status: KycStatus::Pending,
            submitted_at: Some(utc(2025, 7, 20)),
            verified_at: None,
            documents: Some(KycDocuments {
                document_type: crate::domain::user::DocumentType::Passport,
                document_number: "CI0123456".into(),
                address: "12 Boulevard Latrille, Abidjan".into(),
                submission_date: utc(2025, 7, 20),
            }),
        },
        date_of_birth: Some(date(1990, 8, 22)),
        email_verified: true,
        two_factor: TwoFactor::default(),
        registered_at: utc(2025, 2, 1),
        last_login: Some(utc(2025, 7, 28)),
        is_active: true,
        investment_limit: limits.limit_for(InvestmentTier::KycSubmitted),
        total_invested: Money::zero(limits.currency),
        preferred_currency: Currency::Xof,
        notifications: NotificationPreferences {
            email: true,
            browser: false,
            investment: true,
        },
    };

    vec![jean, marie]
}

/// Settled purchases for `investor`, paired with their block numbers.
pub fn demo_transactions(
    investor: UserId,
    bonds: &[Bond],
    fee_bps: u32,
) -> BondsResult<Vec<(NewTransaction, u64)>> {
    let purchases = [
        (1u32, 3_250_000i64, utc(2025, 7, 20), 18_500_000u64),
        (2, 1_950_000, utc(2025, 7, 25), 18_550_000),
    ];
    let mut out = Vec::with_capacity(purchases.len());
    for (n, (bond_id, amount, at, block)) in purchases.into_iter().enumerate() {
        let Some(bond) = bonds.iter().find(|b| b.id == bond_id) else {
            continue;
        };
        let amount = xof(amount);
        let fee = amount.basis_points(fee_bps)?;
        out.push((
            NewTransaction {
                user_id: investor,
                bond_id,
                bond_symbol: bond.symbol.clone(),
                kind: TransactionType::Buy,
                amount,
                price: bond.current_price,
                tokens: bond.tokens_for(amount)?,
                fee,
                total_cost: amount.checked_add(fee)?,
                tx_hash: format!("0x{:064x}", n + 1),
                timestamp: at,
            },
            block,
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_bonds_respect_supply_invariant() {
        for bond in demo_bonds() {
            assert!(bond.available_supply.amount >= 0);
            assert!(bond.available_supply.amount <= bond.total_supply.amount);
            assert_eq!(bond.currency(), Currency::Xof);
        }
    }

    #[test]
    fn test_demo_bond_names() {
        let bonds = demo_bonds();
        assert_eq!(bonds[0].name, "Burkina Faso 2027 Bond");
        assert_eq!(bonds[0].current_price, xof(646_750));
    }

    #[test]
    fn test_demo_users_two_factor_state() {
        let users = demo_users("hash", &LimitsConfig::default());
        assert!(users[0].two_factor_enabled());
        assert!(!users[1].two_factor_enabled());
        assert!(users.iter().all(|u| u.email_verified));
    }

    #[test]
    fn test_demo_transactions_fee() {
        let txs = demo_transactions(Uuid::new_v4(), &demo_bonds(), 50).unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].0.fee, xof(16_250));
        assert_eq!(txs[0].0.tx_hash.len(), 66);
    }
}
