//! Investor profile, KYC submission and portfolio.

use crate::domain::config::LimitsConfig;
use crate::domain::pricing::round_to;
use crate::domain::user::{DocumentType, KycDocuments, NotificationPatch, NotificationPreferences};
use crate::domain::validation::{char_len_between, is_e164_phone, is_wallet_address, Validator};
use crate::domain::{
    BondId, BondsError, BondsResult, Currency, InvestmentTier, KycStatus, Money, Transaction,
    TransactionStatus, TransactionType, User, UserId,
};
use crate::ports::{BondRepository, Clock, TransactionRepository, UserRepository};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

pub const RECENT_ACTIVITY: usize = 5;

const EXPECTED_PROCESSING_TIME: &str = "3-5 business days";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioStats {
    pub total_value: Money,
    pub available_limit: Money,
    pub kyc_progress: u8,
    pub can_invest: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: UserId,
    pub wallet_address: Option<String>,
    pub email: String,
    pub name: String,
    pub country: String,
    pub phone: Option<String>,
    pub kyc_status: KycStatus,
    pub email_verified: bool,
    pub two_factor_enabled: bool,
    pub date_of_birth: Option<NaiveDate>,
    pub registration_date: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub investment_limit: Money,
    pub total_invested: Money,
    pub preferred_currency: Currency,
    pub notifications: NotificationPreferences,
    pub portfolio_stats: PortfolioStats,
}

impl From<&User> for Profile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            wallet_address: user.wallet_address.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            country: user.country.clone(),
            phone: user.phone.clone(),
            kyc_status: user.kyc.status,
            email_verified: user.email_verified,
            two_factor_enabled: user.two_factor_enabled(),
            date_of_birth: user.date_of_birth,
            registration_date: user.registered_at,
            last_login: user.last_login,
            investment_limit: user.investment_limit,
            total_invested: user.total_invested,
            preferred_currency: user.preferred_currency,
            notifications: user.notifications,
            portfolio_stats: PortfolioStats {
                total_value: user.total_invested,
                available_limit: user.available_limit(),
                kyc_progress: user.kyc.status.progress(),
                can_invest: user.kyc.status == KycStatus::Verified,
            },
        }
    }
}

/// `PUT /api/users/profile`. The email address is not editable here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub wallet_address: Option<String>,
    pub preferred_currency: Option<Currency>,
    pub notifications: Option<NotificationPatch>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KycSubmission {
    pub document_type: DocumentType,
    pub document_number: String,
    pub date_of_birth: NaiveDate,
    pub address: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KycReceipt {
    pub kyc_status: KycStatus,
    pub submission_date: DateTime<Utc>,
    pub expected_processing_time: &'static str,
    pub new_investment_limit: Money,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KycOverview {
    pub status: KycStatus,
    pub submission_date: Option<DateTime<Utc>>,
    pub verification_date: Option<DateTime<Utc>>,
    pub documents: Option<KycDocuments>,
    pub requirements: &'static [&'static str],
    pub next_steps: &'static str,
}

fn kyc_requirements(status: KycStatus) -> &'static [&'static str] {
    match status {
        KycStatus::NotStarted => &[
            "Valid identity document",
            "Proof of address",
            "Complete personal information",
        ],
        KycStatus::Pending => &["Documents under review"],
        KycStatus::Verified => &["KYC complete and verified"],
        KycStatus::Rejected => &["Resubmit your documents", "Check the information provided"],
    }
}

fn kyc_next_steps(status: KycStatus) -> &'static str {
    match status {
        KycStatus::NotStarted => "Start KYC verification",
        KycStatus::Pending => "Wait for verification (3-5 days)",
        KycStatus::Verified => "You can invest up to your full limit",
        KycStatus::Rejected => "Resubmit corrected documents",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub bond_id: BondId,
    pub bond_symbol: String,
    pub bond_name: String,
    pub amount: Money,
    pub tokens: f64,
    /// Amount paid per token, averaged across purchases
    pub purchase_price: Money,
    pub current_price: Money,
    pub current_value: Money,
    pub gain: Money,
    pub gain_percent: f64,
    pub purchase_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub status: TransactionStatus,
    pub bond_symbol: String,
    pub amount: Money,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    pub total_value: Money,
    pub total_invested: Money,
    pub total_gain: Money,
    pub total_gain_percent: f64,
    pub investment_limit: Money,
    pub available_limit: Money,
    pub holdings: Vec<Holding>,
    pub recent_activity: Vec<Activity>,
}

fn gain_percent(gain: Money, cost: Money) -> f64 {
    if cost.amount == 0 {
        0.0
    } else {
        round_to(gain.amount as f64 / cost.amount as f64 * 100.0, 2)
    }
}

pub struct Accounts {
    users: Arc<dyn UserRepository>,
    bonds: Arc<dyn BondRepository>,
    transactions: Arc<dyn TransactionRepository>,
    clock: Arc<dyn Clock>,
    limits: LimitsConfig,
}

impl Accounts {
    pub fn new(
        users: Arc<dyn UserRepository>,
        bonds: Arc<dyn BondRepository>,
        transactions: Arc<dyn TransactionRepository>,
        clock: Arc<dyn Clock>,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            users,
            bonds,
            transactions,
            clock,
            limits,
        }
    }

    pub fn profile(&self, user: &User) -> Profile {
        Profile::from(user)
    }

    pub fn update_profile(&self, user_id: UserId, patch: &ProfilePatch) -> BondsResult<Profile> {
        let mut v = Validator::new();
        v.check(
            patch.name.as_deref().map_or(true, |n| char_len_between(n, 2, 50)),
            "name",
            "name must be 2 to 50 characters",
        )
        .check(
            patch.country.as_deref().map_or(true, |c| char_len_between(c, 2, 50)),
            "country",
            "country must be 2 to 50 characters",
        )
        .check(
            patch.phone.as_deref().map_or(true, is_e164_phone),
            "phone",
            "invalid phone number",
        )
        .check(
            patch.wallet_address.as_deref().map_or(true, is_wallet_address),
            "walletAddress",
            "invalid wallet address",
        );
        v.finish().map_err(BondsError::Validation)?;

        let user = self.users.modify(user_id, &mut |u| {
            if let Some(name) = &patch.name {
                u.name = name.trim().to_string();
            }
            if let Some(country) = &patch.country {
                u.country = country.trim().to_string();
            }
            if let Some(phone) = &patch.phone {
                u.phone = Some(phone.clone());
            }
            if let Some(wallet) = &patch.wallet_address {
                u.wallet_address = Some(wallet.to_ascii_lowercase());
            }
            if let Some(currency) = patch.preferred_currency {
                u.preferred_currency = currency;
            }
            if let Some(notifications) = patch.notifications {
                u.notifications.apply(notifications);
            }
            Ok(())
        })?;
        info!(user_id = %user.id, "Profile updated");
        Ok(Profile::from(&user))
    }

    pub fn update_notifications(
        &self,
        user_id: UserId,
        patch: NotificationPatch,
    ) -> BondsResult<NotificationPreferences> {
        let user = self.users.modify(user_id, &mut |u| {
            u.notifications.apply(patch);
            Ok(())
        })?;
        Ok(user.notifications)
    }

    /// File identity documents for review and move to the submitted tier.
    pub fn submit_kyc(&self, user_id: UserId, submission: &KycSubmission) -> BondsResult<KycReceipt> {
        let now = self.clock.now();
        let mut v = Validator::new();
        v.check(
            char_len_between(&submission.document_number, 5, 20),
            "documentNumber",
            "document number must be 5 to 20 characters",
        )
        .check(
            submission.date_of_birth < now.date_naive(),
            "dateOfBirth",
            "date of birth must be in the past",
        )
        .check(
            char_len_between(&submission.address, 10, 200),
            "address",
            "address must be 10 to 200 characters",
        );
        v.finish().map_err(BondsError::Validation)?;

        let limit = self.limits.limit_for(InvestmentTier::KycSubmitted);
        let user = self.users.modify(user_id, &mut |u| {
            if u.kyc.status == KycStatus::Verified {
                return Err(BondsError::KycAlreadyVerified);
            }
            u.kyc.status = KycStatus::Pending;
            u.kyc.submitted_at = Some(now);
            u.kyc.documents = Some(KycDocuments {
                document_type: submission.document_type,
                document_number: submission.document_number.trim().to_string(),
                address: submission.address.trim().to_string(),
                submission_date: now,
            });
            u.date_of_birth = Some(submission.date_of_birth);
            u.raise_limit(limit);
            Ok(())
        })?;

        info!(user_id = %user.id, "KYC documents submitted");
        Ok(KycReceipt {
            kyc_status: user.kyc.status,
            submission_date: now,
            expected_processing_time: EXPECTED_PROCESSING_TIME,
            new_investment_limit: user.investment_limit,
        })
    }

    pub fn kyc_status(&self, user: &User) -> KycOverview {
        KycOverview {
            status: user.kyc.status,
            submission_date: user.kyc.submitted_at,
            verification_date: user.kyc.verified_at,
            documents: user.kyc.documents.clone(),
            requirements: kyc_requirements(user.kyc.status),
            next_steps: kyc_next_steps(user.kyc.status),
        }
    }

    /// Holdings valued at current prices, built from settled purchases.
    pub fn portfolio(&self, user: &User) -> BondsResult<Portfolio> {
        let rows = self.transactions.list_for_user(user.id)?;
        let currency = rows
            .iter()
            .find(|t| t.is_completed_buy())
            .map_or(user.investment_limit.currency, |t| t.amount.currency);

        // Oldest first so the first purchase date sticks
        let mut grouped: BTreeMap<BondId, Vec<&Transaction>> = BTreeMap::new();
        for t in rows.iter().rev().filter(|t| t.is_completed_buy()) {
            grouped.entry(t.bond_id).or_default().push(t);
        }

        let mut holdings = Vec::with_capacity(grouped.len());
        let mut total_value = Money::zero(currency);
        let mut total_invested = Money::zero(currency);
        for (bond_id, purchases) in grouped {
            let Some(first) = purchases.first() else {
                continue;
            };
            let mut amount = Money::zero(first.amount.currency);
            let mut tokens = 0.0;
            for p in &purchases {
                amount = amount.checked_add(p.amount)?;
                tokens += p.tokens;
            }
            let bond = self.bonds.find(bond_id)?;
            let current_price = bond.as_ref().map_or(first.price, |b| b.current_price);
            let current_value = current_price.scale(tokens);
            let gain = current_value.checked_sub(amount)?;
            let purchase_price = if tokens > 0.0 {
                amount.scale(1.0 / tokens)
            } else {
                first.price
            };

            total_value = total_value.checked_add(current_value)?;
            total_invested = total_invested.checked_add(amount)?;
            holdings.push(Holding {
                bond_id,
                bond_symbol: first.bond_symbol.clone(),
                bond_name: bond.map_or_else(|| first.bond_symbol.clone(), |b| b.name),
                amount,
                tokens,
                purchase_price,
                current_price,
                current_value,
                gain,
                gain_percent: gain_percent(gain, amount),
                purchase_date: first.timestamp,
            });
        }

        let total_gain = total_value.checked_sub(total_invested)?;
        let recent_activity = rows
            .iter()
            .take(RECENT_ACTIVITY)
            .map(|t| Activity {
                kind: t.kind,
                status: t.status,
                bond_symbol: t.bond_symbol.clone(),
                amount: t.amount,
                date: t.timestamp,
            })
            .collect();

        Ok(Portfolio {
            total_value,
            total_invested,
            total_gain,
            total_gain_percent: gain_percent(total_gain, total_invested),
            investment_limit: user.investment_limit,
            available_limit: user.available_limit(),
            holdings,
            recent_activity,
        })
    }
}
