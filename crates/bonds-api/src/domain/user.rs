//! Investor accounts.

use super::money::{Currency, Money};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;

/// Verification milestones, in increasing order of trust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentTier {
    Base,
    EmailVerified,
    KycSubmitted,
    TwoFactor,
    KycVerified,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    #[default]
    NotStarted,
    Pending,
    Verified,
    Rejected,
}

impl KycStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KycStatus::NotStarted => "not_started",
            KycStatus::Pending => "pending",
            KycStatus::Verified => "verified",
            KycStatus::Rejected => "rejected",
        }
    }

    /// Completion percentage shown on the profile.
    pub fn progress(&self) -> u8 {
        match self {
            KycStatus::NotStarted | KycStatus::Rejected => 0,
            KycStatus::Pending => 50,
            KycStatus::Verified => 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Passport,
    IdCard,
    DrivingLicense,
}

/// Identity documents submitted for review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KycDocuments {
    pub document_type: DocumentType,
    pub document_number: String,
    pub address: String,
    pub submission_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KycRecord {
    pub status: KycStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
    pub documents: Option<KycDocuments>,
}

/// Two-factor state. An enabled account always carries its secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TwoFactor {
    Disabled {
        /// Base32 secret awaiting confirmation
        pending: Option<String>,
    },
    Enabled {
        secret: String,
    },
}

impl Default for TwoFactor {
    fn default() -> Self {
        TwoFactor::Disabled { pending: None }
    }
}

impl TwoFactor {
    pub fn is_enabled(&self) -> bool {
        matches!(self, TwoFactor::Enabled { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub email: bool,
    pub browser: bool,
    pub investment: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            email: true,
            browser: true,
            investment: true,
        }
    }
}

/// Partial update; `None` keeps the current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct NotificationPatch {
    pub email: Option<bool>,
    pub browser: Option<bool>,
    pub investment: Option<bool>,
}

impl NotificationPreferences {
    pub fn apply(&mut self, patch: NotificationPatch) {
        if let Some(v) = patch.email {
            self.email = v;
        }
        if let Some(v) = patch.browser {
            self.browser = v;
        }
        if let Some(v) = patch.investment {
            self.investment = v;
        }
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    /// Always stored lowercased
    pub email: String,
    pub wallet_address: Option<String>,
    pub name: String,
    pub country: String,
    pub phone: Option<String>,
    /// PHC-format hash; `None` for wallet-only accounts which cannot log in
    /// with a password
    pub password_hash: Option<String>,
    pub kyc: KycRecord,
    pub date_of_birth: Option<NaiveDate>,
    pub email_verified: bool,
    pub two_factor: TwoFactor,
    pub registered_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub investment_limit: Money,
    pub total_invested: Money,
    pub preferred_currency: Currency,
    pub notifications: NotificationPreferences,
}

impl User {
    /// Fresh, unverified account at the base tier.
    pub fn register(
        email: &str,
        password_hash: String,
        name: String,
        country: String,
        phone: Option<String>,
        base_limit: Money,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            wallet_address: None,
            name,
            country,
            phone,
            password_hash: Some(password_hash),
            kyc: KycRecord::default(),
            date_of_birth: None,
            email_verified: false,
            two_factor: TwoFactor::default(),
            registered_at: now,
            last_login: None,
            is_active: true,
            investment_limit: base_limit,
            total_invested: Money::zero(base_limit.currency),
            preferred_currency: base_limit.currency,
            notifications: NotificationPreferences::default(),
        }
    }

    /// Raise the investment limit to `limit` if it is higher. Never lowers.
    pub fn raise_limit(&mut self, limit: Money) {
        self.investment_limit = self.investment_limit.max(limit);
    }

    /// Remaining headroom under the investment limit, floored at zero.
    pub fn available_limit(&self) -> Money {
        self.investment_limit
            .checked_sub(self.total_invested)
            .map(|m| if m.is_negative() { Money::zero(m.currency) } else { m })
            .unwrap_or(self.investment_limit)
    }

    pub fn two_factor_enabled(&self) -> bool {
        self.two_factor.is_enabled()
    }
}

/// Canonical form used for every email lookup and key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::xof;

    fn sample() -> User {
        User::register(
            "Investor@Example.com",
            "$argon2id$stub".into(),
            "Jean Dupont".into(),
            "France".into(),
            None,
            xof(650_000),
            Utc::now(),
        )
    }

    #[test]
    fn test_register_normalizes_email() {
        let user = sample();
        assert_eq!(user.email, "investor@example.com");
        assert!(!user.email_verified);
        assert!(!user.two_factor_enabled());
        assert_eq!(user.investment_limit, xof(650_000));
    }

    #[test]
    fn test_raise_limit_is_monotonic() {
        let mut user = sample();
        user.raise_limit(xof(32_500_000));
        user.raise_limit(xof(3_250_000));
        assert_eq!(user.investment_limit, xof(32_500_000));
    }

    #[test]
    fn test_available_limit_floors_at_zero() {
        let mut user = sample();
        user.total_invested = xof(700_000);
        assert_eq!(user.available_limit(), xof(0));
        user.total_invested = xof(150_000);
        assert_eq!(user.available_limit(), xof(500_000));
    }

    #[test]
    fn test_tier_ordering() {
        assert!(InvestmentTier::Base < InvestmentTier::EmailVerified);
        assert!(InvestmentTier::TwoFactor < InvestmentTier::KycVerified);
    }

    #[test]
    fn test_notification_patch() {
        let mut prefs = NotificationPreferences::default();
        prefs.apply(NotificationPatch {
            browser: Some(false),
            ..Default::default()
        });
        assert!(prefs.email);
        assert!(!prefs.browser);
        assert!(prefs.investment);
    }
}
