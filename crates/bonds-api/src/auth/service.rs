//! Registration, login and account recovery.
//!
//! ```text
//! register ──► email pending ──verify_email──► verified
//!                                                 │
//!                                     login ──────┤
//!                                                 ├─ 2FA off ──► session token
//!                                                 └─ 2FA on ───► temp token
//!                                                                   │
//!                                                 verify_two_factor ┘──► session token
//! ```
//!
//! Every method is synchronous and may run argon2; the HTTP layer calls them
//! from `spawn_blocking`.

use super::attempts::AttemptTracker;
use super::codes::CodeStore;
use super::password::CredentialHasher;
use super::token::{Claims, TokenPurpose, TokenSigner};
use super::totp;
use crate::domain::config::{AuthConfig, LimitsConfig};
use crate::domain::user::normalize_email;
use crate::domain::validation::{
    char_len_between, is_e164_phone, is_email, is_six_digit_code, Validator,
};
use crate::domain::{
    BondsError, BondsResult, CodePurpose, Currency, InvestmentTier, KycStatus, Money, TwoFactor,
    User, UserId,
};
use crate::ports::{Clock, CodeNotifier, UserRepository};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const MIN_PASSWORD_LEN: usize = 8;

const SETUP_INSTRUCTIONS: &str = "Add the key to an authenticator app (Google Authenticator, Authy, ...) and submit the 6-digit code to enable two-factor authentication";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Second login step. `token` is the 6-digit authenticator code.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyTwoFactorRequest {
    pub temp_token: String,
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmTwoFactorRequest {
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

/// The account as returned alongside a session token.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub country: String,
    pub kyc_status: KycStatus,
    pub two_factor_enabled: bool,
    pub investment_limit: Money,
    pub total_invested: Money,
    pub preferred_currency: Currency,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            country: user.country.clone(),
            kyc_status: user.kyc.status,
            two_factor_enabled: user.two_factor_enabled(),
            investment_limit: user.investment_limit,
            total_invested: user.total_invested,
            preferred_currency: user.preferred_currency,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registered {
    pub user_id: UserId,
    pub email: String,
    pub name: String,
    pub country: String,
    pub email_verification_required: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailVerified {
    pub email_verified: bool,
    pub new_investment_limit: Money,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionGrant {
    pub token: String,
    pub user: SessionUser,
}

#[derive(Debug, Clone)]
pub enum LoginOutcome {
    Session(SessionGrant),
    /// Password accepted; a TOTP code must follow with `temp_token`.
    TwoFactorRequired { temp_token: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorSetup {
    pub secret: String,
    pub otpauth_url: String,
    pub manual_entry_key: String,
    pub instructions: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorEnabled {
    pub two_factor_enabled: bool,
    pub new_investment_limit: Money,
}

/// Token and code lifetimes as chrono durations.
struct Lifetimes {
    session: Duration,
    two_factor: Duration,
    email_code: Duration,
    reset_code: Duration,
}

fn chrono_duration(d: std::time::Duration, what: &str) -> BondsResult<Duration> {
    Duration::from_std(d).map_err(|_| BondsError::internal(format!("{what} out of range")))
}

fn validated(v: Validator) -> BondsResult<()> {
    v.finish().map_err(BondsError::Validation)
}

/// Authentication flow over the user directory.
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn CodeNotifier>,
    hasher: CredentialHasher,
    signer: TokenSigner,
    codes: CodeStore,
    attempts: AttemptTracker,
    lifetimes: Lifetimes,
    totp_skew: u8,
    totp_issuer: String,
    limits: LimitsConfig,
}

impl AuthService {
    pub fn new(
        config: &AuthConfig,
        limits: LimitsConfig,
        users: Arc<dyn UserRepository>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn CodeNotifier>,
    ) -> BondsResult<Self> {
        let signer = TokenSigner::new(&config.jwt_secret)
            .map_err(|e| BondsError::internal(format!("token signer: {e}")))?;
        let lifetimes = Lifetimes {
            session: chrono_duration(config.session_ttl, "session_ttl")?,
            two_factor: chrono_duration(config.two_factor_ttl, "two_factor_ttl")?,
            email_code: chrono_duration(config.email_code_ttl, "email_code_ttl")?,
            reset_code: chrono_duration(config.reset_code_ttl, "reset_code_ttl")?,
        };
        Ok(Self {
            users,
            clock,
            notifier,
            hasher: CredentialHasher::new(&config.argon2)?,
            signer,
            codes: CodeStore::new(),
            attempts: AttemptTracker::new(
                config.lockout_threshold,
                chrono_duration(config.lockout_window, "lockout_window")?,
            ),
            lifetimes,
            totp_skew: config.totp_skew,
            totp_issuer: config.totp_issuer.clone(),
            limits,
        })
    }

    pub fn hasher(&self) -> &CredentialHasher {
        &self.hasher
    }

    pub fn codes(&self) -> &CodeStore {
        &self.codes
    }

    pub fn attempts(&self) -> &AttemptTracker {
        &self.attempts
    }

    /// Create an unverified account and send its email verification code.
    pub fn register(&self, req: &RegisterRequest) -> BondsResult<Registered> {
        let mut v = Validator::new();
        v.check(is_email(&req.email), "email", "invalid email address")
            .check(
                req.password.chars().count() >= MIN_PASSWORD_LEN,
                "password",
                "password must be at least 8 characters",
            )
            .check(
                char_len_between(&req.name, 2, 50),
                "name",
                "name must be 2 to 50 characters",
            )
            .check(
                char_len_between(&req.country, 2, usize::MAX),
                "country",
                "country is required",
            )
            .check(
                req.phone.as_deref().map_or(true, is_e164_phone),
                "phone",
                "invalid phone number",
            );
        validated(v)?;

        let email = normalize_email(&req.email);
        if self.users.find_by_email(&email)?.is_some() {
            return Err(BondsError::DuplicateAccount);
        }

        let now = self.clock.now();
        let hash = self.hasher.hash(&req.password)?;
        let user = User::register(
            &email,
            hash,
            req.name.trim().to_string(),
            req.country.trim().to_string(),
            req.phone.clone(),
            self.limits.limit_for(InvestmentTier::Base),
            now,
        );
        let registered = Registered {
            user_id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            country: user.country.clone(),
            email_verification_required: true,
        };
        self.users.insert(user)?;

        self.send_code(&email, CodePurpose::EmailVerification, self.lifetimes.email_code, now);
        info!(user_id = %registered.user_id, email = %email, "Account registered");
        Ok(registered)
    }

    pub fn verify_email(&self, req: &VerifyEmailRequest) -> BondsResult<EmailVerified> {
        let mut v = Validator::new();
        v.check(is_email(&req.email), "email", "invalid email address")
            .check(is_six_digit_code(&req.code), "code", "code must be 6 digits");
        validated(v)?;

        let now = self.clock.now();
        self.codes
            .verify(&req.email, CodePurpose::EmailVerification, &req.code, now)?;

        let user = self
            .users
            .find_by_email(&req.email)?
            .ok_or(BondsError::UserNotFound)?;
        let limit = self.limits.limit_for(InvestmentTier::EmailVerified);
        let user = self.users.modify(user.id, &mut |u| {
            u.email_verified = true;
            u.raise_limit(limit);
            Ok(())
        })?;

        info!(user_id = %user.id, "Email verified");
        Ok(EmailVerified {
            email_verified: true,
            new_investment_limit: user.investment_limit,
        })
    }

    /// Check credentials and either open a session or ask for a TOTP code.
    ///
    /// A locked-out email is refused before the password is looked at.
    pub fn login(&self, req: &LoginRequest) -> BondsResult<LoginOutcome> {
        let mut v = Validator::new();
        v.check(is_email(&req.email), "email", "invalid email address")
            .check(!req.password.is_empty(), "password", "password is required");
        validated(v)?;

        let now = self.clock.now();
        let email = normalize_email(&req.email);
        if self.attempts.is_locked(&email, now) {
            warn!(email = %email, "Login refused during lockout");
            return Err(BondsError::TooManyAttempts);
        }

        let found = self.users.find_by_email(&email)?;
        let password_ok = match found.as_ref().and_then(|u| u.password_hash.as_deref()) {
            Some(hash) => self.hasher.verify(&req.password, hash),
            None => self.hasher.verify_dummy(&req.password),
        };
        let user = match found {
            Some(user) if password_ok => user,
            _ => {
                self.attempts.record_failure(&email, now);
                debug!(email = %email, failures = self.attempts.failures(&email), "Login failed");
                return Err(BondsError::InvalidCredentials);
            }
        };

        if !user.is_active {
            return Err(BondsError::AccountDisabled);
        }
        if !user.email_verified {
            return Err(BondsError::EmailNotVerified);
        }
        self.attempts.clear(&email);

        if user.two_factor_enabled() {
            let claims = self.claims(&user, TokenPurpose::TwoFactor, now, self.lifetimes.two_factor);
            debug!(user_id = %user.id, "Second factor required");
            return Ok(LoginOutcome::TwoFactorRequired {
                temp_token: self.signer.issue(&claims),
            });
        }
        self.open_session(user.id, now).map(LoginOutcome::Session)
    }

    pub fn verify_two_factor(&self, req: &VerifyTwoFactorRequest) -> BondsResult<SessionGrant> {
        let mut v = Validator::new();
        v.check(!req.temp_token.is_empty(), "tempToken", "temporary token is required")
            .check(is_six_digit_code(&req.token), "token", "code must be 6 digits");
        validated(v)?;

        let now = self.clock.now();
        let claims = self
            .signer
            .verify(&req.temp_token, now.timestamp(), TokenPurpose::TwoFactor)
            .map_err(|e| {
                debug!(reason = %e, "Temporary token rejected");
                BondsError::TempTokenInvalid
            })?;
        let user = self
            .users
            .find_by_id(claims.sub)?
            .ok_or(BondsError::UserNotFound)?;
        let TwoFactor::Enabled { secret } = &user.two_factor else {
            return Err(BondsError::TwoFactorNotEnabled);
        };
        // Shares the password login counter for this account
        if self.attempts.is_locked(&user.email, now) {
            warn!(user_id = %user.id, "Second factor refused during lockout");
            return Err(BondsError::TooManyAttempts);
        }
        if !totp::verify(secret, &req.token, now.timestamp(), self.totp_skew) {
            self.attempts.record_failure(&user.email, now);
            debug!(user_id = %user.id, failures = self.attempts.failures(&user.email), "Second factor failed");
            return Err(BondsError::CodeInvalid);
        }
        self.attempts.clear(&user.email);
        self.open_session(user.id, now)
    }

    /// Generate a pending secret. Repeating the call replaces it.
    pub fn setup_two_factor(&self, user_id: UserId) -> BondsResult<TwoFactorSetup> {
        let secret = totp::generate_secret();
        let user = self.users.modify(user_id, &mut |u| {
            if u.two_factor_enabled() {
                return Err(BondsError::TwoFactorAlreadyEnabled);
            }
            u.two_factor = TwoFactor::Disabled {
                pending: Some(secret.clone()),
            };
            Ok(())
        })?;

        debug!(user_id = %user.id, "Two-factor setup started");
        Ok(TwoFactorSetup {
            otpauth_url: totp::provisioning_uri(&self.totp_issuer, &user.email, &secret),
            manual_entry_key: secret.clone(),
            secret,
            instructions: SETUP_INSTRUCTIONS,
        })
    }

    pub fn confirm_two_factor_setup(
        &self,
        user_id: UserId,
        req: &ConfirmTwoFactorRequest,
    ) -> BondsResult<TwoFactorEnabled> {
        let mut v = Validator::new();
        v.check(is_six_digit_code(&req.token), "token", "code must be 6 digits");
        validated(v)?;

        let now = self.clock.now().timestamp();
        let limit = self.limits.limit_for(InvestmentTier::TwoFactor);
        let skew = self.totp_skew;
        let user = self.users.modify(user_id, &mut |u| {
            let secret = match &u.two_factor {
                TwoFactor::Enabled { .. } => return Err(BondsError::TwoFactorAlreadyEnabled),
                TwoFactor::Disabled { pending: None } => return Err(BondsError::NoPendingSetup),
                TwoFactor::Disabled {
                    pending: Some(secret),
                } => secret.clone(),
            };
            if !totp::verify(&secret, &req.token, now, skew) {
                return Err(BondsError::CodeInvalid);
            }
            u.two_factor = TwoFactor::Enabled { secret };
            u.raise_limit(limit);
            Ok(())
        })?;

        info!(user_id = %user.id, "Two-factor authentication enabled");
        Ok(TwoFactorEnabled {
            two_factor_enabled: true,
            new_investment_limit: user.investment_limit,
        })
    }

    /// Send a reset code if the account exists. Succeeds either way.
    pub fn forgot_password(&self, req: &ForgotPasswordRequest) -> BondsResult<()> {
        let mut v = Validator::new();
        v.check(is_email(&req.email), "email", "invalid email address");
        validated(v)?;

        let now = self.clock.now();
        match self.users.find_by_email(&req.email)? {
            Some(user) => {
                self.send_code(&user.email, CodePurpose::PasswordReset, self.lifetimes.reset_code, now)
            }
            None => debug!(email = %normalize_email(&req.email), "Reset requested for unknown email"),
        }
        Ok(())
    }

    pub fn reset_password(&self, req: &ResetPasswordRequest) -> BondsResult<()> {
        let mut v = Validator::new();
        v.check(is_email(&req.email), "email", "invalid email address")
            .check(is_six_digit_code(&req.code), "code", "code must be 6 digits")
            .check(
                req.new_password.chars().count() >= MIN_PASSWORD_LEN,
                "newPassword",
                "password must be at least 8 characters",
            );
        validated(v)?;

        let now = self.clock.now();
        self.codes
            .verify(&req.email, CodePurpose::PasswordReset, &req.code, now)?;

        let user = self
            .users
            .find_by_email(&req.email)?
            .ok_or(BondsError::UserNotFound)?;
        let hash = self.hasher.hash(&req.new_password)?;
        self.users.modify(user.id, &mut |u| {
            u.password_hash = Some(hash.clone());
            Ok(())
        })?;
        self.attempts.clear(&user.email);

        info!(user_id = %user.id, "Password reset");
        Ok(())
    }

    /// Resolve a bearer token to the acting user.
    pub fn authenticate(&self, bearer: Option<&str>) -> BondsResult<User> {
        let token = bearer
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(BondsError::MissingToken)?;
        let claims = self
            .signer
            .verify(token, self.clock.now().timestamp(), TokenPurpose::Session)
            .map_err(|e| {
                debug!(reason = %e, "Session token rejected");
                BondsError::TokenInvalid
            })?;
        self.users
            .find_by_id(claims.sub)?
            .ok_or(BondsError::UserNotFound)
    }

    /// Drop expired codes and stale attempt records.
    pub fn sweep(&self) -> (usize, usize) {
        let now = self.clock.now();
        (self.codes.sweep(now), self.attempts.sweep(now))
    }

    fn send_code(&self, email: &str, purpose: CodePurpose, ttl: Duration, now: DateTime<Utc>) {
        let code = self.codes.issue(email, purpose, ttl, now);
        self.notifier.deliver(email, purpose, &code);
    }

    fn claims(&self, user: &User, purpose: TokenPurpose, now: DateTime<Utc>, ttl: Duration) -> Claims {
        Claims {
            sub: user.id,
            email: user.email.clone(),
            kyc: user.kyc.status,
            purpose,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }

    fn open_session(&self, user_id: UserId, now: DateTime<Utc>) -> BondsResult<SessionGrant> {
        let user = self.users.modify(user_id, &mut |u| {
            u.last_login = Some(now);
            Ok(())
        })?;
        let claims = self.claims(&user, TokenPurpose::Session, now, self.lifetimes.session);
        info!(user_id = %user.id, "Session opened");
        Ok(SessionGrant {
            token: self.signer.issue(&claims),
            user: SessionUser::from(&user),
        })
    }
}
