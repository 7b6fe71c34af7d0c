//! Domain error taxonomy.
//!
//! Every user-visible failure carries a stable slug (see [`BondsError::code`])
//! and a human-readable message. The HTTP layer maps the variant to a status.

use super::money::MoneyError;
use super::validation::FieldError;

/// Errors raised by the authentication, catalog, ledger and account flows.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BondsError {
    // Validation
    /// One or more request fields failed validation
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    // Authentication
    #[error("no authentication token provided")]
    MissingToken,
    #[error("invalid or expired token")]
    TokenInvalid,
    #[error("invalid or expired temporary token")]
    TempTokenInvalid,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("too many failed login attempts, try again later")]
    TooManyAttempts,
    #[error("invalid verification code")]
    CodeInvalid,
    #[error("verification code has expired")]
    CodeExpired,
    #[error("verification code does not match")]
    CodeMismatch,

    // Account state
    #[error("an account with this email already exists")]
    DuplicateAccount,
    #[error("account is disabled")]
    AccountDisabled,
    #[error("please verify your email before logging in")]
    EmailNotVerified,
    #[error("user not found")]
    UserNotFound,
    #[error("two-factor authentication is not enabled")]
    TwoFactorNotEnabled,
    #[error("two-factor authentication is already enabled")]
    TwoFactorAlreadyEnabled,
    #[error("no two-factor setup in progress")]
    NoPendingSetup,
    #[error("KYC is already verified")]
    KycAlreadyVerified,

    // Resources
    #[error("{0} not found")]
    NotFound(&'static str),

    // Business rules
    #[error("minimum investment is {minimum}")]
    BelowMinimum { minimum: String },
    #[error("insufficient bond supply available")]
    InsufficientSupply,
    #[error("only pending transactions can be cancelled")]
    NotCancellable,
    #[error("transaction is not pending")]
    InvalidTransition,
    #[error("transaction already exists")]
    DuplicateTransaction,

    // Internal
    #[error("internal error: {0}")]
    Internal(String),
}

impl BondsError {
    /// Stable machine-checkable slug.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failed",
            Self::MissingToken => "missing_token",
            Self::TokenInvalid => "token_invalid",
            Self::TempTokenInvalid => "temp_token_invalid",
            Self::InvalidCredentials => "invalid_credentials",
            Self::TooManyAttempts => "too_many_attempts",
            Self::CodeInvalid => "code_invalid",
            Self::CodeExpired => "code_expired",
            Self::CodeMismatch => "code_mismatch",
            Self::DuplicateAccount => "duplicate_account",
            Self::AccountDisabled => "account_disabled",
            Self::EmailNotVerified => "email_not_verified",
            Self::UserNotFound => "user_not_found",
            Self::TwoFactorNotEnabled => "two_factor_not_enabled",
            Self::TwoFactorAlreadyEnabled => "two_factor_already_enabled",
            Self::NoPendingSetup => "no_pending_setup",
            Self::KycAlreadyVerified => "kyc_already_verified",
            Self::NotFound(_) => "not_found",
            Self::BelowMinimum { .. } => "below_minimum",
            Self::InsufficientSupply => "insufficient_supply",
            Self::NotCancellable => "not_cancellable",
            Self::InvalidTransition => "invalid_transition",
            Self::DuplicateTransaction => "duplicate_transaction",
            Self::Internal(_) => "internal_error",
        }
    }

    pub fn internal(details: impl Into<String>) -> Self {
        Self::Internal(details.into())
    }

    /// Shorthand for a single-field validation failure.
    pub fn invalid_field(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }
}

impl From<MoneyError> for BondsError {
    fn from(e: MoneyError) -> Self {
        BondsError::Internal(e.to_string())
    }
}

/// Result type for domain operations
pub type BondsResult<T> = Result<T, BondsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugs_are_stable() {
        assert_eq!(BondsError::DuplicateAccount.code(), "duplicate_account");
        assert_eq!(BondsError::TooManyAttempts.code(), "too_many_attempts");
        assert_eq!(BondsError::NotFound("bond").code(), "not_found");
        assert_eq!(
            BondsError::BelowMinimum {
                minimum: "65000 XOF".into()
            }
            .code(),
            "below_minimum"
        );
    }

    #[test]
    fn test_not_found_message_names_resource() {
        assert_eq!(BondsError::NotFound("bond").to_string(), "bond not found");
    }

    #[test]
    fn test_money_error_is_internal() {
        let err: BondsError = MoneyError::Overflow.into();
        assert_eq!(err.code(), "internal_error");
    }
}
