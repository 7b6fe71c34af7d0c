//! Domain types for the bonds service.
//!
//! Entities, money, derived pricing, configuration and the error taxonomy.
//! Nothing in here performs I/O.

pub mod bond;
pub mod config;
pub mod error;
pub mod money;
pub mod pricing;
pub mod transaction;
pub mod user;
pub mod validation;
pub mod verification;

// Re-exports for convenience
pub use bond::{Bond, BondId};
pub use config::{ConfigError, Environment, ServiceConfig};
pub use error::{BondsError, BondsResult};
pub use money::{Currency, Money, MoneyError};
pub use transaction::{
    NewTransaction, Transaction, TransactionId, TransactionStatus, TransactionType,
};
pub use user::{InvestmentTier, KycStatus, TwoFactor, User, UserId};
pub use validation::FieldError;
pub use verification::{CodePurpose, LoginAttemptRecord, VerificationCode};
