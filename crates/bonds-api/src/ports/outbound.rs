//! Outbound (Driven) ports for the bonds service.
//!
//! Storage, time and code delivery are reached only through these traits so
//! the in-memory adapters can be swapped for a database or a mail gateway
//! without touching flow logic.

use crate::domain::{
    Bond, BondId, BondsError, CodePurpose, Money, NewTransaction, Transaction, TransactionId,
    User, UserId,
};
use chrono::{DateTime, Utc};

/// Storage failures and conditional-write outcomes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RepositoryError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("email already registered")]
    DuplicateEmail,
    #[error("transaction hash already recorded")]
    DuplicateHash,
    #[error("insufficient supply")]
    InsufficientSupply,
    /// A mutation closure refused the change
    #[error(transparent)]
    Rejected(BondsError),
    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<RepositoryError> for BondsError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound(entity) => BondsError::NotFound(entity),
            RepositoryError::DuplicateEmail => BondsError::DuplicateAccount,
            RepositoryError::DuplicateHash => BondsError::DuplicateTransaction,
            RepositoryError::InsufficientSupply => BondsError::InsufficientSupply,
            RepositoryError::Rejected(inner) => inner,
            RepositoryError::Storage(detail) => BondsError::Internal(detail),
        }
    }
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Closure applied to a stored entity under the repository's lock.
pub type Mutation<'a, T> = &'a mut dyn FnMut(&mut T) -> Result<(), BondsError>;

/// User directory.
pub trait UserRepository: Send + Sync {
    fn find_by_id(&self, id: UserId) -> RepoResult<Option<User>>;

    /// Lookup by email, case-insensitive.
    fn find_by_email(&self, email: &str) -> RepoResult<Option<User>>;

    /// Fails with [`RepositoryError::DuplicateEmail`] when the email exists.
    fn insert(&self, user: User) -> RepoResult<()>;

    /// Atomically read, mutate and write back one user.
    fn modify(&self, id: UserId, f: Mutation<'_, User>) -> RepoResult<User>;
}

/// Bond catalog storage.
pub trait BondRepository: Send + Sync {
    fn find(&self, id: BondId) -> RepoResult<Option<Bond>>;

    /// All bonds ordered by id.
    fn list(&self) -> RepoResult<Vec<Bond>>;

    /// Re-check and decrement available supply as one step.
    ///
    /// Fails with [`RepositoryError::InsufficientSupply`] if `amount` or
    /// `tokens` exceed what remains; nothing is changed in that case.
    fn debit_supply(
        &self,
        id: BondId,
        amount: Money,
        tokens: f64,
        now: DateTime<Utc>,
    ) -> RepoResult<Bond>;

    /// Return `amount` to available supply after a debit whose transaction
    /// could not be recorded.
    fn credit_supply(&self, id: BondId, amount: Money, now: DateTime<Utc>) -> RepoResult<Bond>;
}

/// Investment ledger storage.
pub trait TransactionRepository: Send + Sync {
    /// Assigns the next id. Fails with [`RepositoryError::DuplicateHash`].
    fn insert(&self, new: NewTransaction) -> RepoResult<Transaction>;

    fn find(&self, id: TransactionId) -> RepoResult<Option<Transaction>>;

    fn find_by_hash(&self, tx_hash: &str) -> RepoResult<Option<Transaction>>;

    /// Atomically read, mutate and write back one transaction.
    fn modify(&self, id: TransactionId, f: Mutation<'_, Transaction>) -> RepoResult<Transaction>;

    /// A user's transactions, newest first.
    fn list_for_user(&self, user_id: UserId) -> RepoResult<Vec<Transaction>>;

    /// Most recent transactions on a bond, newest first.
    fn list_for_bond(&self, bond_id: BondId, limit: usize) -> RepoResult<Vec<Transaction>>;

    fn count(&self) -> RepoResult<usize>;

    /// Distinct users with at least one transaction.
    fn investor_count(&self) -> RepoResult<usize>;
}

/// Time source for consistent timestamp handling.
///
/// Abstracted to allow testing with deterministic time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Delivers verification codes to their owner.
pub trait CodeNotifier: Send + Sync {
    fn deliver(&self, email: &str, purpose: CodePurpose, code: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_errors_map_to_domain() {
        let cases = [
            (RepositoryError::DuplicateEmail, "duplicate_account"),
            (RepositoryError::DuplicateHash, "duplicate_transaction"),
            (RepositoryError::InsufficientSupply, "insufficient_supply"),
            (RepositoryError::NotFound("bond"), "not_found"),
            (RepositoryError::Storage("disk".into()), "internal_error"),
            (
                RepositoryError::Rejected(BondsError::NotCancellable),
                "not_cancellable",
            ),
        ];
        for (repo, slug) in cases {
            assert_eq!(BondsError::from(repo).code(), slug);
        }
    }
}
