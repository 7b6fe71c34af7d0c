//! In-memory repositories.
//!
//! Process-lifetime storage behind `parking_lot::RwLock`. Each mutation runs
//! on a copy that is committed only when the closure succeeds, so a refused
//! change leaves the stored entity untouched.

use crate::domain::user::normalize_email;
use crate::domain::{
    Bond, BondId, Money, NewTransaction, Transaction, TransactionId, User, UserId,
};
use crate::ports::{
    BondRepository, Mutation, RepoResult, RepositoryError, TransactionRepository, UserRepository,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

#[derive(Default)]
struct UserTable {
    by_id: HashMap<UserId, User>,
    by_email: HashMap<String, UserId>,
}

/// In-memory user directory.
#[derive(Default)]
pub struct InMemoryUserRepository {
    table: RwLock<UserTable>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.table.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UserRepository for InMemoryUserRepository {
    fn find_by_id(&self, id: UserId) -> RepoResult<Option<User>> {
        Ok(self.table.read().by_id.get(&id).cloned())
    }

    fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let table = self.table.read();
        Ok(table
            .by_email
            .get(&normalize_email(email))
            .and_then(|id| table.by_id.get(id))
            .cloned())
    }

    fn insert(&self, user: User) -> RepoResult<()> {
        let mut table = self.table.write();
        let email = normalize_email(&user.email);
        if table.by_email.contains_key(&email) {
            return Err(RepositoryError::DuplicateEmail);
        }
        table.by_email.insert(email, user.id);
        table.by_id.insert(user.id, user);
        Ok(())
    }

    fn modify(&self, id: UserId, f: Mutation<'_, User>) -> RepoResult<User> {
        let mut table = self.table.write();
        let current = table
            .by_id
            .get(&id)
            .ok_or(RepositoryError::NotFound("user"))?;
        let old_email = current.email.clone();
        let mut updated = current.clone();
        f(&mut updated).map_err(RepositoryError::Rejected)?;

        updated.email = normalize_email(&updated.email);
        if updated.email != old_email {
            if table.by_email.contains_key(&updated.email) {
                return Err(RepositoryError::DuplicateEmail);
            }
            table.by_email.remove(&old_email);
            table.by_email.insert(updated.email.clone(), id);
        }
        table.by_id.insert(id, updated.clone());
        Ok(updated)
    }
}

/// In-memory bond catalog.
#[derive(Default)]
pub struct InMemoryBondRepository {
    bonds: RwLock<BTreeMap<BondId, Bond>>,
}

impl InMemoryBondRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bonds(bonds: impl IntoIterator<Item = Bond>) -> Self {
        Self {
            bonds: RwLock::new(bonds.into_iter().map(|b| (b.id, b)).collect()),
        }
    }
}

impl BondRepository for InMemoryBondRepository {
    fn find(&self, id: BondId) -> RepoResult<Option<Bond>> {
        Ok(self.bonds.read().get(&id).cloned())
    }

    fn list(&self) -> RepoResult<Vec<Bond>> {
        Ok(self.bonds.read().values().cloned().collect())
    }

    fn debit_supply(
        &self,
        id: BondId,
        amount: Money,
        tokens: f64,
        now: DateTime<Utc>,
    ) -> RepoResult<Bond> {
        // Check and decrement under one write lock.
        let mut bonds = self.bonds.write();
        let bond = bonds.get_mut(&id).ok_or(RepositoryError::NotFound("bond"))?;
        if amount.is_negative() || !bond.can_cover(amount, tokens) {
            return Err(RepositoryError::InsufficientSupply);
        }
        bond.available_supply = bond
            .available_supply
            .checked_sub(amount)
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        bond.updated_at = now;
        debug!(
            bond_id = id,
            debited = amount.amount,
            remaining = bond.available_supply.amount,
            "Supply debited"
        );
        Ok(bond.clone())
    }

    fn credit_supply(&self, id: BondId, amount: Money, now: DateTime<Utc>) -> RepoResult<Bond> {
        let mut bonds = self.bonds.write();
        let bond = bonds.get_mut(&id).ok_or(RepositoryError::NotFound("bond"))?;
        let restored = bond
            .available_supply
            .checked_add(amount)
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        if amount.is_negative() || restored.amount > bond.total_supply.amount {
            return Err(RepositoryError::Storage("credit exceeds total supply".into()));
        }
        bond.available_supply = restored;
        bond.updated_at = now;
        debug!(
            bond_id = id,
            credited = amount.amount,
            remaining = bond.available_supply.amount,
            "Supply credited"
        );
        Ok(bond.clone())
    }
}

#[derive(Default)]
struct TransactionTable {
    rows: BTreeMap<TransactionId, Transaction>,
    by_hash: HashMap<String, TransactionId>,
    next_id: TransactionId,
}

/// In-memory investment ledger.
#[derive(Default)]
pub struct InMemoryTransactionRepository {
    table: RwLock<TransactionTable>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(rows: &mut [Transaction]) {
    rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
}

impl TransactionRepository for InMemoryTransactionRepository {
    fn insert(&self, new: NewTransaction) -> RepoResult<Transaction> {
        let mut table = self.table.write();
        if table.by_hash.contains_key(&new.tx_hash) {
            return Err(RepositoryError::DuplicateHash);
        }
        table.next_id += 1;
        let id = table.next_id;
        let tx = Transaction::from_new(id, new);
        table.by_hash.insert(tx.tx_hash.clone(), id);
        table.rows.insert(id, tx.clone());
        Ok(tx)
    }

    fn find(&self, id: TransactionId) -> RepoResult<Option<Transaction>> {
        Ok(self.table.read().rows.get(&id).cloned())
    }

    fn find_by_hash(&self, tx_hash: &str) -> RepoResult<Option<Transaction>> {
        let table = self.table.read();
        Ok(table
            .by_hash
            .get(tx_hash)
            .and_then(|id| table.rows.get(id))
            .cloned())
    }

    fn modify(&self, id: TransactionId, f: Mutation<'_, Transaction>) -> RepoResult<Transaction> {
        let mut table = self.table.write();
        let row = table
            .rows
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound("transaction"))?;
        let mut updated = row.clone();
        f(&mut updated).map_err(RepositoryError::Rejected)?;
        updated.id = id;
        updated.tx_hash.clone_from(&row.tx_hash);
        *row = updated.clone();
        Ok(updated)
    }

    fn list_for_user(&self, user_id: UserId) -> RepoResult<Vec<Transaction>> {
        let mut rows: Vec<_> = self
            .table
            .read()
            .rows
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut rows);
        Ok(rows)
    }

    fn list_for_bond(&self, bond_id: BondId, limit: usize) -> RepoResult<Vec<Transaction>> {
        let mut rows: Vec<_> = self
            .table
            .read()
            .rows
            .values()
            .filter(|t| t.bond_id == bond_id)
            .cloned()
            .collect();
        newest_first(&mut rows);
        rows.truncate(limit);
        Ok(rows)
    }

    fn count(&self) -> RepoResult<usize> {
        Ok(self.table.read().rows.len())
    }

    fn investor_count(&self) -> RepoResult<usize> {
        let table = self.table.read();
        let investors: HashSet<UserId> = table.rows.values().map(|t| t.user_id).collect();
        Ok(investors.len())
    }
}
