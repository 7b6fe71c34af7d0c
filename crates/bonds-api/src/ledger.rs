//! Investment ledger: placing, settling and cancelling transactions.
//!
//! Placing a BUY debits the bond's available supply through
//! [`BondRepository::debit_supply`], which re-checks and decrements under one
//! lock. Transactions enter as `pending` and only move on through an explicit
//! [`Ledger::confirm`] from the settlement side or [`Ledger::cancel`] by the
//! owner. Cancelling does not return supply to the bond. A debit whose
//! transaction cannot be appended is credited back before the error returns.

use crate::domain::config::SettlementConfig;
use crate::domain::validation::{is_tx_hash, is_wallet_address, Validator};
use crate::domain::{
    Bond, BondId, BondsError, BondsResult, Currency, Money, NewTransaction, Transaction,
    TransactionId, TransactionStatus, TransactionType, User, UserId,
};
use crate::ports::{BondRepository, Clock, TransactionRepository, UserRepository};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;

/// Body of `POST /api/bonds/:id/invest`. `amount` is in minor units of the
/// bond's currency.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestRequest {
    pub amount: i64,
    #[serde(default)]
    pub wallet_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateRequest {
    pub bond_id: BondId,
    pub amount: i64,
    #[serde(rename = "type")]
    pub kind: TransactionType,
}

/// A transaction already broadcast by the client, identified by its hash.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordRequest {
    pub bond_id: BondId,
    pub amount: i64,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub tx_hash: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    #[serde(default)]
    pub block_number: Option<u64>,
}

/// `GET /api/transactions` query. `type` and `status` match case-insensitively.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
    pub bond_id: Option<BondId>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub bond_id: BondId,
    pub bond_symbol: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: Money,
    pub price: Money,
    pub tokens: f64,
    pub fee: Money,
    pub total_cost: Money,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplyUpdate {
    pub id: BondId,
    pub symbol: String,
    pub new_available_supply: Money,
}

#[derive(Debug, Clone, Serialize)]
pub struct Investment {
    pub transaction: Transaction,
    pub bond: SupplyUpdate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerStats {
    pub total: usize,
    /// Completed BUYs only
    pub total_invested: Money,
    /// Completed transactions only
    pub total_fees: Money,
    pub average_investment: Money,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionPage {
    pub transactions: Vec<Transaction>,
    pub pagination: Pagination,
    pub stats: LedgerStats,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetail {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub confirmations: u64,
    pub network: String,
    pub explorer_url: String,
    pub receipt_generated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthBucket {
    /// `YYYY-MM`
    pub month: String,
    pub count: usize,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BondShare {
    pub symbol: String,
    pub count: usize,
    pub amount: Money,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSummary {
    pub total_transactions: usize,
    pub completed_transactions: usize,
    pub pending_transactions: usize,
    pub total_invested: Money,
    pub total_fees: Money,
    pub average_transaction_size: Money,
    pub most_recent_transaction: Option<Transaction>,
    pub transactions_by_month: Vec<MonthBucket>,
    /// Completed transactions grouped by bond, largest first
    pub bond_distribution: Vec<BondShare>,
}

fn random_tx_hash() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("0x{}", hex::encode(bytes))
}

/// Totals are kept in the currency the rows were booked in, never the
/// owner's display preference.
fn ledger_currency(rows: &[Transaction]) -> Currency {
    rows.first().map_or(Currency::Xof, |t| t.amount.currency)
}

fn sum<'a>(
    currency: Currency,
    amounts: impl IntoIterator<Item = &'a Money>,
) -> BondsResult<Money> {
    amounts
        .into_iter()
        .try_fold(Money::zero(currency), |acc, m| acc.checked_add(*m))
        .map_err(BondsError::from)
}

fn average(total: Money, count: usize) -> Money {
    if count == 0 {
        Money::zero(total.currency)
    } else {
        total.scale(1.0 / count as f64)
    }
}

fn parse_kind(raw: &str) -> Option<TransactionType> {
    match raw.to_ascii_uppercase().as_str() {
        "BUY" => Some(TransactionType::Buy),
        "SELL" => Some(TransactionType::Sell),
        _ => None,
    }
}

fn parse_status(raw: &str) -> Option<TransactionStatus> {
    match raw.to_ascii_lowercase().as_str() {
        "pending" => Some(TransactionStatus::Pending),
        "completed" => Some(TransactionStatus::Completed),
        "cancelled" => Some(TransactionStatus::Cancelled),
        _ => None,
    }
}

pub struct Ledger {
    bonds: Arc<dyn BondRepository>,
    transactions: Arc<dyn TransactionRepository>,
    users: Arc<dyn UserRepository>,
    clock: Arc<dyn Clock>,
    fee_bps: u32,
    settlement: SettlementConfig,
}

impl Ledger {
    pub fn new(
        bonds: Arc<dyn BondRepository>,
        transactions: Arc<dyn TransactionRepository>,
        users: Arc<dyn UserRepository>,
        clock: Arc<dyn Clock>,
        fee_bps: u32,
        settlement: SettlementConfig,
    ) -> Self {
        Self {
            bonds,
            transactions,
            users,
            clock,
            fee_bps,
            settlement,
        }
    }

    fn bond(&self, id: BondId) -> BondsResult<Bond> {
        self.bonds.find(id)?.ok_or(BondsError::NotFound("bond"))
    }

    /// Fee, tokens and total for `amount` at the bond's current price.
    fn quote(&self, bond: &Bond, amount: Money, kind: TransactionType) -> BondsResult<Quote> {
        if amount.amount < bond.minimum_investment.amount {
            return Err(BondsError::BelowMinimum {
                minimum: bond.minimum_investment.to_string(),
            });
        }
        let fee = amount.basis_points(self.fee_bps)?;
        let total_cost = match kind {
            TransactionType::Buy => amount.checked_add(fee)?,
            TransactionType::Sell => amount.checked_sub(fee)?,
        };
        Ok(Quote {
            bond_id: bond.id,
            bond_symbol: bond.symbol.clone(),
            kind,
            amount,
            price: bond.current_price,
            tokens: bond.tokens_for(amount)?,
            fee,
            total_cost,
        })
    }

    /// Debit supply for a BUY and append the pending transaction.
    fn place(&self, user_id: UserId, bond: &Bond, quote: Quote, tx_hash: String) -> BondsResult<Investment> {
        let now = self.clock.now();
        let bond = match quote.kind {
            TransactionType::Buy => {
                if !bond.can_cover(quote.amount, quote.tokens) {
                    return Err(BondsError::InsufficientSupply);
                }
                self.bonds
                    .debit_supply(bond.id, quote.amount, quote.tokens, now)?
            }
            TransactionType::Sell => bond.clone(),
        };
        let inserted = self.transactions.insert(NewTransaction {
            user_id,
            bond_id: bond.id,
            bond_symbol: bond.symbol.clone(),
            kind: quote.kind,
            amount: quote.amount,
            price: quote.price,
            tokens: quote.tokens,
            fee: quote.fee,
            total_cost: quote.total_cost,
            tx_hash,
            timestamp: now,
        });
        let transaction = match inserted {
            Ok(transaction) => transaction,
            Err(e) => {
                if quote.kind == TransactionType::Buy {
                    if let Err(credit) = self.bonds.credit_supply(bond.id, quote.amount, now) {
                        error!(bond_id = bond.id, error = %credit, "Supply credit-back failed");
                    }
                }
                warn!(bond_id = bond.id, error = %e, "Transaction not recorded");
                return Err(e.into());
            }
        };

        info!(
            transaction_id = transaction.id,
            user_id = %user_id,
            bond_id = bond.id,
            amount = transaction.amount.amount,
            "Transaction placed"
        );
        Ok(Investment {
            transaction,
            bond: SupplyUpdate {
                id: bond.id,
                symbol: bond.symbol,
                new_available_supply: bond.available_supply,
            },
        })
    }

    /// Buy into a bond. The transaction stays pending until settled.
    pub fn invest(&self, user: &User, bond_id: BondId, req: &InvestRequest) -> BondsResult<Investment> {
        let mut v = Validator::new();
        v.check(req.amount > 0, "amount", "amount must be positive")
            .check(
                req.wallet_address.as_deref().map_or(true, is_wallet_address),
                "walletAddress",
                "invalid wallet address",
            );
        v.finish().map_err(BondsError::Validation)?;

        let bond = self.bond(bond_id)?;
        let quote = self.quote(&bond, Money::new(req.amount, bond.currency()), TransactionType::Buy)?;
        self.place(user.id, &bond, quote, random_tx_hash())
    }

    /// Dry run. Nothing is written.
    pub fn simulate(&self, req: &SimulateRequest) -> BondsResult<Quote> {
        if req.amount <= 0 {
            return Err(BondsError::invalid_field("amount", "amount must be positive"));
        }
        let bond = self.bond(req.bond_id)?;
        self.quote(&bond, Money::new(req.amount, bond.currency()), req.kind)
    }

    /// Record a client-submitted transaction. SELLs leave supply untouched.
    pub fn record(&self, user: &User, req: &RecordRequest) -> BondsResult<Transaction> {
        let mut v = Validator::new();
        v.check(req.amount > 0, "amount", "amount must be positive")
            .check(is_tx_hash(&req.tx_hash), "txHash", "invalid transaction hash");
        v.finish().map_err(BondsError::Validation)?;

        let tx_hash = req.tx_hash.to_ascii_lowercase();
        if self.transactions.find_by_hash(&tx_hash)?.is_some() {
            return Err(BondsError::DuplicateTransaction);
        }
        let bond = self.bond(req.bond_id)?;
        let quote = self.quote(&bond, Money::new(req.amount, bond.currency()), req.kind)?;
        self.place(user.id, &bond, quote, tx_hash)
            .map(|placed| placed.transaction)
    }

    /// Settlement confirmation: pending to completed. A BUY counts towards
    /// the owner's total invested from here on.
    ///
    /// The owner's total is raised before the status flips, and lowered
    /// again if the flip is refused, so a failed step leaves the
    /// transaction pending and retryable.
    pub fn confirm(&self, id: TransactionId, req: &ConfirmRequest) -> BondsResult<Transaction> {
        let now = self.clock.now();
        let pending = self
            .transactions
            .find(id)?
            .ok_or(BondsError::NotFound("transaction"))?;
        if pending.status != TransactionStatus::Pending {
            return Err(BondsError::InvalidTransition);
        }

        let counted = pending.kind == TransactionType::Buy;
        if counted {
            self.users.modify(pending.user_id, &mut |u| {
                u.total_invested = u.total_invested.checked_add(pending.amount)?;
                Ok(())
            })?;
        }
        let tx = match self
            .transactions
            .modify(id, &mut |t| t.complete(req.block_number, now))
        {
            Ok(tx) => tx,
            Err(e) => {
                if counted {
                    let undo = self.users.modify(pending.user_id, &mut |u| {
                        u.total_invested = u.total_invested.checked_sub(pending.amount)?;
                        Ok(())
                    });
                    if let Err(undo) = undo {
                        error!(transaction_id = id, error = %undo, "Total invested rollback failed");
                    }
                }
                return Err(e.into());
            }
        };
        info!(transaction_id = id, block_number = ?tx.block_number, "Transaction settled");
        Ok(tx)
    }

    fn owned(&self, user: &User, id: TransactionId) -> BondsResult<Transaction> {
        self.transactions
            .find(id)?
            .filter(|t| t.user_id == user.id)
            .ok_or(BondsError::NotFound("transaction"))
    }

    pub fn list(&self, user: &User, query: &TransactionQuery) -> BondsResult<TransactionPage> {
        let kind = query.kind.as_deref().map(parse_kind);
        let status = query.status.as_deref().map(parse_status);
        let page = query.page.unwrap_or(1);
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);

        let mut v = Validator::new();
        v.check(!matches!(kind, Some(None)), "type", "type must be BUY or SELL")
            .check(
                !matches!(status, Some(None)),
                "status",
                "status must be pending, completed or cancelled",
            )
            .check(page >= 1, "page", "page starts at 1")
            .check(
                (1..=MAX_PAGE_SIZE).contains(&limit),
                "limit",
                "limit must be between 1 and 100",
            );
        v.finish().map_err(BondsError::Validation)?;

        let rows: Vec<Transaction> = self
            .transactions
            .list_for_user(user.id)?
            .into_iter()
            .filter(|t| kind.flatten().map_or(true, |k| t.kind == k))
            .filter(|t| status.flatten().map_or(true, |s| t.status == s))
            .filter(|t| query.bond_id.map_or(true, |b| t.bond_id == b))
            .collect();

        let currency = ledger_currency(&rows);
        let completed: Vec<&Transaction> = rows
            .iter()
            .filter(|t| t.status == TransactionStatus::Completed)
            .collect();
        let stats = LedgerStats {
            total: rows.len(),
            total_invested: sum(
                currency,
                completed
                    .iter()
                    .filter(|t| t.kind == TransactionType::Buy)
                    .map(|t| &t.amount),
            )?,
            total_fees: sum(currency, completed.iter().map(|t| &t.fee))?,
            average_investment: average(sum(currency, rows.iter().map(|t| &t.amount))?, rows.len()),
        };

        let total_items = rows.len();
        let start = (page - 1).saturating_mul(limit);
        let pagination = Pagination {
            current_page: page,
            total_pages: total_items.div_ceil(limit),
            total_items,
            has_next: start.saturating_add(limit) < total_items,
            has_prev: page > 1,
        };
        let transactions = rows.into_iter().skip(start).take(limit).collect();

        Ok(TransactionPage {
            transactions,
            pagination,
            stats,
        })
    }

    pub fn get(&self, user: &User, id: TransactionId) -> BondsResult<TransactionDetail> {
        let transaction = self.owned(user, id)?;
        Ok(TransactionDetail {
            confirmations: if transaction.block_number.is_some() {
                self.settlement.confirmations
            } else {
                0
            },
            network: self.settlement.network.clone(),
            explorer_url: format!("{}{}", self.settlement.explorer_base_url, transaction.tx_hash),
            receipt_generated: transaction.status == TransactionStatus::Completed,
            transaction,
        })
    }

    pub fn summary(&self, user: &User) -> BondsResult<TransactionSummary> {
        let rows = self.transactions.list_for_user(user.id)?;
        let currency = ledger_currency(&rows);
        let completed: Vec<&Transaction> = rows
            .iter()
            .filter(|t| t.status == TransactionStatus::Completed)
            .collect();

        let mut by_month: BTreeMap<String, (usize, Money)> = BTreeMap::new();
        for t in &rows {
            let entry = by_month
                .entry(t.timestamp.format("%Y-%m").to_string())
                .or_insert((0, Money::zero(t.amount.currency)));
            entry.0 += 1;
            entry.1 = entry.1.checked_add(t.amount)?;
        }

        let mut by_bond: BTreeMap<&str, (usize, Money)> = BTreeMap::new();
        for t in &completed {
            let entry = by_bond
                .entry(t.bond_symbol.as_str())
                .or_insert((0, Money::zero(t.amount.currency)));
            entry.0 += 1;
            entry.1 = entry.1.checked_add(t.amount)?;
        }
        let mut bond_distribution: Vec<BondShare> = by_bond
            .into_iter()
            .map(|(symbol, (count, amount))| BondShare {
                symbol: symbol.to_string(),
                count,
                amount,
            })
            .collect();
        bond_distribution.sort_by(|a, b| b.amount.amount.cmp(&a.amount.amount));

        Ok(TransactionSummary {
            total_transactions: rows.len(),
            completed_transactions: completed.len(),
            pending_transactions: rows
                .iter()
                .filter(|t| t.status == TransactionStatus::Pending)
                .count(),
            total_invested: sum(
                currency,
                completed
                    .iter()
                    .filter(|t| t.kind == TransactionType::Buy)
                    .map(|t| &t.amount),
            )?,
            total_fees: sum(currency, completed.iter().map(|t| &t.fee))?,
            average_transaction_size: average(
                sum(currency, rows.iter().map(|t| &t.amount))?,
                rows.len(),
            ),
            most_recent_transaction: rows.first().cloned(),
            transactions_by_month: by_month
                .into_iter()
                .map(|(month, (count, amount))| MonthBucket {
                    month,
                    count,
                    amount,
                })
                .collect(),
            bond_distribution,
        })
    }

    /// Owner-initiated cancel of a pending transaction.
    pub fn cancel(&self, user: &User, id: TransactionId) -> BondsResult<Transaction> {
        self.owned(user, id)?;
        let now = self.clock.now();
        let tx = self.transactions.modify(id, &mut |t| t.cancel(now))?;
        debug!(transaction_id = id, user_id = %user.id, "Transaction cancelled");
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::seed::demo_bonds;
    use crate::adapters::{
        InMemoryBondRepository, InMemoryTransactionRepository, InMemoryUserRepository, ManualClock,
    };
    use crate::domain::money::xof;
    use crate::ports::{Mutation, RepoResult, RepositoryError};
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;

    struct Harness {
        ledger: Ledger,
        bonds: Arc<InMemoryBondRepository>,
        users: Arc<InMemoryUserRepository>,
        clock: Arc<ManualClock>,
    }

    fn harness_with(bonds: Vec<Bond>) -> Harness {
        harness_on(bonds, Arc::new(InMemoryTransactionRepository::new()))
    }

    fn harness_on(bonds: Vec<Bond>, transactions: Arc<dyn TransactionRepository>) -> Harness {
        let bonds = Arc::new(InMemoryBondRepository::with_bonds(bonds));
        let users = Arc::new(InMemoryUserRepository::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 8, 1, 12, 0, 0).unwrap(),
        ));
        let ledger = Ledger::new(
            bonds.clone(),
            transactions,
            users.clone(),
            clock.clone(),
            50,
            SettlementConfig::default(),
        );
        Harness {
            ledger,
            bonds,
            users,
            clock,
        }
    }

    fn harness() -> Harness {
        harness_with(demo_bonds())
    }

    /// Store that refuses every append.
    #[derive(Default)]
    struct RefusingStore(InMemoryTransactionRepository);

    impl TransactionRepository for RefusingStore {
        fn insert(&self, _new: NewTransaction) -> RepoResult<Transaction> {
            Err(RepositoryError::Storage("disk full".into()))
        }
        fn find(&self, id: TransactionId) -> RepoResult<Option<Transaction>> {
            self.0.find(id)
        }
        fn find_by_hash(&self, tx_hash: &str) -> RepoResult<Option<Transaction>> {
            self.0.find_by_hash(tx_hash)
        }
        fn modify(&self, id: TransactionId, f: Mutation<'_, Transaction>) -> RepoResult<Transaction> {
            self.0.modify(id, f)
        }
        fn list_for_user(&self, user_id: UserId) -> RepoResult<Vec<Transaction>> {
            self.0.list_for_user(user_id)
        }
        fn list_for_bond(&self, bond_id: BondId, limit: usize) -> RepoResult<Vec<Transaction>> {
            self.0.list_for_bond(bond_id, limit)
        }
        fn count(&self) -> RepoResult<usize> {
            self.0.count()
        }
        fn investor_count(&self) -> RepoResult<usize> {
            self.0.investor_count()
        }
    }

    fn unsaved_investor(h: &Harness, email: &str) -> User {
        User::register(
            email,
            "$argon2id$stub".into(),
            "Investor".into(),
            "Mali".into(),
            None,
            xof(650_000),
            h.clock.now(),
        )
    }

    fn investor(h: &Harness, email: &str) -> User {
        let user = User::register(
            email,
            "$argon2id$stub".into(),
            "Investor".into(),
            "Mali".into(),
            None,
            xof(650_000),
            h.clock.now(),
        );
        h.users.insert(user.clone()).unwrap();
        user
    }

    fn invest(h: &Harness, user: &User, bond_id: BondId, amount: i64) -> BondsResult<Investment> {
        h.ledger.invest(
            user,
            bond_id,
            &InvestRequest {
                amount,
                wallet_address: None,
            },
        )
    }

    fn available(h: &Harness, bond_id: BondId) -> Money {
        h.bonds.find(bond_id).unwrap().unwrap().available_supply
    }

    #[test]
    fn test_worked_example() {
        let h = harness();
        let user = investor(&h, "a@example.com");
        let before = available(&h, 1);

        let out = invest(&h, &user, 1, 65_000).unwrap();
        let tx = &out.transaction;
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert!((tx.tokens - 0.1005).abs() < 0.0001);
        assert_eq!(tx.fee, xof(325));
        assert_eq!(tx.total_cost, xof(65_325));
        assert_eq!(tx.price, xof(646_750));
        assert!(is_tx_hash(&tx.tx_hash));

        let after = available(&h, 1);
        assert_eq!(before.checked_sub(after).unwrap(), xof(65_000));
        assert_eq!(out.bond.new_available_supply, after);
    }

    #[test]
    fn test_below_minimum_leaves_supply() {
        let h = harness();
        let user = investor(&h, "a@example.com");
        let before = available(&h, 1);
        assert!(matches!(
            invest(&h, &user, 1, 64_999),
            Err(BondsError::BelowMinimum { .. })
        ));
        assert_eq!(available(&h, 1), before);
    }

    #[test]
    fn test_unknown_bond() {
        let h = harness();
        let user = investor(&h, "a@example.com");
        assert_eq!(
            invest(&h, &user, 42, 65_000).unwrap_err(),
            BondsError::NotFound("bond")
        );
    }

    #[test]
    fn test_insufficient_supply() {
        let mut bonds = demo_bonds();
        bonds[0].available_supply = xof(100_000);
        let h = harness_with(bonds);
        let user = investor(&h, "a@example.com");

        invest(&h, &user, 1, 65_000).unwrap();
        assert_eq!(
            invest(&h, &user, 1, 65_000).unwrap_err(),
            BondsError::InsufficientSupply
        );
        assert_eq!(available(&h, 1), xof(35_000));
    }

    #[test]
    fn test_concurrent_investors_never_oversell() {
        let mut bonds = demo_bonds();
        bonds[0].available_supply = xof(650_000);
        let h = harness_with(bonds);
        let user = investor(&h, "a@example.com");

        let placed: usize = std::thread::scope(|s| {
            let (h, user) = (&h, &user);
            let handles: Vec<_> = (0..16)
                .map(|_| s.spawn(move || invest(h, user, 1, 65_000).is_ok()))
                .collect();
            handles
                .into_iter()
                .map(|t| usize::from(t.join().unwrap()))
                .sum()
        });
        assert_eq!(placed, 10);
        assert_eq!(available(&h, 1), xof(0));
    }

    #[test]
    fn test_invalid_wallet_address() {
        let h = harness();
        let user = investor(&h, "a@example.com");
        let err = h
            .ledger
            .invest(
                &user,
                1,
                &InvestRequest {
                    amount: 65_000,
                    wallet_address: Some("0x123".into()),
                },
            )
            .unwrap_err();
        assert_eq!(err.code(), "validation_failed");
    }

    #[test]
    fn test_cancel_only_once() {
        let h = harness();
        let user = investor(&h, "a@example.com");
        let id = invest(&h, &user, 1, 65_000).unwrap().transaction.id;
        let before = available(&h, 1);

        let cancelled = h.ledger.cancel(&user, id).unwrap();
        assert_eq!(cancelled.status, TransactionStatus::Cancelled);
        assert_eq!(h.ledger.cancel(&user, id).unwrap_err(), BondsError::NotCancellable);
        assert_eq!(available(&h, 1), before);
    }

    #[test]
    fn test_cancel_foreign_transaction_is_not_found() {
        let h = harness();
        let owner = investor(&h, "a@example.com");
        let other = investor(&h, "b@example.com");
        let id = invest(&h, &owner, 1, 65_000).unwrap().transaction.id;
        assert_eq!(
            h.ledger.cancel(&other, id).unwrap_err(),
            BondsError::NotFound("transaction")
        );
        assert_eq!(
            h.ledger.get(&other, id).unwrap_err(),
            BondsError::NotFound("transaction")
        );
    }

    #[test]
    fn test_confirm_settles_and_counts_investment() {
        let h = harness();
        let user = investor(&h, "a@example.com");
        let id = invest(&h, &user, 1, 65_000).unwrap().transaction.id;

        let tx = h
            .ledger
            .confirm(id, &ConfirmRequest { block_number: Some(18_600_123) })
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);
        let stored = h.users.find_by_id(user.id).unwrap().unwrap();
        assert_eq!(stored.total_invested, xof(65_000));

        assert_eq!(
            h.ledger.confirm(id, &ConfirmRequest::default()).unwrap_err(),
            BondsError::InvalidTransition
        );
        assert_eq!(h.ledger.cancel(&user, id).unwrap_err(), BondsError::NotCancellable);

        let detail = h.ledger.get(&user, id).unwrap();
        assert_eq!(detail.confirmations, 25);
        assert!(detail.receipt_generated);
        assert!(detail.explorer_url.ends_with(&detail.transaction.tx_hash));
    }

    #[test]
    fn test_get_reports_settlement_details() {
        let h = harness();
        let user = investor(&h, "a@example.com");
        let tx = invest(&h, &user, 1, 65_000).unwrap().transaction;

        let pending = h.ledger.get(&user, tx.id).unwrap();
        assert_eq!(pending.confirmations, 0);
        assert!(!pending.receipt_generated);
        assert_eq!(pending.network, "Polygon");
        assert!(pending.explorer_url.ends_with(&tx.tx_hash));

        h.ledger
            .confirm(
                tx.id,
                &ConfirmRequest {
                    block_number: Some(18_600_000),
                },
            )
            .unwrap();
        let settled = h.ledger.get(&user, tx.id).unwrap();
        assert_eq!(settled.confirmations, 25);
        assert!(settled.receipt_generated);
    }

    #[test]
    fn test_confirm_without_owner_stays_pending() {
        let h = harness();
        let user = unsaved_investor(&h, "ghost@example.com");
        let id = invest(&h, &user, 1, 65_000).unwrap().transaction.id;

        assert_eq!(
            h.ledger.confirm(id, &ConfirmRequest::default()).unwrap_err(),
            BondsError::NotFound("user")
        );
        assert_eq!(
            h.ledger.get(&user, id).unwrap().transaction.status,
            TransactionStatus::Pending
        );

        // Retry once the owner exists
        h.users.insert(user.clone()).unwrap();
        h.ledger.confirm(id, &ConfirmRequest::default()).unwrap();
        let stored = h.users.find_by_id(user.id).unwrap().unwrap();
        assert_eq!(stored.total_invested, xof(65_000));
    }

    #[test]
    fn test_confirm_rejected_leaves_total_invested() {
        let h = harness();
        let user = investor(&h, "a@example.com");
        let id = invest(&h, &user, 1, 65_000).unwrap().transaction.id;
        h.ledger.confirm(id, &ConfirmRequest::default()).unwrap();
        assert!(h.ledger.confirm(id, &ConfirmRequest::default()).is_err());

        let stored = h.users.find_by_id(user.id).unwrap().unwrap();
        assert_eq!(stored.total_invested, xof(65_000));
    }

    #[test]
    fn test_confirm_cancelled_is_rejected() {
        let h = harness();
        let user = investor(&h, "a@example.com");
        let id = invest(&h, &user, 1, 65_000).unwrap().transaction.id;
        h.ledger.cancel(&user, id).unwrap();
        assert_eq!(
            h.ledger.confirm(id, &ConfirmRequest::default()).unwrap_err(),
            BondsError::InvalidTransition
        );
    }

    #[test]
    fn test_simulate_does_not_write() {
        let h = harness();
        let before = available(&h, 1);
        let buy = h
            .ledger
            .simulate(&SimulateRequest {
                bond_id: 1,
                amount: 65_000,
                kind: TransactionType::Buy,
            })
            .unwrap();
        let sell = h
            .ledger
            .simulate(&SimulateRequest {
                bond_id: 1,
                amount: 65_000,
                kind: TransactionType::Sell,
            })
            .unwrap();
        assert_eq!(buy.total_cost, xof(65_325));
        assert_eq!(sell.total_cost, xof(64_675));
        assert_eq!(buy.tokens, sell.tokens);
        assert_eq!(available(&h, 1), before);
    }

    #[test]
    fn test_record_rejects_duplicate_hash() {
        let h = harness();
        let user = investor(&h, "a@example.com");
        let req = RecordRequest {
            bond_id: 2,
            amount: 130_000,
            kind: TransactionType::Buy,
            tx_hash: format!("0x{}", "ab".repeat(32)),
        };
        let tx = h.ledger.record(&user, &req).unwrap();
        assert_eq!(tx.fee, xof(650));
        assert_eq!(
            h.ledger.record(&user, &req).unwrap_err(),
            BondsError::DuplicateTransaction
        );
    }

    #[test]
    fn test_failed_append_returns_supply() {
        let h = harness_on(demo_bonds(), Arc::new(RefusingStore::default()));
        let user = investor(&h, "a@example.com");
        let before = available(&h, 1);

        assert!(matches!(
            invest(&h, &user, 1, 65_000),
            Err(BondsError::Internal(_))
        ));
        assert_eq!(available(&h, 1), before);
    }

    #[test]
    fn test_duplicate_hash_past_precheck_returns_supply() {
        // Two submissions of one hash that both got past the lookup in `record`
        let h = harness();
        let user = investor(&h, "a@example.com");
        let bond = h.ledger.bond(2).unwrap();
        let before = available(&h, 2);
        let hash = format!("0x{}", "cd".repeat(32));

        let quote = h.ledger.quote(&bond, xof(130_000), TransactionType::Buy).unwrap();
        h.ledger.place(user.id, &bond, quote.clone(), hash.clone()).unwrap();
        assert_eq!(
            h.ledger.place(user.id, &bond, quote, hash).unwrap_err(),
            BondsError::DuplicateTransaction
        );
        assert_eq!(before.checked_sub(available(&h, 2)).unwrap(), xof(130_000));
    }

    #[test]
    fn test_record_sell_keeps_supply() {
        let h = harness();
        let user = investor(&h, "a@example.com");
        let before = available(&h, 3);
        let tx = h
            .ledger
            .record(
                &user,
                &RecordRequest {
                    bond_id: 3,
                    amount: 70_000,
                    kind: TransactionType::Sell,
                    tx_hash: format!("0x{}", "cd".repeat(32)),
                },
            )
            .unwrap();
        assert_eq!(tx.kind, TransactionType::Sell);
        assert_eq!(available(&h, 3), before);
    }

    #[test]
    fn test_record_validates_hash() {
        let h = harness();
        let user = investor(&h, "a@example.com");
        let err = h
            .ledger
            .record(
                &user,
                &RecordRequest {
                    bond_id: 1,
                    amount: 65_000,
                    kind: TransactionType::Buy,
                    tx_hash: "0x1234".into(),
                },
            )
            .unwrap_err();
        assert_eq!(err.code(), "validation_failed");
    }

    #[test]
    fn test_list_paginates_and_filters() {
        let h = harness();
        let user = investor(&h, "a@example.com");
        let other = investor(&h, "b@example.com");
        for n in 0..12 {
            invest(&h, &user, 1 + (n % 2), 65_000).unwrap();
            h.clock.advance(Duration::minutes(1));
        }
        invest(&h, &other, 1, 65_000).unwrap();
        h.ledger.confirm(1, &ConfirmRequest::default()).unwrap();

        let page = h
            .ledger
            .list(
                &user,
                &TransactionQuery {
                    page: Some(2),
                    limit: Some(5),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(page.transactions.len(), 5);
        assert_eq!(
            page.pagination,
            Pagination {
                current_page: 2,
                total_pages: 3,
                total_items: 12,
                has_next: true,
                has_prev: true,
            }
        );
        assert_eq!(page.stats.total, 12);
        assert_eq!(page.stats.total_invested, xof(65_000));
        assert_eq!(page.stats.total_fees, xof(325));
        assert_eq!(page.stats.average_investment, xof(65_000));
        assert!(page
            .transactions
            .windows(2)
            .all(|w| w[0].timestamp >= w[1].timestamp));

        let on_bond_two = h
            .ledger
            .list(
                &user,
                &TransactionQuery {
                    bond_id: Some(2),
                    status: Some("PENDING".into()),
                    kind: Some("buy".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(on_bond_two.pagination.total_items, 6);
        assert!(!on_bond_two.pagination.has_next);
    }

    #[test]
    fn test_list_rejects_bad_filters() {
        let h = harness();
        let user = investor(&h, "a@example.com");
        let err = h
            .ledger
            .list(
                &user,
                &TransactionQuery {
                    kind: Some("HOLD".into()),
                    limit: Some(0),
                    ..Default::default()
                },
            )
            .unwrap_err();
        let BondsError::Validation(fields) = err else {
            panic!("expected validation failure");
        };
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn test_summary_groups() {
        let h = harness();
        let user = investor(&h, "a@example.com");
        let a = invest(&h, &user, 1, 65_000).unwrap().transaction.id;
        h.clock.set(Utc.with_ymd_and_hms(2025, 9, 3, 8, 0, 0).unwrap());
        let b = invest(&h, &user, 2, 130_000).unwrap().transaction.id;
        invest(&h, &user, 2, 70_000).unwrap();
        h.ledger.confirm(a, &ConfirmRequest::default()).unwrap();
        h.ledger.confirm(b, &ConfirmRequest::default()).unwrap();

        let summary = h.ledger.summary(&user).unwrap();
        assert_eq!(summary.total_transactions, 3);
        assert_eq!(summary.completed_transactions, 2);
        assert_eq!(summary.pending_transactions, 1);
        assert_eq!(summary.total_invested, xof(195_000));
        assert_eq!(summary.total_fees, xof(975));
        assert_eq!(summary.average_transaction_size, xof(88_333));
        assert_eq!(
            summary.transactions_by_month,
            vec![
                MonthBucket {
                    month: "2025-08".into(),
                    count: 1,
                    amount: xof(65_000),
                },
                MonthBucket {
                    month: "2025-09".into(),
                    count: 2,
                    amount: xof(200_000),
                },
            ]
        );
        assert_eq!(summary.bond_distribution[0].symbol, "CI2028");
        assert_eq!(summary.bond_distribution[1].symbol, "BF2027");
        assert!(summary.most_recent_transaction.is_some());
    }

    #[test]
    fn test_stats_ignore_preferred_currency() {
        let h = harness();
        let mut user = investor(&h, "a@example.com");
        let id = invest(&h, &user, 1, 65_000).unwrap().transaction.id;
        h.ledger.confirm(id, &ConfirmRequest::default()).unwrap();
        user = h
            .users
            .modify(user.id, &mut |u| {
                u.preferred_currency = Currency::Eur;
                Ok(())
            })
            .unwrap();

        let page = h.ledger.list(&user, &TransactionQuery::default()).unwrap();
        assert_eq!(page.stats.total_invested, xof(65_000));
        assert_eq!(page.stats.total_fees, xof(325));

        let summary = h.ledger.summary(&user).unwrap();
        assert_eq!(summary.total_invested, xof(65_000));
        assert_eq!(summary.average_transaction_size, xof(65_000));
    }

    #[test]
    fn test_stats_for_empty_ledger() {
        let h = harness();
        let user = investor(&h, "a@example.com");
        let summary = h.ledger.summary(&user).unwrap();
        assert_eq!(summary.total_invested, xof(0));
        assert!(summary.most_recent_transaction.is_none());
    }

    proptest! {
        #[test]
        fn prop_fee_is_half_percent_rounded_half_up(amount in 65_000i64..10_000_000) {
            let h = harness();
            let quote = h
                .ledger
                .simulate(&SimulateRequest { bond_id: 1, amount, kind: TransactionType::Buy })
                .unwrap();
            let expected = (amount * 50 + 5_000) / 10_000;
            prop_assert_eq!(quote.fee, xof(expected));
            prop_assert_eq!(quote.total_cost, xof(amount + expected));
        }
    }
}
