//! Investment ledger entries and their status machine.

use super::bond::BondId;
use super::error::{BondsError, BondsResult};
use super::money::Money;
use super::user::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type TransactionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Buy,
    Sell,
}

/// `pending -> completed | cancelled`. Both terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Cancelled,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

/// Fields of a transaction before the ledger assigns its id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub user_id: UserId,
    pub bond_id: BondId,
    pub bond_symbol: String,
    pub kind: TransactionType,
    pub amount: Money,
    pub price: Money,
    pub tokens: f64,
    pub fee: Money,
    pub total_cost: Money,
    pub tx_hash: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: UserId,
    pub bond_id: BondId,
    pub bond_symbol: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: Money,
    pub price: Money,
    pub tokens: f64,
    pub fee: Money,
    pub total_cost: Money,
    pub status: TransactionStatus,
    pub tx_hash: String,
    pub block_number: Option<u64>,
    pub timestamp: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Materialize a ledger entry in `pending` status.
    pub fn from_new(id: TransactionId, new: NewTransaction) -> Self {
        Self {
            id,
            user_id: new.user_id,
            bond_id: new.bond_id,
            bond_symbol: new.bond_symbol,
            kind: new.kind,
            amount: new.amount,
            price: new.price,
            tokens: new.tokens,
            fee: new.fee,
            total_cost: new.total_cost,
            status: TransactionStatus::Pending,
            tx_hash: new.tx_hash,
            block_number: None,
            timestamp: new.timestamp,
            updated_at: new.timestamp,
        }
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> BondsResult<()> {
        if self.status != TransactionStatus::Pending {
            return Err(BondsError::NotCancellable);
        }
        self.status = TransactionStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }

    /// Settlement confirmation.
    pub fn complete(&mut self, block_number: Option<u64>, now: DateTime<Utc>) -> BondsResult<()> {
        if self.status != TransactionStatus::Pending {
            return Err(BondsError::InvalidTransition);
        }
        self.status = TransactionStatus::Completed;
        self.block_number = block_number;
        self.updated_at = now;
        Ok(())
    }

    pub fn is_completed_buy(&self) -> bool {
        self.kind == TransactionType::Buy && self.status == TransactionStatus::Completed
    }
}
