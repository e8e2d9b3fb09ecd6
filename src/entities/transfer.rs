// 🔁 Transfer Record - append-only log of completed transfers
//
// Once persisted a record is never mutated or deleted. It is the source of
// truth for "what happened", independent of current balances.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// TRANSFER STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    /// Both balances moved and the record was appended
    Success,

    /// Recorded failure (the engine only logs successes today)
    Failed,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Success => "success",
            TransferStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(TransferStatus::Success),
            "failed" => Ok(TransferStatus::Failed),
            other => Err(format!("unknown transfer status: {}", other)),
        }
    }
}

// ============================================================================
// TRANSFER RECORD
// ============================================================================

/// Persisted transfer, as returned by history queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    /// Monotonic id assigned by the store
    pub id: i64,

    #[serde(rename = "from_account_num")]
    pub from_account_number: String,

    #[serde(rename = "to_account_num")]
    pub to_account_number: String,

    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub amount: Decimal,

    pub status: TransferStatus,

    /// Persistence time - sole sort key for history (newest first)
    pub created_at: DateTime<Utc>,
}

impl TransferRecord {
    /// True when the account is either side of this transfer
    pub fn involves(&self, account_number: &str) -> bool {
        self.from_account_number == account_number || self.to_account_number == account_number
    }
}

/// Transfer waiting to be appended; id and timestamp come from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransfer {
    pub from_account_number: String,
    pub to_account_number: String,
    pub amount: Decimal,
    pub status: TransferStatus,
}

impl NewTransfer {
    pub fn success(from: &str, to: &str, amount: Decimal) -> Self {
        NewTransfer {
            from_account_number: from.to_string(),
            to_account_number: to.to_string(),
            amount,
            status: TransferStatus::Success,
        }
    }

    pub fn into_record(self, id: i64, created_at: DateTime<Utc>) -> TransferRecord {
        TransferRecord {
            id,
            from_account_number: self.from_account_number,
            to_account_number: self.to_account_number,
            amount: self.amount,
            status: self.status,
            created_at,
        }
    }
}

/// Newest first; equal timestamps fall back to the id so the order is strict
pub fn sort_newest_first(records: &mut [TransferRecord]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}
