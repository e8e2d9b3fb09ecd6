// Store capabilities consumed by the registry and the transfer engine
//
// Two narrow interfaces (accounts, transfer log) plus an optional atomic
// commit capability for stores that support transactions.

use crate::entities::{Account, NewAccount, NewTransfer, TransferRecord};
use crate::error::Result;

/// Account Ledger Store - accounts keyed by account number
pub trait AccountStore: Send + Sync {
    /// Lookup by key; `LedgerError::NotFound` when absent
    fn get(&self, account_number: &str) -> Result<Account>;

    /// Overwrite the stored balance for `account.account_number`
    fn put(&self, account: &Account) -> Result<()>;

    /// Create; `LedgerError::Conflict` when the number is already taken
    fn insert(&self, account: NewAccount) -> Result<Account>;

    /// Every account in insertion order
    fn list_all(&self) -> Result<Vec<Account>>;
}

/// Transfer Log Store - append-only
pub trait TransferLog: Send + Sync {
    /// Persist a record; the store assigns id and created_at
    fn append(&self, transfer: NewTransfer) -> Result<TransferRecord>;

    /// Records where the account is either side, newest first
    fn query_by_account(&self, account_number: &str) -> Result<Vec<TransferRecord>>;
}

/// Debit, credit and log append applied as one unit
pub trait AtomicCommit: Send + Sync {
    fn commit_transfer(
        &self,
        source: &Account,
        destination: &Account,
        transfer: NewTransfer,
    ) -> Result<TransferRecord>;
}
