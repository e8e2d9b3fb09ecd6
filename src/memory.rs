// In-memory store - test double and ephemeral mode
//
// Same contract as the SQLite store: accounts keep insertion order, ids are
// monotonic, history is newest first.

use chrono::Utc;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::entities::{sort_newest_first, Account, NewAccount, NewTransfer, TransferRecord};
use crate::error::{LedgerError, Result};
use crate::store::{AccountStore, AtomicCommit, TransferLog};

#[derive(Default)]
struct AccountTable {
    rows: Vec<Account>,
    next_id: i64,
}

impl AccountTable {
    fn position(&self, account_number: &str) -> Option<usize> {
        self.rows.iter().position(|a| a.account_number == account_number)
    }

    fn overwrite(&mut self, account: &Account) -> Result<()> {
        let idx = self
            .position(&account.account_number)
            .ok_or_else(|| LedgerError::NotFound(account.account_number.clone()))?;
        self.rows[idx].balance = account.balance;
        Ok(())
    }
}

#[derive(Default)]
struct TransferTable {
    rows: Vec<TransferRecord>,
    next_id: i64,
}

impl TransferTable {
    fn push(&mut self, transfer: NewTransfer) -> TransferRecord {
        self.next_id += 1;
        let record = transfer.into_record(self.next_id, Utc::now());
        self.rows.push(record.clone());
        record
    }
}

/// Account and transfer store held entirely in memory
#[derive(Default)]
pub struct MemoryStore {
    accounts: RwLock<AccountTable>,
    transfers: RwLock<TransferTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn accounts(&self) -> RwLockReadGuard<'_, AccountTable> {
        self.accounts.read().unwrap_or_else(|p| p.into_inner())
    }

    fn accounts_mut(&self) -> RwLockWriteGuard<'_, AccountTable> {
        self.accounts.write().unwrap_or_else(|p| p.into_inner())
    }

    fn transfers(&self) -> RwLockReadGuard<'_, TransferTable> {
        self.transfers.read().unwrap_or_else(|p| p.into_inner())
    }

    fn transfers_mut(&self) -> RwLockWriteGuard<'_, TransferTable> {
        self.transfers.write().unwrap_or_else(|p| p.into_inner())
    }

    /// Every logged transfer, oldest first
    pub fn all_transfers(&self) -> Vec<TransferRecord> {
        self.transfers().rows.clone()
    }
}

impl AccountStore for MemoryStore {
    fn get(&self, account_number: &str) -> Result<Account> {
        let table = self.accounts();
        table
            .position(account_number)
            .map(|idx| table.rows[idx].clone())
            .ok_or_else(|| LedgerError::NotFound(account_number.to_string()))
    }

    fn put(&self, account: &Account) -> Result<()> {
        self.accounts_mut().overwrite(account)
    }

    fn insert(&self, account: NewAccount) -> Result<Account> {
        let mut table = self.accounts_mut();
        if table.position(&account.account_number).is_some() {
            return Err(LedgerError::Conflict(account.account_number));
        }

        table.next_id += 1;
        let created = account.into_account(table.next_id);
        table.rows.push(created.clone());
        Ok(created)
    }

    fn list_all(&self) -> Result<Vec<Account>> {
        Ok(self.accounts().rows.clone())
    }
}

impl TransferLog for MemoryStore {
    fn append(&self, transfer: NewTransfer) -> Result<TransferRecord> {
        Ok(self.transfers_mut().push(transfer))
    }

    fn query_by_account(&self, account_number: &str) -> Result<Vec<TransferRecord>> {
        let mut matching: Vec<TransferRecord> = self
            .transfers()
            .rows
            .iter()
            .filter(|t| t.involves(account_number))
            .cloned()
            .collect();

        sort_newest_first(&mut matching);
        Ok(matching)
    }
}

impl AtomicCommit for MemoryStore {
    fn commit_transfer(
        &self,
        source: &Account,
        destination: &Account,
        transfer: NewTransfer,
    ) -> Result<TransferRecord> {
        // Lock order: accounts, then transfers
        let mut accounts = self.accounts_mut();
        let mut transfers = self.transfers_mut();

        for account in [source, destination] {
            if accounts.position(&account.account_number).is_none() {
                return Err(LedgerError::NotFound(account.account_number.clone()));
            }
        }

        accounts.overwrite(source)?;
        accounts.overwrite(destination)?;
        Ok(transfers.push(transfer))
    }
}
