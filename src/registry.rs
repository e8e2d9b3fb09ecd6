// 📇 Account Registry - create and read accounts
//
// Guards the identity invariants: required fields, unique account number.
// Balance reads can optionally queue behind in-flight transfers.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

use crate::engine::CriticalSection;
use crate::entities::{Account, NewAccount};
use crate::error::{LedgerError, Result};
use crate::store::AccountStore;

/// Outcome of a bulk import
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub duplicates: usize,
    pub invalid: usize,
}

pub struct AccountRegistry {
    store: Arc<dyn AccountStore>,
    read_lock: Option<Arc<CriticalSection>>,
}

impl AccountRegistry {
    /// Registry whose reads may observe a transfer between its two writes
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        AccountRegistry {
            store,
            read_lock: None,
        }
    }

    /// Registry whose balance reads wait for any transfer in progress
    pub fn serialized_with(store: Arc<dyn AccountStore>, critical: Arc<CriticalSection>) -> Self {
        AccountRegistry {
            store,
            read_lock: Some(critical),
        }
    }

    fn read<T>(&self, f: impl FnOnce(&dyn AccountStore) -> Result<T>) -> Result<T> {
        match &self.read_lock {
            Some(critical) => {
                let _guard = critical.enter();
                f(self.store.as_ref())
            }
            None => f(self.store.as_ref()),
        }
    }

    /// Open a new account
    pub fn create_account(
        &self,
        name: &str,
        account_number: &str,
        initial_balance: Decimal,
    ) -> Result<Account> {
        self.create(NewAccount::new(name, account_number, initial_balance))
    }

    pub fn create(&self, account: NewAccount) -> Result<Account> {
        account.validate()?;

        match self.store.insert(account) {
            Ok(created) => {
                info!(
                    account_id = created.id,
                    balance = %created.balance,
                    "Account created: {}", created.account_number
                );
                Ok(created)
            }
            Err(err) => {
                warn!(code = err.code(), "Account creation failed: {}", err);
                Err(err)
            }
        }
    }

    /// Every account in insertion order (empty is fine)
    pub fn list_accounts(&self) -> Result<Vec<Account>> {
        self.read(|store| store.list_all())
    }

    pub fn get_account(&self, account_number: &str) -> Result<Account> {
        self.read(|store| store.get(account_number))
    }

    /// Create many accounts; duplicates and invalid rows are counted, not fatal
    pub fn import(&self, accounts: Vec<NewAccount>) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();

        for account in accounts {
            match self.create(account) {
                Ok(_) => summary.inserted += 1,
                Err(LedgerError::Conflict(_)) => summary.duplicates += 1,
                Err(LedgerError::Validation(_)) => summary.invalid += 1,
                Err(err) => return Err(err),
            }
        }

        Ok(summary)
    }

    /// Sum of all balances (conserved by every successful transfer)
    pub fn total_balance(&self) -> Result<Decimal> {
        self.list_accounts()?
            .iter()
            .try_fold(Decimal::ZERO, |total, account| total.checked_add(account.balance))
            .ok_or_else(|| {
                LedgerError::Validation("total balance exceeds the representable range".to_string())
            })
    }
}
