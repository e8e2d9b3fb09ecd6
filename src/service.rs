// Ledger service - wires stores, registry and engine together
//
// The registry shares the engine's critical section, so balance reads never
// land between the debit and the credit of a transfer.

use anyhow::Result as AnyResult;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

use crate::config::AppConfig;
use crate::db::SqliteStore;
use crate::engine::{CommitMode, TransferEngine};
use crate::entities::{Account, NewAccount, TransferRecord};
use crate::error::Result;
use crate::memory::MemoryStore;
use crate::registry::{AccountRegistry, ImportSummary};
use crate::store::{AccountStore, AtomicCommit, TransferLog};

pub struct LedgerService {
    registry: AccountRegistry,
    engine: TransferEngine,
}

impl LedgerService {
    /// Build over any store that provides all three capabilities
    pub fn with_store<S>(store: Arc<S>, mode: CommitMode) -> Self
    where
        S: AccountStore + TransferLog + AtomicCommit + 'static,
    {
        let mut engine = TransferEngine::new(store.clone(), store.clone());
        if mode == CommitMode::Atomic {
            engine = engine.with_atomic_commit(store.clone());
        }
        let registry = AccountRegistry::serialized_with(store, engine.critical_section());

        LedgerService { registry, engine }
    }

    /// SQLite-backed service as described by the config
    pub fn open(config: &AppConfig) -> AnyResult<Self> {
        let store = Arc::new(SqliteStore::open(&config.db_path)?);
        info!(
            db = %config.db_path.display(),
            mode = %config.commit_mode,
            "Ledger opened"
        );
        Ok(Self::with_store(store, config.commit_mode))
    }

    /// Ephemeral service (nothing survives the process)
    pub fn in_memory(mode: CommitMode) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), mode)
    }

    pub fn registry(&self) -> &AccountRegistry {
        &self.registry
    }

    pub fn engine(&self) -> &TransferEngine {
        &self.engine
    }

    // ========================================================================
    // Operations exposed to the HTTP layer and the CLI
    // ========================================================================

    pub fn create_account(&self, account: NewAccount) -> Result<Account> {
        self.registry.create(account)
    }

    pub fn list_accounts(&self) -> Result<Vec<Account>> {
        self.registry.list_accounts()
    }

    pub fn get_account(&self, account_number: &str) -> Result<Account> {
        self.registry.get_account(account_number)
    }

    pub fn import_accounts(&self, accounts: Vec<NewAccount>) -> Result<ImportSummary> {
        self.registry.import(accounts)
    }

    pub fn transfer_funds(&self, from: &str, to: &str, amount: Decimal) -> Result<TransferRecord> {
        self.engine.transfer_funds(from, to, amount)
    }

    pub fn get_transfer_history(&self, account_number: &str) -> Result<Vec<TransferRecord>> {
        self.engine.get_transfer_history(account_number)
    }
}
