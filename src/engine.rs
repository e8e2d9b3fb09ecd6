// ⚖️ Transfer Engine - the only code allowed to move balances
//
// A transfer is validated, then runs alone inside one process-wide critical
// section: read source, check funds, read destination, write both balances,
// append the record.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use tracing::{error, info, warn};

use crate::entities::{NewTransfer, TransferRecord};
use crate::error::{LedgerError, Result};
use crate::store::{AccountStore, AtomicCommit, TransferLog};

/// Largest amount a single transfer may move (inclusive)
pub const MAX_TRANSFER_AMOUNT: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

/// Reject amounts outside `(0, MAX_TRANSFER_AMOUNT]`
pub fn validate_amount(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO || amount > MAX_TRANSFER_AMOUNT {
        return Err(LedgerError::InvalidAmount(amount));
    }
    Ok(())
}

// ============================================================================
// CRITICAL SECTION
// ============================================================================

/// Global mutual exclusion for the balance-mutating part of a transfer
///
/// Not per-account: transfers on disjoint pairs still run one at a time.
/// The guard releases on drop, so every exit path (including `?`) unlocks.
#[derive(Debug, Default)]
pub struct CriticalSection {
    lock: Mutex<()>,
}

impl CriticalSection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the section is free
    pub fn enter(&self) -> MutexGuard<'_, ()> {
        // The mutex guards no data, so a panic while held leaves nothing torn
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Enter only if nobody else is inside
    pub fn try_enter(&self) -> Option<MutexGuard<'_, ()>> {
        match self.lock.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }
}

// ============================================================================
// COMMIT MODE
// ============================================================================

/// How the debit, credit and log append reach the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitMode {
    /// Three independent writes. A failure after the debit is not rolled back.
    #[default]
    Sequential,

    /// One store transaction through `AtomicCommit`
    Atomic,
}

impl fmt::Display for CommitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitMode::Sequential => f.write_str("sequential"),
            CommitMode::Atomic => f.write_str("atomic"),
        }
    }
}

impl FromStr for CommitMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(CommitMode::Sequential),
            "atomic" => Ok(CommitMode::Atomic),
            other => Err(format!("unknown commit mode: {} (expected sequential or atomic)", other)),
        }
    }
}

// ============================================================================
// TRANSFER ENGINE
// ============================================================================

pub struct TransferEngine {
    accounts: Arc<dyn AccountStore>,
    transfers: Arc<dyn TransferLog>,
    committer: Option<Arc<dyn AtomicCommit>>,
    critical: Arc<CriticalSection>,
}

impl TransferEngine {
    /// Engine with sequential commits and its own critical section
    pub fn new(accounts: Arc<dyn AccountStore>, transfers: Arc<dyn TransferLog>) -> Self {
        TransferEngine {
            accounts,
            transfers,
            committer: None,
            critical: Arc::new(CriticalSection::new()),
        }
    }

    /// Route the three writes through one store transaction
    pub fn with_atomic_commit(mut self, committer: Arc<dyn AtomicCommit>) -> Self {
        self.committer = Some(committer);
        self
    }

    /// Handle on the section this engine serializes on (for read serialization)
    pub fn critical_section(&self) -> Arc<CriticalSection> {
        Arc::clone(&self.critical)
    }

    pub fn commit_mode(&self) -> CommitMode {
        if self.committer.is_some() {
            CommitMode::Atomic
        } else {
            CommitMode::Sequential
        }
    }

    /// Move `amount` from one account to another
    ///
    /// Amount validation happens before the lock so malformed requests never
    /// contend for it. Returns the appended `success` record.
    pub fn transfer_funds(&self, from: &str, to: &str, amount: Decimal) -> Result<TransferRecord> {
        if let Err(err) = validate_amount(amount) {
            warn!(from, to, %amount, "Transfer rejected: {}", err);
            return Err(err);
        }

        if from == to {
            warn!(from, to, %amount, "Transfer rejected: same account");
            return Err(LedgerError::Validation(
                "source and destination accounts must differ".to_string(),
            ));
        }

        let result = {
            let _guard = self.critical.enter();
            self.apply(from, to, amount)
        };

        match &result {
            Ok(record) => info!(
                transfer_id = record.id,
                %amount,
                "Transfer completed: {} -> {}", from, to
            ),
            Err(err) if err.is_client_error() => {
                warn!(from, to, %amount, code = err.code(), "Transfer rejected: {}", err)
            }
            Err(err) => error!(
                from,
                to,
                %amount,
                mode = %self.commit_mode(),
                "Transfer failed in storage: {}", err
            ),
        }

        result
    }

    // Caller holds the critical section
    fn apply(&self, from: &str, to: &str, amount: Decimal) -> Result<TransferRecord> {
        let source = self.accounts.get(from)?;

        if !source.can_cover(amount) {
            return Err(LedgerError::InsufficientBalance {
                account_number: source.account_number,
                balance: source.balance,
                requested: amount,
            });
        }

        // Destination must be known before anything is written
        let destination = self.accounts.get(to)?;

        // Both new balances are computed before anything is written
        let debited = source.debited(amount)?;
        let credited = destination.credited(amount)?;
        let transfer = NewTransfer::success(from, to, amount);

        match &self.committer {
            Some(committer) => committer.commit_transfer(&debited, &credited, transfer),
            None => {
                // No rollback: a failure below leaves the debit persisted
                self.accounts.put(&debited)?;
                self.accounts.put(&credited)?;
                self.transfers.append(transfer)
            }
        }
    }

    /// Every transfer touching the account, newest first
    ///
    /// Unknown accounts simply have no history.
    pub fn get_transfer_history(&self, account_number: &str) -> Result<Vec<TransferRecord>> {
        self.transfers.query_by_account(account_number)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Account, NewAccount, TransferStatus};
    use crate::memory::MemoryStore;
    use rust_decimal_macros::dec;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    /// Wraps the memory store, recording lookups and failing chosen writes
    #[derive(Default)]
    struct SpyStore {
        inner: MemoryStore,
        gets: Mutex<Vec<String>>,
        puts: Mutex<Vec<String>>,
        fail_put_for: Option<String>,
        fail_append: bool,
    }

    impl SpyStore {
        fn gets(&self) -> Vec<String> {
            self.gets.lock().unwrap().clone()
        }

        fn puts(&self) -> Vec<String> {
            self.puts.lock().unwrap().clone()
        }
    }

    impl AccountStore for SpyStore {
        fn get(&self, account_number: &str) -> Result<Account> {
            self.gets.lock().unwrap().push(account_number.to_string());
            self.inner.get(account_number)
        }

        fn put(&self, account: &Account) -> Result<()> {
            if self.fail_put_for.as_deref() == Some(account.account_number.as_str()) {
                return Err(LedgerError::store("disk I/O error"));
            }
            self.puts.lock().unwrap().push(account.account_number.clone());
            self.inner.put(account)
        }

        fn insert(&self, account: NewAccount) -> Result<Account> {
            self.inner.insert(account)
        }

        fn list_all(&self) -> Result<Vec<Account>> {
            self.inner.list_all()
        }
    }

    impl TransferLog for SpyStore {
        fn append(&self, transfer: NewTransfer) -> Result<TransferRecord> {
            if self.fail_append {
                return Err(LedgerError::store("log unavailable"));
            }
            self.inner.append(transfer)
        }

        fn query_by_account(&self, account_number: &str) -> Result<Vec<TransferRecord>> {
            self.inner.query_by_account(account_number)
        }
    }

    fn seed(store: &dyn AccountStore) {
        store.insert(NewAccount::new("Alice", "111", dec!(1000.0))).unwrap();
        store.insert(NewAccount::new("Bob", "222", dec!(500.0))).unwrap();
    }

    fn engine_over(store: Arc<SpyStore>) -> TransferEngine {
        seed(store.as_ref());
        TransferEngine::new(store.clone(), store)
    }

    fn memory_engine() -> (Arc<MemoryStore>, TransferEngine) {
        let store = Arc::new(MemoryStore::new());
        seed(store.as_ref());
        let engine = TransferEngine::new(store.clone(), store.clone());
        (store, engine)
    }

    #[test]
    fn test_validate_amount_bounds() {
        assert!(validate_amount(dec!(0.01)).is_ok());
        assert!(validate_amount(dec!(10000)).is_ok());
        assert!(validate_amount(dec!(10000.00)).is_ok());

        for bad in [dec!(0), dec!(-5), dec!(10000.01), dec!(20000.0)] {
            assert!(matches!(validate_amount(bad), Err(LedgerError::InvalidAmount(_))));
        }
    }

    #[test]
    fn test_successful_transfer_moves_balances_and_logs_once() {
        let (store, engine) = memory_engine();

        let record = engine.transfer_funds("111", "222", dec!(200.0)).unwrap();

        assert_eq!(store.get("111").unwrap().balance, dec!(800.0));
        assert_eq!(store.get("222").unwrap().balance, dec!(700.0));
        assert_eq!(record.status, TransferStatus::Success);
        assert_eq!(record.amount, dec!(200.0));
        assert_eq!(store.all_transfers(), vec![record.clone()]);

        assert_eq!(engine.get_transfer_history("111").unwrap(), vec![record.clone()]);
        assert_eq!(engine.get_transfer_history("222").unwrap(), vec![record]);
    }

    #[test]
    fn test_exact_balance_can_be_transferred() {
        let (store, engine) = memory_engine();

        engine.transfer_funds("222", "111", dec!(500.0)).unwrap();

        assert_eq!(store.get("222").unwrap().balance, dec!(0));
        assert_eq!(store.get("111").unwrap().balance, dec!(1500.0));
    }

    #[test]
    fn test_invalid_amount_never_touches_the_store() {
        let store = Arc::new(SpyStore::default());
        let engine = engine_over(store.clone());

        for amount in [dec!(20000.0), dec!(0), dec!(-1)] {
            let err = engine.transfer_funds("111", "222", amount).unwrap_err();
            assert!(matches!(err, LedgerError::InvalidAmount(_)));
        }

        assert!(store.gets().is_empty());
        assert!(store.puts().is_empty());
        assert_eq!(store.inner.get("111").unwrap().balance, dec!(1000.0));
        assert!(store.inner.all_transfers().is_empty());
    }

    #[test]
    fn test_insufficient_balance_stops_before_destination_lookup() {
        let store = Arc::new(SpyStore::default());
        let engine = engine_over(store.clone());

        let err = engine.transfer_funds("222", "111", dec!(500.01)).unwrap_err();

        assert!(matches!(
            err,
            LedgerError::InsufficientBalance { ref account_number, .. } if account_number == "222"
        ));
        assert_eq!(store.gets(), vec!["222".to_string()]);
        assert!(store.puts().is_empty());
        assert!(store.inner.all_transfers().is_empty());
    }

    #[test]
    fn test_unknown_destination_is_not_found_without_mutation() {
        let store = Arc::new(SpyStore::default());
        let engine = engine_over(store.clone());

        let err = engine.transfer_funds("111", "999", dec!(50.0)).unwrap_err();

        assert!(matches!(err, LedgerError::NotFound(ref n) if n == "999"));
        assert!(store.puts().is_empty());
        assert_eq!(store.inner.get("111").unwrap().balance, dec!(1000.0));
        assert!(store.inner.all_transfers().is_empty());
    }

    #[test]
    fn test_unknown_source_is_not_found() {
        let (store, engine) = memory_engine();

        let err = engine.transfer_funds("999", "111", dec!(50.0)).unwrap_err();

        assert!(matches!(err, LedgerError::NotFound(ref n) if n == "999"));
        assert_eq!(store.get("111").unwrap().balance, dec!(1000.0));
    }

    #[test]
    fn test_same_account_is_rejected() {
        let (store, engine) = memory_engine();

        let err = engine.transfer_funds("111", "111", dec!(10)).unwrap_err();

        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(store.get("111").unwrap().balance, dec!(1000.0));
    }

    #[test]
    fn test_credit_overflow_is_rejected_without_mutation() {
        for mode in [CommitMode::Sequential, CommitMode::Atomic] {
            let store = Arc::new(SpyStore::default());
            store.insert(NewAccount::new("Alice", "111", dec!(1000.0))).unwrap();
            store.insert(NewAccount::new("Whale", "777", Decimal::MAX)).unwrap();

            let mut engine = TransferEngine::new(store.clone(), store.clone());
            if mode == CommitMode::Atomic {
                engine = engine.with_atomic_commit(Arc::new(MemoryStore::new()));
            }

            let err = engine.transfer_funds("111", "777", dec!(1)).unwrap_err();

            assert!(matches!(err, LedgerError::Validation(_)), "{}", mode);
            assert_eq!(err.http_status(), 400);
            assert!(store.puts().is_empty());
            assert_eq!(store.inner.get("111").unwrap().balance, dec!(1000.0));
            assert_eq!(store.inner.get("777").unwrap().balance, Decimal::MAX);
            assert!(store.inner.all_transfers().is_empty());

            // lock released, ledger still usable
            assert!(engine.critical_section().try_enter().is_some());
        }
    }

    #[test]
    fn test_sequential_credit_failure_leaves_debit_persisted() {
        let store = Arc::new(SpyStore {
            fail_put_for: Some("222".to_string()),
            ..SpyStore::default()
        });
        let engine = engine_over(store.clone());

        let err = engine.transfer_funds("111", "222", dec!(200.0)).unwrap_err();

        assert!(matches!(err, LedgerError::Store(_)));
        // Known gap: the debit is not rolled back
        assert_eq!(store.inner.get("111").unwrap().balance, dec!(800.0));
        assert_eq!(store.inner.get("222").unwrap().balance, dec!(500.0));
        assert!(store.inner.all_transfers().is_empty());
    }

    #[test]
    fn test_sequential_log_failure_is_reported_as_store_error() {
        let store = Arc::new(SpyStore {
            fail_append: true,
            ..SpyStore::default()
        });
        let engine = engine_over(store.clone());

        let err = engine.transfer_funds("111", "222", dec!(200.0)).unwrap_err();

        assert!(matches!(err, LedgerError::Store(_)));
        assert_eq!(store.puts(), vec!["111".to_string(), "222".to_string()]);
    }

    #[test]
    fn test_atomic_mode_uses_committer() {
        let store = Arc::new(MemoryStore::new());
        seed(store.as_ref());
        let engine = TransferEngine::new(store.clone(), store.clone()).with_atomic_commit(store.clone());

        assert_eq!(engine.commit_mode(), CommitMode::Atomic);
        engine.transfer_funds("111", "222", dec!(200.0)).unwrap();

        assert_eq!(store.get("111").unwrap().balance, dec!(800.0));
        assert_eq!(store.get("222").unwrap().balance, dec!(700.0));
        assert_eq!(store.all_transfers().len(), 1);
    }

    #[test]
    fn test_lock_is_released_after_failure() {
        let (_store, engine) = memory_engine();

        assert!(engine.transfer_funds("111", "999", dec!(1)).is_err());
        assert!(engine.transfer_funds("222", "111", dec!(9999)).is_err());

        assert!(engine.critical_section().try_enter().is_some());
    }

    #[test]
    fn test_transfer_waits_for_the_critical_section() {
        let (store, engine) = memory_engine();
        let engine = Arc::new(engine);
        let critical = engine.critical_section();

        let guard = critical.enter();

        let (tx, rx) = mpsc::channel();
        let worker = {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let result = engine.transfer_funds("111", "222", dec!(1));
                tx.send(result.is_ok()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(store.get("111").unwrap().balance, dec!(1000.0));

        drop(guard);
        assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap());
        worker.join().unwrap();
        assert_eq!(store.get("111").unwrap().balance, dec!(999.0));
    }

    #[test]
    fn test_concurrent_transfers_lose_no_update() {
        let store = Arc::new(MemoryStore::new());
        for (name, number) in [("A", "a"), ("B", "b"), ("C", "c"), ("D", "d")] {
            store.insert(NewAccount::new(name, number, dec!(1000))).unwrap();
        }
        let engine = Arc::new(TransferEngine::new(store.clone(), store.clone()));

        let pairs = [("a", "b"), ("c", "d"), ("b", "a"), ("d", "c"), ("a", "c")];
        let handles: Vec<_> = pairs
            .iter()
            .map(|&(from, to)| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    for _ in 0..50 {
                        engine.transfer_funds(from, to, dec!(1)).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let balance = |n: &str| store.get(n).unwrap().balance;
        assert_eq!(balance("a"), dec!(950));
        assert_eq!(balance("b"), dec!(1000));
        assert_eq!(balance("c"), dec!(1050));
        assert_eq!(balance("d"), dec!(1000));

        let total: Decimal = store.list_all().unwrap().iter().map(|a| a.balance).sum();
        assert_eq!(total, dec!(4000));
        assert_eq!(store.all_transfers().len(), 250);
    }

    #[test]
    fn test_commit_mode_parsing() {
        assert_eq!("atomic".parse::<CommitMode>().unwrap(), CommitMode::Atomic);
        assert_eq!(" Sequential ".parse::<CommitMode>().unwrap(), CommitMode::Sequential);
        assert!("eventual".parse::<CommitMode>().is_err());
        assert_eq!(CommitMode::default(), CommitMode::Sequential);
    }
}
