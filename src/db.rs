use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::entities::{Account, NewAccount, NewTransfer, TransferRecord};
use crate::error::{LedgerError, Result};
use crate::store::{AccountStore, AtomicCommit, TransferLog};

pub fn setup_database(conn: &Connection) -> anyhow::Result<()> {
    // Enable WAL mode for crash recovery (in-memory databases stay on "memory")
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Clients Table (accounts)
    // Balances are canonical decimal TEXT - never REAL
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS clients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            account_num TEXT NOT NULL UNIQUE,
            balance TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Transfers Table (append-only log)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS transfers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            from_account_num TEXT NOT NULL,
            to_account_num TEXT NOT NULL,
            amount TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (from_account_num) REFERENCES clients(account_num),
            FOREIGN KEY (to_account_num) REFERENCES clients(account_num)
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transfers_from ON transfers(from_account_num, created_at)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transfers_to ON transfers(to_account_num, created_at)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// ROW MAPPING
// ============================================================================

fn decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let text: String = row.get(idx)?;
    Decimal::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        name: row.get(1)?,
        account_number: row.get(2)?,
        balance: decimal_column(row, 3)?,
    })
}

fn transfer_from_row(row: &Row<'_>) -> rusqlite::Result<TransferRecord> {
    let status_str: String = row.get(4)?;
    let created_at_str: String = row.get(5)?;

    Ok(TransferRecord {
        id: row.get(0)?,
        from_account_number: row.get(1)?,
        to_account_number: row.get(2)?,
        amount: decimal_column(row, 3)?,
        status: status_str.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(4, Type::Text, e.into())
        })?,
        created_at: DateTime::parse_from_rfc3339(&created_at_str)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?
            .with_timezone(&Utc),
    })
}

// ============================================================================
// STATEMENTS (shared by plain and transactional writes)
// ============================================================================

fn update_balance(conn: &Connection, account: &Account) -> Result<()> {
    let changed = conn.execute(
        "UPDATE clients SET balance = ?1 WHERE account_num = ?2",
        params![account.balance.to_string(), account.account_number],
    )?;

    if changed == 0 {
        return Err(LedgerError::NotFound(account.account_number.clone()));
    }
    Ok(())
}

fn insert_transfer(conn: &Connection, transfer: NewTransfer) -> Result<TransferRecord> {
    let created_at = Utc::now();

    conn.execute(
        "INSERT INTO transfers (from_account_num, to_account_num, amount, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            transfer.from_account_number,
            transfer.to_account_number,
            transfer.amount.to_string(),
            transfer.status.as_str(),
            created_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
        ],
    )?;

    Ok(transfer.into_record(conn.last_insert_rowid(), created_at))
}

// ============================================================================
// SQLITE STORE
// ============================================================================

/// SQLite-backed account and transfer store
///
/// One connection behind a mutex, shared by every clone, so each statement
/// runs alone. Multi-statement sequences are only isolated inside
/// `commit_transfer`.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a database file and make sure the schema exists
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {:?}", path))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> anyhow::Result<Self> {
        setup_database(&conn).context("Failed to set up schema")?;
        Ok(SqliteStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of stored accounts
    pub fn count_accounts(&self) -> Result<i64> {
        let count = self
            .conn()
            .query_row("SELECT COUNT(*) FROM clients", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Number of logged transfers
    pub fn count_transfers(&self) -> Result<i64> {
        let count = self
            .conn()
            .query_row("SELECT COUNT(*) FROM transfers", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl AccountStore for SqliteStore {
    fn get(&self, account_number: &str) -> Result<Account> {
        self.conn()
            .query_row(
                "SELECT id, name, account_num, balance FROM clients WHERE account_num = ?1",
                [account_number],
                account_from_row,
            )
            .optional()?
            .ok_or_else(|| LedgerError::NotFound(account_number.to_string()))
    }

    fn put(&self, account: &Account) -> Result<()> {
        update_balance(&self.conn(), account)
    }

    fn insert(&self, account: NewAccount) -> Result<Account> {
        let conn = self.conn();
        let result = conn.execute(
            "INSERT INTO clients (name, account_num, balance) VALUES (?1, ?2, ?3)",
            params![account.name, account.account_number, account.balance.to_string()],
        );

        match result {
            Ok(_) => {
                let id = conn.last_insert_rowid();
                Ok(account.into_account(id))
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(LedgerError::Conflict(account.account_number))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn list_all(&self) -> Result<Vec<Account>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT id, name, account_num, balance FROM clients ORDER BY id ASC")?;

        let accounts = stmt
            .query_map([], account_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(accounts)
    }
}

impl TransferLog for SqliteStore {
    fn append(&self, transfer: NewTransfer) -> Result<TransferRecord> {
        insert_transfer(&self.conn(), transfer)
    }

    fn query_by_account(&self, account_number: &str) -> Result<Vec<TransferRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, from_account_num, to_account_num, amount, status, created_at
             FROM transfers
             WHERE from_account_num = ?1 OR to_account_num = ?1
             ORDER BY created_at DESC, id DESC",
        )?;

        // created_at is fixed-width UTC text, so text order is time order
        let transfers = stmt
            .query_map([account_number], transfer_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(transfers)
    }
}

impl AtomicCommit for SqliteStore {
    fn commit_transfer(
        &self,
        source: &Account,
        destination: &Account,
        transfer: NewTransfer,
    ) -> Result<TransferRecord> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        update_balance(&tx, source)?;
        update_balance(&tx, destination)?;
        let record = insert_transfer(&tx, transfer)?;

        tx.commit()?;
        Ok(record)
    }
}

// ============================================================================
// CSV SEEDING
// ============================================================================

#[derive(Debug, Deserialize)]
struct SeedRow {
    name: String,
    account_num: String,
    balance: String,
}

/// Load account seeds from a CSV with columns `name,account_num,balance`
pub fn load_accounts_csv(csv_path: &Path) -> anyhow::Result<Vec<NewAccount>> {
    let mut rdr = csv::Reader::from_path(csv_path).context("Failed to open CSV file")?;

    let mut accounts = Vec::new();

    for (line, result) in rdr.deserialize().enumerate() {
        let row: SeedRow = result.context("Failed to deserialize account")?;
        let balance = Decimal::from_str(row.balance.trim())
            .with_context(|| format!("Invalid balance {:?} on data row {}", row.balance, line + 1))?;

        accounts.push(NewAccount::new(row.name, row.account_num, balance));
    }

    Ok(accounts)
}
