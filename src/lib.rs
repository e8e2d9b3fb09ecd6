// Ledger Transfer - Core Library
// Exposes all modules for use in the CLI, the API server, and tests

pub mod config;
pub mod db;
pub mod engine;
pub mod entities;
pub mod error;
pub mod logging;
pub mod memory;
pub mod registry;
pub mod service;
pub mod store;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{load_accounts_csv, setup_database, SqliteStore};
pub use engine::{validate_amount, CommitMode, CriticalSection, TransferEngine, MAX_TRANSFER_AMOUNT};
pub use entities::{Account, NewAccount, NewTransfer, TransferRecord, TransferStatus};
pub use error::{LedgerError, Result};
pub use memory::MemoryStore;
pub use registry::{AccountRegistry, ImportSummary};
pub use service::LedgerService;
pub use store::{AccountStore, AtomicCommit, TransferLog};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
