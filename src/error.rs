// Ledger error taxonomy
// Every failure surfaced by the registry, the engine and the stores

use rust_decimal::Decimal;
use thiserror::Error;

/// Opaque cause of a storage failure
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by every ledger operation
///
/// Kinds are never translated on the way up: a `NotFound` raised by a store
/// lookup reaches the caller of `transfer_funds` as a `NotFound`.
#[derive(Error, Debug)]
pub enum LedgerError {
    // === Request Errors ===
    #[error("{0}")]
    Validation(String),

    #[error("amount must be between 0 and 10,000 (got {0})")]
    InvalidAmount(Decimal),

    #[error("insufficient balance on account {account_number}: balance {balance}, requested {requested}")]
    InsufficientBalance {
        account_number: String,
        balance: Decimal,
        requested: Decimal,
    },

    // === Identity Errors ===
    #[error("account {0} already exists")]
    Conflict(String),

    #[error("account {0} not found")]
    NotFound(String),

    // === System Errors ===
    #[error("storage failure: {0}")]
    Store(#[source] BoxError),
}

impl LedgerError {
    /// Wrap any persistence failure, keeping the cause for logging
    pub fn store<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        LedgerError::Store(err.into())
    }

    /// Stable error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Validation(_) => "VALIDATION_ERROR",
            LedgerError::InvalidAmount(_) => "INVALID_AMOUNT",
            LedgerError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            LedgerError::Conflict(_) => "CONFLICT",
            LedgerError::NotFound(_) => "NOT_FOUND",
            LedgerError::Store(_) => "STORE_ERROR",
        }
    }

    /// HTTP status class for the error
    pub fn http_status(&self) -> u16 {
        match self {
            LedgerError::Validation(_)
            | LedgerError::InvalidAmount(_)
            | LedgerError::InsufficientBalance { .. } => 400,
            LedgerError::NotFound(_) => 404,
            LedgerError::Conflict(_) => 409,
            LedgerError::Store(_) => 500,
        }
    }

    /// True for failures caused by the request rather than the system
    pub fn is_client_error(&self) -> bool {
        self.http_status() < 500
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(err: rusqlite::Error) -> Self {
        LedgerError::store(err)
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
