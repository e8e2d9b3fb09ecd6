// 💳 Account Entity - identity is the account number, value is the balance
//
// "Account number is IDENTITY (never changes), balance is a VALUE (moves)"
//
// - account_number is unique and immutable once created
// - name is required at creation
// - balance is a Decimal, only ever moved by the transfer engine

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

// ============================================================================
// ACCOUNT ENTITY
// ============================================================================

/// Account as stored in the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Row id assigned by the store
    pub id: i64,

    /// Holder name (e.g., "Alice")
    pub name: String,

    /// Account number - primary identity, globally unique
    #[serde(rename = "account_num")]
    pub account_number: String,

    /// Current balance (signed, decimal-safe); a JSON number on the wire
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub balance: Decimal,
}

impl Account {
    /// True when the balance covers the requested amount
    pub fn can_cover(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }

    /// Copy of this account with `amount` taken out
    pub fn debited(&self, amount: Decimal) -> Result<Account> {
        let balance = self
            .balance
            .checked_sub(amount)
            .ok_or_else(|| self.out_of_range())?;
        Ok(Account {
            balance,
            ..self.clone()
        })
    }

    /// Copy of this account with `amount` added
    pub fn credited(&self, amount: Decimal) -> Result<Account> {
        let balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| self.out_of_range())?;
        Ok(Account {
            balance,
            ..self.clone()
        })
    }

    fn out_of_range(&self) -> LedgerError {
        LedgerError::Validation(format!(
            "balance of account {} would leave the representable range",
            self.account_number
        ))
    }
}

// ============================================================================
// NEW ACCOUNT (creation request)
// ============================================================================

/// Fields required to open an account; the store assigns the id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    pub name: String,

    #[serde(rename = "account_num")]
    pub account_number: String,

    #[serde(default)]
    pub balance: Decimal,
}

impl NewAccount {
    pub fn new(name: impl Into<String>, account_number: impl Into<String>, balance: Decimal) -> Self {
        NewAccount {
            name: name.into(),
            account_number: account_number.into(),
            balance,
        }
    }

    /// Check required fields (name and account number must be non-blank)
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() || self.account_number.trim().is_empty() {
            return Err(LedgerError::Validation("missing required fields".to_string()));
        }
        Ok(())
    }

    /// Materialize with a store-assigned id
    pub fn into_account(self, id: i64) -> Account {
        Account {
            id,
            name: self.name,
            account_number: self.account_number,
            balance: self.balance,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
