// Entity Models
//
// Each entity has:
// - Stable identity that NEVER changes (account number / transfer id)
// - Values that only the transfer engine moves (balances)

pub mod account;
pub mod transfer;

pub use account::{Account, NewAccount};
pub use transfer::{sort_newest_first, NewTransfer, TransferRecord, TransferStatus};
