//! Core lending logic.
//!
//! This module contains:
//! - Ledger: Issues, returns, expiry sweeps and purchases (SQLite)
//! - Accounts: Registration, login and roles
//! - Circulation: Customer actions combining catalog, ledger and locations

pub mod accounts;
pub mod circulation;
pub mod ledger;

// Re-export commonly used types
pub use accounts::{hash_password, AccountError};
pub use circulation::{Circulation, CirculationError, Delivery, PurchaseReceipt};
pub use ledger::{from_db_timestamp, to_db_timestamp, Ledger, LedgerError};
