//! Domain types for the library.
//!
//! This module contains the core data structures:
//! - Book: Catalog entries (file-backed or link-backed)
//! - Lending: Issue and purchase records, loan policy
//! - User: Accounts, roles and sessions

pub mod book;
pub mod lending;
pub mod user;

// Re-export commonly used types
pub use book::{BookKind, BookRecord};
pub use lending::{
    IssueOutcome, IssueRecord, LendingPolicy, LoanState, PurchaseRecord, DEFAULT_LOAN_DAYS,
    DEFAULT_PURCHASE_PRICE, MAX_LOAN_DAYS,
};
pub use user::{Role, Session, User};
