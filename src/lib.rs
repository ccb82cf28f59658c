//! elib - Personal e-book library
//!
//! Keeps a catalog of books (local PDFs and online e-books), lets users
//! read, issue and buy them, and records loans and purchases per user.
//!
//! # Architecture
//!
//! - The catalog is a two-sheet workbook file, re-read for every action
//! - Loans, purchases and accounts live in a SQLite ledger
//! - Titles typed by users are matched after Unicode normalization,
//!   exact matches first, then substring matches
//! - Expired loans are swept at startup, login and before listing
//!
//! # Modules
//!
//! - `adapters`: Viewer launching and PDF delivery
//! - `core`: Ledger, accounts and the circulation desk
//! - `domain`: Data structures (BookRecord, IssueRecord, Session)
//! - `library`: Catalog store, normalization, title and location resolution
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Browse with matching titles first
//! elib list --query "rust"
//!
//! # Issue a book for the loan period
//! elib issue "Programming Rust" -u ana -p secret
//!
//! # Show my loans and purchases
//! elib mine -u ana -p secret
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod library;

// Re-export main types at crate root for convenience
pub use core::{Circulation, CirculationError, Delivery, Ledger, PurchaseReceipt};
pub use domain::{BookKind, BookRecord, IssueOutcome, IssueRecord, PurchaseRecord, Session};
pub use library::{normalize, resolve, sanitize_filename, CatalogStore, DeletePolicy, Target};
