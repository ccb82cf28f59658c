//! Lending records owned by the ledger.
//!
//! Issues are time-boxed loans; purchases are an append-only receipt log.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::book::{BookKind, BookRecord};

/// Default loan period in days
pub const DEFAULT_LOAN_DAYS: i64 = 10;

/// Longest loan period accepted from configuration
pub const MAX_LOAN_DAYS: i64 = 36_500;

/// Default stub price of a purchase
pub const DEFAULT_PURCHASE_PRICE: f64 = 100.0;

/// Lifecycle state of an issue at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanState {
    /// `now < expiry_date`
    Active,

    /// `now >= expiry_date`, waiting for the next sweep
    Expired,
}

/// An issued (borrowed) book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub id: i64,
    pub username: String,
    pub title: String,
    pub author: String,
    pub source: BookKind,
    pub location: String,
    pub issue_date: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
}

impl IssueRecord {
    /// State of this issue at `now`
    pub fn state(&self, now: DateTime<Utc>) -> LoanState {
        if now < self.expiry_date {
            LoanState::Active
        } else {
            LoanState::Expired
        }
    }

    /// The catalog view of this record, used for location resolution
    pub fn as_book(&self) -> BookRecord {
        BookRecord::new(&self.title, &self.author, self.source, &self.location)
    }
}

/// A purchased book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub id: i64,
    pub username: String,
    pub title: String,
    pub author: String,
    pub source: BookKind,
    pub location: String,
    pub purchase_date: DateTime<Utc>,
    pub price: f64,
}

impl PurchaseRecord {
    /// The catalog view of this record, used for location resolution
    pub fn as_book(&self) -> BookRecord {
        BookRecord::new(&self.title, &self.author, self.source, &self.location)
    }
}

/// Result of an issue request
#[derive(Debug, Clone, PartialEq)]
pub enum IssueOutcome {
    /// A new issue was recorded
    Issued {
        record: IssueRecord,
        /// An expired issue for the same title was replaced
        replaced_expired: bool,
    },

    /// The user already holds an unexpired issue for this title
    AlreadyIssued { expiry_date: DateTime<Utc> },
}

impl IssueOutcome {
    /// Check if a new record was written
    pub fn is_issued(&self) -> bool {
        matches!(self, Self::Issued { .. })
    }

    /// Expiry of the new or the existing issue
    pub fn expiry_date(&self) -> DateTime<Utc> {
        match self {
            Self::Issued { record, .. } => record.expiry_date,
            Self::AlreadyIssued { expiry_date } => *expiry_date,
        }
    }
}

/// Loan period settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LendingPolicy {
    pub loan_days: i64,
    pub purchase_price: f64,
}

impl Default for LendingPolicy {
    fn default() -> Self {
        Self {
            loan_days: DEFAULT_LOAN_DAYS,
            purchase_price: DEFAULT_PURCHASE_PRICE,
        }
    }
}

impl LendingPolicy {
    /// Expiry of an issue started at `issued_at`, or `None` when the loan
    /// period does not fit in a timestamp
    pub fn expiry_for(&self, issued_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        issued_at.checked_add_signed(Duration::try_days(self.loan_days)?)
    }
}
