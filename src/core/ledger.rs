//! SQLite-backed lending ledger.
//!
//! Holds accounts, active issues and the purchase receipt log. Every call
//! goes straight to the database; the ledger keeps no in-memory state
//! besides the connection and the lending policy.
//!
//! Timestamps are stored as RFC 3339 UTC text with a fixed microsecond
//! precision, so comparing the text compares the instants.

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{
    BookKind, BookRecord, IssueOutcome, IssueRecord, LendingPolicy, LoanState, PurchaseRecord,
    Session,
};

/// Errors that can occur with the ledger
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Loan period of {0} days is out of range")]
    InvalidLoanPeriod(i64),
}

/// Format an instant the way the ledger stores it
pub fn to_db_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp. Offset-less values (older databases) are
/// taken as UTC.
pub fn from_db_timestamp(text: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    match DateTime::parse_from_rfc3339(text) {
        Ok(instant) => Ok(instant.with_timezone(&Utc)),
        Err(e) => NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|_| e),
    }
}

fn timestamp_column(row: &Row, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(index)?;
    from_db_timestamp(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

/// Issue timestamps from older databases may be unreadable; those read as
/// long expired so the row is swept or replaced instead of failing queries
fn lenient_timestamp_column(row: &Row, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: Option<String> = row.get(index)?;
    Ok(text
        .as_deref()
        .and_then(|t| from_db_timestamp(t).ok())
        .unwrap_or(DateTime::<Utc>::MIN_UTC))
}

fn source_column(row: &Row, index: usize) -> rusqlite::Result<BookKind> {
    let text: Option<String> = row.get(index)?;
    Ok(text
        .and_then(|s| s.parse().ok())
        .unwrap_or(BookKind::LinkBacked))
}

const ISSUE_COLUMNS: &str =
    "id, username, title, author, source, location, issue_date, expiry_date";

const PURCHASE_COLUMNS: &str =
    "id, username, title, author, source, location, purchase_date, price";

fn issue_from_row(row: &Row) -> rusqlite::Result<IssueRecord> {
    Ok(IssueRecord {
        id: row.get(0)?,
        username: row.get(1)?,
        title: row.get(2)?,
        author: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        source: source_column(row, 4)?,
        location: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        issue_date: lenient_timestamp_column(row, 6)?,
        expiry_date: lenient_timestamp_column(row, 7)?,
    })
}

fn purchase_from_row(row: &Row) -> rusqlite::Result<PurchaseRecord> {
    Ok(PurchaseRecord {
        id: row.get(0)?,
        username: row.get(1)?,
        title: row.get(2)?,
        author: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        source: source_column(row, 4)?,
        location: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        purchase_date: timestamp_column(row, 6)?,
        price: row.get::<_, Option<f64>>(7)?.unwrap_or_default(),
    })
}

/// Create tables, upgrading databases written by older versions
fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            username TEXT PRIMARY KEY,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'customer'
        )",
        [],
    )?;

    // Older databases named the hash column `password` and had no roles
    let columns: Vec<String> = conn
        .prepare("PRAGMA table_info(users)")?
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<_>>()?;

    if columns.iter().any(|c| c == "password") && !columns.iter().any(|c| c == "password_hash") {
        conn.execute("ALTER TABLE users RENAME COLUMN password TO password_hash", [])?;
        info!("Renamed legacy users.password column");
    }
    if !columns.iter().any(|c| c == "role") {
        conn.execute(
            "ALTER TABLE users ADD COLUMN role TEXT NOT NULL DEFAULT 'customer'",
            [],
        )?;
    }

    conn.execute(
        "CREATE TABLE IF NOT EXISTS issued_books (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL,
            title TEXT NOT NULL,
            author TEXT,
            source TEXT,
            location TEXT,
            issue_date TEXT,
            expiry_date TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS purchased_books (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL,
            title TEXT NOT NULL,
            author TEXT,
            source TEXT,
            location TEXT,
            purchase_date TEXT,
            price REAL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_issued_user_title ON issued_books (username, title)",
        [],
    )?;

    Ok(())
}

/// Lending ledger over a SQLite database
pub struct Ledger {
    pub(crate) conn: Connection,
    policy: LendingPolicy,
}

impl Ledger {
    /// Open (and create if needed) the ledger database at `path`
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        init_schema(&conn)?;
        debug!(path = %path.display(), "Opened ledger");

        Ok(Self {
            conn,
            policy: LendingPolicy::default(),
        })
    }

    /// Open a throwaway in-memory ledger
    pub fn open_in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;

        Ok(Self {
            conn,
            policy: LendingPolicy::default(),
        })
    }

    /// Use a different loan period / purchase price
    pub fn with_policy(mut self, policy: LendingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Current lending policy
    pub fn policy(&self) -> LendingPolicy {
        self.policy
    }

    /// Issue `record` to the session's user now
    pub fn issue(&self, session: &Session, record: &BookRecord) -> Result<IssueOutcome, LedgerError> {
        self.issue_at(session, record, Utc::now())
    }

    /// Issue `record` to the session's user at `now`.
    ///
    /// An unexpired issue for the same title is left alone and reported as
    /// `AlreadyIssued`. Expired issues for the title are replaced.
    pub fn issue_at(
        &self,
        session: &Session,
        record: &BookRecord,
        now: DateTime<Utc>,
    ) -> Result<IssueOutcome, LedgerError> {
        let username = session.username();
        let tx = self.conn.unchecked_transaction()?;

        let existing: Vec<IssueRecord> = tx
            .prepare(&format!(
                "SELECT {} FROM issued_books WHERE username = ?1 AND title = ?2",
                ISSUE_COLUMNS
            ))?
            .query_map(params![username, record.title], issue_from_row)?
            .collect::<rusqlite::Result<_>>()?;

        if let Some(active) = existing
            .iter()
            .filter(|issue| issue.state(now) == LoanState::Active)
            .max_by_key(|issue| issue.expiry_date)
        {
            debug!(username, title = %record.title, "Title already issued");
            return Ok(IssueOutcome::AlreadyIssued {
                expiry_date: active.expiry_date,
            });
        }

        let replaced_expired = !existing.is_empty();
        if replaced_expired {
            tx.execute(
                "DELETE FROM issued_books WHERE username = ?1 AND title = ?2",
                params![username, record.title],
            )?;
        }

        let expiry_date = self
            .policy
            .expiry_for(now)
            .ok_or(LedgerError::InvalidLoanPeriod(self.policy.loan_days))?;
        tx.execute(
            "INSERT INTO issued_books
                (username, title, author, source, location, issue_date, expiry_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                username,
                record.title,
                record.author,
                record.kind.as_source(),
                record.location,
                to_db_timestamp(now),
                to_db_timestamp(expiry_date),
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        info!(username, title = %record.title, %expiry_date, replaced_expired, "Issued book");

        Ok(IssueOutcome::Issued {
            record: IssueRecord {
                id,
                username: username.to_string(),
                title: record.title.clone(),
                author: record.author.clone(),
                source: record.kind,
                location: record.location.clone(),
                issue_date: now,
                expiry_date,
            },
            replaced_expired,
        })
    }

    /// Return an issued book. Returning an id that is absent (or owned by
    /// someone else) changes nothing; the result tells whether a row went.
    pub fn return_issue(&self, session: &Session, id: i64) -> Result<bool, LedgerError> {
        let removed = self.conn.execute(
            "DELETE FROM issued_books WHERE id = ?1 AND username = ?2",
            params![id, session.username()],
        )?;

        if removed > 0 {
            info!(username = session.username(), id, "Returned book");
        }
        Ok(removed > 0)
    }

    /// Delete every issue, for every user, whose expiry is at or before `now`
    /// or cannot be read
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, LedgerError> {
        let mut removed = self.conn.execute(
            "DELETE FROM issued_books WHERE expiry_date <= ?1",
            params![to_db_timestamp(now)],
        )?;

        let unreadable: Vec<i64> = self
            .conn
            .prepare("SELECT id, expiry_date FROM issued_books")?
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .filter(|(_, expiry)| {
                expiry
                    .as_deref()
                    .map_or(true, |text| from_db_timestamp(text).is_err())
            })
            .map(|(id, _)| id)
            .collect();

        for id in unreadable {
            removed += self
                .conn
                .execute("DELETE FROM issued_books WHERE id = ?1", params![id])?;
        }

        if removed > 0 {
            info!(removed, "Swept expired issues");
        }
        Ok(removed)
    }

    /// Sweep without failing the caller; a failed sweep is skipped
    pub fn try_sweep_expired(&self, now: DateTime<Utc>) -> Option<usize> {
        match self.sweep_expired(now) {
            Ok(removed) => Some(removed),
            Err(e) => {
                warn!("Skipping expiry sweep: {}", e);
                None
            }
        }
    }

    /// Record a purchase now at the policy price
    pub fn purchase(
        &self,
        session: &Session,
        record: &BookRecord,
    ) -> Result<PurchaseRecord, LedgerError> {
        self.purchase_at(session, record, Utc::now(), self.policy.purchase_price)
    }

    /// Record a purchase. Purchases are never deduplicated.
    pub fn purchase_at(
        &self,
        session: &Session,
        record: &BookRecord,
        now: DateTime<Utc>,
        price: f64,
    ) -> Result<PurchaseRecord, LedgerError> {
        let username = session.username();
        self.conn.execute(
            "INSERT INTO purchased_books
                (username, title, author, source, location, purchase_date, price)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                username,
                record.title,
                record.author,
                record.kind.as_source(),
                record.location,
                to_db_timestamp(now),
                price,
            ],
        )?;
        let id = self.conn.last_insert_rowid();

        info!(username, title = %record.title, price, "Recorded purchase");

        Ok(PurchaseRecord {
            id,
            username: username.to_string(),
            title: record.title.clone(),
            author: record.author.clone(),
            source: record.kind,
            location: record.location.clone(),
            purchase_date: now,
            price,
        })
    }

    /// The session user's issues, oldest first
    pub fn issued_for(&self, session: &Session) -> Result<Vec<IssueRecord>, LedgerError> {
        let issues = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM issued_books WHERE username = ?1 ORDER BY id",
                ISSUE_COLUMNS
            ))?
            .query_map(params![session.username()], issue_from_row)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(issues)
    }

    /// The session user's purchases, oldest first
    pub fn purchased_for(&self, session: &Session) -> Result<Vec<PurchaseRecord>, LedgerError> {
        let purchases = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM purchased_books WHERE username = ?1 ORDER BY id",
                PURCHASE_COLUMNS
            ))?
            .query_map(params![session.username()], purchase_from_row)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(purchases)
    }

    /// One of the session user's issues
    pub fn find_issue(&self, session: &Session, id: i64) -> Result<Option<IssueRecord>, LedgerError> {
        let issue = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM issued_books WHERE id = ?1 AND username = ?2",
                    ISSUE_COLUMNS
                ),
                params![id, session.username()],
                issue_from_row,
            )
            .optional()?;
        Ok(issue)
    }

    /// One of the session user's purchases
    pub fn find_purchase(
        &self,
        session: &Session,
        id: i64,
    ) -> Result<Option<PurchaseRecord>, LedgerError> {
        let purchase = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM purchased_books WHERE id = ?1 AND username = ?2",
                    PURCHASE_COLUMNS
                ),
                params![id, session.username()],
                purchase_from_row,
            )
            .optional()?;
        Ok(purchase)
    }
}
