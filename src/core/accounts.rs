//! Registration, login and roles.
//!
//! Passwords are stored as hex SHA-256 digests. Accounts created by older
//! versions may still hold the plaintext password; those are upgraded to
//! the digest on the first successful login.

use chrono::Utc;
use rusqlite::{params, ErrorCode, OptionalExtension};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

use super::ledger::Ledger;
use crate::domain::{Role, Session, User};

/// Errors that can occur with accounts
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Provide username and password")]
    EmptyCredentials,

    #[error("Username exists: {0}")]
    DuplicateUser(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("Administrator access required")]
    Forbidden,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Hex SHA-256 of a password
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Check whether a stored value already is a SHA-256 hex digest
fn is_password_hash(stored: &str) -> bool {
    stored.len() == 64 && stored.chars().all(|c| c.is_ascii_hexdigit())
}

impl Ledger {
    /// Create a customer account
    pub fn register(&self, username: &str, password: &str) -> Result<(), AccountError> {
        let username = username.trim();
        let password = password.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AccountError::EmptyCredentials);
        }

        let inserted = self.conn.execute(
            "INSERT INTO users (username, password_hash, role) VALUES (?1, ?2, ?3)",
            params![username, hash_password(password), Role::Customer.as_str()],
        );

        match inserted {
            Ok(_) => {
                info!(username, "Registered user");
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(AccountError::DuplicateUser(username.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Look up an account
    pub fn user(&self, username: &str) -> Result<Option<User>, AccountError> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT password_hash, role FROM users WHERE username = ?1",
                params![username.trim()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        Ok(row.map(|(password_hash, role)| User {
            username: username.trim().to_string(),
            password_hash,
            role: role.parse().unwrap_or(Role::Customer),
        }))
    }

    /// Authenticate and open a session.
    ///
    /// A successful login also sweeps expired issues (best effort).
    pub fn login(&self, username: &str, password: &str) -> Result<Session, AccountError> {
        let username = username.trim();
        let password = password.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AccountError::EmptyCredentials);
        }

        let user = self
            .user(username)?
            .ok_or(AccountError::InvalidCredentials)?;
        let hashed = hash_password(password);

        let ok = if is_password_hash(&user.password_hash) {
            user.password_hash.eq_ignore_ascii_case(&hashed)
        } else {
            let ok = user.password_hash == password;
            if ok {
                self.conn.execute(
                    "UPDATE users SET password_hash = ?1 WHERE username = ?2",
                    params![hashed, username],
                )?;
                info!(username, "Upgraded legacy plaintext password");
            }
            ok
        };

        if !ok {
            return Err(AccountError::InvalidCredentials);
        }

        self.try_sweep_expired(Utc::now());
        info!(username, role = %user.role, "Logged in");
        Ok(Session::new(username, user.role))
    }

    /// Check whether any administrator account exists
    pub fn admin_exists(&self) -> Result<bool, AccountError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM users WHERE role = ?1",
            params![Role::Admin.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Fail unless the session belongs to an administrator
    pub fn require_admin(&self, session: &Session) -> Result<(), AccountError> {
        if session.is_admin() {
            Ok(())
        } else {
            Err(AccountError::Forbidden)
        }
    }

    /// Make `username` an administrator.
    ///
    /// While no administrator exists any caller may grant the role, which
    /// is how the first one is set up. After that an admin session is
    /// required.
    pub fn grant_admin(&self, acting: Option<&Session>, username: &str) -> Result<(), AccountError> {
        if self.admin_exists()? {
            match acting {
                Some(session) => self.require_admin(session)?,
                None => return Err(AccountError::Forbidden),
            }
        }

        let updated = self.conn.execute(
            "UPDATE users SET role = ?1 WHERE username = ?2",
            params![Role::Admin.as_str(), username.trim()],
        )?;
        if updated == 0 {
            return Err(AccountError::UnknownUser(username.trim().to_string()));
        }

        info!(username = username.trim(), "Granted admin role");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password() {
        assert_eq!(
            hash_password("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(is_password_hash(&hash_password("anything")));
        assert!(!is_password_hash("plaintext"));
    }

    #[test]
    fn test_register_and_login() {
        let ledger = Ledger::open_in_memory().unwrap();
        ledger.register(" ana ", "secret").unwrap();

        let session = ledger.login("ana", "secret").unwrap();
        assert_eq!(session.username(), "ana");
        assert_eq!(session.role(), Role::Customer);

        let stored = ledger.user("ana").unwrap().unwrap();
        assert_eq!(stored.password_hash, hash_password("secret"));
    }

    #[test]
    fn test_duplicate_and_empty_registration() {
        let ledger = Ledger::open_in_memory().unwrap();
        ledger.register("ana", "secret").unwrap();

        assert!(matches!(
            ledger.register("ana", "other"),
            Err(AccountError::DuplicateUser(name)) if name == "ana"
        ));
        assert!(matches!(
            ledger.register("", "secret"),
            Err(AccountError::EmptyCredentials)
        ));
    }

    #[test]
    fn test_invalid_credentials() {
        let ledger = Ledger::open_in_memory().unwrap();
        ledger.register("ana", "secret").unwrap();

        assert!(matches!(
            ledger.login("ana", "wrong"),
            Err(AccountError::InvalidCredentials)
        ));
        assert!(matches!(
            ledger.login("nobody", "secret"),
            Err(AccountError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_legacy_plaintext_password_is_upgraded() {
        let ledger = Ledger::open_in_memory().unwrap();
        ledger
            .conn
            .execute(
                "INSERT INTO users (username, password_hash) VALUES ('old', 'hunter2')",
                [],
            )
            .unwrap();

        assert!(matches!(
            ledger.login("old", "wrong"),
            Err(AccountError::InvalidCredentials)
        ));
        assert_eq!(ledger.user("old").unwrap().unwrap().password_hash, "hunter2");

        ledger.login("old", "hunter2").unwrap();
        assert_eq!(
            ledger.user("old").unwrap().unwrap().password_hash,
            hash_password("hunter2")
        );

        // Still works once upgraded
        ledger.login("old", "hunter2").unwrap();
    }

    #[test]
    fn test_login_survives_failed_sweep() {
        let ledger = Ledger::open_in_memory().unwrap();
        ledger.register("ana", "secret").unwrap();
        ledger.conn.execute("DROP TABLE issued_books", []).unwrap();

        let session = ledger.login("ana", "secret").unwrap();
        assert_eq!(session.username(), "ana");
    }

    #[test]
    fn test_admin_bootstrap_then_restricted() {
        let ledger = Ledger::open_in_memory().unwrap();
        ledger.register("root", "pw").unwrap();
        ledger.register("ana", "pw").unwrap();
        ledger.register("ben", "pw").unwrap();

        assert!(!ledger.admin_exists().unwrap());
        ledger.grant_admin(None, "root").unwrap();
        assert!(ledger.admin_exists().unwrap());

        assert!(matches!(ledger.grant_admin(None, "ana"), Err(AccountError::Forbidden)));

        let customer = ledger.login("ben", "pw").unwrap();
        assert!(matches!(
            ledger.grant_admin(Some(&customer), "ana"),
            Err(AccountError::Forbidden)
        ));

        let admin = ledger.login("root", "pw").unwrap();
        assert!(admin.is_admin());
        ledger.grant_admin(Some(&admin), "ana").unwrap();
        assert_eq!(ledger.user("ana").unwrap().unwrap().role, Role::Admin);

        assert!(matches!(
            ledger.grant_admin(Some(&admin), "ghost"),
            Err(AccountError::UnknownUser(_))
        ));
    }
}
