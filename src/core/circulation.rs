//! Circulation desk: ties catalog, resolver, ledger and locations together.
//!
//! Each customer action resolves the typed title against a fresh catalog
//! read, records the change in the ledger and, for reading actions, turns
//! the entry into an openable target.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use super::ledger::{Ledger, LedgerError};
use crate::adapters::Downloads;
use crate::config::ResolvedConfig;
use crate::domain::{BookKind, BookRecord, IssueOutcome, IssueRecord, PurchaseRecord, Session};
use crate::library::{
    filter_and_reorder, resolve, CatalogError, CatalogStore, LocationError, LocationResolver,
    ResolveError, Target,
};

/// Errors surfaced by circulation actions
#[derive(Debug, Error)]
pub enum CirculationError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Location(#[from] LocationError),

    #[error("No issued book with id {0}")]
    UnknownIssue(i64),

    #[error("No purchased book with id {0}")]
    UnknownPurchase(i64),

    #[error("'{0}' is not a downloadable PDF")]
    NotDownloadable(String),

    #[error("Download failed: {0}")]
    DeliveryFailed(String),
}

/// What happened to the file copy after a purchase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The PDF was copied to this path
    Delivered(PathBuf),

    /// No copy was attempted
    Skipped(String),

    /// The copy failed; the purchase still stands
    Failed(String),
}

/// A recorded purchase and the outcome of its delivery
#[derive(Debug, Clone)]
pub struct PurchaseReceipt {
    pub record: PurchaseRecord,
    pub delivery: Delivery,
}

/// Customer-facing library operations
pub struct Circulation {
    catalog: CatalogStore,
    ledger: Ledger,
    locations: LocationResolver,
    downloads: Downloads,
}

impl Circulation {
    pub fn new(
        catalog: CatalogStore,
        ledger: Ledger,
        locations: LocationResolver,
        downloads: Downloads,
    ) -> Self {
        Self {
            catalog,
            ledger,
            locations,
            downloads,
        }
    }

    /// Open everything from the resolved configuration.
    ///
    /// Creates an empty catalog if none exists and runs the startup sweep
    /// of expired issues.
    pub async fn from_config(config: &ResolvedConfig) -> Result<Self> {
        let catalog = CatalogStore::new(&config.catalog);
        catalog
            .ensure_exists()
            .await
            .with_context(|| format!("Failed to create catalog: {}", config.catalog.display()))?;

        let ledger = Ledger::open(&config.database)
            .with_context(|| format!("Failed to open database: {}", config.database.display()))?
            .with_policy(config.lending);
        ledger.try_sweep_expired(Utc::now());

        Ok(Self::new(
            catalog,
            ledger,
            LocationResolver::new(config.search_dirs()),
            Downloads::new(&config.downloads),
        ))
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn locations(&self) -> &LocationResolver {
        &self.locations
    }

    /// The whole catalog with titles matching `query` moved to the top
    pub async fn browse(&self, query: &str) -> Vec<BookRecord> {
        let catalog = self.catalog.load_or_empty().await;
        filter_and_reorder(query, catalog.books())
            .into_iter()
            .cloned()
            .collect()
    }

    /// Resolve a typed title against the current catalog
    pub async fn select(&self, query: &str) -> Result<BookRecord, CirculationError> {
        let catalog = self.catalog.load_or_empty().await;
        let record = resolve(query, catalog.books())?;
        Ok(record.clone())
    }

    /// Resolve a title to something the opener can show
    pub async fn read(&self, query: &str) -> Result<(BookRecord, Target), CirculationError> {
        let record = self.select(query).await?;
        let target = self.locations.resolve(&record)?;
        Ok((record, target))
    }

    /// Issue a title to the session user
    pub async fn issue(
        &self,
        session: &Session,
        query: &str,
    ) -> Result<(BookRecord, IssueOutcome), CirculationError> {
        let record = self.select(query).await?;
        let outcome = self.ledger.issue(session, &record)?;
        Ok((record, outcome))
    }

    /// Buy a title and, if asked, copy its PDF to the downloads directory.
    ///
    /// The purchase is recorded before delivery and stays recorded whatever
    /// happens to the copy.
    pub async fn purchase(
        &self,
        session: &Session,
        query: &str,
        deliver: bool,
    ) -> Result<PurchaseReceipt, CirculationError> {
        let record = self.select(query).await?;
        let purchase = self.ledger.purchase(session, &record)?;

        let delivery = if !deliver {
            Delivery::Skipped("delivery not requested".to_string())
        } else if record.kind != BookKind::FileBacked {
            Delivery::Skipped("online book, nothing to download".to_string())
        } else {
            match self.deliver(&record).await {
                Ok(path) => Delivery::Delivered(path),
                Err(e) => {
                    warn!(title = %record.title, "Delivery after purchase failed: {}", e);
                    Delivery::Failed(e.to_string())
                }
            }
        };

        Ok(PurchaseReceipt {
            record: purchase,
            delivery,
        })
    }

    /// The session user's issues and purchases, after sweeping expired issues
    pub fn my_books(
        &self,
        session: &Session,
    ) -> Result<(Vec<IssueRecord>, Vec<PurchaseRecord>), CirculationError> {
        self.ledger.try_sweep_expired(Utc::now());
        let issued = self.ledger.issued_for(session)?;
        let purchased = self.ledger.purchased_for(session)?;
        Ok((issued, purchased))
    }

    /// Return an issued book; unknown ids are a no-op
    pub fn return_issue(&self, session: &Session, id: i64) -> Result<bool, CirculationError> {
        Ok(self.ledger.return_issue(session, id)?)
    }

    /// Target for one of the session user's issued books
    pub fn open_issued(&self, session: &Session, id: i64) -> Result<Target, CirculationError> {
        let issue = self
            .ledger
            .find_issue(session, id)?
            .ok_or(CirculationError::UnknownIssue(id))?;
        Ok(self.locations.resolve(&issue.as_book())?)
    }

    /// Target for one of the session user's purchased books
    pub fn open_purchased(&self, session: &Session, id: i64) -> Result<Target, CirculationError> {
        let purchase = self
            .ledger
            .find_purchase(session, id)?
            .ok_or(CirculationError::UnknownPurchase(id))?;
        Ok(self.locations.resolve(&purchase.as_book())?)
    }

    /// Copy a purchased PDF to the downloads directory again
    pub async fn download(&self, session: &Session, id: i64) -> Result<PathBuf, CirculationError> {
        let purchase = self
            .ledger
            .find_purchase(session, id)?
            .ok_or(CirculationError::UnknownPurchase(id))?;

        if purchase.source != BookKind::FileBacked {
            return Err(CirculationError::NotDownloadable(purchase.title));
        }

        self.deliver(&purchase.as_book()).await
    }

    async fn deliver(&self, record: &BookRecord) -> Result<PathBuf, CirculationError> {
        let source = self.locations.resolve_file(record)?;
        let destination = self
            .downloads
            .deliver(&source, &record.title)
            .await
            .map_err(|e| CirculationError::DeliveryFailed(format!("{:#}", e)))?;

        info!(title = %record.title, path = %destination.display(), "Book downloaded");
        Ok(destination)
    }
}
