//! Catalog store for file-backed and link-backed books.
//!
//! The catalog lives in a JSON workbook with two named sheets, one row
//! per book:
//!
//! ```text
//! {
//!   "version": 1,
//!   "sheets": {
//!     "Book PDF": { "columns": ["title", "author", "filepath"], "rows": [[...]] },
//!     "E-Book":   { "columns": ["title", "author", "url"],      "rows": [[...]] }
//!   }
//! }
//! ```
//!
//! Every operation reads the file, applies its change and writes the whole
//! workbook back. Nothing is cached between operations, so the file is the
//! single source of truth.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::normalize::normalize;
use crate::domain::{BookKind, BookRecord};

/// Sheet holding file-backed books
pub const SHEET_FILE_BACKED: &str = "Book PDF";

/// Sheet holding link-backed books
pub const SHEET_LINK_BACKED: &str = "E-Book";

/// Current workbook format version
const WORKBOOK_VERSION: u32 = 1;

/// Errors that can occur with the catalog store
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog store unavailable at {path}: {reason}")]
    StoreUnavailable { path: PathBuf, reason: String },

    #[error("Invalid book record: title and author are required")]
    InvalidRecord,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// How `delete` matches titles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Normalized title equals the normalized query
    #[default]
    Exact,

    /// Normalized title contains the normalized query
    Substring,
}

impl DeletePolicy {
    /// Check whether `title` is matched by an already-normalized query
    pub fn matches(&self, normalized_query: &str, title: &str) -> bool {
        let title = normalize(title);
        match self {
            DeletePolicy::Exact => title == normalized_query,
            DeletePolicy::Substring => title.contains(normalized_query),
        }
    }
}

impl std::str::FromStr for DeletePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "exact" => Ok(DeletePolicy::Exact),
            "substring" | "contains" => Ok(DeletePolicy::Substring),
            _ => anyhow::bail!("Unknown delete policy: {}", s),
        }
    }
}

/// In-memory view of both catalog sheets, in stored order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    pub file_backed: Vec<BookRecord>,
    pub link_backed: Vec<BookRecord>,
}

impl Catalog {
    /// Create a new empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// All books, file-backed first, each sheet in stored order
    pub fn books(&self) -> Vec<&BookRecord> {
        self.file_backed.iter().chain(self.link_backed.iter()).collect()
    }

    /// Append a record to the sheet matching its kind
    pub fn push(&mut self, record: BookRecord) {
        match record.kind {
            BookKind::FileBacked => self.file_backed.push(record),
            BookKind::LinkBacked => self.link_backed.push(record),
        }
    }

    /// Remove every record matching `predicate`, returning how many went
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&BookRecord) -> bool) -> usize {
        let before = self.len();
        self.file_backed.retain(|r| !predicate(r));
        self.link_backed.retain(|r| !predicate(r));
        before - self.len()
    }

    /// Get the number of books
    pub fn len(&self) -> usize {
        self.file_backed.len() + self.link_backed.len()
    }

    /// Check if the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.file_backed.is_empty() && self.link_backed.is_empty()
    }
}

/// On-disk workbook
#[derive(Debug, Serialize, Deserialize)]
struct Workbook {
    version: u32,
    sheets: Sheets,
}

#[derive(Debug, Serialize, Deserialize)]
struct Sheets {
    #[serde(rename = "Book PDF")]
    file_backed: Sheet,

    #[serde(rename = "E-Book")]
    link_backed: Sheet,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Sheet {
    columns: Vec<String>,

    #[serde(default)]
    rows: Vec<Vec<Value>>,
}

impl Sheet {
    fn from_records(kind: BookKind, records: &[BookRecord]) -> Self {
        Self {
            columns: vec![
                "title".to_string(),
                "author".to_string(),
                location_column(kind).to_string(),
            ],
            rows: records
                .iter()
                .map(|r| {
                    vec![
                        Value::String(r.title.clone()),
                        Value::String(r.author.clone()),
                        Value::String(r.location.clone()),
                    ]
                })
                .collect(),
        }
    }

    /// Convert rows into records using the column contract for `kind`
    fn into_records(self, kind: BookKind) -> Result<Vec<BookRecord>, String> {
        let sheet_name = sheet_name(kind);
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| c.trim().to_lowercase())
            .collect();
        let position = |name: &str| columns.iter().position(|c| c == name);

        if self.rows.is_empty() {
            return Ok(Vec::new());
        }

        let title_col = position("title")
            .ok_or_else(|| format!("sheet '{}' has no 'title' column", sheet_name))?;
        let author_col = position("author")
            .ok_or_else(|| format!("sheet '{}' has no 'author' column", sheet_name))?;
        let location_col = position(location_column(kind));

        let mut records = Vec::with_capacity(self.rows.len());
        for (index, row) in self.rows.iter().enumerate() {
            let cell = |col: usize| row.get(col).map(cell_text).unwrap_or_default();
            let record = BookRecord::new(
                cell(title_col),
                cell(author_col),
                kind,
                location_col.map(cell).unwrap_or_default(),
            );

            if record.is_valid() {
                records.push(record);
            } else {
                warn!(sheet = sheet_name, row = index + 1, "Skipping row without title or author");
            }
        }

        Ok(records)
    }
}

fn sheet_name(kind: BookKind) -> &'static str {
    match kind {
        BookKind::FileBacked => SHEET_FILE_BACKED,
        BookKind::LinkBacked => SHEET_LINK_BACKED,
    }
}

fn location_column(kind: BookKind) -> &'static str {
    match kind {
        BookKind::FileBacked => "filepath",
        BookKind::LinkBacked => "url",
    }
}

/// Render a cell as text; numbers keep their literal form, null is empty
fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// File-backed catalog store
pub struct CatalogStore {
    /// Path to the workbook file
    path: PathBuf,
}

impl CatalogStore {
    /// Create a store for the workbook at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the workbook path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing the workbook
    pub fn directory(&self) -> PathBuf {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn unavailable(&self, reason: impl std::fmt::Display) -> CatalogError {
        CatalogError::StoreUnavailable {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }

    /// Create an empty workbook if none exists. Returns true if created.
    pub async fn ensure_exists(&self) -> Result<bool, CatalogError> {
        if self.path.exists() {
            return Ok(false);
        }

        self.save(&Catalog::new()).await?;
        info!(path = %self.path.display(), "Created empty catalog");
        Ok(true)
    }

    /// Load both sheets
    pub async fn load(&self) -> Result<Catalog, CatalogError> {
        if !self.path.exists() {
            return Err(self.unavailable("file does not exist"));
        }

        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.unavailable(e))?;

        let workbook: Workbook = serde_json::from_str(&content).map_err(|e| self.unavailable(e))?;

        let Sheets {
            file_backed,
            link_backed,
        } = workbook.sheets;

        let catalog = Catalog {
            file_backed: file_backed
                .into_records(BookKind::FileBacked)
                .map_err(|e| self.unavailable(e))?,
            link_backed: link_backed
                .into_records(BookKind::LinkBacked)
                .map_err(|e| self.unavailable(e))?,
        };

        debug!(books = catalog.len(), "Loaded catalog");
        Ok(catalog)
    }

    /// Load for read-only use; an unavailable store reads as empty
    pub async fn load_or_empty(&self) -> Catalog {
        match self.load().await {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!("Treating catalog as empty: {}", e);
                Catalog::new()
            }
        }
    }

    /// Replace both sheets atomically.
    ///
    /// The workbook is written to a sibling temporary file which is then
    /// renamed over the target, so readers never observe a partial write.
    pub async fn save(&self, catalog: &Catalog) -> Result<(), CatalogError> {
        let dir = self.directory();
        fs::create_dir_all(&dir).await?;

        let workbook = Workbook {
            version: WORKBOOK_VERSION,
            sheets: Sheets {
                file_backed: Sheet::from_records(BookKind::FileBacked, &catalog.file_backed),
                link_backed: Sheet::from_records(BookKind::LinkBacked, &catalog.link_backed),
            },
        };
        let content = serde_json::to_string_pretty(&workbook)?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "catalog".to_string());
        let temp_path = dir.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

        let written = async {
            let mut file = File::create(&temp_path).await?;
            file.write_all(content.as_bytes()).await?;
            file.sync_all().await?;
            fs::rename(&temp_path, &self.path).await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(())
    }

    /// All books in catalog order (empty if the store is unavailable)
    pub async fn list(&self) -> Vec<BookRecord> {
        self.load_or_empty()
            .await
            .books()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Append a book to its sheet
    pub async fn add(&self, record: BookRecord) -> Result<(), CatalogError> {
        if !record.is_valid() {
            return Err(CatalogError::InvalidRecord);
        }

        let mut catalog = self.load().await?;
        info!(title = %record.title, kind = %record.kind, "Adding book");
        catalog.push(record);
        self.save(&catalog).await
    }

    /// Delete every book whose title matches `query` under `policy`.
    ///
    /// Returns the number of removed books. An empty normalized query
    /// matches nothing.
    pub async fn delete(&self, query: &str, policy: DeletePolicy) -> Result<usize, CatalogError> {
        let normalized = normalize(query);
        if normalized.is_empty() {
            return Ok(0);
        }

        let mut catalog = self.load().await?;
        let removed = catalog.remove_where(|r| policy.matches(&normalized, &r.title));

        if removed > 0 {
            self.save(&catalog).await?;
            info!(query, ?policy, removed, "Deleted books");
        }

        Ok(removed)
    }

    /// Update title and/or author of every book whose normalized title
    /// equals the normalized `old_title`.
    ///
    /// Blank replacement values are ignored. Returns false when nothing
    /// matched.
    pub async fn modify(
        &self,
        old_title: &str,
        new_title: Option<&str>,
        new_author: Option<&str>,
    ) -> Result<bool, CatalogError> {
        let target = normalize(old_title);
        if target.is_empty() {
            return Ok(false);
        }

        let new_title = new_title.map(str::trim).filter(|s| !s.is_empty());
        let new_author = new_author.map(str::trim).filter(|s| !s.is_empty());

        let mut catalog = self.load().await?;
        let mut updated = 0;

        for record in catalog
            .file_backed
            .iter_mut()
            .chain(catalog.link_backed.iter_mut())
            .filter(|r| normalize(&r.title) == target)
        {
            if let Some(title) = new_title {
                record.title = title.to_string();
            }
            if let Some(author) = new_author {
                record.author = author.to_string();
            }
            updated += 1;
        }

        if updated == 0 {
            return Ok(false);
        }

        self.save(&catalog).await?;
        info!(old_title, updated, "Modified books");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (CatalogStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let store = CatalogStore::new(temp.path().join("catalog.json"));
        (store, temp)
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let (store, _temp) = create_test_store();

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, CatalogError::StoreUnavailable { .. }));
        assert!(store.load_or_empty().await.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_unavailable() {
        let (store, _temp) = create_test_store();
        tokio::fs::write(store.path(), b"{ not json").await.unwrap();

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, CatalogError::StoreUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_ensure_exists_creates_empty_sheets() {
        let (store, _temp) = create_test_store();

        assert!(store.ensure_exists().await.unwrap());
        assert!(!store.ensure_exists().await.unwrap());

        let catalog = store.load().await.unwrap();
        assert!(catalog.is_empty());

        let raw = tokio::fs::read_to_string(store.path()).await.unwrap();
        assert!(raw.contains(SHEET_FILE_BACKED));
        assert!(raw.contains(SHEET_LINK_BACKED));
    }

    #[tokio::test]
    async fn test_column_names_are_normalized_on_read() {
        let (store, _temp) = create_test_store();
        let raw = serde_json::json!({
            "version": 1,
            "sheets": {
                "Book PDF": {
                    "columns": [" Author ", "TITLE", "FilePath"],
                    "rows": [["Herbert", "Dune", "/books/dune.pdf"], ["Orwell", 1984, null]]
                },
                "E-Book": { "columns": ["Title", "Author"], "rows": [["Rust Book", "Klabnik"]] }
            }
        });
        tokio::fs::write(store.path(), raw.to_string()).await.unwrap();

        let catalog = store.load().await.unwrap();
        assert_eq!(
            catalog.file_backed,
            vec![
                BookRecord::file_backed("Dune", "Herbert", "/books/dune.pdf"),
                BookRecord::file_backed("1984", "Orwell", ""),
            ]
        );
        assert_eq!(
            catalog.link_backed,
            vec![BookRecord::link_backed("Rust Book", "Klabnik", "")]
        );
    }

    #[tokio::test]
    async fn test_rows_without_title_or_author_are_skipped() {
        let (store, _temp) = create_test_store();
        let raw = serde_json::json!({
            "version": 1,
            "sheets": {
                "Book PDF": {
                    "columns": ["title", "author", "filepath"],
                    "rows": [["", "Nobody", ""], ["Dune", "Herbert", ""], ["Untitled"]]
                },
                "E-Book": { "columns": [], "rows": [] }
            }
        });
        tokio::fs::write(store.path(), raw.to_string()).await.unwrap();

        let catalog = store.load().await.unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.file_backed[0].title, "Dune");
    }

    #[tokio::test]
    async fn test_missing_required_column_is_unavailable() {
        let (store, _temp) = create_test_store();
        let raw = serde_json::json!({
            "version": 1,
            "sheets": {
                "Book PDF": { "columns": ["title", "filepath"], "rows": [["Dune", ""]] },
                "E-Book": { "columns": ["title", "author", "url"], "rows": [] }
            }
        });
        tokio::fs::write(store.path(), raw.to_string()).await.unwrap();

        assert!(matches!(
            store.load().await.unwrap_err(),
            CatalogError::StoreUnavailable { .. }
        ));
    }

    #[tokio::test]
    async fn test_add_requires_existing_store() {
        let (store, _temp) = create_test_store();
        let result = store.add(BookRecord::file_backed("Dune", "Herbert", "")).await;
        assert!(matches!(result, Err(CatalogError::StoreUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_add_rejects_invalid_record() {
        let (store, _temp) = create_test_store();
        store.ensure_exists().await.unwrap();

        let result = store.add(BookRecord::file_backed("Dune", "", "")).await;
        assert!(matches!(result, Err(CatalogError::InvalidRecord)));
    }

    #[tokio::test]
    async fn test_save_leaves_no_temporary_files() {
        let (store, temp) = create_test_store();
        store.ensure_exists().await.unwrap();
        store
            .add(BookRecord::link_backed("Rust Book", "Klabnik", "https://doc.rust-lang.org/book/"))
            .await
            .unwrap();

        let names: Vec<String> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["catalog.json".to_string()]);
    }

    #[test]
    fn test_delete_policy_matching() {
        let query = normalize("go");
        assert!(DeletePolicy::Exact.matches(&query, "Go!"));
        assert!(!DeletePolicy::Exact.matches(&query, "Go Programming"));
        assert!(DeletePolicy::Substring.matches(&query, "Go Programming"));
        assert_eq!("substring".parse::<DeletePolicy>().unwrap(), DeletePolicy::Substring);
    }
}
