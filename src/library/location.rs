//! Location resolution: from a catalog entry to something openable.
//!
//! File-backed books are looked up in this order:
//! 1. the stored location, if it exists (relative paths are also tried
//!    against each search directory)
//! 2. `<sanitized title>.pdf` in each search directory, in order
//! 3. any `.pdf` in a search directory whose normalized stem contains the
//!    normalized title (first in directory order)
//!
//! Link-backed books must carry an absolute http(s) URL.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use thiserror::Error;
use tracing::debug;

use super::normalize::{normalize, sanitize_filename};
use crate::domain::{BookKind, BookRecord};

/// Errors that can occur while resolving a location
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("PDF not found for '{0}'")]
    LocationNotFound(String),

    #[error("URL missing or invalid: '{0}'")]
    InvalidLocation(String),
}

/// A concrete target for the opener
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Local file
    File(PathBuf),

    /// Remote http(s) resource
    Url(String),
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::File(path) => write!(f, "{}", path.display()),
            Target::Url(url) => write!(f, "{}", url),
        }
    }
}

/// File name a title is stored (and delivered) under
pub fn pdf_file_name(title: &str) -> String {
    format!("{}.pdf", sanitize_filename(title))
}

/// Check that `location` is an absolute http or https URL
pub fn is_web_url(location: &str) -> bool {
    let lower = location.trim().to_lowercase();
    ["http://", "https://"].iter().any(|scheme| {
        lower
            .strip_prefix(scheme)
            .map(|rest| !rest.is_empty() && !rest.starts_with('/'))
            .unwrap_or(false)
    })
}

/// Resolves catalog entries and ledger records to openable targets
#[derive(Debug, Clone)]
pub struct LocationResolver {
    /// Directories tried in order for file-backed books
    search_dirs: Vec<PathBuf>,
}

impl LocationResolver {
    /// Create a resolver searching `search_dirs` in order
    pub fn new(search_dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            search_dirs: search_dirs.into_iter().collect(),
        }
    }

    /// Directories searched for file-backed books
    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    /// Resolve a book to an openable target
    pub fn resolve(&self, record: &BookRecord) -> Result<Target, LocationError> {
        match record.kind {
            BookKind::FileBacked => self.resolve_file(record).map(Target::File),
            BookKind::LinkBacked => {
                let url = record.location.trim();
                if is_web_url(url) {
                    Ok(Target::Url(url.to_string()))
                } else {
                    Err(LocationError::InvalidLocation(url.to_string()))
                }
            }
        }
    }

    /// Locate the PDF for a file-backed book
    pub fn resolve_file(&self, record: &BookRecord) -> Result<PathBuf, LocationError> {
        if let Some(path) = self.stored_location(&record.location) {
            debug!(title = %record.title, path = %path.display(), "Using stored location");
            return Ok(path);
        }

        let file_name = pdf_file_name(&record.title);
        if let Some(path) = self
            .search_dirs
            .iter()
            .map(|dir| dir.join(&file_name))
            .find(|candidate| candidate.is_file())
        {
            debug!(title = %record.title, path = %path.display(), "Found PDF by title");
            return Ok(path);
        }

        if let Some(path) = self.scan_for_title(&record.title) {
            debug!(title = %record.title, path = %path.display(), "Found PDF by directory scan");
            return Ok(path);
        }

        Err(LocationError::LocationNotFound(record.title.clone()))
    }

    fn stored_location(&self, location: &str) -> Option<PathBuf> {
        let location = location.trim();
        if location.is_empty() {
            return None;
        }

        let path = PathBuf::from(location);
        if path.is_file() {
            return Some(path);
        }

        if path.is_relative() {
            return self
                .search_dirs
                .iter()
                .map(|dir| dir.join(&path))
                .find(|candidate| candidate.is_file());
        }

        None
    }

    fn scan_for_title(&self, title: &str) -> Option<PathBuf> {
        let needle = normalize(title);
        if needle.is_empty() {
            return None;
        }

        self.search_dirs
            .iter()
            .flat_map(|dir| pdfs_in(dir))
            .find(|path| {
                path.file_stem()
                    .map(|stem| normalize(&stem.to_string_lossy()).contains(&needle))
                    .unwrap_or(false)
            })
    }
}

/// All `.pdf` files directly inside `dir`, in path order
fn pdfs_in(dir: &Path) -> Vec<PathBuf> {
    let pattern = format!("{}/*.pdf", Pattern::escape(&dir.to_string_lossy()));
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };

    match glob::glob_with(&pattern, options) {
        Ok(paths) => paths.filter_map(Result::ok).filter(|p| p.is_file()).collect(),
        Err(e) => {
            debug!(dir = %dir.display(), "Skipping directory scan: {}", e);
            Vec::new()
        }
    }
}
