//! Catalog entries.
//!
//! A book is either a locally stored PDF or a link to a remotely hosted
//! e-book. Both share the same fields; the kind decides how `location`
//! is interpreted.

use serde::{Deserialize, Serialize};

/// Kind of catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookKind {
    /// Local PDF file, `location` is a filesystem path
    FileBacked,

    /// Remote e-book, `location` is an http(s) URL
    LinkBacked,
}

impl BookKind {
    /// Value stored in the ledger's `source` column
    pub fn as_source(&self) -> &'static str {
        match self {
            BookKind::FileBacked => "pdf",
            BookKind::LinkBacked => "ebook",
        }
    }

    /// Short label for listings
    pub fn label(&self) -> &'static str {
        match self {
            BookKind::FileBacked => "PDF",
            BookKind::LinkBacked => "Online",
        }
    }
}

impl std::fmt::Display for BookKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_source())
    }
}

impl std::str::FromStr for BookKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pdf" | "file" | "file_backed" => Ok(BookKind::FileBacked),
            "ebook" | "e-book" | "link" | "online" | "link_backed" => Ok(BookKind::LinkBacked),
            _ => anyhow::bail!("Unknown book kind: {}", s),
        }
    }
}

/// A single catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    /// Display title, also the (non-unique) matching key
    pub title: String,

    /// Author name
    pub author: String,

    /// File-backed or link-backed
    pub kind: BookKind,

    /// Filesystem path or URL; may be empty for file-backed entries
    #[serde(default)]
    pub location: String,
}

impl BookRecord {
    /// Create a new record, trimming every field
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        kind: BookKind,
        location: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into().trim().to_string(),
            author: author.into().trim().to_string(),
            kind,
            location: location.into().trim().to_string(),
        }
    }

    /// Create a file-backed record
    pub fn file_backed(
        title: impl Into<String>,
        author: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self::new(title, author, BookKind::FileBacked, path)
    }

    /// Create a link-backed record
    pub fn link_backed(
        title: impl Into<String>,
        author: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self::new(title, author, BookKind::LinkBacked, url)
    }

    /// Title and author must both be present
    pub fn is_valid(&self) -> bool {
        !self.title.is_empty() && !self.author.is_empty()
    }
}

impl std::fmt::Display for BookRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} by {} ({})", self.title, self.author, self.kind.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_str() {
        assert_eq!("pdf".parse::<BookKind>().unwrap(), BookKind::FileBacked);
        assert_eq!("E-Book".parse::<BookKind>().unwrap(), BookKind::LinkBacked);
        assert_eq!("link".parse::<BookKind>().unwrap(), BookKind::LinkBacked);
        assert!("vinyl".parse::<BookKind>().is_err());
    }

    #[test]
    fn test_kind_source_round_trips_through_from_str() {
        for kind in [BookKind::FileBacked, BookKind::LinkBacked] {
            assert_eq!(kind.as_source().parse::<BookKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_record_trims_and_validates() {
        let record = BookRecord::file_backed("  Dune ", " Herbert", "");
        assert_eq!(record.title, "Dune");
        assert_eq!(record.author, "Herbert");
        assert!(record.is_valid());

        assert!(!BookRecord::link_backed("Dune", "  ", "https://x").is_valid());
    }
}
