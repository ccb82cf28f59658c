//! Delivery of purchased PDFs into the downloads directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::info;

use crate::library::pdf_file_name;

/// Copies PDFs into a downloads directory under their sanitized title
#[derive(Debug, Clone)]
pub struct Downloads {
    dir: PathBuf,
}

impl Downloads {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The downloads directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where a title is delivered to
    pub fn destination_for(&self, title: &str) -> PathBuf {
        self.dir.join(pdf_file_name(title))
    }

    /// Copy `source` to the destination for `title`.
    ///
    /// A source that already is the destination is left untouched.
    pub async fn deliver(&self, source: &Path, title: &str) -> Result<PathBuf> {
        let destination = self.destination_for(title);

        if same_file(source, &destination).await {
            return Ok(destination);
        }

        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create downloads directory: {}", self.dir.display()))?;

        fs::copy(source, &destination).await.with_context(|| {
            format!(
                "Failed to copy {} to {}",
                source.display(),
                destination.display()
            )
        })?;

        info!(source = %source.display(), destination = %destination.display(), "Delivered PDF");
        Ok(destination)
    }
}

async fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a).await, fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
