//! Catalog storage and matching.
//!
//! # Storage Layout
//!
//! ```text
//! ~/.elib/
//! ├── catalog.json              # Workbook with "Book PDF" and "E-Book" sheets
//! ├── library.db                # Accounts, issues and purchases (SQLite)
//! └── <Title>.pdf               # PDFs found by sanitized title
//! ```

pub mod catalog;
pub mod location;
pub mod normalize;
pub mod resolver;

pub use catalog::{Catalog, CatalogError, CatalogStore, DeletePolicy};
pub use location::{is_web_url, pdf_file_name, LocationError, LocationResolver, Target};
pub use normalize::{normalize, normalize_opt, sanitize_filename};
pub use resolver::{filter_and_reorder, resolve, search, ResolveError};
