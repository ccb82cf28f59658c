//! Configuration for elib paths and lending settings.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (ELIB_HOME, ELIB_CATALOG, ELIB_DATABASE,
//!    ELIB_BOOKS_DIR, ELIB_DOWNLOADS)
//! 2. Config file (.elib/config.yaml)
//! 3. Defaults (~/.elib)
//!
//! Config file discovery:
//! - Searches current directory and parents for .elib/config.yaml
//! - Paths in config file are relative to the project root (the parent of .elib/)

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::{LendingPolicy, MAX_LOAN_DAYS};
use crate::library::DeletePolicy;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub lending: Option<LendingConfig>,
    #[serde(default)]
    pub catalog: Option<CatalogConfig>,
    #[serde(default)]
    pub opener: Option<OpenerConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory holding the database (and catalog by default)
    pub home: Option<String>,
    /// Catalog workbook file
    pub catalog: Option<String>,
    /// Ledger database file
    pub database: Option<String>,
    /// Directory searched for PDFs by title
    pub books_dir: Option<String>,
    /// Directory purchased PDFs are delivered to
    pub downloads: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LendingConfig {
    pub loan_days: Option<i64>,
    pub purchase_price: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    pub delete_policy: Option<DeletePolicy>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenerConfig {
    /// Program used instead of the platform default opener
    pub command: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// State directory
    pub home: PathBuf,
    /// Catalog workbook
    pub catalog: PathBuf,
    /// Ledger database
    pub database: PathBuf,
    /// Directory searched for PDFs by title
    pub books_dir: PathBuf,
    /// Delivery directory for purchased PDFs
    pub downloads: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Loan period and purchase price
    pub lending: LendingPolicy,
    /// Title matching used by `books delete`
    pub delete_policy: DeletePolicy,
    /// Opener program override
    pub opener_command: Option<String>,
}

impl ResolvedConfig {
    /// Directories searched for file-backed books, in fallback order
    pub fn search_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = vec![self.books_dir.clone()];
        if self.downloads != self.books_dir {
            dirs.push(self.downloads.clone());
        }
        dirs
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".elib").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Default home directory (~/.elib)
fn default_home() -> Result<PathBuf> {
    Ok(dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".elib"))
}

/// Build the configuration from an optional config file and an environment
/// lookup. Environment values win over the file, the file over defaults.
fn resolve_config(
    config_file: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    let file = match config_file {
        Some(ref path) => Some(load_config_file(path)?),
        None => None,
    };

    // Base directory is the parent of .elib/ (i.e., grandparent of config.yaml)
    let base_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .and_then(Path::parent)
        .unwrap_or(Path::new("."))
        .to_path_buf();

    let paths = file.as_ref().map(|f| f.paths.clone()).unwrap_or_default();
    let pick = |var: &str, configured: &Option<String>| -> Option<PathBuf> {
        env(var)
            .map(PathBuf::from)
            .or_else(|| configured.as_deref().map(|p| resolve_path(&base_dir, p)))
    };

    let home = match pick("ELIB_HOME", &paths.home) {
        Some(home) => home,
        None => default_home()?,
    };
    let catalog = pick("ELIB_CATALOG", &paths.catalog).unwrap_or_else(|| home.join("catalog.json"));
    let database =
        pick("ELIB_DATABASE", &paths.database).unwrap_or_else(|| home.join("library.db"));
    let books_dir = pick("ELIB_BOOKS_DIR", &paths.books_dir).unwrap_or_else(|| {
        catalog
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| home.clone())
    });
    let downloads = pick("ELIB_DOWNLOADS", &paths.downloads)
        .or_else(dirs::download_dir)
        .unwrap_or_else(|| home.join("downloads"));

    let defaults = LendingPolicy::default();
    let lending = file.as_ref().and_then(|f| f.lending.as_ref());
    let lending = LendingPolicy {
        loan_days: lending
            .and_then(|l| l.loan_days)
            .filter(|days| (1..=MAX_LOAN_DAYS).contains(days))
            .unwrap_or(defaults.loan_days),
        purchase_price: lending
            .and_then(|l| l.purchase_price)
            .filter(|price| *price >= 0.0)
            .unwrap_or(defaults.purchase_price),
    };

    let delete_policy = file
        .as_ref()
        .and_then(|f| f.catalog.as_ref())
        .and_then(|c| c.delete_policy)
        .unwrap_or_default();

    let opener_command = file
        .as_ref()
        .and_then(|f| f.opener.as_ref())
        .and_then(|o| o.command.clone())
        .filter(|c| !c.trim().is_empty());

    Ok(ResolvedConfig {
        home,
        catalog,
        database,
        books_dir,
        downloads,
        config_file,
        lending,
        delete_policy,
        opener_command,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    resolve_config(find_config_file(), |var| std::env::var(var).ok())
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}
