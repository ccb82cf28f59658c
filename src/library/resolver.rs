//! Resolution of free-text queries to catalog entries.
//!
//! Users pick from a list filtered on every keystroke, but the final choice
//! is read back from the text field. An exact normalized title match is
//! therefore preferred over a longer title that merely contains the query.

use thiserror::Error;
use tracing::debug;

use super::normalize::normalize;
use crate::domain::BookRecord;

/// Errors that can occur while resolving a query
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Type or choose a book title first")]
    EmptyQuery,

    #[error("No book matching: {0}")]
    NotFound(String),
}

/// Resolve `query` to a single book.
///
/// Scans in catalog order: first an exact normalized title match, then a
/// normalized substring match. Duplicate titles resolve to the first one.
pub fn resolve<'a, I>(query: &str, catalog: I) -> Result<&'a BookRecord, ResolveError>
where
    I: IntoIterator<Item = &'a BookRecord>,
{
    let needle = normalize(query);
    if needle.is_empty() {
        return Err(ResolveError::EmptyQuery);
    }

    let titled: Vec<(&'a BookRecord, String)> = catalog
        .into_iter()
        .map(|record| (record, normalize(&record.title)))
        .collect();

    let exact = titled.iter().find(|(_, title)| *title == needle);
    if let Some(record) = exact.map(|(record, _)| *record) {
        debug!(query, title = %record.title, "Resolved by exact match");
        return Ok(record);
    }

    let partial = titled.iter().find(|(_, title)| title.contains(&needle));
    if let Some(record) = partial.map(|(record, _)| *record) {
        debug!(query, title = %record.title, "Resolved by substring match");
        return Ok(record);
    }

    Err(ResolveError::NotFound(query.trim().to_string()))
}

/// Reorder for browsing: titles containing `query` first, then the rest.
///
/// Relative order inside each group is preserved and nothing is dropped.
/// An empty query keeps catalog order.
pub fn filter_and_reorder<'a, I>(query: &str, catalog: I) -> Vec<&'a BookRecord>
where
    I: IntoIterator<Item = &'a BookRecord>,
{
    let needle = normalize(query);
    let (mut matched, rest): (Vec<_>, Vec<_>) = catalog
        .into_iter()
        .partition(|record| normalize(&record.title).contains(&needle));

    matched.extend(rest);
    matched
}

/// Only the books whose normalized title contains `query`
pub fn search<'a, I>(query: &str, catalog: I) -> Vec<&'a BookRecord>
where
    I: IntoIterator<Item = &'a BookRecord>,
{
    let needle = normalize(query);
    catalog
        .into_iter()
        .filter(|record| normalize(&record.title).contains(&needle))
        .collect()
}
