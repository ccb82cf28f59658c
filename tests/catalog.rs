//! Catalog Store Integration Tests
//!
//! Tests for workbook round-trips, add/delete/modify semantics and how
//! damaged workbooks are reported.

use elib::domain::BookRecord;
use elib::library::{CatalogError, CatalogStore, DeletePolicy};
use tempfile::TempDir;

async fn seeded_store(temp: &TempDir) -> CatalogStore {
    let store = CatalogStore::new(temp.path().join("catalog.json"));
    store.ensure_exists().await.unwrap();
    for record in [
        BookRecord::file_backed("Go", "Pike", "go.pdf"),
        BookRecord::file_backed("Go Programming", "Donovan", "gopl.pdf"),
        BookRecord::link_backed("Dune", "Herbert", "https://example.com/dune"),
        BookRecord::link_backed("Go", "Kernighan", "https://go.dev/doc"),
    ] {
        store.add(record).await.unwrap();
    }
    store
}

#[tokio::test]
async fn test_save_of_load_preserves_order() {
    let temp = TempDir::new().unwrap();
    let store = seeded_store(&temp).await;

    let before = store.load().await.unwrap();
    store.save(&before).await.unwrap();
    let after = store.load().await.unwrap();

    assert_eq!(before, after);
    let titles: Vec<&str> = after.books().iter().map(|b| b.title.as_str()).collect();
    assert_eq!(titles, vec!["Go", "Go Programming", "Dune", "Go"]);
}

#[tokio::test]
async fn test_exact_delete_leaves_longer_titles() {
    let temp = TempDir::new().unwrap();
    let store = seeded_store(&temp).await;

    let removed = store.delete("  go ", DeletePolicy::Exact).await.unwrap();
    assert_eq!(removed, 2);

    let titles: Vec<String> = store.list().await.into_iter().map(|b| b.title).collect();
    assert_eq!(titles, vec!["Go Programming", "Dune"]);
}

#[tokio::test]
async fn test_substring_delete() {
    let temp = TempDir::new().unwrap();
    let store = seeded_store(&temp).await;

    let removed = store.delete("go", DeletePolicy::Substring).await.unwrap();
    assert_eq!(removed, 3);
    assert_eq!(store.list().await.len(), 1);

    // Nothing left to match; the store is untouched
    assert_eq!(store.delete("go", DeletePolicy::Substring).await.unwrap(), 0);
    assert_eq!(store.delete("", DeletePolicy::Substring).await.unwrap(), 0);
    assert_eq!(store.list().await.len(), 1);
}

#[tokio::test]
async fn test_modify_updates_every_duplicate() {
    let temp = TempDir::new().unwrap();
    let store = seeded_store(&temp).await;

    assert!(store.modify("GO", Some("The Go Book"), None).await.unwrap());

    let books = store.list().await;
    let renamed: Vec<&BookRecord> = books.iter().filter(|b| b.title == "The Go Book").collect();
    assert_eq!(renamed.len(), 2);
    // Authors untouched
    assert_eq!(renamed[0].author, "Pike");
    assert_eq!(renamed[1].author, "Kernighan");
    assert!(books.iter().any(|b| b.title == "Go Programming"));

    assert!(!store.modify("Missing", Some("X"), None).await.unwrap());
}

#[tokio::test]
async fn test_modify_author_only() {
    let temp = TempDir::new().unwrap();
    let store = seeded_store(&temp).await;

    assert!(store.modify("Dune", Some("  "), Some("F. Herbert")).await.unwrap());
    let dune = store
        .list()
        .await
        .into_iter()
        .find(|b| b.title == "Dune")
        .unwrap();
    assert_eq!(dune.author, "F. Herbert");
}

#[tokio::test]
async fn test_add_rejects_missing_author() {
    let temp = TempDir::new().unwrap();
    let store = seeded_store(&temp).await;

    let result = store.add(BookRecord::file_backed("Nameless", " ", "")).await;
    assert!(matches!(result, Err(CatalogError::InvalidRecord)));
    assert_eq!(store.list().await.len(), 4);
}

#[tokio::test]
async fn test_corrupt_workbook_is_unavailable() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("catalog.json");
    tokio::fs::write(&path, "not a workbook").await.unwrap();

    let store = CatalogStore::new(&path);
    assert!(matches!(
        store.load().await,
        Err(CatalogError::StoreUnavailable { .. })
    ));
    // Readers see an empty catalog, writers fail
    assert!(store.list().await.is_empty());
    assert!(store
        .add(BookRecord::file_backed("Dune", "Herbert", ""))
        .await
        .is_err());
    // The damaged file was not overwritten
    assert_eq!(
        tokio::fs::read_to_string(&path).await.unwrap(),
        "not a workbook"
    );
}

#[tokio::test]
async fn test_column_names_are_case_insensitive() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("catalog.json");
    let workbook = serde_json::json!({
        "version": 1,
        "sheets": {
            "Book PDF": {
                "columns": ["Title", "AUTHOR", "FilePath"],
                "rows": [["Dune", "Herbert", "Dune.pdf"]]
            },
            "E-Book": { "columns": ["title", "author", "url"], "rows": [] }
        }
    });
    tokio::fs::write(&path, workbook.to_string()).await.unwrap();

    let catalog = CatalogStore::new(&path).load().await.unwrap();
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog.file_backed[0].location, "Dune.pdf");
}
