//! Circulation Integration Tests
//!
//! Tests for customer actions end to end: title resolution, issuing,
//! purchasing with delivery, and opening recorded books.

use std::path::PathBuf;

use elib::adapters::Downloads;
use elib::core::{Circulation, CirculationError, Delivery, Ledger};
use elib::domain::{BookRecord, IssueOutcome, Session};
use elib::library::{CatalogStore, LocationError, LocationResolver, ResolveError, Target};
use tempfile::TempDir;

struct Fixture {
    temp: TempDir,
    desk: Circulation,
    session: Session,
}

impl Fixture {
    fn books_dir(&self) -> PathBuf {
        self.temp.path().join("books")
    }

    fn downloads_dir(&self) -> PathBuf {
        self.temp.path().join("downloads")
    }
}

async fn fixture(books: Vec<BookRecord>) -> Fixture {
    let temp = TempDir::new().unwrap();
    let books_dir = temp.path().join("books");
    tokio::fs::create_dir_all(&books_dir).await.unwrap();

    let catalog = CatalogStore::new(temp.path().join("catalog.json"));
    catalog.ensure_exists().await.unwrap();
    for book in books {
        catalog.add(book).await.unwrap();
    }

    let ledger = Ledger::open_in_memory().unwrap();
    ledger.register("ana", "secret").unwrap();
    let session = ledger.login("ana", "secret").unwrap();

    let desk = Circulation::new(
        catalog,
        ledger,
        LocationResolver::new(vec![books_dir]),
        Downloads::new(temp.path().join("downloads")),
    );

    Fixture {
        temp,
        desk,
        session,
    }
}

#[tokio::test]
async fn test_exact_title_beats_earlier_substring() {
    let fx = fixture(vec![
        BookRecord::file_backed("Go Programming", "Donovan", ""),
        BookRecord::file_backed("Go", "Pike", ""),
    ])
    .await;

    let (record, outcome) = fx.desk.issue(&fx.session, "go").await.unwrap();
    assert_eq!(record.title, "Go");
    assert!(outcome.is_issued());

    let partial = fx.desk.select("program").await.unwrap();
    assert_eq!(partial.title, "Go Programming");
}

#[tokio::test]
async fn test_unknown_title() {
    let fx = fixture(vec![BookRecord::file_backed("Dune", "Herbert", "")]).await;

    assert!(matches!(
        fx.desk.issue(&fx.session, "Neuromancer").await,
        Err(CirculationError::Resolve(ResolveError::NotFound(_)))
    ));
    assert!(matches!(
        fx.desk.select("  ?! ").await,
        Err(CirculationError::Resolve(ResolveError::EmptyQuery))
    ));
    assert!(fx.desk.ledger().issued_for(&fx.session).unwrap().is_empty());
}

#[tokio::test]
async fn test_browse_puts_matches_first() {
    let fx = fixture(vec![
        BookRecord::file_backed("Dune", "Herbert", ""),
        BookRecord::file_backed("Go", "Pike", ""),
        BookRecord::link_backed("Dune Messiah", "Herbert", "https://example.com/m"),
    ])
    .await;

    let titles: Vec<String> = fx
        .desk
        .browse("go")
        .await
        .into_iter()
        .map(|b| b.title)
        .collect();
    assert_eq!(titles, vec!["Go", "Dune", "Dune Messiah"]);
}

#[tokio::test]
async fn test_issue_twice_reports_existing_loan() {
    let fx = fixture(vec![BookRecord::file_backed("Dune", "Herbert", "")]).await;

    let (_, first) = fx.desk.issue(&fx.session, "Dune").await.unwrap();
    let (_, second) = fx.desk.issue(&fx.session, "dune").await.unwrap();

    assert!(first.is_issued());
    assert!(matches!(second, IssueOutcome::AlreadyIssued { .. }));

    let (issued, _) = fx.desk.my_books(&fx.session).unwrap();
    assert_eq!(issued.len(), 1);
}

#[tokio::test]
async fn test_purchase_delivers_pdf_by_title() {
    let fx = fixture(vec![BookRecord::file_backed("Dune: Part One", "Herbert", "")]).await;
    tokio::fs::write(fx.books_dir().join("Dune Part One.pdf"), b"%PDF dune")
        .await
        .unwrap();

    let receipt = fx.desk.purchase(&fx.session, "dune", true).await.unwrap();
    let expected = fx.downloads_dir().join("Dune Part One.pdf");

    assert_eq!(receipt.delivery, Delivery::Delivered(expected.clone()));
    assert_eq!(tokio::fs::read(&expected).await.unwrap(), b"%PDF dune");
    assert_eq!(receipt.record.price, 100.0);
}

#[tokio::test]
async fn test_failed_delivery_keeps_purchase() {
    let fx = fixture(vec![BookRecord::file_backed("Dune", "Herbert", "missing/Dune.pdf")]).await;

    let receipt = fx.desk.purchase(&fx.session, "Dune", true).await.unwrap();
    assert!(matches!(receipt.delivery, Delivery::Failed(_)));

    let (_, purchased) = fx.desk.my_books(&fx.session).unwrap();
    assert_eq!(purchased.len(), 1);
    assert_eq!(purchased[0].title, "Dune");
}

#[tokio::test]
async fn test_purchase_of_online_book_skips_delivery() {
    let fx = fixture(vec![BookRecord::link_backed(
        "Dune",
        "Herbert",
        "https://example.com/dune",
    )])
    .await;

    let receipt = fx.desk.purchase(&fx.session, "Dune", true).await.unwrap();
    assert!(matches!(receipt.delivery, Delivery::Skipped(_)));

    assert!(matches!(
        fx.desk.download(&fx.session, receipt.record.id).await,
        Err(CirculationError::NotDownloadable(_))
    ));
    assert!(matches!(
        fx.desk.open_purchased(&fx.session, receipt.record.id),
        Ok(Target::Url(url)) if url == "https://example.com/dune"
    ));
}

#[tokio::test]
async fn test_download_again_after_purchase() {
    let fx = fixture(vec![BookRecord::file_backed("Dune", "Herbert", "Dune.pdf")]).await;
    tokio::fs::write(fx.books_dir().join("Dune.pdf"), b"%PDF dune")
        .await
        .unwrap();

    let receipt = fx.desk.purchase(&fx.session, "Dune", false).await.unwrap();
    assert!(matches!(receipt.delivery, Delivery::Skipped(_)));

    let path = fx.desk.download(&fx.session, receipt.record.id).await.unwrap();
    assert_eq!(path, fx.downloads_dir().join("Dune.pdf"));

    assert!(matches!(
        fx.desk.download(&fx.session, receipt.record.id + 100).await,
        Err(CirculationError::UnknownPurchase(_))
    ));
}

#[tokio::test]
async fn test_open_issued_falls_back_to_title() {
    let fx = fixture(vec![BookRecord::file_backed(
        "Dune",
        "Herbert",
        "/nowhere/old-location.pdf",
    )])
    .await;
    let fallback = fx.books_dir().join("Dune.pdf");
    tokio::fs::write(&fallback, b"%PDF dune").await.unwrap();

    let id = match fx.desk.issue(&fx.session, "Dune").await.unwrap().1 {
        IssueOutcome::Issued { record, .. } => record.id,
        other => panic!("expected a new issue, got {:?}", other),
    };

    assert_eq!(
        fx.desk.open_issued(&fx.session, id).unwrap(),
        Target::File(fallback)
    );
}

#[tokio::test]
async fn test_open_issued_without_file() {
    let fx = fixture(vec![BookRecord::file_backed("Dune", "Herbert", "")]).await;
    let (_, outcome) = fx.desk.issue(&fx.session, "Dune").await.unwrap();
    let id = match outcome {
        IssueOutcome::Issued { record, .. } => record.id,
        other => panic!("expected a new issue, got {:?}", other),
    };

    assert!(matches!(
        fx.desk.open_issued(&fx.session, id),
        Err(CirculationError::Location(LocationError::LocationNotFound(_)))
    ));
    assert!(matches!(
        fx.desk.open_issued(&fx.session, id + 1),
        Err(CirculationError::UnknownIssue(_))
    ));
}

#[tokio::test]
async fn test_return_then_reissue() {
    let fx = fixture(vec![BookRecord::link_backed(
        "Dune",
        "Herbert",
        "https://example.com/dune",
    )])
    .await;

    let (_, outcome) = fx.desk.issue(&fx.session, "Dune").await.unwrap();
    let id = match outcome {
        IssueOutcome::Issued { record, .. } => record.id,
        other => panic!("expected a new issue, got {:?}", other),
    };

    assert!(fx.desk.return_issue(&fx.session, id).unwrap());
    assert!(!fx.desk.return_issue(&fx.session, id).unwrap());

    let (_, again) = fx.desk.issue(&fx.session, "Dune").await.unwrap();
    assert!(again.is_issued());
}

#[tokio::test]
async fn test_read_link_backed_book() {
    let fx = fixture(vec![BookRecord::link_backed("Dune", "Herbert", "not a url")]).await;

    assert!(matches!(
        fx.desk.read("Dune").await,
        Err(CirculationError::Location(LocationError::InvalidLocation(_)))
    ));
}
