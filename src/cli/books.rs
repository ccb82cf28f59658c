//! Catalog management subcommands (administrators only).
//!
//! Provides commands to:
//! - `add`: Append a book to its sheet
//! - `delete`: Remove books by title
//! - `modify`: Change title and/or author of matching books
//! - `search`: Show books whose title contains some text
//! - `show`: Show both sheets with their locations

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::config::ResolvedConfig;
use crate::core::Circulation;
use crate::domain::{BookKind, BookRecord};
use crate::library::{search, DeletePolicy};

/// Catalog management subcommands
#[derive(Subcommand, Debug)]
pub enum BookCommands {
    /// Add a book to the catalog
    Add {
        /// Sheet to add to: pdf or ebook
        #[arg(short, long, default_value = "pdf")]
        kind: String,

        /// Book title
        #[arg(short, long)]
        title: String,

        /// Book author
        #[arg(short, long)]
        author: String,

        /// File path (pdf) or URL (ebook)
        #[arg(short, long, default_value = "")]
        location: String,
    },

    /// Delete books by title
    Delete {
        /// Title to delete
        title: String,

        /// Matching policy: exact or substring (default from config)
        #[arg(long)]
        policy: Option<String>,
    },

    /// Modify title and/or author of books with this title
    Modify {
        /// Current title
        title: String,

        /// New title
        #[arg(long)]
        new_title: Option<String>,

        /// New author
        #[arg(long)]
        new_author: Option<String>,
    },

    /// Search titles
    Search {
        /// Text contained in the title
        query: String,
    },

    /// Show every book with its location
    Show,
}

/// Execute catalog subcommands
pub async fn execute(desk: &Circulation, cfg: &ResolvedConfig, command: BookCommands) -> Result<()> {
    match command {
        BookCommands::Add {
            kind,
            title,
            author,
            location,
        } => {
            let kind: BookKind = kind.parse()?;
            let record = BookRecord::new(title, author, kind, location);
            let title = record.title.clone();
            desk.catalog()
                .add(record)
                .await
                .context("Failed to add book")?;
            println!("Added '{}' to the {} sheet.", title, kind.label());
            Ok(())
        }
        BookCommands::Delete { title, policy } => {
            let policy: DeletePolicy = match policy {
                Some(policy) => policy.parse()?,
                None => cfg.delete_policy,
            };
            let removed = desk.catalog().delete(&title, policy).await?;
            if removed == 0 {
                println!("No book matches '{}'.", title);
            } else {
                println!("Deleted {} book(s) matching '{}'.", removed, title);
            }
            Ok(())
        }
        BookCommands::Modify {
            title,
            new_title,
            new_author,
        } => {
            if new_title.is_none() && new_author.is_none() {
                anyhow::bail!("Nothing to change: pass --new-title and/or --new-author");
            }
            let updated = desk
                .catalog()
                .modify(&title, new_title.as_deref(), new_author.as_deref())
                .await?;
            if updated {
                println!("Book details updated.");
            } else {
                println!("No book titled '{}'.", title);
            }
            Ok(())
        }
        BookCommands::Search { query } => {
            let books = desk.catalog().list().await;
            let found: Vec<&BookRecord> = search(&query, &books);

            if found.is_empty() {
                println!("No matching titles.");
                return Ok(());
            }
            for book in found {
                println!("{}", book);
            }
            Ok(())
        }
        BookCommands::Show => {
            let catalog = desk.catalog().load().await?;
            print_sheet("Book PDF", &catalog.file_backed);
            println!();
            print_sheet("E-Book", &catalog.link_backed);
            Ok(())
        }
    }
}

fn print_sheet(name: &str, books: &[BookRecord]) {
    println!("{} ({} books)", name, books.len());
    println!("{}", "-".repeat(60));

    for book in books {
        println!("  {} - {}", book.title, book.author);
        if !book.location.is_empty() {
            println!("    {}", book.location);
        }
    }
}
