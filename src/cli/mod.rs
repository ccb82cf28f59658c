//! Command-line interface for elib.
//!
//! Provides commands for browsing and reading the catalog, issuing,
//! returning and buying books, and managing the catalog and accounts.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};

use crate::adapters::{Opener, SystemOpener};
use crate::config::{self, ResolvedConfig};
use crate::core::{Circulation, Delivery};
use crate::domain::{BookRecord, IssueOutcome, Session};
use crate::library::Target;

pub mod books;

/// elib - Personal e-book library
#[derive(Parser, Debug)]
#[command(name = "elib")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Username to act as
    #[arg(short, long, global = true, env = "ELIB_USER")]
    pub user: Option<String>,

    /// Password for --user
    #[arg(short, long, global = true, env = "ELIB_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the catalog file and the database
    Init,

    /// Create a customer account (uses --password)
    Register {
        /// New username
        username: String,
    },

    /// Browse the catalog, matching titles first
    List {
        /// Move titles containing this text to the top
        #[arg(short, long)]
        query: Option<String>,
    },

    /// Open a book by title
    Read {
        /// Title (exact or partial)
        query: String,
    },

    /// Issue a book for the loan period
    Issue {
        /// Title (exact or partial)
        query: String,
    },

    /// Buy a book and copy its PDF to the downloads directory
    Buy {
        /// Title (exact or partial)
        query: String,

        /// Record the purchase without copying the PDF
        #[arg(long)]
        no_download: bool,
    },

    /// List my issued and purchased books
    Mine,

    /// Return an issued book
    Return {
        /// Issue ID (see `elib mine`)
        id: i64,
    },

    /// Open an issued book
    OpenIssued {
        /// Issue ID (see `elib mine`)
        id: i64,
    },

    /// Open a purchased book
    OpenPurchased {
        /// Purchase ID (see `elib mine`)
        id: i64,
    },

    /// Copy a purchased PDF to the downloads directory
    Download {
        /// Purchase ID (see `elib mine`)
        id: i64,
    },

    /// Manage the catalog (administrators)
    Books {
        #[command(subcommand)]
        command: books::BookCommands,
    },

    /// Manage accounts
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Show resolved configuration (debug)
    Config,
}

#[derive(Subcommand, Debug)]
pub enum AdminCommands {
    /// Give a user the administrator role
    ///
    /// Anyone may grant the first administrator; afterwards an
    /// administrator login is required.
    Grant {
        /// User to promote
        username: String,
    },
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let cfg = config::config()?;

        if matches!(self.command, Commands::Config) {
            return show_config(cfg);
        }

        let desk = Circulation::from_config(cfg).await?;
        let credentials = Credentials {
            user: self.user,
            password: self.password,
        };
        let opener = match &cfg.opener_command {
            Some(program) => SystemOpener::with_program(program),
            None => SystemOpener::new(),
        };

        match self.command {
            Commands::Init => init(cfg),
            Commands::Register { username } => register(&desk, &username, &credentials),
            Commands::List { query } => list_books(&desk, query.as_deref().unwrap_or("")).await,
            Commands::Read { query } => read_book(&desk, &opener, &query).await,
            Commands::Issue { query } => {
                let session = credentials.login(&desk)?;
                issue_book(&desk, &session, &query).await
            }
            Commands::Buy { query, no_download } => {
                let session = credentials.login(&desk)?;
                buy_book(&desk, &session, &query, !no_download).await
            }
            Commands::Mine => {
                let session = credentials.login(&desk)?;
                show_my_books(&desk, &session)
            }
            Commands::Return { id } => {
                let session = credentials.login(&desk)?;
                return_book(&desk, &session, id)
            }
            Commands::OpenIssued { id } => {
                let session = credentials.login(&desk)?;
                let target = desk.open_issued(&session, id)?;
                open_target(&opener, &target)
            }
            Commands::OpenPurchased { id } => {
                let session = credentials.login(&desk)?;
                let target = desk.open_purchased(&session, id)?;
                open_target(&opener, &target)
            }
            Commands::Download { id } => {
                let session = credentials.login(&desk)?;
                let path = desk.download(&session, id).await?;
                println!("Book downloaded to: {}", path.display());
                Ok(())
            }
            Commands::Books { command } => {
                let session = credentials.login(&desk)?;
                desk.ledger().require_admin(&session)?;
                books::execute(&desk, cfg, command).await
            }
            Commands::Admin { command } => execute_admin(&desk, &credentials, command),
            Commands::Config => show_config(cfg),
        }
    }
}

/// Credentials passed on the command line or through the environment
struct Credentials {
    user: Option<String>,
    password: Option<String>,
}

impl Credentials {
    fn password(&self) -> Result<&str> {
        self.password
            .as_deref()
            .context("Password required: pass --password or set ELIB_PASSWORD")
    }

    fn is_present(&self) -> bool {
        self.user.is_some() && self.password.is_some()
    }

    fn login(&self, desk: &Circulation) -> Result<Session> {
        let user = self
            .user
            .as_deref()
            .context("Login required: pass --user or set ELIB_USER")?;
        let session = desk.ledger().login(user, self.password()?)?;
        Ok(session)
    }
}

/// Execute admin subcommands
fn execute_admin(desk: &Circulation, credentials: &Credentials, command: AdminCommands) -> Result<()> {
    match command {
        AdminCommands::Grant { username } => {
            let session = if credentials.is_present() {
                Some(credentials.login(desk)?)
            } else {
                None
            };
            desk.ledger().grant_admin(session.as_ref(), &username)?;
            println!("'{}' is now an administrator.", username.trim());
            Ok(())
        }
    }
}

/// Storage is created while opening the desk; report where it lives
fn init(cfg: &ResolvedConfig) -> Result<()> {
    println!("Catalog:  {}", cfg.catalog.display());
    println!("Database: {}", cfg.database.display());
    Ok(())
}

fn register(desk: &Circulation, username: &str, credentials: &Credentials) -> Result<()> {
    desk.ledger().register(username, credentials.password()?)?;
    println!("Registration successful. Please login.");
    Ok(())
}

/// Local calendar date of an instant
fn local_date(instant: DateTime<Utc>) -> String {
    instant.with_timezone(&Local).format("%Y-%m-%d").to_string()
}

/// Truncate a title for table output
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

fn print_books(books: &[BookRecord]) {
    println!("{:<4} {:<44} {:<24} {:<8}", "#", "TITLE", "AUTHOR", "TYPE");
    println!("{}", "-".repeat(82));

    for (index, book) in books.iter().enumerate() {
        println!(
            "{:<4} {:<44} {:<24} {:<8}",
            index + 1,
            truncate(&book.title, 44),
            truncate(&book.author, 24),
            book.kind.label()
        );
    }
}

/// Browse the catalog
async fn list_books(desk: &Circulation, query: &str) -> Result<()> {
    let books = desk.browse(query).await;

    if books.is_empty() {
        println!("No books available.");
        return Ok(());
    }

    print_books(&books);
    println!("\nTotal: {} books", books.len());
    Ok(())
}

fn open_target(opener: &dyn Opener, target: &Target) -> Result<()> {
    opener.open(target)?;
    println!("Opened: {}", target);
    Ok(())
}

/// Resolve a title and open it
async fn read_book(desk: &Circulation, opener: &dyn Opener, query: &str) -> Result<()> {
    let (record, target) = desk.read(query).await?;
    eprintln!("{}", record);
    open_target(opener, &target)
}

async fn issue_book(desk: &Circulation, session: &Session, query: &str) -> Result<()> {
    let (record, outcome) = desk.issue(session, query).await?;

    match outcome {
        IssueOutcome::Issued { record: issue, .. } => {
            println!(
                "'{}' issued for {} days until {} (id {}).",
                record.title,
                desk.ledger().policy().loan_days,
                local_date(issue.expiry_date),
                issue.id
            );
        }
        IssueOutcome::AlreadyIssued { expiry_date } => {
            println!(
                "You already issued '{}' until {}.",
                record.title,
                local_date(expiry_date)
            );
        }
    }

    Ok(())
}

async fn buy_book(desk: &Circulation, session: &Session, query: &str, deliver: bool) -> Result<()> {
    let receipt = desk.purchase(session, query, deliver).await?;
    println!(
        "You purchased '{}' for {:.2} (id {}).",
        receipt.record.title, receipt.record.price, receipt.record.id
    );

    match receipt.delivery {
        Delivery::Delivered(path) => println!("Book downloaded to: {}", path.display()),
        Delivery::Skipped(reason) => eprintln!("Not downloaded: {}", reason),
        Delivery::Failed(error) => eprintln!("Download error (purchase kept): {}", error),
    }

    Ok(())
}

fn show_my_books(desk: &Circulation, session: &Session) -> Result<()> {
    let (issued, purchased) = desk.my_books(session)?;

    println!("My books - {}\n", session.username());
    println!("Issued (active):");
    if issued.is_empty() {
        println!("  (none)");
    }
    for issue in &issued {
        println!(
            "  [{}] {} - {} (until {})",
            issue.id,
            issue.title,
            issue.author,
            local_date(issue.expiry_date)
        );
    }

    println!("\nPurchased:");
    if purchased.is_empty() {
        println!("  (none)");
    }
    for purchase in &purchased {
        println!(
            "  [{}] {} - {} (bought {})",
            purchase.id,
            purchase.title,
            purchase.author,
            local_date(purchase.purchase_date)
        );
    }

    Ok(())
}

fn return_book(desk: &Circulation, session: &Session, id: i64) -> Result<()> {
    if desk.return_issue(session, id)? {
        println!("Book {} returned successfully.", id);
    } else {
        println!("Book {} is not issued to you; nothing to return.", id);
    }
    Ok(())
}

/// Show the resolved configuration (for debugging)
fn show_config(cfg: &ResolvedConfig) -> Result<()> {
    println!("elib configuration\n");
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:      {}", cfg.home.display());
    println!("  Catalog:   {}", cfg.catalog.display());
    println!("  Database:  {}", cfg.database.display());
    println!("  Books dir: {}", cfg.books_dir.display());
    println!("  Downloads: {}", cfg.downloads.display());
    println!();
    println!("Lending:");
    println!("  Loan period:    {} days", cfg.lending.loan_days);
    println!("  Purchase price: {:.2}", cfg.lending.purchase_price);
    println!();
    println!("Catalog:");
    println!("  Delete policy:  {:?}", cfg.delete_policy);
    println!(
        "  Opener:         {}",
        cfg.opener_command.as_deref().unwrap_or("(platform default)")
    );

    Ok(())
}
