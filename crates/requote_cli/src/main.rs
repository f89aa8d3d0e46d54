//! `requote` operator CLI.
//!
//! # Responsibility
//! - Run one delivery tick (cron entry point).
//! - Inspect and edit a user's dashboard from a shell.

use clap::{Parser, Subcommand};
use log::error;
use requote_core::{
    init_logging_from_config, open_db, truncate_preview, CoreConfig, EmailRotator, MailSettings,
    OwnerId, Quote, QuoteDraft, QuoteId, QuoteService, SpoolMailer, SqliteQuoteRepository,
    SqliteScheduleRepository, SqliteUserRepository, UserRepository, SELECTION_CAP,
};
use rusqlite::Connection;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "requote")]
#[command(about = "Quote dashboard and morning mail rotation")]
#[command(version)]
struct Args {
    /// JSON config file; built-in defaults apply when omitted
    #[arg(short, long, global = true, env = "REQUOTE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check core linkage
    Ping,
    /// Register a mail recipient
    AddUser { email: String },
    /// Add a quote to the end of the unselected list
    AddQuote {
        email: String,
        content: String,
        #[arg(short, long)]
        author: String,
        #[arg(short, long)]
        source: Option<String>,
    },
    /// Add a quote to the morning rotation
    Select { email: String, quote_id: QuoteId },
    /// Take a quote out of the morning rotation
    Deselect { email: String, quote_id: QuoteId },
    /// Print both partitions of a user's dashboard
    Board { email: String },
    /// Send every user their next scheduled quote
    Tick,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_exit module=cli status=error");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = match &args.config {
        Some(path) => CoreConfig::load(path)?,
        None => CoreConfig::default(),
    };
    init_logging_from_config(&config)?;

    if let Command::Ping = args.command {
        println!(
            "requote_core ping={} version={}",
            requote_core::ping(),
            requote_core::core_version()
        );
        return Ok(());
    }

    let conn = open_db(&config.db_path)?;
    match args.command {
        Command::Ping => {}
        Command::AddUser { email } => {
            let user = SqliteUserRepository::try_new(&conn)?.create_user(&email)?;
            println!("user {} <{}>", user.id, user.email);
        }
        Command::AddQuote {
            email,
            content,
            author,
            source,
        } => {
            let owner_id = owner_by_email(&conn, &email)?;
            let draft = QuoteDraft::new(content, author, source)?;
            let quote = QuoteService::new(&conn, config.affiliate_tag.as_str())
                .add_quote(owner_id, &draft)?;
            println!("quote {}", quote.id);
        }
        Command::Select { email, quote_id } => {
            let owner_id = owner_by_email(&conn, &email)?;
            QuoteService::new(&conn, config.affiliate_tag.as_str())
                .set_selected(owner_id, quote_id, true)?;
        }
        Command::Deselect { email, quote_id } => {
            let owner_id = owner_by_email(&conn, &email)?;
            QuoteService::new(&conn, config.affiliate_tag.as_str())
                .set_selected(owner_id, quote_id, false)?;
        }
        Command::Board { email } => {
            let owner_id = owner_by_email(&conn, &email)?;
            let board = QuoteService::new(&conn, config.affiliate_tag.as_str()).board(owner_id)?;
            println!("Selected ({}/{SELECTION_CAP}):", board.selected.len());
            print_quotes(&board.selected);
            println!("Unselected ({}):", board.unselected.len());
            print_quotes(&board.unselected);
        }
        Command::Tick => {
            let rotator = EmailRotator::new(
                SqliteScheduleRepository::try_new(&conn)?,
                SqliteQuoteRepository::try_new(&conn)?,
                SqliteUserRepository::try_new(&conn)?,
                SpoolMailer::new(&config.spool_dir)?,
                MailSettings::from(&config),
            );
            let report = rotator.run_tick()?;
            println!(
                "tick sent={} skipped={} failed={}",
                report.sent(),
                report.skipped(),
                report.failed()
            );
        }
    }
    Ok(())
}

fn owner_by_email(conn: &Connection, email: &str) -> Result<OwnerId, Box<dyn Error>> {
    SqliteUserRepository::try_new(conn)?
        .find_user_by_email(email)?
        .map(|user| user.id)
        .ok_or_else(|| format!("no user registered for `{email}`").into())
}

fn print_quotes(quotes: &[Quote]) {
    for quote in quotes {
        println!(
            "  {:>2}. {}  ({})  [{}]",
            quote.position,
            truncate_preview(&quote.content),
            quote.author,
            quote.id
        );
    }
}
