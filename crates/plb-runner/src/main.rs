//! # plb-runner
//!
//! Main entry point for the price-level book system.
//!
//! Loads a JSON configuration file, builds one price-level book per
//! configured subscription over a JSONL replay feed, logs the resulting
//! notifications, and manages lifecycle.
//!
//! # Usage
//!
//! ```bash
//! plb-runner config.json --log-level info
//! ```

mod stats;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::Parser;
use plb_book::{OrderFeed, PriceLevelBook, ReplayFeed};
use tracing::{debug, error, info};

use crate::stats::NotificationStats;

/// Price-Level Book Replay Runner.
#[derive(Parser)]
#[command(name = "plb-runner", about = "Price-Level Book Replay Runner")]
struct Cli {
    /// Configuration file path (JSON).
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Optional log directory for file output.
    #[arg(long)]
    log_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration (errors surface on stderr via anyhow)
    let config = plb_core::config::load_config(&cli.config)?;

    // 2. Initialize logging — CLI --log-dir overrides the config's log path
    let log_dir = cli.log_dir.clone().or_else(|| config.log_path());
    plb_core::logging::init_logging(&cli.log_level, log_dir.as_deref());

    info!("plb-runner starting — config={}, log_level={}", cli.config.display(), cli.log_level,);
    info!(
        "config loaded — module '{}', {} subscription(s)",
        config.module_name(),
        config.subscriptions.len(),
    );

    // 3. Build one book + replay feed per subscription
    let mut feeds: Vec<Arc<ReplayFeed>> = Vec::new();
    let mut books: Vec<PriceLevelBook> = Vec::new();

    for (idx, sub) in config.subscriptions.iter().enumerate() {
        let feed = Arc::new(ReplayFeed::new(
            &sub.replay.path,
            sub.replay.effective_batch_pause_ms(),
        ));

        let book = match PriceLevelBook::create(
            feed.clone() as Arc<dyn OrderFeed>,
            &sub.symbol,
            &sub.effective_source(),
            sub.effective_levels(),
        ) {
            Ok(book) => book,
            Err(e) => {
                error!("subscription[{idx}]: failed to create book for '{}': {e}", sub.symbol);
                continue;
            }
        };
        register_log_handlers(&book);

        if let Err(e) = feed.start() {
            error!("subscription[{idx}]: failed to start replay for '{}': {e}", sub.symbol);
            continue;
        }
        info!(
            "subscription[{idx}]: book '{}' live (source={}, levels={}, replay={})",
            sub.symbol,
            sub.effective_source(),
            sub.effective_levels(),
            sub.replay.path,
        );

        feeds.push(feed);
        books.push(book);
    }

    info!("all {} book(s) live — press Ctrl+C to stop", books.len());

    // 4. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    // 5. Stop feeds, then close books (detaches listeners)
    for feed in &feeds {
        feed.stop();
    }
    drop(books);

    info!("all books closed — goodbye");
    Ok(())
}

/// Wire logging handlers onto a book: snapshots at info, updates and
/// change-sets at debug, plus a periodic notification-stats summary.
fn register_log_handlers(book: &PriceLevelBook) {
    let symbol = book.symbol().to_string();
    book.set_on_new_book(move |view| info!("[{symbol}] {view}"));

    let stats = Arc::new(Mutex::new(NotificationStats::new()));

    let symbol = book.symbol().to_string();
    let sink = stats.clone();
    book.set_on_incremental_change(move |changes| {
        if !changes.is_empty() {
            debug!("[{symbol}] {changes}");
        }
        sink.lock().unwrap_or_else(|e| e.into_inner()).record_changes(changes);
    });

    let symbol = book.symbol().to_string();
    book.set_on_book_update(move |view| {
        debug!("[{symbol}] {view}");

        let mut stats = stats.lock().unwrap_or_else(|e| e.into_inner());
        stats.record_view(view);
        if stats.due_report() {
            info!("[{symbol}] {}", *stats);
        }
    });
}
