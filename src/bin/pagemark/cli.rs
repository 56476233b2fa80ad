use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pagemark::StrategyKind;

/// Bookmark pagination over a journaled record store
#[derive(Parser, Debug)]
#[command(name = "pagemark", version, about = "pagemark CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Append one record
    Append {
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        text: String,
        /// Contributor identity (required with --strategy unique-token)
        #[arg(long)]
        contributor: Option<String>,
        /// native | key-range | unique-token (default: PAGEMARK_STRATEGY or key-range)
        #[arg(long)]
        strategy: Option<StrategyKind>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print one page, newest first, and the bookmark for the next one
    Page {
        #[arg(long)]
        path: PathBuf,
        /// Bookmark printed by the previous call; empty or absent starts from the top
        #[arg(long)]
        bookmark: Option<String>,
        /// Defaults to PAGEMARK_PAGE_SIZE or 5
        #[arg(long)]
        page_size: Option<usize>,
        #[arg(long)]
        strategy: Option<StrategyKind>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Append sample records "Suggestion 0", "Suggestion 1", ...
    Populate {
        #[arg(long)]
        path: PathBuf,
        /// Defaults to page size + 1
        #[arg(long)]
        count: Option<usize>,
        #[arg(long)]
        contributor: Option<String>,
        #[arg(long)]
        strategy: Option<StrategyKind>,
        /// Give every record the same created_at (exercises key-range tie handling)
        #[arg(long, default_value_t = false)]
        same_instant: bool,
    },
    /// Look up one record by identity
    Get {
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        id: String,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Store summary and effective config
    Status {
        #[arg(long)]
        path: PathBuf,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Replay the journal read-only and print process counters
    Metrics {
        #[arg(long)]
        path: PathBuf,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}
