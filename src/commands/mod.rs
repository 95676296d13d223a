pub mod poll;

use crate::config::Config;
use crate::db::KeyValueStore;
use crate::handlers::share::SiteLinks;
use crate::registry::PollBackend;
use crate::voting::results::SortBy;
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use rand::Rng;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "poll-board", version, about = "Community polls: boards, voting and results")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compose this session's category boards
    Boards {
        /// Explicit board categories, comma separated
        #[arg(long, value_delimiter = ',')]
        categories: Option<Vec<String>>,
        /// Only show polls matching this text
        #[arg(long)]
        query: Option<String>,
        /// Only show polls in this category
        #[arg(long)]
        category: Option<String>,
        /// Insert a break card after this many polls (0 disables)
        #[arg(long, default_value_t = 4)]
        break_every: usize,
    },
    /// Vote in a poll by id or slug
    Vote { poll: String, option: String },
    /// Show the results table
    Results {
        #[arg(long, default_value = "")]
        query: String,
        #[arg(long, default_value = "registry")]
        sort: SortBy,
        /// Section rows by primary category
        #[arg(long)]
        grouped: bool,
    },
    /// Export the rows `results` would show as CSV or JSON
    Export {
        #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
        #[arg(long, default_value = "")]
        query: String,
        #[arg(long, default_value = "registry")]
        sort: SortBy,
        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
        /// Write to the dated default file name
        #[arg(long, conflicts_with = "out")]
        save: bool,
    },
    /// Search polls as you type
    Suggest { query: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
}

/// Everything a command needs, built once in main.
pub struct AppContext {
    pub config: Config,
    pub backend: Arc<dyn PollBackend>,
    pub profile: Arc<dyn KeyValueStore>,
    pub session: Arc<dyn KeyValueStore>,
    pub links: SiteLinks,
}

pub async fn handle_command<R: Rng + ?Sized>(
    app: &AppContext,
    command: Command,
    rng: &mut R,
    out: &mut dyn Write,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Running command: {:?}", command);
    match command {
        Command::Boards {
            categories,
            query,
            category,
            break_every,
        } => poll::handle_boards(app, categories, query, category, break_every, rng, out).await?,
        Command::Vote { poll, option } => poll::handle_vote(app, &poll, &option, out).await?,
        Command::Results { query, sort, grouped } => poll::handle_results(app, &query, sort, grouped, out).await?,
        Command::Export {
            format,
            query,
            sort,
            out: path,
            save,
        } => poll::handle_export(app, format, &query, sort, path, save, out).await?,
        Command::Suggest { query } => poll::handle_suggest(app, &query, out).await?,
    }
    Ok(())
}
