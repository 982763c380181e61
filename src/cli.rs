use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "sitelens",
    about = "Embedding sync and similarity search for published site content"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Override the embedding model
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Embed and store documents that do not yet have embeddings
    Sync(SyncArgs),
    /// Report which documents already have stored embeddings
    Check(CheckArgs),
    /// Search stored documents by semantic similarity
    Search(SearchArgs),
    /// Print the structured text and chunks for documents (no API calls)
    Chunk(ChunkArgs),
    /// Show store statistics
    Stats(StatsArgs),
    /// Rewrite the store at a different timestamp precision
    MigratePrecision(MigratePrecisionArgs),
    /// Delete stored embeddings by document id
    Purge(PurgeArgs),
}

// -- Sync --

#[derive(Debug, Parser)]
pub struct SyncArgs {
    /// JSON export file with the documents to sync
    #[arg(long)]
    pub input: PathBuf,

    /// Only sync documents published on or after this date (YYYY-MM-DD)
    #[arg(long)]
    pub after: Option<String>,

    /// Only sync documents published on or before this date (YYYY-MM-DD)
    #[arg(long)]
    pub before: Option<String>,

    /// Re-embed documents even if they already have stored embeddings
    #[arg(long)]
    pub force: bool,
}

// -- Check --

#[derive(Debug, Parser)]
pub struct CheckArgs {
    /// JSON export file with the documents to check
    #[arg(long)]
    pub input: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// The search query
    pub query: String,

    /// Number of results to return (capped at 20)
    #[arg(short = 'n', long, default_value = "5")]
    pub count: usize,

    /// Only match documents published on or after this date (YYYY-MM-DD)
    #[arg(long)]
    pub after: Option<String>,

    /// Only match documents published on or before this date (YYYY-MM-DD)
    #[arg(long)]
    pub before: Option<String>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Chunk --

#[derive(Debug, Parser)]
pub struct ChunkArgs {
    /// JSON export file with the documents to render
    #[arg(long)]
    pub input: PathBuf,

    /// Token budget per chunk
    #[arg(long, default_value = "1024")]
    pub max_tokens: usize,
}

// -- Stats --

#[derive(Debug, Parser)]
pub struct StatsArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Migrate precision --

#[derive(Debug, Parser)]
pub struct MigratePrecisionArgs {
    /// Target precision: "ms" or "us"
    pub precision: String,
}

// -- Purge --

#[derive(Debug, Parser)]
pub struct PurgeArgs {
    /// Document ids to delete
    #[arg(long, required = true, num_args = 1.., value_delimiter = ',')]
    pub ids: Vec<u64>,
}
