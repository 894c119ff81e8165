use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::config::{DEFAULT_BACKEND_URL, QueryMode};

#[derive(Debug, Parser)]
#[command(
    name = "packrat",
    about = "Pack a directory into a searchable archive and query it offline"
)]
pub struct Cli {
    /// Base URL of the inference server
    #[arg(long, global = true, default_value = DEFAULT_BACKEND_URL)]
    pub backend_url: String,

    /// Worker threads for scoring and extraction
    #[arg(long, global = true, default_value = "4")]
    pub concurrency: usize,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Pack a directory into a container and its index
    Pack(PackArgs),
    /// Query an index semantically and extract the winners
    Query(QueryArgs),
    /// List indexed files matching structured filters
    Search(SearchArgs),
    /// Extract specific files from the container by path
    Extract(ExtractArgs),
    /// Show index and container statistics
    Status(StatusArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Pack --

#[derive(Debug, Parser)]
pub struct PackArgs {
    /// Directory to pack
    pub root: PathBuf,

    /// Path of the index to create
    #[arg(long, default_value = "index.redb")]
    pub index: PathBuf,

    /// Path of the container to create
    #[arg(long, default_value = "data.pack")]
    pub container: PathBuf,

    /// Skip embedding computation (index is usable only in off mode)
    #[arg(long)]
    pub no_embed: bool,
}

// -- Query --

#[derive(Debug, Parser)]
pub struct QueryArgs {
    /// The free-text query
    pub query: String,

    /// Path of the index
    #[arg(long, default_value = "index.redb")]
    pub index: PathBuf,

    /// Path of the container
    #[arg(long, default_value = "data.pack")]
    pub container: PathBuf,

    /// Ranking mode
    #[arg(long, value_enum, default_value = "embeddings")]
    pub mode: QueryMode,

    /// Maximum shortlist size
    #[arg(long, default_value = "200")]
    pub limit: usize,

    /// Number of winners to extract
    #[arg(short = 'n', long, default_value = "5")]
    pub topk: usize,

    /// Score tolerance for treating candidates as tied
    #[arg(long, default_value = "0.0")]
    pub epsilon: f32,

    /// Size of the top slice handed to the reranker in hybrid mode
    #[arg(long, default_value = "10")]
    pub rerank_depth: usize,

    /// Directory to extract winners into
    #[arg(short, long, default_value = "extracted")]
    pub out: PathBuf,

    /// Output the result as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub filter: FilterArgs,
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// Path of the index
    #[arg(long, default_value = "index.redb")]
    pub index: PathBuf,

    /// Maximum number of results
    #[arg(short = 'n', long, default_value = "50")]
    pub limit: usize,

    /// Output only file paths (one per line)
    #[arg(long)]
    pub paths: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub filter: FilterArgs,
}

/// Structured filter flags shared by `query` and `search`.
#[derive(Debug, Parser)]
pub struct FilterArgs {
    /// Glob pattern applied to relative paths
    #[arg(long)]
    pub glob: Option<String>,

    /// Case-insensitive path substring
    #[arg(long)]
    pub path_contains: Option<String>,

    /// Restrict to these file extensions (repeatable)
    #[arg(long = "ext")]
    pub extensions: Vec<String>,

    /// Minimum file size in bytes
    #[arg(long)]
    pub min_size: Option<u64>,

    /// Maximum file size in bytes
    #[arg(long)]
    pub max_size: Option<u64>,

    /// Only files modified at or after this Unix timestamp
    #[arg(long)]
    pub modified_after: Option<u64>,

    /// Only files modified at or before this Unix timestamp
    #[arg(long)]
    pub modified_before: Option<u64>,
}

// -- Extract --

#[derive(Debug, Parser)]
pub struct ExtractArgs {
    /// Relative paths to extract
    #[arg(required = true)]
    pub paths: Vec<String>,

    /// Path of the index
    #[arg(long, default_value = "index.redb")]
    pub index: PathBuf,

    /// Path of the container
    #[arg(long, default_value = "data.pack")]
    pub container: PathBuf,

    /// Directory to extract into
    #[arg(short, long, default_value = "extracted")]
    pub out: PathBuf,
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Path of the index
    #[arg(long, default_value = "index.redb")]
    pub index: PathBuf,

    /// Path of the container
    #[arg(long, default_value = "data.pack")]
    pub container: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "packrat",
            &mut std::io::stdout(),
        );
    }
}
