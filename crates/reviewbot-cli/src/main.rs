//! reviewbot - ask questions, get the most relevant hotel reviews
//!
//! # Usage
//!
//! ```bash
//! # Interactive session
//! reviewbot chat
//!
//! # One-shot question
//! reviewbot search "quiet rooms near the station" --top-k 3
//!
//! # Check the store and the vector index
//! reviewbot status
//!
//! # Populate the review vector collection
//! reviewbot ingest --from-store
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use reviewbot_config::{EmbeddingProviderType, LogFormat, StoreBackend};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod commands;
mod present;
mod progress;

/// reviewbot - semantic search over hotel reviews
#[derive(Parser, Debug)]
#[command(name = "reviewbot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalOptions {
    /// Path to a configuration file (replaces the local .reviewbot/config.toml)
    #[arg(long, short = 'c', global = true, env = "REVIEWBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Document store backend (couchbase, qdrant)
    #[arg(long, global = true, env = "REVIEWBOT_BACKEND", value_parser = parse_backend)]
    backend: Option<StoreBackend>,

    /// Couchbase connection string (couchbase:// or couchbases://)
    #[arg(long, global = true, env = "REVIEWBOT_CONNECTION_STRING")]
    connection_string: Option<String>,

    /// Couchbase username
    #[arg(long, global = true, env = "REVIEWBOT_USERNAME")]
    username: Option<String>,

    /// Qdrant server URL
    #[arg(long, global = true, env = "REVIEWBOT_QDRANT_URL")]
    qdrant_url: Option<String>,

    /// Embedding provider type (local, openai)
    #[arg(long, global = true, env = "REVIEWBOT_EMBEDDING_PROVIDER", value_parser = parse_embedding_provider)]
    embedding_provider: Option<EmbeddingProviderType>,
}

fn parse_backend(s: &str) -> Result<StoreBackend, String> {
    s.parse()
        .map_err(|e: reviewbot_config::ConfigError| e.to_string())
}

/// Parse embedding provider from string
fn parse_embedding_provider(s: &str) -> Result<EmbeddingProviderType, String> {
    s.parse()
        .map_err(|e: reviewbot_config::ConfigError| e.to_string())
}

impl GlobalOptions {
    /// Convert global options to config overrides
    pub fn to_config_overrides(&self) -> reviewbot_config::ConfigOverrides {
        reviewbot_config::ConfigOverrides {
            backend: self.backend,
            connection_string: self.connection_string.clone(),
            username: self.username.clone(),
            qdrant_url: self.qdrant_url.clone(),
            embedding_provider: self.embedding_provider,
            ..Default::default()
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start an interactive question loop
    Chat(commands::chat::ChatArgs),

    /// Answer a single question
    Search(commands::search::SearchArgs),

    /// Check store connectivity, the vector index and the embedding provider
    Status(commands::status::StatusArgs),

    /// Embed hotel reviews and write them to the review collection
    Ingest(commands::ingest::IngestArgs),

    /// View and manage configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),
}

fn init_logging(global: &GlobalOptions) -> Result<()> {
    // A broken config file is reported by the command itself
    let logging = commands::load_config(global)
        .map(|c| c.logging)
        .unwrap_or_default();

    let level = if global.quiet {
        "error".to_string()
    } else if global.verbose {
        "debug".to_string()
    } else {
        logging.level
    };
    let filter =
        EnvFilter::try_from_env("REVIEWBOT_LOG").unwrap_or_else(|_| EnvFilter::new(level));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Text => {
            tracing::subscriber::set_global_default(builder.with_ansi(true).finish())?
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.global)?;

    match cli.command {
        Commands::Chat(args) => commands::chat::execute(args, cli.global).await,
        Commands::Search(args) => commands::search::execute(args, cli.global).await,
        Commands::Status(args) => commands::status::execute(args, cli.global).await,
        Commands::Ingest(args) => commands::ingest::execute(args, cli.global).await,
        Commands::Config(cmd) => commands::config::execute(cmd, cli.global).await,
    }
}
