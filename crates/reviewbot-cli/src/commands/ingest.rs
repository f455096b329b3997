//! Ingest command - embed hotel reviews into the review vector collection

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use reviewbot_search::{read_hotels, IngestStats, ReviewIngestor};

use super::{create_embedding_provider, create_store, load_valid_config};
use crate::progress::{finish_spinner, finish_spinner_warn, spinner};
use crate::GlobalOptions;

/// Arguments for the ingest command
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Read hotels from a JSON file (array or one document per line)
    #[arg(long, short = 'f', conflicts_with = "from_store")]
    file: Option<PathBuf>,

    /// Read hotels from the store's source collection
    #[arg(long)]
    from_store: bool,

    /// Stop after this many hotels
    #[arg(long)]
    limit: Option<usize>,

    /// Reviews embedded per batch
    #[arg(long, default_value = "32")]
    batch_size: usize,

    /// Output statistics as JSON
    #[arg(long)]
    json: bool,
}

fn summary(stats: &IngestStats) -> String {
    format!(
        "{} hotels, {} reviews: {} written, {} skipped (no content), {} failed",
        stats.hotels, stats.reviews_seen, stats.written, stats.skipped, stats.failed
    )
}

/// Execute the ingest command
pub async fn execute(args: IngestArgs, global: GlobalOptions) -> Result<()> {
    if args.file.is_none() && !args.from_store {
        bail!("Nothing to ingest: pass --file <PATH> or --from-store");
    }

    let config = load_valid_config(&global)?;
    let provider = create_embedding_provider(&config)?;
    let store = create_store(&config)?;
    let ingestor = ReviewIngestor::new(provider, store).with_batch_size(args.batch_size);
    let quiet = global.quiet || args.json;

    let pb = spinner("Reading hotels...", quiet);
    let mut hotels = match args.file {
        Some(ref path) => read_hotels(path)
            .with_context(|| format!("Failed to read hotels from {}", path.display()))?,
        None => ingestor
            .load_hotels_from_store(args.limit)
            .await
            .context("Failed to read the source collection")?,
    };
    if let Some(limit) = args.limit {
        hotels.truncate(limit);
    }
    finish_spinner(pb, &format!("Read {} hotels", hotels.len()));

    let pb = spinner("Embedding and writing reviews...", quiet);
    let stats = ingestor.ingest(&hotels).await.context("Ingestion aborted")?;
    if stats.failed > 0 {
        finish_spinner_warn(pb, &summary(&stats));
    } else {
        finish_spinner(pb, &summary(&stats));
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else if quiet {
        println!("{}", summary(&stats));
    }

    Ok(())
}
