//! Search command - answer a single question

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use reviewbot_search::{AttemptStatus, Query, RetrievalOutcome};

use super::{create_searcher, load_valid_config};
use crate::present::format_results;
use crate::GlobalOptions;

/// Arguments for the search command
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Question or topic to look up
    query: String,

    /// Maximum number of reviews to return (defaults to [retrieval].top_k)
    #[arg(long, short = 'k')]
    top_k: Option<usize>,

    /// Output format: text (default), json
    #[arg(long, short = 'o', default_value = "text")]
    output: OutputFormat,

    /// Report which tiers were tried and which one answered
    #[arg(long)]
    tiers: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

fn describe_attempts(outcome: &RetrievalOutcome) -> String {
    let mut lines = Vec::with_capacity(outcome.attempts.len());
    for attempt in &outcome.attempts {
        let status = match &attempt.status {
            AttemptStatus::Served { results } => format!("served {} results", results),
            AttemptStatus::Empty => "no results".to_string(),
            AttemptStatus::Skipped { reason } => format!("skipped ({})", reason),
            AttemptStatus::Failed { error } => format!("failed ({})", error),
        };
        lines.push(format!("  {}: {}", attempt.tier, status));
    }
    lines.join("\n")
}

/// Execute the search command
pub async fn execute(args: SearchArgs, global: GlobalOptions) -> Result<()> {
    let config = load_valid_config(&global)?;
    let top_k = args.top_k.unwrap_or(config.retrieval.top_k);
    let query = Query::new(&args.query, top_k)?;
    let searcher = create_searcher(&config)?;

    let outcome = searcher.search_detailed(&query).await.context("Search failed")?;

    match args.output {
        OutputFormat::Json => {
            let json = if args.tiers {
                serde_json::to_string_pretty(&outcome)
            } else {
                serde_json::to_string_pretty(&outcome.results)
            }
            .context("Failed to serialize results")?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            if args.tiers && !global.quiet {
                eprintln!("Tiers:\n{}", describe_attempts(&outcome));
            }
            print!("{}", format_results(&outcome.results));
        }
    }

    Ok(())
}
