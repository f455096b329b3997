//! Status command - store connectivity, vector index and embedding provider

use anyhow::{Context, Result};
use clap::Args;
use reviewbot_config::{ReviewbotConfig, StoreBackend};
use reviewbot_search::{CapabilityState, IndexAvailability, EMBEDDING_DIM};

use super::{create_searcher, load_valid_config};
use crate::progress::{finish_spinner, finish_spinner_error, finish_spinner_warn, spinner};
use crate::GlobalOptions;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Skip the embedding provider check (avoids loading the model)
    #[arg(long)]
    skip_embeddings: bool,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Steps for creating the vector index by hand
fn index_hint(config: &ReviewbotConfig, state: &CapabilityState) -> String {
    match config.store.backend {
        StoreBackend::Couchbase => {
            let cb = &config.store.couchbase;
            format!(
                "To use vector search, create a Search index with vector capabilities:\n\
                 1. Go to Search → Add Index\n\
                 2. Name the index '{}'\n\
                 3. Select bucket '{}', scope '{}', collection '{}'\n\
                 4. Add a vector mapping for the '{}' field with {} dimensions\n\
                 5. Save and build the index",
                state.index_name, cb.bucket, cb.scope, cb.collection, cb.vector_field, EMBEDDING_DIM
            )
        }
        StoreBackend::Qdrant => format!(
            "Create the Qdrant collection '{}' with {}-dimensional cosine vectors, \
             then run `reviewbot ingest`",
            state.index_name, EMBEDDING_DIM
        ),
    }
}

/// Execute the status command
pub async fn execute(args: StatusArgs, global: GlobalOptions) -> Result<()> {
    let config = load_valid_config(&global)?;
    let searcher = create_searcher(&config)?;
    let store = searcher.store();
    let quiet = global.quiet || args.json;

    let pb = spinner("Contacting the review store...", quiet);
    let ping = store.ping().await;
    match ping {
        Ok(()) => finish_spinner(pb, &format!("{} store reachable", store.backend_name())),
        Err(ref e) => finish_spinner_error(pb, &format!("{} store unreachable: {}", store.backend_name(), e)),
    }

    let pb = spinner("Probing the vector index...", quiet);
    let capability = searcher.reprobe().await;
    match capability.index {
        IndexAvailability::Present => finish_spinner(pb, "Vector index present"),
        IndexAvailability::Absent => finish_spinner_warn(pb, "Vector index not found"),
        IndexAvailability::Unknown => finish_spinner_warn(pb, "Vector index state unknown"),
    }

    let provider = if args.skip_embeddings {
        None
    } else {
        let pb = spinner("Checking the embedding provider...", quiet);
        let status = searcher.provider().check_status().await;
        match status {
            Ok(ref s) if s.available => finish_spinner(pb, "Embedding provider ready"),
            Ok(ref s) => finish_spinner_warn(
                pb,
                &format!(
                    "Embedding provider unavailable: {}",
                    s.error.as_deref().unwrap_or("unknown error")
                ),
            ),
            Err(ref e) => finish_spinner_error(pb, &format!("Embedding provider failed: {}", e)),
        }
        Some(status)
    };

    if args.json {
        let mut status = serde_json::json!({
            "backend": store.backend_name(),
            "reachable": ping.is_ok(),
            "capability": capability,
        });
        if let Err(ref e) = ping {
            status["store_error"] = serde_json::json!(e.to_string());
        }
        match provider {
            Some(Ok(ref s)) => status["embedding"] = serde_json::to_value(s)?,
            Some(Err(ref e)) => {
                status["embedding"] = serde_json::json!({ "available": false, "error": e.to_string() })
            }
            None => {}
        }
        let json = serde_json::to_string_pretty(&status).context("Failed to serialize status")?;
        println!("{}", json);
        return Ok(());
    }

    println!("reviewbot status");
    println!("================");
    println!();
    println!("Store:             {}", store.backend_name());
    println!(
        "Reachable:         {}",
        if ping.is_ok() { "yes" } else { "no" }
    );
    println!("Vector index:      {} ({})", capability.index_name, capability.index);
    println!(
        "Index management:  {}",
        if capability.management_responded {
            "responded"
        } else {
            "no answer"
        }
    );
    if let Some(ref detail) = capability.detail {
        println!("Detail:            {}", detail);
    }
    let plan: Vec<String> = capability.tier_plan().iter().map(|t| t.to_string()).collect();
    println!("Tier plan:         {}", plan.join(" → "));

    if let Some(Ok(ref s)) = provider {
        println!();
        println!("Embeddings:        {} on {}", s.provider_type, s.device);
        if let Some(ms) = s.latency_ms {
            println!("Latency:           {} ms", ms);
        }
    }

    if capability.index == IndexAvailability::Absent {
        println!();
        println!("{}", index_hint(&config, &capability));
    }

    Ok(())
}
