//! Session facade: embed, probe (cached), retrieve

use std::sync::Arc;

use tracing::{debug, info};

use crate::capability::{self, CapabilityCache, CapabilityState};
use crate::embeddings::{embed_query, EmbeddingProvider};
use crate::error::Result;
use crate::query::Query;
use crate::retrieval::{RetrievalConfig, RetrievalEngine, RetrievalOutcome};
use crate::schema::{CanonicalResult, EMBEDDING_DIM};
use crate::store::DocumentStore;

/// One chat session's view of the review index
///
/// Owns the embedding provider, the store-backed retrieval engine and the
/// capability cache. Safe to share between tasks.
pub struct ReviewSearcher {
    provider: Arc<dyn EmbeddingProvider>,
    engine: RetrievalEngine,
    cache: CapabilityCache,
    reprobe_on_failure: bool,
}

impl ReviewSearcher {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn DocumentStore>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            provider,
            engine: RetrievalEngine::new(store, config),
            cache: CapabilityCache::new(),
            reprobe_on_failure: true,
        }
    }

    /// Whether a stale capability is dropped so the next query re-probes
    pub fn with_reprobe_on_failure(mut self, enabled: bool) -> Self {
        self.reprobe_on_failure = enabled;
        self
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        self.engine.store()
    }

    /// Top `top_k` reviews for `text`, most relevant first
    pub async fn search(&self, text: &str, top_k: usize) -> Result<Vec<CanonicalResult>> {
        let query = Query::new(text, top_k)?;
        Ok(self.search_detailed(&query).await?.results)
    }

    /// Search and report which tier served the results
    pub async fn search_detailed(&self, query: &Query) -> Result<RetrievalOutcome> {
        // Embedding failures end the query before any store call
        let embedding = embed_query(self.provider.as_ref(), query.text()).await?;
        let capability = self.capability().await;

        let outcome = match self
            .engine
            .retrieve_detailed(query, &embedding, &capability)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                self.cache.invalidate();
                return Err(err);
            }
        };

        if outcome.stale_capability && self.reprobe_on_failure {
            info!("Capability looks stale; re-probing on the next query");
            self.cache.invalidate();
        }

        debug!(
            "Query served by {:?} with {} results",
            outcome.tier,
            outcome.results.len()
        );
        Ok(outcome)
    }

    /// Cached capability, probing the store on first use
    pub async fn capability(&self) -> CapabilityState {
        self.cache
            .get_or_probe(
                self.engine.store().as_ref(),
                EMBEDDING_DIM,
                self.engine.config().fetch_timeout,
            )
            .await
    }

    /// Probe again regardless of the cache
    pub async fn reprobe(&self) -> CapabilityState {
        let state = capability::probe(
            self.engine.store().as_ref(),
            EMBEDDING_DIM,
            self.engine.config().fetch_timeout,
        )
        .await;
        self.cache.set(state.clone());
        state
    }
}
