//! Tiered retrieval engine
//!
//! Tries the search tiers in priority order and returns the first tier's
//! non-empty, normalized answer:
//!
//! ```text
//! A native vector ──(shape rejected)──► B alternate vector
//!        │                                      │
//!        └──────────── any failure ─────────────┴──► C distance query ──► D unscored
//! ```
//!
//! Tier B only runs when Tier A's request shape was rejected. Failures on
//! Tiers A-C advance to the next tier; a timeout or connectivity failure on
//! Tier D ends the query. When every tier fails the caller receives a single
//! [`SearchError::Connectivity`].

use std::cmp::Ordering;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::capability::{CapabilityState, IndexAvailability};
use crate::error::{Result, SearchError};
use crate::normalize;
use crate::query::{EmbeddingVector, Query};
use crate::schema::{fields, CanonicalResult, RawHit, RETURN_FIELDS};
use crate::store::{DeclarativeQuery, DocumentStore, VectorSearchRequest, VectorShape};
use crate::tier::SearchTier;

/// Default ratio of engine-internal candidates to requested results
pub const DEFAULT_CANDIDATE_MULTIPLIER: usize = 20;

/// Default bound on a single tier's store call
pub const DEFAULT_TIER_TIMEOUT: Duration = Duration::from_secs(75);

/// Default bound on a single key lookup
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Tuning knobs for the retrieval engine
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Candidates examined per requested result (Tiers A and B)
    pub candidate_multiplier: usize,
    pub tier_timeout: Duration,
    pub fetch_timeout: Duration,
    /// Document field holding the embedding
    pub vector_field: String,
    /// Stored fields requested from vector search
    pub return_fields: Vec<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            candidate_multiplier: DEFAULT_CANDIDATE_MULTIPLIER,
            tier_timeout: DEFAULT_TIER_TIMEOUT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            vector_field: fields::EMBEDDING.to_string(),
            return_fields: RETURN_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// What happened to one tier during a query
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum AttemptStatus {
    /// The tier produced the returned results
    Served { results: usize },
    /// The tier answered with no results
    Empty,
    /// The tier was not attempted
    Skipped { reason: String },
    /// The tier failed and the engine moved on
    Failed { error: String },
}

/// One entry of the per-query attempt log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierAttempt {
    pub tier: SearchTier,
    #[serde(flatten)]
    pub status: AttemptStatus,
}

/// Results plus an account of how they were obtained
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalOutcome {
    /// Tier that produced `results`; `None` when every tier came back empty
    pub tier: Option<SearchTier>,
    pub results: Vec<CanonicalResult>,
    pub attempts: Vec<TierAttempt>,
    /// A failure suggested the capability probe no longer holds
    pub stale_capability: bool,
}

/// Tiered retrieval over a single document store
pub struct RetrievalEngine {
    store: Arc<dyn DocumentStore>,
    config: RetrievalConfig,
}

impl RetrievalEngine {
    pub fn new(store: Arc<dyn DocumentStore>, config: RetrievalConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Ordered results for `query`, most relevant first
    pub async fn retrieve(
        &self,
        query: &Query,
        embedding: &EmbeddingVector,
        capability: &CapabilityState,
    ) -> Result<Vec<CanonicalResult>> {
        Ok(self
            .retrieve_detailed(query, embedding, capability)
            .await?
            .results)
    }

    /// Like [`retrieve`](Self::retrieve), also reporting every tier attempt
    pub async fn retrieve_detailed(
        &self,
        query: &Query,
        embedding: &EmbeddingVector,
        capability: &CapabilityState,
    ) -> Result<RetrievalOutcome> {
        let mut attempts = Vec::with_capacity(SearchTier::ALL.len());
        let mut answered_empty = false;
        let mut stale_capability = false;
        let mut native_shape_rejected = false;

        for tier in SearchTier::ALL {
            if !capability.allows(tier) {
                attempts.push(TierAttempt {
                    tier,
                    status: AttemptStatus::Skipped {
                        reason: "vector index absent".into(),
                    },
                });
                continue;
            }
            if tier == SearchTier::AlternateVector && !native_shape_rejected {
                attempts.push(TierAttempt {
                    tier,
                    status: AttemptStatus::Skipped {
                        reason: "native request shape not rejected".into(),
                    },
                });
                continue;
            }

            debug!("Tier {} ({}) for top_k={}", tier.letter(), tier, query.top_k());

            match self.run_tier(tier, query, embedding).await {
                Ok(results) if !results.is_empty() => {
                    info!(
                        "Tier {} ({}) served {} results",
                        tier.letter(),
                        tier,
                        results.len()
                    );
                    attempts.push(TierAttempt {
                        tier,
                        status: AttemptStatus::Served {
                            results: results.len(),
                        },
                    });
                    return Ok(RetrievalOutcome {
                        tier: Some(tier),
                        results,
                        attempts,
                        stale_capability,
                    });
                }
                Ok(_) => {
                    debug!("Tier {} ({}) answered with no results", tier.letter(), tier);
                    answered_empty = true;
                    attempts.push(TierAttempt {
                        tier,
                        status: AttemptStatus::Empty,
                    });
                }
                Err(err) => {
                    if tier == SearchTier::NativeVector && err.is_interface_mismatch() {
                        native_shape_rejected = true;
                    }
                    if marks_stale(tier, &err, capability) {
                        stale_capability = true;
                    }

                    let fatal = tier == SearchTier::Unscored
                        && matches!(err, SearchError::Timeout(_) | SearchError::Connectivity(_));

                    warn!("Tier {} ({}) failed: {}", tier.letter(), tier, err);
                    attempts.push(TierAttempt {
                        tier,
                        status: AttemptStatus::Failed {
                            error: err.to_string(),
                        },
                    });

                    // Losing the store during the last tier is an outage, not an empty answer
                    if fatal {
                        return Err(SearchError::Connectivity(format!(
                            "unscored fallback failed: {}",
                            err
                        )));
                    }
                }
            }
        }

        if answered_empty {
            return Ok(RetrievalOutcome {
                tier: None,
                results: Vec::new(),
                attempts,
                stale_capability,
            });
        }

        Err(SearchError::Connectivity(format!(
            "all retrieval tiers failed: {}",
            summarize(&attempts)
        )))
    }

    async fn run_tier(
        &self,
        tier: SearchTier,
        query: &Query,
        embedding: &EmbeddingVector,
    ) -> Result<Vec<CanonicalResult>> {
        let results = match tier {
            SearchTier::NativeVector => {
                self.vector_tier(VectorShape::Primary, query, embedding)
                    .await?
            }
            SearchTier::AlternateVector => {
                self.vector_tier(VectorShape::Alternate, query, embedding)
                    .await?
            }
            SearchTier::DistanceQuery => self.distance_tier(query, embedding).await?,
            SearchTier::Unscored => self.unscored_tier(query).await?,
        };
        Ok(finalize(tier, results, query.top_k()))
    }

    async fn vector_tier(
        &self,
        shape: VectorShape,
        query: &Query,
        embedding: &EmbeddingVector,
    ) -> Result<Vec<CanonicalResult>> {
        let request = VectorSearchRequest {
            index: self.store.index_name().to_string(),
            field: self.config.vector_field.clone(),
            vector: embedding.clone(),
            limit: query.top_k(),
            candidates: query
                .top_k()
                .saturating_mul(self.config.candidate_multiplier.max(1)),
            return_fields: self.config.return_fields.clone(),
        };

        let hits = bounded(
            self.config.tier_timeout,
            self.store.vector_search(&request, shape),
        )
        .await?;

        Ok(hits.into_iter().map(normalize::normalize).collect())
    }

    async fn distance_tier(
        &self,
        query: &Query,
        embedding: &EmbeddingVector,
    ) -> Result<Vec<CanonicalResult>> {
        let statement = DeclarativeQuery::VectorDistance {
            field: self.config.vector_field.clone(),
            vector: embedding.clone(),
            limit: query.top_k(),
        };

        let rows = bounded(self.config.tier_timeout, self.store.query(&statement)).await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(map) => Some(normalize::normalize(RawHit::Row(map))),
                other => {
                    warn!("Skipping non-object distance row: {}", other);
                    None
                }
            })
            .collect())
    }

    async fn unscored_tier(&self, query: &Query) -> Result<Vec<CanonicalResult>> {
        let listing = DeclarativeQuery::ListKeys {
            limit: query.top_k(),
        };
        let rows = bounded(self.config.tier_timeout, self.store.query(&listing)).await?;

        let keys: Vec<String> = rows.iter().filter_map(row_key).collect();
        let mut results = Vec::with_capacity(keys.len());

        for key in keys.into_iter().take(query.top_k()) {
            match bounded(self.config.fetch_timeout, self.store.get_by_key(&key)).await {
                Ok(Some(body)) => {
                    results.push(normalize::normalize(RawHit::Document { id: key, body }));
                }
                Ok(None) => debug!("Key {} vanished between listing and fetch", key),
                Err(err @ (SearchError::Timeout(_) | SearchError::Connectivity(_))) => {
                    return Err(err);
                }
                Err(err) => warn!("Skipping document {}: {}", key, err),
            }
        }

        Ok(results)
    }
}

async fn bounded<T>(limit: Duration, call: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| SearchError::Timeout(limit))?
}

/// Key column of a listing row
fn row_key(row: &Value) -> Option<String> {
    match row {
        Value::Object(map) => map
            .get(fields::DOC_ID)
            .or_else(|| map.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string),
        Value::String(key) => Some(key.clone()),
        _ => None,
    }
}

/// Whether a tier failure means the cached capability should be re-probed
fn marks_stale(tier: SearchTier, err: &SearchError, capability: &CapabilityState) -> bool {
    match err {
        SearchError::IndexNotFound(_) => true,
        SearchError::Timeout(_) | SearchError::Connectivity(_) => false,
        SearchError::InterfaceMismatch(_) => {
            tier == SearchTier::AlternateVector && capability.index == IndexAvailability::Present
        }
        _ => tier.uses_vector_index() && capability.index == IndexAvailability::Present,
    }
}

/// Order by descending similarity (unscored last, ties keep store order),
/// then cap at `top_k`.
fn finalize(tier: SearchTier, mut results: Vec<CanonicalResult>, top_k: usize) -> Vec<CanonicalResult> {
    if tier.is_scored() {
        results.sort_by(|a, b| match (a.similarity.value(), b.similarity.value()) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
    }
    results.truncate(top_k);
    results
}

fn summarize(attempts: &[TierAttempt]) -> String {
    attempts
        .iter()
        .map(|a| match &a.status {
            AttemptStatus::Failed { error } => format!("{} {}: {}", a.tier.letter(), a.tier, error),
            AttemptStatus::Skipped { reason } => {
                format!("{} {}: skipped ({})", a.tier.letter(), a.tier, reason)
            }
            AttemptStatus::Empty => format!("{} {}: empty", a.tier.letter(), a.tier),
            AttemptStatus::Served { results } => {
                format!("{} {}: {} results", a.tier.letter(), a.tier, results)
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}
