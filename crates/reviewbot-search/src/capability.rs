//! Capability probing
//!
//! Decides, once per session, whether the vector index tiers are worth
//! trying. The result is advisory: `Unknown` means "try everything".

use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::SearchError;
use crate::store::{DeclarativeQuery, DocumentStore, IndexDescriptor};
use crate::tier::SearchTier;

/// Whether a compatible vector index exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexAvailability {
    Present,
    Absent,
    Unknown,
}

impl std::fmt::Display for IndexAvailability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexAvailability::Present => write!(f, "present"),
            IndexAvailability::Absent => write!(f, "absent"),
            IndexAvailability::Unknown => write!(f, "unknown"),
        }
    }
}

/// Probe findings for one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityState {
    /// Name of the index that was looked for
    pub index_name: String,
    pub index: IndexAvailability,
    /// Whether the index management interface answered
    pub management_responded: bool,
    /// Why the index is absent or unknown, when there is something to say
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CapabilityState {
    /// State used when nothing is known; every tier is attempted
    pub fn unknown(index_name: impl Into<String>) -> Self {
        Self {
            index_name: index_name.into(),
            index: IndexAvailability::Unknown,
            management_responded: false,
            detail: None,
        }
    }

    /// Whether `tier` should be attempted at all
    pub fn allows(&self, tier: SearchTier) -> bool {
        !(tier.uses_vector_index() && self.index == IndexAvailability::Absent)
    }

    /// Tiers to attempt, in priority order
    pub fn tier_plan(&self) -> Vec<SearchTier> {
        SearchTier::ALL
            .into_iter()
            .filter(|t| self.allows(*t))
            .collect()
    }
}

/// Whether `descriptor` is the configured index with a usable vector mapping
pub fn is_compatible(descriptor: &IndexDescriptor, index_name: &str, expected_dim: usize) -> bool {
    descriptor.name == index_name
        && descriptor
            .vector_dims
            .map_or(true, |dims| dims == expected_dim)
}

/// Probe `store` for its configured vector index.
///
/// Never fails: an unreachable store yields [`IndexAvailability::Unknown`].
pub async fn probe(
    store: &dyn DocumentStore,
    expected_dim: usize,
    timeout: Duration,
) -> CapabilityState {
    let index_name = store.index_name().to_string();

    let listed = match tokio::time::timeout(timeout, store.list_indexes()).await {
        Ok(result) => result,
        Err(_) => Err(SearchError::Timeout(timeout)),
    };

    match listed {
        Ok(indexes) => {
            let state = from_listing(&index_name, &indexes, expected_dim);
            info!(
                "Vector index '{}' is {} ({} indexes listed)",
                index_name,
                state.index,
                indexes.len()
            );
            return state;
        }
        Err(e) => {
            debug!("Index listing unavailable, falling back to metadata query: {}", e);
        }
    }

    let lookup = DeclarativeQuery::IndexLookup {
        index: index_name.clone(),
    };
    let rows = match tokio::time::timeout(timeout, store.query(&lookup)).await {
        Ok(result) => result,
        Err(_) => Err(SearchError::Timeout(timeout)),
    };

    let state = match rows {
        Ok(rows) if rows.is_empty() => CapabilityState {
            index: IndexAvailability::Absent,
            detail: Some("not listed in index metadata".into()),
            ..CapabilityState::unknown(&index_name)
        },
        Ok(_) => CapabilityState {
            index: IndexAvailability::Present,
            ..CapabilityState::unknown(&index_name)
        },
        Err(e) => {
            warn!("Capability probe failed, assuming all tiers: {}", e);
            CapabilityState {
                detail: Some(e.to_string()),
                ..CapabilityState::unknown(&index_name)
            }
        }
    };

    info!(
        "Vector index '{}' is {} (metadata query)",
        index_name, state.index
    );
    state
}

fn from_listing(index_name: &str, indexes: &[IndexDescriptor], expected_dim: usize) -> CapabilityState {
    let named = indexes.iter().find(|d| d.name == index_name);

    let (index, detail) = match named {
        Some(d) if is_compatible(d, index_name, expected_dim) => (IndexAvailability::Present, None),
        Some(d) => (
            IndexAvailability::Absent,
            Some(format!(
                "vector dimension {} does not match {}",
                d.vector_dims.unwrap_or_default(),
                expected_dim
            )),
        ),
        None => (IndexAvailability::Absent, Some("index not listed".into())),
    };

    CapabilityState {
        index_name: index_name.to_string(),
        index,
        management_responded: true,
        detail,
    }
}

/// Session-wide cache of the latest probe
///
/// Concurrent re-probes may race; the last write wins.
#[derive(Debug, Default)]
pub struct CapabilityCache {
    state: RwLock<Option<CapabilityState>>,
}

impl CapabilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached state, if a probe has completed
    pub fn get(&self) -> Option<CapabilityState> {
        self.state.read().clone()
    }

    pub fn set(&self, state: CapabilityState) {
        *self.state.write() = Some(state);
    }

    /// Drop the cached state so the next query re-probes
    pub fn invalidate(&self) {
        if self.state.write().take().is_some() {
            debug!("Capability cache invalidated");
        }
    }

    /// Cached state, probing first when there is none.
    ///
    /// No lock is held while the probe is in flight.
    pub async fn get_or_probe(
        &self,
        store: &dyn DocumentStore,
        expected_dim: usize,
        timeout: Duration,
    ) -> CapabilityState {
        if let Some(state) = self.get() {
            return state;
        }
        let state = probe(store, expected_dim, timeout).await;
        self.set(state.clone());
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, dims: Option<usize>) -> IndexDescriptor {
        IndexDescriptor {
            name: name.into(),
            kind: "fulltext-index".into(),
            vector_dims: dims,
        }
    }

    #[test]
    fn test_tier_plan_skips_vector_tiers_when_absent() {
        let mut state = CapabilityState::unknown("rv_idx");
        assert_eq!(state.tier_plan(), SearchTier::ALL.to_vec());

        state.index = IndexAvailability::Absent;
        assert_eq!(
            state.tier_plan(),
            vec![SearchTier::DistanceQuery, SearchTier::Unscored]
        );

        state.index = IndexAvailability::Present;
        assert_eq!(state.tier_plan().len(), 4);
    }

    #[test]
    fn test_compatibility_checks_name_and_dims() {
        assert!(is_compatible(&descriptor("rv_idx", Some(384)), "rv_idx", 384));
        assert!(is_compatible(&descriptor("rv_idx", None), "rv_idx", 384));
        assert!(!is_compatible(&descriptor("rv_idx", Some(768)), "rv_idx", 384));
        assert!(!is_compatible(&descriptor("other", Some(384)), "rv_idx", 384));
    }

    #[test]
    fn test_listing_states() {
        let present = from_listing("rv_idx", &[descriptor("rv_idx", Some(384))], 384);
        assert_eq!(present.index, IndexAvailability::Present);
        assert!(present.management_responded);

        let wrong_dims = from_listing("rv_idx", &[descriptor("rv_idx", Some(768))], 384);
        assert_eq!(wrong_dims.index, IndexAvailability::Absent);
        assert!(wrong_dims.detail.unwrap().contains("768"));

        let missing = from_listing("rv_idx", &[], 384);
        assert_eq!(missing.index, IndexAvailability::Absent);
    }

    #[test]
    fn test_cache_last_write_wins() {
        let cache = CapabilityCache::new();
        assert!(cache.get().is_none());

        cache.set(CapabilityState::unknown("a"));
        let mut absent = CapabilityState::unknown("a");
        absent.index = IndexAvailability::Absent;
        cache.set(absent.clone());
        assert_eq!(cache.get(), Some(absent));

        cache.invalidate();
        assert!(cache.get().is_none());
    }
}
