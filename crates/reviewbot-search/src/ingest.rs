//! Review ingestion
//!
//! Turns source hotel documents into review vector documents and writes them
//! to the store under deterministic keys, so running ingestion twice leaves
//! the same documents behind.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::embeddings::EmbeddingProvider;
use crate::error::{Result, SearchError};
use crate::normalize;
use crate::schema::{placeholders, HotelDocument, HotelReview, ReviewDocument, EMBEDDING_DIM};
use crate::store::{DeclarativeQuery, DocumentStore};

/// Default number of reviews embedded per provider call
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Key prefix of review vector documents
pub const KEY_PREFIX: &str = "review_vector_";

/// Statistics from an ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct IngestStats {
    /// Hotel documents read
    pub hotels: usize,
    /// Reviews encountered across all hotels
    pub reviews_seen: usize,
    /// Reviews skipped (no content)
    pub skipped: usize,
    /// Review documents written
    pub written: usize,
    /// Reviews that failed to embed or write
    pub failed: usize,
}

/// A review waiting for its embedding
struct PendingReview {
    key: String,
    document: ReviewDocument,
}

/// Embeds hotel reviews and writes them to a [`DocumentStore`]
pub struct ReviewIngestor {
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn DocumentStore>,
    batch_size: usize,
}

impl ReviewIngestor {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            provider,
            store,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the embedding batch size (minimum 1)
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Read source hotels from the store's source collection
    pub async fn load_hotels_from_store(&self, limit: Option<usize>) -> Result<Vec<HotelDocument>> {
        let rows = self
            .store
            .query(&DeclarativeQuery::SourceHotels { limit })
            .await?;
        let hotels = rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value::<HotelDocument>(row) {
                Ok(hotel) => Some(hotel),
                Err(e) => {
                    warn!("Skipping malformed hotel row: {}", e);
                    None
                }
            })
            .collect::<Vec<_>>();
        info!(
            "Loaded {} hotels from {} source collection",
            hotels.len(),
            self.store.backend_name()
        );
        Ok(hotels)
    }

    /// Embed and write every review of `hotels`
    ///
    /// Batch failures are counted, not fatal. Connectivity loss aborts.
    pub async fn ingest(&self, hotels: &[HotelDocument]) -> Result<IngestStats> {
        let mut stats = IngestStats {
            hotels: hotels.len(),
            ..Default::default()
        };

        let mut pending = Vec::new();
        for (position, hotel) in hotels.iter().enumerate() {
            let hotel_id = hotel
                .doc_id
                .clone()
                .unwrap_or_else(|| format!("hotel_{}", position));
            for review in &hotel.reviews {
                stats.reviews_seen += 1;
                match pending_review(&hotel_id, hotel.name.as_deref(), review) {
                    Some(p) => pending.push(p),
                    None => stats.skipped += 1,
                }
            }
        }

        info!(
            "Collected {} reviews from {} hotels for embedding (batch size: {})",
            pending.len(),
            hotels.len(),
            self.batch_size
        );

        let total = pending.len();
        let mut processed = 0;
        for (batch_idx, batch) in pending.chunks_mut(self.batch_size).enumerate() {
            processed += batch.len();

            let texts = batch
                .iter()
                .map(|p| p.document.review_content.clone())
                .collect::<Vec<_>>();
            let vectors = match self.provider.embed(texts).await {
                Ok(v) if v.len() == batch.len() => v,
                Ok(v) => {
                    debug!(
                        "Batch {} size mismatch: expected {}, got {}",
                        batch_idx,
                        batch.len(),
                        v.len()
                    );
                    stats.failed += batch.len();
                    continue;
                }
                Err(e) => {
                    debug!("Batch {} failed: {}", batch_idx, e);
                    stats.failed += batch.len();
                    continue;
                }
            };

            for (item, vector) in batch.iter_mut().zip(vectors) {
                if vector.len() != EMBEDDING_DIM {
                    stats.failed += 1;
                    continue;
                }
                item.document.embedding = vector;
                match self.store.upsert(&item.key, &item.document).await {
                    Ok(()) => stats.written += 1,
                    Err(e) if e.is_connectivity() => return Err(e),
                    Err(e @ SearchError::InterfaceMismatch(_)) => return Err(e),
                    Err(e) => {
                        warn!("Failed to write {}: {}", item.key, e);
                        stats.failed += 1;
                    }
                }
            }

            if processed % 500 < self.batch_size || processed == total {
                info!(
                    "Embedding progress: {}/{} ({:.1}%)",
                    processed,
                    total,
                    (processed as f64 / total as f64) * 100.0
                );
            }
        }

        info!(
            "Ingestion complete: {} reviews seen, {} written, {} skipped, {} failed",
            stats.reviews_seen, stats.written, stats.skipped, stats.failed
        );
        Ok(stats)
    }
}

fn pending_review(hotel_id: &str, hotel_name: Option<&str>, review: &HotelReview) -> Option<PendingReview> {
    let content = review
        .content
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())?;

    let document = ReviewDocument {
        hotel_id: hotel_id.to_string(),
        hotel_name: hotel_name.unwrap_or(placeholders::HOTEL_NAME).to_string(),
        review_author: review
            .author
            .clone()
            .unwrap_or_else(|| placeholders::REVIEW_AUTHOR.to_string()),
        review_date: review.date.clone().unwrap_or_default(),
        review_content: content.to_string(),
        review_ratings: numeric_ratings(&review.ratings),
        embedding: Vec::new(),
    };

    Some(PendingReview {
        key: review_key(hotel_id, review),
        document,
    })
}

fn numeric_ratings(ratings: &BTreeMap<String, Value>) -> BTreeMap<String, f64> {
    ratings
        .iter()
        .filter_map(|(k, v)| normalize::number(v).map(|n| (k.clone(), n)))
        .collect()
}

/// Deterministic document key for a review
pub fn review_key(hotel_id: &str, review: &HotelReview) -> String {
    let mut hasher = Sha256::new();
    for part in [
        hotel_id,
        review.author.as_deref().unwrap_or_default(),
        review.date.as_deref().unwrap_or_default(),
        review.content.as_deref().unwrap_or_default(),
    ] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let digest = format!("{:x}", hasher.finalize());
    format!("{}{}", KEY_PREFIX, &digest[..16])
}

/// Read hotels from a JSON file holding an array or one document per line
pub fn read_hotels(path: &Path) -> Result<Vec<HotelDocument>> {
    let text = std::fs::read_to_string(path)?;
    parse_hotels(&text)
}

fn parse_hotels(text: &str) -> Result<Vec<HotelDocument>> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }
    trimmed
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str::<HotelDocument>(line).map_err(SearchError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(author: &str, content: Option<&str>) -> HotelReview {
        HotelReview {
            author: Some(author.into()),
            date: Some("2013-05-20 13:38:15 +0300".into()),
            content: content.map(Into::into),
            ratings: BTreeMap::from([
                ("Overall".to_string(), serde_json::json!(4)),
                ("Value".to_string(), serde_json::json!("3")),
                ("Rooms".to_string(), serde_json::json!("n/a")),
            ]),
        }
    }

    #[test]
    fn test_review_key_is_deterministic() {
        let r = review("Ozella", Some("Nice"));
        assert_eq!(review_key("hotel_1", &r), review_key("hotel_1", &r));
        assert_ne!(review_key("hotel_1", &r), review_key("hotel_2", &r));
        assert!(review_key("hotel_1", &r).starts_with(KEY_PREFIX));
        assert_eq!(review_key("hotel_1", &r).len(), KEY_PREFIX.len() + 16);
    }

    #[test]
    fn test_pending_review_skips_blank_content() {
        assert!(pending_review("h", None, &review("a", None)).is_none());
        assert!(pending_review("h", None, &review("a", Some("   "))).is_none());

        let p = pending_review("h", None, &review("a", Some(" Clean rooms "))).unwrap();
        assert_eq!(p.document.review_content, "Clean rooms");
        assert_eq!(p.document.hotel_name, placeholders::HOTEL_NAME);
        assert_eq!(p.document.review_ratings.len(), 2);
        assert_eq!(p.document.review_ratings["Value"], 3.0);
    }

    #[test]
    fn test_parse_hotels_array_and_lines() {
        let array = r#"[{"doc_id": "hotel_1", "name": "A", "reviews": []}, {"name": "B"}]"#;
        assert_eq!(parse_hotels(array).unwrap().len(), 2);

        let lines = "{\"name\": \"A\"}\n\n{\"name\": \"B\", \"reviews\": [{\"content\": \"ok\"}]}\n";
        let hotels = parse_hotels(lines).unwrap();
        assert_eq!(hotels.len(), 2);
        assert_eq!(hotels[1].reviews.len(), 1);

        assert!(parse_hotels("{not json").is_err());
    }

    #[test]
    fn test_ingest_stats_default() {
        let stats = IngestStats::default();
        assert_eq!(stats.written, 0);
        assert_eq!(stats.failed, 0);
    }
}
