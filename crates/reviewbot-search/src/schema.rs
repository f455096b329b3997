//! Document schemas and result types for review search
//!
//! Defines the stored review vector document, the tier-specific raw hits
//! returned by stores, and the canonical result record handed to callers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Embedding dimension of all-MiniLM-L6-v2
pub const EMBEDDING_DIM: usize = 384;

/// Field names of a review vector document
pub mod fields {
    /// Key of the source hotel document
    pub const HOTEL_ID: &str = "hotel_id";
    /// Hotel display name
    pub const HOTEL_NAME: &str = "hotel_name";
    /// Review body text (the embedded content)
    pub const REVIEW_CONTENT: &str = "review_content";
    /// Review author
    pub const REVIEW_AUTHOR: &str = "review_author";
    /// Review date as stored by the source (free-form string)
    pub const REVIEW_DATE: &str = "review_date";
    /// Category → rating mapping
    pub const REVIEW_RATINGS: &str = "review_ratings";
    /// Stored embedding vector
    pub const EMBEDDING: &str = "embedding";
    /// Alias for the document key in declarative query rows
    pub const DOC_ID: &str = "doc_id";
    /// Alias for the computed distance in declarative query rows
    pub const DISTANCE_SCORE: &str = "distance_score";
}

/// Fields requested from a vector search (everything except the embedding)
pub const RETURN_FIELDS: [&str; 5] = [
    fields::HOTEL_NAME,
    fields::REVIEW_CONTENT,
    fields::REVIEW_AUTHOR,
    fields::REVIEW_DATE,
    fields::REVIEW_RATINGS,
];

/// Placeholders used when a document lacks a field
pub mod placeholders {
    pub const HOTEL_NAME: &str = "Unknown Hotel";
    pub const REVIEW_CONTENT: &str = "No content available";
    pub const REVIEW_AUTHOR: &str = "Anonymous";
    pub const REVIEW_DATE: &str = "";
}

/// A review vector document as written by ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewDocument {
    pub hotel_id: String,
    pub hotel_name: String,
    pub review_author: String,
    pub review_date: String,
    pub review_content: String,
    #[serde(default)]
    pub review_ratings: BTreeMap<String, f64>,
    pub embedding: Vec<f32>,
}

/// A single review embedded in a source hotel document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HotelReview {
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub ratings: BTreeMap<String, Value>,
}

/// Source hotel document (travel-sample `hotel` shape)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HotelDocument {
    /// Document key, injected by the source query as `doc_id`
    #[serde(default)]
    pub doc_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub reviews: Vec<HotelReview>,
}

/// Tier-specific response fragment, before normalization
#[derive(Debug, Clone, PartialEq)]
pub enum RawHit {
    /// Vector search hit: stored fields plus the engine's distance
    Vector {
        id: Option<String>,
        fields: Map<String, Value>,
        distance: Option<f64>,
    },
    /// Row of a declarative query (fields, `doc_id`, `distance_score`)
    Row(Map<String, Value>),
    /// Whole document fetched by key, no score
    Document { id: String, body: Map<String, Value> },
}

/// Relevance of a canonical result
///
/// Serializes as a number, or `null` when the tier could not score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "Option<f32>", into = "Option<f32>")]
pub enum Similarity {
    /// Similarity in [0, 1], higher is more relevant
    Scored(f32),
    /// The tier that produced the result cannot compute a score
    Unscored,
}

impl Similarity {
    /// Similarity derived from a distance: `1 - distance`, clamped to [0, 1].
    ///
    /// A missing or non-finite distance is never turned into a number.
    pub fn from_distance(distance: Option<f64>) -> Self {
        match distance {
            Some(d) if d.is_finite() => Similarity::Scored((1.0 - d).clamp(0.0, 1.0) as f32),
            _ => Similarity::Unscored,
        }
    }

    /// Numeric value, if scored
    pub fn value(&self) -> Option<f32> {
        match self {
            Similarity::Scored(v) => Some(*v),
            Similarity::Unscored => None,
        }
    }

    pub fn is_scored(&self) -> bool {
        matches!(self, Similarity::Scored(_))
    }
}

impl From<Option<f32>> for Similarity {
    fn from(value: Option<f32>) -> Self {
        value.map_or(Similarity::Unscored, Similarity::Scored)
    }
}

impl From<Similarity> for Option<f32> {
    fn from(value: Similarity) -> Self {
        value.value()
    }
}

impl std::fmt::Display for Similarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Similarity::Scored(v) => write!(f, "{:.2}", v),
            Similarity::Unscored => write!(f, "N/A"),
        }
    }
}

/// Normalized, tier-agnostic review search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalResult {
    /// Store key of the review document, when the tier exposes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    pub hotel_name: String,
    pub review_content: String,
    pub review_author: String,
    pub review_date: String,
    pub ratings: BTreeMap<String, f64>,
    pub similarity: Similarity,
}
