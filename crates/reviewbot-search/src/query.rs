//! Query and query-vector types

use std::ops::Deref;
use std::sync::Arc;

use crate::error::{Result, SearchError};

/// Default number of results per query
pub const DEFAULT_TOP_K: usize = 5;

/// A validated user query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    text: String,
    top_k: usize,
}

impl Query {
    /// Create a query, rejecting blank text and a zero result count.
    ///
    /// Surrounding whitespace is trimmed.
    pub fn new(text: impl AsRef<str>, top_k: usize) -> Result<Self> {
        let text = text.as_ref().trim();
        if text.is_empty() {
            return Err(SearchError::InvalidQuery("query text is empty".into()));
        }
        if top_k == 0 {
            return Err(SearchError::InvalidQuery(
                "top_k must be a positive integer".into(),
            ));
        }
        Ok(Self {
            text: text.to_string(),
            top_k,
        })
    }

    /// Create a query with [`DEFAULT_TOP_K`] results
    pub fn with_default_k(text: impl AsRef<str>) -> Result<Self> {
        Self::new(text, DEFAULT_TOP_K)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }
}

/// Immutable embedding of a single query
///
/// Cheap to clone; the values are shared.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingVector(Arc<[f32]>);

impl EmbeddingVector {
    /// Wrap a provider output, checking its dimension.
    pub fn new(values: Vec<f32>, expected_dim: usize) -> Result<Self> {
        if values.len() != expected_dim {
            return Err(SearchError::DimensionMismatch {
                expected: expected_dim,
                actual: values.len(),
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(SearchError::Embedding(
                "embedding contains non-finite values".into(),
            ));
        }
        Ok(Self(values.into()))
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.0.to_vec()
    }
}

impl Deref for EmbeddingVector {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_trims_text() {
        let query = Query::new("  clean rooms  ", 3).unwrap();
        assert_eq!(query.text(), "clean rooms");
        assert_eq!(query.top_k(), 3);
    }

    #[test]
    fn test_query_rejects_blank_text() {
        assert!(matches!(
            Query::new("   ", 5),
            Err(SearchError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_query_rejects_zero_k() {
        assert!(matches!(
            Query::new("pool", 0),
            Err(SearchError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_query_default_k() {
        assert_eq!(Query::with_default_k("pool").unwrap().top_k(), DEFAULT_TOP_K);
    }

    #[test]
    fn test_embedding_dimension_checked() {
        let err = EmbeddingVector::new(vec![0.0; 10], 384).unwrap_err();
        assert!(matches!(
            err,
            SearchError::DimensionMismatch {
                expected: 384,
                actual: 10
            }
        ));
    }

    #[test]
    fn test_embedding_rejects_nan() {
        let mut values = vec![0.1; 4];
        values[2] = f32::NAN;
        assert!(matches!(
            EmbeddingVector::new(values, 4),
            Err(SearchError::Embedding(_))
        ));
    }

    #[test]
    fn test_embedding_shares_values() {
        let vector = EmbeddingVector::new(vec![0.5; 4], 4).unwrap();
        let copy = vector.clone();
        assert_eq!(copy.as_slice(), vector.as_slice());
        assert_eq!(vector.dim(), 4);
        assert_eq!(vector.len(), 4);
    }
}
