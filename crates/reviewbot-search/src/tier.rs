//! Search tiers in fallback priority order

use serde::{Deserialize, Serialize};

/// A retrieval strategy, ordered from most to least precise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchTier {
    /// Tier A: k-NN query against the vector index
    NativeVector,
    /// Tier B: the same k-NN query through the alternate call convention
    AlternateVector,
    /// Tier C: declarative query with a vector-distance function
    DistanceQuery,
    /// Tier D: bounded key listing plus key lookups, no scores
    Unscored,
}

impl SearchTier {
    /// All tiers in priority order
    pub const ALL: [SearchTier; 4] = [
        SearchTier::NativeVector,
        SearchTier::AlternateVector,
        SearchTier::DistanceQuery,
        SearchTier::Unscored,
    ];

    /// Priority rank, 0 is tried first
    pub fn rank(self) -> u8 {
        match self {
            SearchTier::NativeVector => 0,
            SearchTier::AlternateVector => 1,
            SearchTier::DistanceQuery => 2,
            SearchTier::Unscored => 3,
        }
    }

    /// Single-letter label used in logs
    pub fn letter(self) -> char {
        (b'A' + self.rank()) as char
    }

    /// Whether results from this tier carry similarity scores
    pub fn is_scored(self) -> bool {
        !matches!(self, SearchTier::Unscored)
    }

    /// Whether this tier needs the vector search index
    pub fn uses_vector_index(self) -> bool {
        matches!(self, SearchTier::NativeVector | SearchTier::AlternateVector)
    }
}

impl std::fmt::Display for SearchTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchTier::NativeVector => write!(f, "native-vector"),
            SearchTier::AlternateVector => write!(f, "alternate-vector"),
            SearchTier::DistanceQuery => write!(f, "distance-query"),
            SearchTier::Unscored => write!(f, "unscored"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiers_in_rank_order() {
        let ranks: Vec<u8> = SearchTier::ALL.iter().map(|t| t.rank()).collect();
        assert_eq!(ranks, vec![0, 1, 2, 3]);

        let mut sorted = SearchTier::ALL;
        sorted.sort();
        assert_eq!(sorted, SearchTier::ALL);
    }

    #[test]
    fn test_tier_letters() {
        let letters: String = SearchTier::ALL.iter().map(|t| t.letter()).collect();
        assert_eq!(letters, "ABCD");
    }

    #[test]
    fn test_only_last_tier_is_unscored() {
        assert!(SearchTier::NativeVector.is_scored());
        assert!(SearchTier::DistanceQuery.is_scored());
        assert!(!SearchTier::Unscored.is_scored());
    }

    #[test]
    fn test_tier_display() {
        assert_eq!(SearchTier::AlternateVector.to_string(), "alternate-vector");
        assert_eq!(
            serde_json::to_string(&SearchTier::DistanceQuery).unwrap(),
            "\"distance-query\""
        );
    }
}
