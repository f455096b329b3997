//! Tests against real services.
//!
//! Need a Couchbase cluster with the travel-sample bucket and the review
//! vector collection populated, and the embedding model download.
//! Run with: `cargo test -p reviewbot-search --test live -- --ignored`

use std::sync::Arc;

use reviewbot_search::{
    create_provider, CouchbaseConfig, CouchbaseStore, EmbeddingConfig, RetrievalConfig,
    ReviewSearcher,
};

fn couchbase_from_env() -> CouchbaseConfig {
    let connection = std::env::var("REVIEWBOT_TEST_CONNECTION")
        .unwrap_or_else(|_| "couchbase://localhost".to_string());
    let mut config = CouchbaseConfig::from_connection_string(&connection).unwrap();
    config.username =
        std::env::var("REVIEWBOT_TEST_USERNAME").unwrap_or_else(|_| "Administrator".into());
    config.password = std::env::var("REVIEWBOT_TEST_PASSWORD").unwrap_or_else(|_| "password".into());
    config
}

#[tokio::test]
#[ignore = "requires a running Couchbase cluster and model download"]
async fn test_live_search_returns_results() {
    let store = Arc::new(CouchbaseStore::new(couchbase_from_env()).unwrap());
    let provider = create_provider(&EmbeddingConfig::local()).unwrap();
    let searcher = ReviewSearcher::new(provider, store, RetrievalConfig::default());

    let results = searcher.search("friendly staff and clean rooms", 3).await.unwrap();
    assert!(!results.is_empty());
    assert!(results.len() <= 3);
}

#[tokio::test]
#[ignore = "requires a running Couchbase cluster"]
async fn test_live_probe_reports_index() {
    let store = Arc::new(CouchbaseStore::new(couchbase_from_env()).unwrap());
    let provider = create_provider(&EmbeddingConfig::local()).unwrap();
    let searcher = ReviewSearcher::new(provider, store, RetrievalConfig::default());

    let state = searcher.capability().await;
    assert_eq!(state.index_name, "review_vector_idx");
    assert!(state.management_responded);
}
