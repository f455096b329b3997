//! Session behavior: embedding first, cached capability, re-probing.

mod common;

use std::sync::Arc;

use common::{distance_row, vector_hit, Fail, FakeProvider, MockStore};
use reviewbot_search::store::IndexDescriptor;
use reviewbot_search::{
    IndexAvailability, Query, RetrievalConfig, ReviewSearcher, SearchError, SearchTier,
};

fn searcher(provider: FakeProvider, store: MockStore) -> (Arc<MockStore>, ReviewSearcher) {
    let store = Arc::new(store);
    let searcher = ReviewSearcher::new(
        Arc::new(provider),
        store.clone(),
        RetrievalConfig::default(),
    );
    (store, searcher)
}

#[tokio::test]
async fn test_search_returns_ranked_results() {
    let (_, searcher) = searcher(
        FakeProvider::new(),
        MockStore {
            primary: Ok(vec![vector_hit("Far", 0.6), vector_hit("Near", 0.1)]),
            ..Default::default()
        },
    );

    let results = searcher.search("sea view", 5).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].hotel_name, "Near");
}

#[tokio::test]
async fn test_invalid_query_is_rejected_before_embedding() {
    let provider = Arc::new(FakeProvider::new());
    let store = Arc::new(MockStore::default());
    let searcher = ReviewSearcher::new(provider.clone(), store.clone(), RetrievalConfig::default());

    assert!(matches!(
        searcher.search("   ", 5).await,
        Err(SearchError::InvalidQuery(_))
    ));
    assert!(matches!(
        searcher.search("rooms", 0).await,
        Err(SearchError::InvalidQuery(_))
    ));
    assert_eq!(provider.calls(), 0);
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn test_embedding_failure_stops_before_store() {
    let (store, searcher) = searcher(FakeProvider::failing(), MockStore::default());

    let err = searcher.search("rooms", 5).await.unwrap_err();
    assert!(err.is_embedding_failure(), "got {:?}", err);
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn test_wrong_embedding_dimension_is_rejected() {
    let (store, searcher) = searcher(FakeProvider::with_dim(768), MockStore::default());

    let err = searcher.search("rooms", 5).await.unwrap_err();
    assert!(matches!(err, SearchError::DimensionMismatch { .. }), "got {:?}", err);
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn test_capability_is_probed_once() {
    let (store, searcher) = searcher(
        FakeProvider::new(),
        MockStore {
            primary: Ok(vec![vector_hit("A", 0.2)]),
            ..Default::default()
        },
    );

    searcher.search("one", 5).await.unwrap();
    searcher.search("two", 5).await.unwrap();

    assert_eq!(store.count("list_indexes"), 1);
    assert_eq!(
        searcher.capability().await.index,
        IndexAvailability::Present
    );
}

#[tokio::test]
async fn test_absent_index_goes_straight_to_distance_query() {
    let (store, searcher) = searcher(
        FakeProvider::new(),
        MockStore {
            indexes: Ok(Vec::new()),
            distance: Ok(vec![distance_row("Sql", 0.3)]),
            ..Default::default()
        },
    );

    let query = Query::new("rooms", 5).unwrap();
    let outcome = searcher.search_detailed(&query).await.unwrap();

    assert_eq!(outcome.tier, Some(SearchTier::DistanceQuery));
    assert_eq!(store.count("vector:"), 0);
}

#[tokio::test]
async fn test_probe_falls_back_to_metadata_query() {
    let (store, searcher) = searcher(
        FakeProvider::new(),
        MockStore {
            indexes: Err(Fail::Mismatch),
            index_lookup: Ok(vec![serde_json::json!({"name": common::INDEX})]),
            ..Default::default()
        },
    );

    let state = searcher.capability().await;
    assert_eq!(state.index, IndexAvailability::Present);
    assert!(!state.management_responded);
    assert_eq!(store.count("query:index-lookup"), 1);
}

#[tokio::test]
async fn test_unreachable_probe_means_unknown() {
    let (_, searcher) = searcher(FakeProvider::new(), MockStore::unreachable());

    let state = searcher.capability().await;
    assert_eq!(state.index, IndexAvailability::Unknown);
    assert_eq!(state.tier_plan(), SearchTier::ALL.to_vec());
}

#[tokio::test]
async fn test_stale_capability_triggers_reprobe() {
    let (store, searcher) = searcher(
        FakeProvider::new(),
        MockStore {
            primary: Err(Fail::NotFound),
            distance: Ok(vec![distance_row("Sql", 0.3)]),
            ..Default::default()
        },
    );

    searcher.search("one", 5).await.unwrap();
    searcher.search("two", 5).await.unwrap();

    assert_eq!(store.count("list_indexes"), 2);
}

#[tokio::test]
async fn test_reprobe_can_be_disabled() {
    let store = Arc::new(MockStore {
        primary: Err(Fail::NotFound),
        distance: Ok(vec![distance_row("Sql", 0.3)]),
        ..Default::default()
    });
    let searcher = ReviewSearcher::new(
        Arc::new(FakeProvider::new()),
        store.clone(),
        RetrievalConfig::default(),
    )
    .with_reprobe_on_failure(false);

    searcher.search("one", 5).await.unwrap();
    searcher.search("two", 5).await.unwrap();

    assert_eq!(store.count("list_indexes"), 1);
}

#[tokio::test]
async fn test_connectivity_error_drops_cached_capability() {
    let (store, searcher) = searcher(FakeProvider::new(), MockStore::unreachable());

    assert!(searcher.search("one", 5).await.unwrap_err().is_connectivity());
    assert!(searcher.search("two", 5).await.unwrap_err().is_connectivity());

    assert_eq!(store.count("list_indexes"), 2);
}

#[tokio::test]
async fn test_explicit_reprobe_refreshes_cache() {
    let (store, searcher) = searcher(
        FakeProvider::new(),
        MockStore {
            indexes: Ok(vec![IndexDescriptor {
                name: common::INDEX.into(),
                kind: "fulltext-index".into(),
                vector_dims: Some(768),
            }]),
            ..Default::default()
        },
    );

    let state = searcher.reprobe().await;
    assert_eq!(state.index, IndexAvailability::Absent);
    assert_eq!(searcher.capability().await, state);
    assert_eq!(store.count("list_indexes"), 1);
}
