//! Ingestion of hotel documents into review vector documents.

mod common;

use std::io::Write;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;

use common::{Fail, FakeProvider, MockStore};
use reviewbot_search::schema::{HotelDocument, EMBEDDING_DIM};
use reviewbot_search::{read_hotels, IngestStats, ReviewIngestor};

fn hotels() -> Vec<HotelDocument> {
    serde_json::from_value(json!([
        {
            "doc_id": "hotel_10025",
            "name": "Medway Youth Hostel",
            "reviews": [
                {"author": "Ozella Sipes", "date": "2013-06-22", "content": "Great value",
                 "ratings": {"Overall": 4, "Value": "5"}},
                {"author": "Barton Marks", "content": ""},
                {"author": "Blaise O'Connell", "content": "Noisy at night"}
            ]
        },
        {
            "doc_id": "hotel_10026",
            "name": "The Balmoral Guesthouse",
            "reviews": [{"content": "Lovely breakfast"}]
        },
        {"doc_id": "hotel_10027", "name": "No Reviews"}
    ]))
    .unwrap()
}

#[tokio::test]
async fn test_ingest_writes_one_document_per_review() {
    let store = Arc::new(MockStore::default());
    let provider = Arc::new(FakeProvider::new());
    let ingestor = ReviewIngestor::new(provider.clone(), store.clone()).with_batch_size(2);

    let stats = ingestor.ingest(&hotels()).await.unwrap();

    assert_eq!(
        stats,
        IngestStats {
            hotels: 3,
            reviews_seen: 4,
            skipped: 1,
            written: 3,
            failed: 0,
        }
    );
    assert_eq!(provider.calls(), 2);

    let written = store.written();
    assert_eq!(written.len(), 3);
    assert!(written.keys().all(|k| k.starts_with("review_vector_")));

    let great_value = written
        .values()
        .find(|d| d.review_content == "Great value")
        .unwrap();
    assert_eq!(great_value.hotel_id, "hotel_10025");
    assert_eq!(great_value.hotel_name, "Medway Youth Hostel");
    assert_eq!(great_value.review_ratings.get("Value"), Some(&5.0));
    assert_eq!(great_value.embedding.len(), EMBEDDING_DIM);

    let anonymous = written
        .values()
        .find(|d| d.review_content == "Lovely breakfast")
        .unwrap();
    assert_eq!(anonymous.review_author, "Anonymous");
}

#[tokio::test]
async fn test_ingest_is_idempotent() {
    let store = Arc::new(MockStore::default());
    let ingestor = ReviewIngestor::new(Arc::new(FakeProvider::new()), store.clone());

    ingestor.ingest(&hotels()).await.unwrap();
    let first = store.written();
    ingestor.ingest(&hotels()).await.unwrap();

    assert_eq!(store.written(), first);
    assert_eq!(store.count("upsert:"), 6);
}

#[tokio::test]
async fn test_embedding_failures_are_counted() {
    let store = Arc::new(MockStore::default());
    let ingestor = ReviewIngestor::new(Arc::new(FakeProvider::failing()), store.clone());

    let stats = ingestor.ingest(&hotels()).await.unwrap();

    assert_eq!(stats.failed, 3);
    assert_eq!(stats.written, 0);
    assert_eq!(store.count("upsert:"), 0);
}

#[tokio::test]
async fn test_short_embedding_batch_fails_whole_batch() {
    let store = Arc::new(MockStore::default());
    let provider = FakeProvider {
        short_batches: true,
        ..FakeProvider::new()
    };
    let ingestor = ReviewIngestor::new(Arc::new(provider), store.clone()).with_batch_size(10);

    let stats = ingestor.ingest(&hotels()).await.unwrap();
    assert_eq!(stats.failed, 3);
    assert!(store.written().is_empty());
}

#[tokio::test]
async fn test_lost_store_aborts_ingestion() {
    let store = Arc::new(MockStore {
        upsert_failure: Some(Fail::Unreachable),
        ..Default::default()
    });
    let ingestor = ReviewIngestor::new(Arc::new(FakeProvider::new()), store.clone());

    let err = ingestor.ingest(&hotels()).await.unwrap_err();
    assert!(err.is_connectivity());
    assert_eq!(store.count("upsert:"), 1);
}

#[tokio::test]
async fn test_rejected_write_is_counted() {
    let store = Arc::new(MockStore {
        upsert_failure: Some(Fail::Data),
        ..Default::default()
    });
    let ingestor = ReviewIngestor::new(Arc::new(FakeProvider::new()), store);

    let stats = ingestor.ingest(&hotels()).await.unwrap();
    assert_eq!(stats.failed, 3);
}

#[tokio::test]
async fn test_load_hotels_from_source_collection() {
    let store = Arc::new(MockStore {
        source_hotels: Ok(vec![
            json!({"doc_id": "hotel_1", "id": 1, "name": "One", "reviews": []}),
            json!({"doc_id": "hotel_2", "name": "Two"}),
            json!("not a hotel"),
        ]),
        ..Default::default()
    });
    let ingestor = ReviewIngestor::new(Arc::new(FakeProvider::new()), store.clone());

    let hotels = ingestor.load_hotels_from_store(None).await.unwrap();
    assert_eq!(hotels.len(), 2);
    assert_eq!(hotels[1].name.as_deref(), Some("Two"));

    let limited = ingestor.load_hotels_from_store(Some(1)).await.unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(store.count("query:source-hotels"), 2);
}

#[test]
fn test_read_hotels_from_json_lines_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "{{\"doc_id\": \"hotel_1\", \"name\": \"One\"}}").unwrap();
    writeln!(
        file,
        "{{\"doc_id\": \"hotel_2\", \"reviews\": [{{\"content\": \"ok\"}}]}}"
    )
    .unwrap();

    let hotels = read_hotels(file.path()).unwrap();
    assert_eq!(hotels.len(), 2);
    assert_eq!(hotels[1].reviews[0].content.as_deref(), Some("ok"));
}

#[test]
fn test_read_hotels_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(read_hotels(&dir.path().join("missing.json")).is_err());
}
