//! Response normalization
//!
//! One function per [`RawHit`] variant, each total: a missing field becomes
//! its placeholder, a missing distance becomes [`Similarity::Unscored`].

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::schema::{fields, placeholders, CanonicalResult, RawHit, Similarity};

/// Normalize any raw hit
pub fn normalize(hit: RawHit) -> CanonicalResult {
    match hit {
        RawHit::Vector {
            id,
            fields: stored,
            distance,
        } => from_vector_hit(id, &stored, distance),
        RawHit::Row(row) => from_row(&row),
        RawHit::Document { id, body } => from_document(id, &body),
    }
}

/// Normalize a k-NN hit (Tiers A and B)
pub fn from_vector_hit(
    id: Option<String>,
    stored: &Map<String, Value>,
    distance: Option<f64>,
) -> CanonicalResult {
    build(id, stored, Similarity::from_distance(distance))
}

/// Normalize a declarative query row (Tier C)
///
/// The key and distance travel in the `doc_id` and `distance_score` columns.
pub fn from_row(row: &Map<String, Value>) -> CanonicalResult {
    let body = unwrap_single_object(row);
    let id = row
        .get(fields::DOC_ID)
        .or_else(|| body.get(fields::DOC_ID))
        .and_then(Value::as_str)
        .map(str::to_string);
    let distance = row
        .get(fields::DISTANCE_SCORE)
        .or_else(|| body.get(fields::DISTANCE_SCORE))
        .and_then(number);
    build(id, body, Similarity::from_distance(distance))
}

/// Normalize a document fetched by key (Tier D); never scored
pub fn from_document(id: String, body: &Map<String, Value>) -> CanonicalResult {
    build(Some(id), body, Similarity::Unscored)
}

fn build(
    doc_id: Option<String>,
    doc: &Map<String, Value>,
    similarity: Similarity,
) -> CanonicalResult {
    CanonicalResult {
        doc_id,
        hotel_name: text(doc, fields::HOTEL_NAME)
            .unwrap_or_else(|| placeholders::HOTEL_NAME.into()),
        review_content: text(doc, fields::REVIEW_CONTENT)
            .unwrap_or_else(|| placeholders::REVIEW_CONTENT.into()),
        review_author: text(doc, fields::REVIEW_AUTHOR)
            .unwrap_or_else(|| placeholders::REVIEW_AUTHOR.into()),
        review_date: text(doc, fields::REVIEW_DATE)
            .unwrap_or_else(|| placeholders::REVIEW_DATE.into()),
        ratings: ratings(doc),
        similarity,
    }
}

/// `SELECT r FROM ...` wraps the document under its alias
fn unwrap_single_object(row: &Map<String, Value>) -> &Map<String, Value> {
    let has_known_field = [
        fields::HOTEL_NAME,
        fields::REVIEW_CONTENT,
        fields::REVIEW_AUTHOR,
    ]
    .iter()
    .any(|f| row.contains_key(*f));

    if has_known_field {
        return row;
    }

    let mut objects = row.values().filter_map(Value::as_object);
    match (objects.next(), objects.next()) {
        (Some(inner), None) => inner,
        _ => row,
    }
}

fn text(doc: &Map<String, Value>, key: &str) -> Option<String> {
    match doc.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Ratings from a nested object and/or flattened `review_ratings.<category>`
/// keys; non-numeric values are dropped.
fn ratings(doc: &Map<String, Value>) -> BTreeMap<String, f64> {
    let mut out = BTreeMap::new();

    if let Some(Value::Object(nested)) = doc.get(fields::REVIEW_RATINGS) {
        for (category, value) in nested {
            if let Some(n) = number(value) {
                out.insert(category.clone(), n);
            }
        }
    }

    let prefix = format!("{}.", fields::REVIEW_RATINGS);
    for (key, value) in doc {
        if let Some(category) = key.strip_prefix(&prefix) {
            if let Some(n) = number(value) {
                out.insert(category.to_string(), n);
            }
        }
    }

    out
}
