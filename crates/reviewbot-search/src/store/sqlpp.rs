//! SQL++ rendering of declarative queries
//!
//! Identifiers (keyspace parts, field names) are backtick-escaped after
//! validation; every value travels as a named parameter.

use serde_json::{json, Map, Value};

use super::{DeclarativeQuery, Keyspace};
use crate::error::{Result, SearchError};
use crate::schema::fields;

/// Distance metric passed to `VECTOR_DISTANCE`
pub const DISTANCE_METRIC: &str = "cosine";

/// A rendered statement plus its named parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub text: String,
    /// Parameter name (with `$`) → value
    pub params: Map<String, Value>,
}

impl Statement {
    fn new(text: String) -> Self {
        Self {
            text,
            params: Map::new(),
        }
    }

    fn bind(mut self, name: &str, value: Value) -> Self {
        self.params.insert(format!("${}", name), value);
        self
    }
}

/// Escape a single identifier, rejecting characters that would break out of
/// the backtick quoting.
pub fn escape_identifier(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(SearchError::InvalidConfig("empty identifier".into()));
    }
    if name.contains('`') || name.chars().any(char::is_control) {
        return Err(SearchError::InvalidConfig(format!(
            "identifier contains forbidden characters: {:?}",
            name
        )));
    }
    Ok(format!("`{}`", name))
}

fn escape_keyspace(keyspace: &Keyspace) -> Result<String> {
    Ok(format!(
        "{}.{}.{}",
        escape_identifier(&keyspace.bucket)?,
        escape_identifier(&keyspace.scope)?,
        escape_identifier(&keyspace.collection)?
    ))
}

/// Query context for statements run against `keyspace`
pub fn query_context(keyspace: &Keyspace) -> Result<String> {
    Ok(format!(
        "default:{}.{}",
        escape_identifier(&keyspace.bucket)?,
        escape_identifier(&keyspace.scope)?
    ))
}

/// Render `query` for the review collection `keyspace`.
///
/// `source_collection` is the collection holding source hotel documents.
pub fn render(
    query: &DeclarativeQuery,
    keyspace: &Keyspace,
    source_collection: &str,
) -> Result<Statement> {
    match query {
        DeclarativeQuery::VectorDistance {
            field,
            vector,
            limit,
        } => {
            let field = escape_identifier(field)?;
            let text = format!(
                "SELECT META(r).id AS {doc_id}, r.{name}, r.{content}, r.{author}, r.{date}, r.{ratings}, \
                 VECTOR_DISTANCE(r.{field}, $query_vector, $metric) AS {distance} \
                 FROM {ks} AS r \
                 WHERE r.{field} IS NOT MISSING AND r.{field} IS NOT NULL \
                 ORDER BY {distance} ASC \
                 LIMIT $limit",
                doc_id = fields::DOC_ID,
                name = fields::HOTEL_NAME,
                content = fields::REVIEW_CONTENT,
                author = fields::REVIEW_AUTHOR,
                date = fields::REVIEW_DATE,
                ratings = fields::REVIEW_RATINGS,
                distance = fields::DISTANCE_SCORE,
                field = field,
                ks = escape_keyspace(keyspace)?,
            );
            Ok(Statement::new(text)
                .bind("query_vector", json!(vector.as_slice()))
                .bind("metric", json!(DISTANCE_METRIC))
                .bind("limit", json!(limit)))
        }
        DeclarativeQuery::ListKeys { limit } => {
            let text = format!(
                "SELECT META(r).id AS {} FROM {} AS r ORDER BY META(r).id LIMIT $limit",
                fields::DOC_ID,
                escape_keyspace(keyspace)?
            );
            Ok(Statement::new(text).bind("limit", json!(limit)))
        }
        DeclarativeQuery::IndexLookup { index } => {
            let text = "SELECT s.name FROM system:indexes AS s \
                        WHERE s.bucket_id = $bucket AND s.scope_id = $scope \
                        AND s.keyspace_id = $collection AND s.name = $index"
                .to_string();
            Ok(Statement::new(text)
                .bind("bucket", json!(keyspace.bucket))
                .bind("scope", json!(keyspace.scope))
                .bind("collection", json!(keyspace.collection))
                .bind("index", json!(index)))
        }
        DeclarativeQuery::SourceHotels { limit } => {
            let source = keyspace.sibling(source_collection);
            let mut text = format!(
                "SELECT META(h).id AS {}, h.* FROM {} AS h ORDER BY META(h).id",
                fields::DOC_ID,
                escape_keyspace(&source)?
            );
            match limit {
                Some(limit) => {
                    text.push_str(" LIMIT $limit");
                    Ok(Statement::new(text).bind("limit", json!(limit)))
                }
                None => Ok(Statement::new(text)),
            }
        }
    }
}
