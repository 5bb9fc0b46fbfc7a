//! Document store contract
//!
//! The core never talks to a concrete database directly. Everything it needs is
//! expressed through [`DocumentStore`]: point reads, ordered queries that can
//! resume after a cursor position, inserts, partial updates, deletes, and the
//! atomic array primitives that keep collection membership free of lost updates.
//!
//! The embedded implementation lives in [`crate::database`].

use std::cmp::Ordering;
use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Persisted document body: field name to JSON value, without the id.
pub type Fields = Map<String, Value>;

/// The two entity types the application persists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Movies,
    Collections,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Movies => "movies",
            EntityKind::Collections => "collections",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by a [`DocumentStore`] implementation
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not serve the request. Transient from the caller's view.
    #[error("document store unavailable: {0}")]
    Unavailable(String),

    /// A write targeted a document that does not exist.
    #[error("{kind} document not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// A stored document could not be decoded, or a field had the wrong shape.
    #[error("malformed document: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Malformed(err.to_string())
    }
}

/// A stored document together with its store-assigned id
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    /// Decodes the document into a typed entity, exposing the id as an `id` field.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        let mut fields = self.fields.clone();
        fields.insert("id".to_string(), Value::String(self.id.clone()));
        serde_json::from_value(Value::Object(fields)).map_err(|err| {
            StoreError::Malformed(format!("document {}: {}", self.id, err))
        })
    }
}

/// Serializes an entity into storable fields, dropping its `id`.
pub fn to_fields<T: Serialize>(entity: &T) -> Result<Fields, StoreError> {
    match serde_json::to_value(entity)? {
        Value::Object(mut fields) => {
            fields.remove("id");
            Ok(fields)
        }
        other => Err(StoreError::Malformed(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

/// Field predicate supported by [`Query`]
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `field == value`
    Eq(String, Value),
    /// `field` is an array holding `value`
    ArrayContains(String, Value),
}

impl Filter {
    pub fn matches(&self, fields: &Fields) -> bool {
        match self {
            Filter::Eq(field, value) => fields.get(field) == Some(value),
            Filter::ArrayContains(field, value) => fields
                .get(field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(value)),
        }
    }
}

/// A position inside an ordered query result: the sort key of a document plus
/// its id, which breaks ties between equal keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub key: Value,
    pub id: String,
}

impl Position {
    /// Position of `doc` when results are ordered by `order_by`.
    pub fn of(doc: &Document, order_by: Option<&str>) -> Self {
        let key = order_by
            .and_then(|field| doc.fields.get(field).cloned())
            .unwrap_or(Value::Null);
        Position {
            key,
            id: doc.id.clone(),
        }
    }

    fn cmp_doc(&self, doc: &Document, order_by: Option<&str>) -> Ordering {
        let other = Position::of(doc, order_by);
        compare_values(&self.key, &other.key).then_with(|| self.id.cmp(&other.id))
    }
}

/// Query over one entity type.
///
/// Results are ordered by `order_by` ascending, ties broken by id. Without an
/// `order_by` the store's id order is used.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Option<Filter>,
    pub order_by: Option<String>,
    pub after: Option<Position>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filter = Some(Filter::Eq(field.to_string(), value.into()));
        self
    }

    pub fn array_contains(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filter = Some(Filter::ArrayContains(field.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, field: &str) -> Self {
        self.order_by = Some(field.to_string());
        self
    }

    pub fn after(mut self, position: Position) -> Self {
        self.after = Some(position);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Applies filter, ordering, cursor and limit to an unordered document set.
    ///
    /// Backends without native secondary indexes evaluate queries with this.
    pub fn apply(&self, docs: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let order_by = self.order_by.as_deref();

        let mut matched: Vec<Document> = docs
            .into_iter()
            .filter(|doc| self.filter.as_ref().is_none_or(|f| f.matches(&doc.fields)))
            .collect();

        matched.sort_by(|a, b| {
            let (pa, pb) = (Position::of(a, order_by), Position::of(b, order_by));
            compare_values(&pa.key, &pb.key).then_with(|| pa.id.cmp(&pb.id))
        });

        let start = match &self.after {
            Some(position) => matched.partition_point(|doc| {
                position.cmp_doc(doc, order_by) != Ordering::Less
            }),
            None => 0,
        };

        matched
            .into_iter()
            .skip(start)
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

/// Total order over JSON values used for sorting query results.
///
/// Values of different types order as null < bool < number < string < array <
/// object. Strings compare by code point, numbers numerically.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (left, right) in x.iter().zip(y) {
                match compare_values(left, right) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
            x.len().cmp(&y.len())
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Document store client used by every service in this crate.
///
/// Array operations must be atomic per document: concurrent `array_add` calls
/// on the same document may not lose each other's element.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetches one document. `Ok(None)` when it does not exist.
    async fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Document>, StoreError>;

    /// Runs a filtered, ordered, cursor-resumable query.
    async fn query(&self, kind: EntityKind, query: &Query) -> Result<Vec<Document>, StoreError>;

    /// Inserts a new document and returns its freshly assigned id.
    async fn insert(&self, kind: EntityKind, fields: Fields) -> Result<String, StoreError>;

    /// Overwrites the given fields, leaving the others untouched.
    ///
    /// Fails with [`StoreError::NotFound`] when the document does not exist.
    async fn update_fields(
        &self,
        kind: EntityKind,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError>;

    /// Deletes a document. Returns whether it existed.
    async fn delete(&self, kind: EntityKind, id: &str) -> Result<bool, StoreError>;

    /// Appends `value` to the array `field` unless already present.
    async fn array_add(
        &self,
        kind: EntityKind,
        id: &str,
        field: &str,
        value: Value,
    ) -> Result<(), StoreError>;

    /// Removes every occurrence of `value` from the array `field`.
    async fn array_remove(
        &self,
        kind: EntityKind,
        id: &str,
        field: &str,
        value: Value,
    ) -> Result<(), StoreError>;
}
