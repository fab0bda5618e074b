//! Remote document store contract
//!
//! The backing database is an external collaborator. This module only fixes
//! the generic create / update / get / list / delete surface the lifecycle
//! needs, with records as loosely typed JSON field maps.

pub mod memory;

use crate::error::PersistenceError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use memory::MemoryPersistence;

/// Record field map
pub type Fields = serde_json::Map<String, Value>;

/// Identifier assigned by the store
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Raw string form
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RecordId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for RecordId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Collections used by the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Per-excerpt analyses (drafts while `completed = false`)
    Analyses,
    /// Graded submissions
    Results,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Analyses => f.write_str("analyses"),
            Self::Results => f.write_str("results"),
        }
    }
}

/// Stored document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Store-assigned id
    pub id: RecordId,
    /// Creation time, used for ordering
    pub created_at: DateTime<Utc>,
    /// Document body
    pub fields: Fields,
}

impl Record {
    /// Deserialize the field map into `T`
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, PersistenceError> {
        Ok(serde_json::from_value(Value::Object(self.fields.clone()))?)
    }

    /// True if every filter matches this record
    #[must_use]
    pub fn matches(&self, filters: &[(String, Value)]) -> bool {
        filters
            .iter()
            .all(|(field, expected)| self.fields.get(field) == Some(expected))
    }
}

/// Serialize `value` into a field map
pub fn encode<T: Serialize>(value: &T) -> Result<Fields, PersistenceError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(PersistenceError::Serialization(format!(
            "expected an object, got {other}"
        ))),
    }
}

/// Ordering by creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Order {
    /// Oldest first
    #[default]
    CreatedAsc,
    /// Newest first
    CreatedDesc,
}

/// Equality filters, ordering and limit for [`Persistence::list`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// `(field, value)` pairs that must all match
    pub filters: Vec<(String, Value)>,
    /// Result order
    pub order: Order,
    /// Maximum number of records
    pub limit: Option<usize>,
}

impl Query {
    /// Match everything, oldest first
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality filter
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// Set the ordering
    #[inline]
    #[must_use]
    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    /// Cap the number of results
    #[inline]
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Generic document store
///
/// Implementations talk to the real database. `update` merges the given
/// fields into the stored document.
#[async_trait::async_trait]
pub trait Persistence: Send + Sync {
    /// Insert a new record
    async fn create(&self, kind: RecordKind, fields: Fields) -> Result<Record, PersistenceError>;

    /// Merge `fields` into an existing record
    async fn update(
        &self,
        kind: RecordKind,
        id: &RecordId,
        fields: Fields,
    ) -> Result<Record, PersistenceError>;

    /// Fetch one record
    async fn get(&self, kind: RecordKind, id: &RecordId) -> Result<Record, PersistenceError>;

    /// Fetch records matching `query`
    async fn list(&self, kind: RecordKind, query: &Query) -> Result<Vec<Record>, PersistenceError>;

    /// Remove one record
    async fn delete(&self, kind: RecordKind, id: &RecordId) -> Result<(), PersistenceError>;
}
