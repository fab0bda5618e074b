//! In-process document store
//!
//! Backs the CLI and the test suites. Records of each kind keep insertion
//! order, which is also creation order.

use super::{Fields, Order, Persistence, Query, Record, RecordId, RecordKind};
use crate::error::PersistenceError;
use chrono::Utc;
use dashmap::DashMap;
use ulid::Ulid;

/// Document store held in memory
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    collections: DashMap<RecordKind, Vec<Record>>,
}

impl MemoryPersistence {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records of `kind`
    #[must_use]
    pub fn len(&self, kind: RecordKind) -> usize {
        self.collections.get(&kind).map_or(0, |c| c.len())
    }

    /// True if no record of `kind` exists
    #[must_use]
    pub fn is_empty(&self, kind: RecordKind) -> bool {
        self.len(kind) == 0
    }

    /// Copy of every record of `kind`, oldest first
    #[must_use]
    pub fn records(&self, kind: RecordKind) -> Vec<Record> {
        self.collections
            .get(&kind)
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    fn not_found(kind: RecordKind, id: &RecordId) -> PersistenceError {
        PersistenceError::NotFound {
            kind,
            id: id.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Persistence for MemoryPersistence {
    async fn create(&self, kind: RecordKind, fields: Fields) -> Result<Record, PersistenceError> {
        let record = Record {
            id: RecordId::from(Ulid::new().to_string()),
            created_at: Utc::now(),
            fields,
        };
        self.collections
            .entry(kind)
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        kind: RecordKind,
        id: &RecordId,
        fields: Fields,
    ) -> Result<Record, PersistenceError> {
        let mut collection = self
            .collections
            .get_mut(&kind)
            .ok_or_else(|| Self::not_found(kind, id))?;
        let record = collection
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| Self::not_found(kind, id))?;
        record.fields.extend(fields);
        Ok(record.clone())
    }

    async fn get(&self, kind: RecordKind, id: &RecordId) -> Result<Record, PersistenceError> {
        self.collections
            .get(&kind)
            .and_then(|c| c.iter().find(|r| &r.id == id).cloned())
            .ok_or_else(|| Self::not_found(kind, id))
    }

    async fn list(&self, kind: RecordKind, query: &Query) -> Result<Vec<Record>, PersistenceError> {
        let Some(collection) = self.collections.get(&kind) else {
            return Ok(Vec::new());
        };
        let matching = collection.iter().filter(|r| r.matches(&query.filters));
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(match query.order {
            Order::CreatedAsc => matching.take(limit).cloned().collect(),
            Order::CreatedDesc => matching.rev().take(limit).cloned().collect(),
        })
    }

    async fn delete(&self, kind: RecordKind, id: &RecordId) -> Result<(), PersistenceError> {
        let mut collection = self
            .collections
            .get_mut(&kind)
            .ok_or_else(|| Self::not_found(kind, id))?;
        let before = collection.len();
        collection.retain(|r| &r.id != id);
        if collection.len() == before {
            return Err(Self::not_found(kind, id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::encode;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> Fields {
        encode(&value).unwrap()
    }

    #[tokio::test]
    async fn create_get_update_delete() {
        let store = MemoryPersistence::new();
        let created = store
            .create(RecordKind::Analyses, fields(json!({"analysisText": "a", "completed": false})))
            .await
            .unwrap();

        let updated = store
            .update(RecordKind::Analyses, &created.id, fields(json!({"analysisText": "b"})))
            .await
            .unwrap();
        assert_eq!(updated.fields["analysisText"], json!("b"));
        assert_eq!(updated.fields["completed"], json!(false));

        let fetched = store.get(RecordKind::Analyses, &created.id).await.unwrap();
        assert_eq!(fetched, updated);

        store.delete(RecordKind::Analyses, &created.id).await.unwrap();
        assert!(store.is_empty(RecordKind::Analyses));
        assert!(matches!(
            store.delete(RecordKind::Analyses, &created.id).await,
            Err(PersistenceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn list_filters_orders_and_limits() {
        let store = MemoryPersistence::new();
        for (i, user) in ["u1", "u2", "u1", "u1"].iter().enumerate() {
            store
                .create(RecordKind::Analyses, fields(json!({"userId": user, "n": i})))
                .await
                .unwrap();
        }

        let asc = store
            .list(RecordKind::Analyses, &Query::new().eq("userId", "u1"))
            .await
            .unwrap();
        let ns: Vec<_> = asc.iter().map(|r| r.fields["n"].clone()).collect();
        assert_eq!(ns, vec![json!(0), json!(2), json!(3)]);

        let desc = store
            .list(
                RecordKind::Analyses,
                &Query::new().eq("userId", "u1").order(Order::CreatedDesc).limit(2),
            )
            .await
            .unwrap();
        let ns: Vec<_> = desc.iter().map(|r| r.fields["n"].clone()).collect();
        assert_eq!(ns, vec![json!(3), json!(2)]);
    }

    #[tokio::test]
    async fn kinds_are_separate_collections() {
        let store = MemoryPersistence::new();
        store
            .create(RecordKind::Results, fields(json!({"x": 1})))
            .await
            .unwrap();
        assert_eq!(store.len(RecordKind::Results), 1);
        assert!(store
            .list(RecordKind::Analyses, &Query::new())
            .await
            .unwrap()
            .is_empty());
    }
}
