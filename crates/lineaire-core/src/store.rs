//! Hardened persistence access
//!
//! [`ResilientPersistence`] bounds every remote call with a timeout and
//! retries idempotent reads. Writes are never retried. [`DraftStore`] is the
//! typed view over incomplete analysis records used by the draft manager and
//! the submission coordinator.

use crate::config::LineaireConfig;
use crate::error::PersistenceError;
use crate::model::{AnalysisFields, AnalysisRecord, PoemContext};
use crate::persistence::{encode, Fields, Persistence, Query, Record, RecordId, RecordKind};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Timeout and retry wrapper around a [`Persistence`] implementation
#[derive(Clone)]
pub struct ResilientPersistence {
    inner: Arc<dyn Persistence>,
    timeout: Duration,
    read_retries: u32,
}

impl std::fmt::Debug for ResilientPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientPersistence")
            .field("timeout", &self.timeout)
            .field("read_retries", &self.read_retries)
            .finish_non_exhaustive()
    }
}

impl ResilientPersistence {
    /// Wrap `inner` with explicit limits
    #[must_use]
    pub fn new(inner: Arc<dyn Persistence>, timeout: Duration, read_retries: u32) -> Self {
        Self {
            inner,
            timeout,
            read_retries,
        }
    }

    /// Wrap `inner` with the limits from `config`
    #[must_use]
    pub fn from_config(inner: Arc<dyn Persistence>, config: &LineaireConfig) -> Self {
        Self::new(inner, config.persistence_timeout(), config.read_retries)
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, PersistenceError>
    where
        F: Future<Output = Result<T, PersistenceError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(PersistenceError::Timeout {
                millis: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    async fn read<T, F, Fut>(&self, op: &'static str, mut call: F) -> Result<T, PersistenceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PersistenceError>>,
    {
        let mut attempt = 0;
        loop {
            match self.bounded(call()).await {
                Err(e) if e.is_retryable() && attempt < self.read_retries => {
                    attempt += 1;
                    tracing::debug!(op, attempt, error = %e, "retrying persistence read");
                }
                other => return other,
            }
        }
    }
}

#[async_trait::async_trait]
impl Persistence for ResilientPersistence {
    async fn create(&self, kind: RecordKind, fields: Fields) -> Result<Record, PersistenceError> {
        self.bounded(self.inner.create(kind, fields)).await
    }

    async fn update(
        &self,
        kind: RecordKind,
        id: &RecordId,
        fields: Fields,
    ) -> Result<Record, PersistenceError> {
        self.bounded(self.inner.update(kind, id, fields)).await
    }

    async fn get(&self, kind: RecordKind, id: &RecordId) -> Result<Record, PersistenceError> {
        self.read("get", || self.inner.get(kind, id)).await
    }

    async fn list(&self, kind: RecordKind, query: &Query) -> Result<Vec<Record>, PersistenceError> {
        self.read("list", || self.inner.list(kind, query)).await
    }

    async fn delete(&self, kind: RecordKind, id: &RecordId) -> Result<(), PersistenceError> {
        self.bounded(self.inner.delete(kind, id)).await
    }
}

/// Typed access to incomplete analysis records of one poem
#[derive(Debug, Clone)]
pub struct DraftStore {
    backend: ResilientPersistence,
}

impl DraftStore {
    /// Create a store over a hardened backend
    #[inline]
    #[must_use]
    pub fn new(backend: ResilientPersistence) -> Self {
        Self { backend }
    }

    /// Underlying hardened backend
    #[inline]
    #[must_use]
    pub fn backend(&self) -> &ResilientPersistence {
        &self.backend
    }

    /// Incomplete records for this user and poem, oldest first
    ///
    /// Records that no longer decode are skipped with a warning; they still
    /// appear in [`Self::incomplete_ids`].
    pub async fn list_incomplete(
        &self,
        context: &PoemContext,
    ) -> Result<Vec<AnalysisRecord>, PersistenceError> {
        let records = self.query_incomplete(context).await?;
        Ok(records
            .iter()
            .filter_map(|record| match AnalysisRecord::from_record(record) {
                Ok(decoded) => Some(decoded),
                Err(e) => {
                    tracing::warn!(record = %record.id, error = %e, "skipping unreadable draft");
                    None
                }
            })
            .collect())
    }

    /// Ids of every incomplete record for this user and poem, readable or not
    pub async fn incomplete_ids(
        &self,
        context: &PoemContext,
    ) -> Result<Vec<RecordId>, PersistenceError> {
        let records = self.query_incomplete(context).await?;
        Ok(records.into_iter().map(|r| r.id).collect())
    }

    async fn query_incomplete(
        &self,
        context: &PoemContext,
    ) -> Result<Vec<Record>, PersistenceError> {
        let query = Query::new()
            .eq("userId", context.user_id.as_str())
            .eq("poemId", context.poem_id.as_str())
            .eq("completed", false);
        self.backend.list(RecordKind::Analyses, &query).await
    }

    /// Create a record, returning its id
    pub async fn create(&self, fields: &AnalysisFields) -> Result<RecordId, PersistenceError> {
        let record = self
            .backend
            .create(RecordKind::Analyses, encode(fields)?)
            .await?;
        Ok(record.id)
    }

    /// Overwrite the selection and text of a record
    pub async fn update(
        &self,
        id: &RecordId,
        fields: &AnalysisFields,
    ) -> Result<(), PersistenceError> {
        self.backend
            .update(RecordKind::Analyses, id, encode(fields)?)
            .await
            .map(|_| ())
    }

    /// Remove a record
    pub async fn delete(&self, id: &RecordId) -> Result<(), PersistenceError> {
        self.backend.delete(RecordKind::Analyses, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryPersistence;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` reads, then delegates
    struct Flaky {
        inner: MemoryPersistence,
        failures: usize,
        calls: AtomicUsize,
    }

    impl Flaky {
        fn new(failures: usize) -> Self {
            Self {
                inner: MemoryPersistence::new(),
                failures,
                calls: AtomicUsize::new(0),
            }
        }

        fn trip(&self) -> Result<(), PersistenceError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                Err(PersistenceError::Backend("unavailable".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait::async_trait]
    impl Persistence for Flaky {
        async fn create(
            &self,
            kind: RecordKind,
            fields: Fields,
        ) -> Result<Record, PersistenceError> {
            self.trip()?;
            self.inner.create(kind, fields).await
        }
        async fn update(
            &self,
            kind: RecordKind,
            id: &RecordId,
            fields: Fields,
        ) -> Result<Record, PersistenceError> {
            self.inner.update(kind, id, fields).await
        }
        async fn get(&self, kind: RecordKind, id: &RecordId) -> Result<Record, PersistenceError> {
            self.trip()?;
            self.inner.get(kind, id).await
        }
        async fn list(
            &self,
            kind: RecordKind,
            query: &Query,
        ) -> Result<Vec<Record>, PersistenceError> {
            self.trip()?;
            self.inner.list(kind, query).await
        }
        async fn delete(&self, kind: RecordKind, id: &RecordId) -> Result<(), PersistenceError> {
            self.inner.delete(kind, id).await
        }
    }

    /// Never answers
    struct Stalled;

    #[async_trait::async_trait]
    impl Persistence for Stalled {
        async fn create(&self, _: RecordKind, _: Fields) -> Result<Record, PersistenceError> {
            std::future::pending().await
        }
        async fn update(
            &self,
            _: RecordKind,
            _: &RecordId,
            _: Fields,
        ) -> Result<Record, PersistenceError> {
            std::future::pending().await
        }
        async fn get(&self, _: RecordKind, _: &RecordId) -> Result<Record, PersistenceError> {
            std::future::pending().await
        }
        async fn list(&self, _: RecordKind, _: &Query) -> Result<Vec<Record>, PersistenceError> {
            std::future::pending().await
        }
        async fn delete(&self, _: RecordKind, _: &RecordId) -> Result<(), PersistenceError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn list_is_retried_once() {
        let flaky = Arc::new(Flaky::new(1));
        let store = ResilientPersistence::new(flaky.clone(), Duration::from_secs(1), 1);
        assert!(store.list(RecordKind::Analyses, &Query::new()).await.is_ok());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn read_gives_up_after_retries() {
        let flaky = Arc::new(Flaky::new(5));
        let store = ResilientPersistence::new(flaky.clone(), Duration::from_secs(1), 1);
        let err = store
            .list(RecordKind::Analyses, &Query::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::Backend(_)));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn create_is_not_retried() {
        let flaky = Arc::new(Flaky::new(1));
        let store = ResilientPersistence::new(flaky.clone(), Duration::from_secs(1), 3);
        assert!(store
            .create(RecordKind::Analyses, Fields::new())
            .await
            .is_err());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
        assert!(flaky.inner.is_empty(RecordKind::Analyses));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_calls_time_out() {
        let store = ResilientPersistence::new(Arc::new(Stalled), Duration::from_secs(10), 1);
        let err = store
            .create(RecordKind::Analyses, Fields::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::Timeout { millis: 10_000 }));

        let err = store.get(RecordKind::Analyses, &"x".into()).await.unwrap_err();
        assert!(matches!(err, PersistenceError::Timeout { .. }));
    }

    #[tokio::test]
    async fn draft_store_lists_only_incomplete_for_poem() {
        let memory = Arc::new(MemoryPersistence::new());
        let drafts = DraftStore::new(ResilientPersistence::new(
            memory.clone(),
            Duration::from_secs(1),
            0,
        ));
        let ctx = PoemContext::new("u1", "p1", "Titre");
        let mut fields = AnalysisFields {
            user_id: "u1".into(),
            poem_id: "p1".into(),
            poem_title: "Titre".into(),
            stanza_index: 0,
            selected_words: Vec::new(),
            analysis_text: "a".into(),
            completed: false,
        };
        let kept = drafts.create(&fields).await.unwrap();
        fields.poem_id = "p2".into();
        drafts.create(&fields).await.unwrap();
        fields.poem_id = "p1".into();
        fields.completed = true;
        drafts.create(&fields).await.unwrap();

        let listed = drafts.list_incomplete(&ctx).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, kept);
    }

    #[tokio::test]
    async fn unreadable_record_is_skipped_but_listed_by_id() {
        let memory = Arc::new(MemoryPersistence::new());
        let drafts = DraftStore::new(ResilientPersistence::new(
            memory.clone(),
            Duration::from_secs(1),
            0,
        ));
        let ctx = PoemContext::new("u1", "p1", "Titre");
        let broken = memory
            .create(
                RecordKind::Analyses,
                encode(&serde_json::json!({
                    "userId": "u1",
                    "poemId": "p1",
                    "completed": false,
                    "selectedWords": "ancien format",
                }))
                .unwrap(),
            )
            .await
            .unwrap();
        let readable = drafts
            .create(&AnalysisFields {
                user_id: "u1".into(),
                poem_id: "p1".into(),
                poem_title: "Titre".into(),
                stanza_index: 0,
                selected_words: Vec::new(),
                analysis_text: "a".into(),
                completed: false,
            })
            .await
            .unwrap();

        let listed = drafts.list_incomplete(&ctx).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, readable);
        assert_eq!(
            drafts.incomplete_ids(&ctx).await.unwrap(),
            vec![broken.id, readable]
        );
    }
}
