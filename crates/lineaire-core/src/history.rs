//! Graded submissions of a student

use crate::error::PersistenceError;
use crate::model::{ResultFields, ResultRecord, SubmissionOutcome};
use crate::persistence::{encode, Order, Persistence, Query, RecordId, RecordKind};
use crate::store::ResilientPersistence;

/// Stores and lists [`ResultRecord`]s
#[derive(Debug, Clone)]
pub struct ResultHistory {
    backend: ResilientPersistence,
}

impl ResultHistory {
    /// Create a history over a hardened backend
    #[inline]
    #[must_use]
    pub fn new(backend: ResilientPersistence) -> Self {
        Self { backend }
    }

    /// Persist a graded submission
    #[tracing::instrument(skip(self, outcome), fields(poem = %outcome.poem_id))]
    pub async fn record(
        &self,
        user_id: &str,
        outcome: &SubmissionOutcome,
    ) -> Result<ResultRecord, PersistenceError> {
        let fields = ResultFields::from_outcome(user_id, outcome);
        let record = self
            .backend
            .create(RecordKind::Results, encode(&fields)?)
            .await?;
        tracing::info!(record = %record.id, average = outcome.average_score, "result recorded");
        Ok(ResultRecord {
            id: record.id,
            created_at: record.created_at,
            fields,
        })
    }

    /// Results of `user_id`, newest first, optionally for one poem
    pub async fn list(
        &self,
        user_id: &str,
        poem_id: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<ResultRecord>, PersistenceError> {
        let mut query = Query::new().eq("userId", user_id).order(Order::CreatedDesc);
        if let Some(poem) = poem_id {
            query = query.eq("poemId", poem);
        }
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        self.backend
            .list(RecordKind::Results, &query)
            .await?
            .iter()
            .map(ResultRecord::from_record)
            .collect()
    }

    /// One result
    pub async fn get(&self, id: &RecordId) -> Result<ResultRecord, PersistenceError> {
        let record = self.backend.get(RecordKind::Results, id).await?;
        ResultRecord::from_record(&record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LineaireConfig;
    use crate::persistence::MemoryPersistence;
    use std::sync::Arc;

    fn outcome(poem: &str, average: f64) -> SubmissionOutcome {
        SubmissionOutcome {
            poem_id: poem.into(),
            poem_title: "Titre".into(),
            answers: Vec::new(),
            evaluations: Vec::new(),
            global_feedback: "ok".into(),
            average_score: average,
            retired_drafts: 0,
        }
    }

    fn history() -> ResultHistory {
        ResultHistory::new(ResilientPersistence::from_config(
            Arc::new(MemoryPersistence::new()),
            &LineaireConfig::default(),
        ))
    }

    #[tokio::test]
    async fn list_is_newest_first_and_filtered() {
        let history = history();
        history.record("u1", &outcome("p1", 10.0)).await.unwrap();
        history.record("u1", &outcome("p2", 12.0)).await.unwrap();
        history.record("u2", &outcome("p1", 8.0)).await.unwrap();
        let last = history.record("u1", &outcome("p1", 14.0)).await.unwrap();

        let all = history.list("u1", None, None).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, last.id);

        let p1 = history.list("u1", Some("p1"), Some(1)).await.unwrap();
        assert_eq!(p1.len(), 1);
        assert!((p1[0].fields.average_score - 14.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn get_round_trips_fields() {
        let history = history();
        let stored = history.record("u1", &outcome("p1", 11.5)).await.unwrap();
        let fetched = history.get(&stored.id).await.unwrap();
        assert_eq!(fetched.fields, stored.fields);
        assert!(history.get(&"missing".into()).await.is_err());
    }
}
