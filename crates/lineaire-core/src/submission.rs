//! Batched submission of drafts for grading
//!
//! Submission retires every incomplete remote record of the poem, grades all
//! drafts in one call and hands the evaluations back. Nothing is rolled back
//! on failure; the caller keeps its drafts and may retry.

use crate::config::LineaireConfig;
use crate::error::{GradingError, PersistenceError, SubmissionError};
use crate::grading::{validate_batch, Grader};
use crate::model::{
    BatchEvaluation, DraftAnalysis, GradingDraft, PoemContext, SubmissionOutcome, UserAnswer,
};
use crate::store::DraftStore;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

/// Runs the cleanup / grade / package sequence
#[derive(Clone)]
pub struct SubmissionCoordinator {
    store: DraftStore,
    grader: Arc<dyn Grader>,
    grading_timeout: Duration,
    max_score: f64,
}

impl std::fmt::Debug for SubmissionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionCoordinator")
            .field("grading_timeout", &self.grading_timeout)
            .field("max_score", &self.max_score)
            .finish_non_exhaustive()
    }
}

impl SubmissionCoordinator {
    /// Create a coordinator using the limits from `config`
    #[must_use]
    pub fn new(store: DraftStore, grader: Arc<dyn Grader>, config: &LineaireConfig) -> Self {
        Self {
            store,
            grader,
            grading_timeout: config.grading_timeout(),
            max_score: config.max_score,
        }
    }

    /// Retire remote drafts, grade `drafts` in one batch and package the result
    ///
    /// An empty batch is rejected before any remote call.
    #[tracing::instrument(
        skip(self, context, drafts),
        fields(user = %context.user_id, poem = %context.poem_id, drafts = drafts.len())
    )]
    pub async fn submit_all(
        &self,
        context: &PoemContext,
        drafts: &[DraftAnalysis],
    ) -> Result<SubmissionOutcome, SubmissionError> {
        if drafts.is_empty() {
            return Err(SubmissionError::NoDrafts);
        }

        let retired = self.retire_incomplete(context).await.map_err(|e| {
            tracing::error!(error = %e, "draft cleanup failed");
            SubmissionError::Cleanup(e)
        })?;

        let batch: Vec<GradingDraft> = drafts
            .iter()
            .map(|d| GradingDraft {
                selected_words: d.selected_words.clone(),
                analysis_text: d.analysis_text.clone(),
            })
            .collect();

        let mut graded = self.grade(context, &batch).await.map_err(|e| {
            tracing::error!(error = %e, "grading failed");
            SubmissionError::Grading(e)
        })?;

        for (evaluation, draft) in graded.evaluations.iter_mut().zip(&batch) {
            evaluation.selected_words.clone_from(&draft.selected_words);
            evaluation.user_analysis.clone_from(&draft.analysis_text);
        }

        tracing::info!(retired, average = graded.average_score, "submission graded");

        Ok(SubmissionOutcome {
            poem_id: context.poem_id.clone(),
            poem_title: context.poem_title.clone(),
            answers: drafts.iter().map(UserAnswer::from_draft).collect(),
            evaluations: graded.evaluations,
            global_feedback: graded.global_feedback,
            average_score: graded.average_score,
            retired_drafts: retired,
        })
    }

    /// Delete every incomplete record of the poem; every delete is attempted
    async fn retire_incomplete(&self, context: &PoemContext) -> Result<usize, PersistenceError> {
        let ids = self.store.incomplete_ids(context).await?;
        let results = join_all(ids.iter().map(|id| self.store.delete(id))).await;

        let mut first_error = None;
        let mut retired = 0;
        for (id, result) in ids.iter().zip(results) {
            match result {
                Ok(()) => retired += 1,
                Err(e) => {
                    tracing::warn!(record = %id, error = %e, "failed to retire draft");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(retired),
        }
    }

    async fn grade(
        &self,
        context: &PoemContext,
        drafts: &[GradingDraft],
    ) -> Result<BatchEvaluation, GradingError> {
        let graded = tokio::time::timeout(
            self.grading_timeout,
            self.grader.evaluate_batch(context, drafts),
        )
        .await
        .map_err(|_| GradingError::Timeout {
            secs: self.grading_timeout.as_secs(),
        })??;
        validate_batch(&graded, drafts.len(), self.max_score)?;
        Ok(graded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::MockGrader;
    use crate::model::{DraftId, Evaluation, SyncState};
    use crate::persistence::{encode, MemoryPersistence, Persistence, RecordKind};
    use crate::store::ResilientPersistence;
    use lineaire_text::TokenId;
    use serde_json::json;

    fn evaluation(score: f64) -> Evaluation {
        Evaluation {
            score,
            feedback: "ok".into(),
            missed_points: Vec::new(),
            strengths: Vec::new(),
            selected_words: Vec::new(),
            user_analysis: String::new(),
        }
    }

    fn draft(words: &[&str], text: &str) -> DraftAnalysis {
        DraftAnalysis {
            id: DraftId::new(),
            selected_token_ids: words.iter().map(|w| TokenId::new(0, w, 0)).collect(),
            selected_words: words.iter().map(ToString::to_string).collect(),
            analysis_text: text.into(),
            stanza_index: 0,
            remote_id: None,
            sync: SyncState::Synced,
        }
    }

    fn coordinator(memory: Arc<MemoryPersistence>, grader: MockGrader) -> SubmissionCoordinator {
        let config = LineaireConfig::default();
        let store = DraftStore::new(ResilientPersistence::from_config(memory, &config));
        SubmissionCoordinator::new(store, Arc::new(grader), &config)
    }

    #[tokio::test]
    async fn empty_batch_makes_no_calls() {
        let mut grader = MockGrader::new();
        grader.expect_evaluate_batch().never();
        let memory = Arc::new(MemoryPersistence::new());
        let coord = coordinator(memory, grader);
        let ctx = PoemContext::new("u", "p", "t");
        assert!(matches!(
            coord.submit_all(&ctx, &[]).await,
            Err(SubmissionError::NoDrafts)
        ));
    }

    #[tokio::test]
    async fn cleanup_happens_before_grading_and_survives_failure() {
        let memory = Arc::new(MemoryPersistence::new());
        memory
            .create(
                RecordKind::Analyses,
                encode(&json!({"userId": "u", "poemId": "p", "poemTitle": "t",
                    "stanzaIndex": 0, "selectedWords": [], "analysisText": "x",
                    "completed": false}))
                .unwrap(),
            )
            .await
            .unwrap();

        let mut grader = MockGrader::new();
        grader
            .expect_evaluate_batch()
            .returning(|_, _| Err(GradingError::Transport("down".into())));
        let coord = coordinator(memory.clone(), grader);
        let ctx = PoemContext::new("u", "p", "t");

        let err = coord
            .submit_all(&ctx, &[draft(&["mot"], "texte")])
            .await
            .unwrap_err();
        assert!(matches!(err, SubmissionError::Grading(_)));
        assert!(memory.is_empty(RecordKind::Analyses));
    }

    #[tokio::test]
    async fn wrong_evaluation_count_is_malformed() {
        let mut grader = MockGrader::new();
        grader.expect_evaluate_batch().returning(|_, _| {
            Ok(BatchEvaluation {
                evaluations: vec![evaluation(10.0)],
                global_feedback: String::new(),
                average_score: 10.0,
            })
        });
        let coord = coordinator(Arc::new(MemoryPersistence::new()), grader);
        let ctx = PoemContext::new("u", "p", "t");

        let err = coord
            .submit_all(&ctx, &[draft(&[], "a"), draft(&[], "b")])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SubmissionError::Grading(GradingError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn out_of_range_score_is_malformed() {
        let mut grader = MockGrader::new();
        grader.expect_evaluate_batch().returning(|_, _| {
            Ok(BatchEvaluation {
                evaluations: vec![evaluation(25.0)],
                global_feedback: String::new(),
                average_score: 12.0,
            })
        });
        let coord = coordinator(Arc::new(MemoryPersistence::new()), grader);
        let ctx = PoemContext::new("u", "p", "t");
        assert!(coord.submit_all(&ctx, &[draft(&[], "a")]).await.is_err());
    }

    #[tokio::test]
    async fn outcome_pairs_answers_with_evaluations() {
        let mut grader = MockGrader::new();
        grader.expect_evaluate_batch().returning(|_, drafts| {
            Ok(BatchEvaluation {
                evaluations: drafts.iter().map(|_| evaluation(12.0)).collect(),
                global_feedback: "Bon travail".into(),
                average_score: 12.0,
            })
        });
        let coord = coordinator(Arc::new(MemoryPersistence::new()), grader);
        let ctx = PoemContext::new("u", "p", "t");
        let drafts = [draft(&["rose"], "a"), draft(&[], "b")];

        let outcome = coord.submit_all(&ctx, &drafts).await.unwrap();
        assert_eq!(outcome.evaluations.len(), 2);
        assert_eq!(outcome.evaluations[0].selected_words, vec!["rose"]);
        assert_eq!(outcome.evaluations[1].user_analysis, "b");
        assert!(!outcome.answers[0].general);
        assert!(outcome.answers[1].general);
        assert_eq!(outcome.global_feedback, "Bon travail");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_grader_times_out() {
        struct Slow;

        #[async_trait::async_trait]
        impl Grader for Slow {
            async fn evaluate_batch(
                &self,
                _: &PoemContext,
                _: &[GradingDraft],
            ) -> Result<BatchEvaluation, GradingError> {
                std::future::pending().await
            }
        }

        let config = LineaireConfig::default().with_grading_timeout(Duration::from_secs(5));
        let store = DraftStore::new(ResilientPersistence::from_config(
            Arc::new(MemoryPersistence::new()),
            &config,
        ));
        let coord = SubmissionCoordinator::new(store, Arc::new(Slow), &config);
        let ctx = PoemContext::new("u", "p", "t");

        let err = coord.submit_all(&ctx, &[draft(&[], "a")]).await.unwrap_err();
        assert!(matches!(
            err,
            SubmissionError::Grading(GradingError::Timeout { secs: 5 })
        ));
    }
}
