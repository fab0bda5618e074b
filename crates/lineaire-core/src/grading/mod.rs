//! Grading collaborator
//!
//! The grader receives every draft of a submission in one batch and answers
//! with one evaluation per draft plus shared feedback. Transport is out of
//! scope: [`LlmGrader`] renders the prompt and parses the answer, the actual
//! model call goes through a [`CompletionClient`].

pub mod cache;
pub mod llm;

use crate::error::GradingError;
use crate::model::{BatchEvaluation, GradingDraft, PoemContext};

pub use cache::{CacheKey, CachedGrader, GradingCache, MokaGradingCache};
pub use llm::{CompletionClient, LlmGrader};

/// Batch grading service
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Grader: Send + Sync {
    /// Grade every draft of one submission
    async fn evaluate_batch(
        &self,
        context: &PoemContext,
        drafts: &[GradingDraft],
    ) -> Result<BatchEvaluation, GradingError>;
}

#[async_trait::async_trait]
impl<G: Grader + ?Sized> Grader for std::sync::Arc<G> {
    async fn evaluate_batch(
        &self,
        context: &PoemContext,
        drafts: &[GradingDraft],
    ) -> Result<BatchEvaluation, GradingError> {
        (**self).evaluate_batch(context, drafts).await
    }
}

/// Check a grader answer against the batch it was asked to grade
///
/// One evaluation per draft, every score and the average finite and within
/// `0..=max_score`.
pub fn validate_batch(
    batch: &BatchEvaluation,
    expected: usize,
    max_score: f64,
) -> Result<(), GradingError> {
    if batch.evaluations.len() != expected {
        return Err(GradingError::Malformed(format!(
            "expected {expected} evaluations, got {}",
            batch.evaluations.len()
        )));
    }
    let in_range = |score: f64| score.is_finite() && (0.0..=max_score).contains(&score);
    if let Some((i, bad)) = batch
        .evaluations
        .iter()
        .enumerate()
        .find(|(_, e)| !in_range(e.score))
    {
        return Err(GradingError::Malformed(format!(
            "evaluation {i} has score {} outside 0..={max_score}",
            bad.score
        )));
    }
    if !in_range(batch.average_score) {
        return Err(GradingError::Malformed(format!(
            "average score {} outside 0..={max_score}",
            batch.average_score
        )));
    }
    Ok(())
}
