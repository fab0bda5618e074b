//! Prompt rendering and answer parsing for an LLM grader

use super::Grader;
use crate::error::GradingError;
use crate::model::{BatchEvaluation, GradingDraft, PoemContext};
use std::fmt::Write as _;

/// Sends a prompt to a language model and returns its raw answer
#[async_trait::async_trait]
pub trait CompletionClient: Send + Sync {
    /// One completion
    async fn complete(&self, prompt: &str) -> Result<String, GradingError>;
}

/// Grader backed by a language model
#[derive(Debug, Clone)]
pub struct LlmGrader<C> {
    client: C,
    max_score: f64,
}

impl<C: CompletionClient> LlmGrader<C> {
    /// Grade out of `max_score` through `client`
    #[must_use]
    pub fn new(client: C, max_score: f64) -> Self {
        Self { client, max_score }
    }

    /// French grading prompt for one batch
    #[must_use]
    pub fn render_prompt(&self, context: &PoemContext, drafts: &[GradingDraft]) -> String {
        let mut prompt = format!(
            "Tu es un correcteur de l'épreuve d'analyse linéaire du baccalauréat de français.\n\
             Poème : « {title} »{author}\n\n\
             Texte étudié :\n{text}\n\n\
             Voici {count} analyse(s) rédigée(s) par l'élève. Note chacune sur {max}.\n",
            title = context.poem_title,
            author = if context.author.is_empty() {
                String::new()
            } else {
                format!(" de {}", context.author)
            },
            text = context.stanza_text(),
            count = drafts.len(),
            max = self.max_score,
        );

        for (i, draft) in drafts.iter().enumerate() {
            let focus = if draft.selected_words.is_empty() {
                "analyse générale".to_string()
            } else {
                format!("mots sélectionnés : {}", draft.selected_words.join(", "))
            };
            let _ = write!(
                prompt,
                "\nAnalyse {n} ({focus}) :\n{text}\n",
                n = i + 1,
                text = draft.analysis_text,
            );
        }

        prompt.push_str(
            "\nRéponds uniquement avec un objet JSON de la forme :\n\
             {\"evaluations\": [{\"score\": nombre, \"feedback\": texte, \
             \"missedPoints\": [texte], \"strengths\": [texte]}], \
             \"globalFeedback\": texte, \"averageScore\": nombre}\n\
             avec une évaluation par analyse, dans le même ordre.\n",
        );
        prompt
    }
}

/// Parse a model answer, tolerating a fenced code block around the JSON
///
/// Draft selections and texts are copied onto the evaluations so the result
/// can be displayed without the original drafts.
pub fn parse_answer(raw: &str, drafts: &[GradingDraft]) -> Result<BatchEvaluation, GradingError> {
    let start = raw
        .find('{')
        .ok_or_else(|| GradingError::Malformed("no JSON object in answer".into()))?;
    let end = raw
        .rfind('}')
        .filter(|&end| end > start)
        .ok_or_else(|| GradingError::Malformed("unterminated JSON object".into()))?;

    let mut batch: BatchEvaluation = serde_json::from_str(&raw[start..=end])
        .map_err(|e| GradingError::Malformed(e.to_string()))?;

    for (evaluation, draft) in batch.evaluations.iter_mut().zip(drafts) {
        evaluation.selected_words.clone_from(&draft.selected_words);
        evaluation.user_analysis.clone_from(&draft.analysis_text);
    }
    Ok(batch)
}

#[async_trait::async_trait]
impl<C: CompletionClient> Grader for LlmGrader<C> {
    #[tracing::instrument(skip_all, fields(poem = %context.poem_id, drafts = drafts.len()))]
    async fn evaluate_batch(
        &self,
        context: &PoemContext,
        drafts: &[GradingDraft],
    ) -> Result<BatchEvaluation, GradingError> {
        let prompt = self.render_prompt(context, drafts);
        let answer = self.client.complete(&prompt).await?;
        tracing::debug!(bytes = answer.len(), "grading answer received");
        parse_answer(&answer, drafts)
    }
}
