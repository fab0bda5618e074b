//! Analysis, grading and result data model
//!
//! Local drafts live only in the [`crate::DraftManager`]. Their remote mirror
//! is an [`AnalysisFields`] document stored under [`crate::persistence::RecordKind::Analyses`]
//! with `completed = false`. Field names on the wire are camelCase.

use crate::error::PersistenceError;
use crate::persistence::{Record, RecordId};
use chrono::{DateTime, Utc};
use lineaire_text::{DisplayedStanza, TokenId};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// The poem and student an analysis session belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoemContext {
    /// Authenticated student
    pub user_id: String,
    /// Poem identifier in the catalogue
    pub poem_id: String,
    /// Poem title
    pub poem_title: String,
    /// Poem author
    pub author: String,
    /// Stanzas currently displayed
    pub stanzas: Vec<DisplayedStanza>,
    /// Stanza the student is looking at; attributed to general analyses
    pub current_stanza: usize,
}

impl PoemContext {
    /// Create a context with no displayed stanzas
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        poem_id: impl Into<String>,
        poem_title: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            poem_id: poem_id.into(),
            poem_title: poem_title.into(),
            author: String::new(),
            stanzas: Vec::new(),
            current_stanza: 0,
        }
    }

    /// Set the author
    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Set the displayed stanzas, focusing the first one
    #[must_use]
    pub fn with_stanzas(mut self, stanzas: Vec<DisplayedStanza>) -> Self {
        self.current_stanza = stanzas.first().map_or(0, |s| s.index);
        self.stanzas = stanzas;
        self
    }

    /// Displayed stanzas as plain text, one block per stanza
    #[must_use]
    pub fn stanza_text(&self) -> String {
        self.stanzas
            .iter()
            .map(|s| s.lines.join("\n"))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Local identity of a draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DraftId(Ulid);

impl DraftId {
    /// Fresh id
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for DraftId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DraftId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remote mirror status of a draft
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SyncState {
    /// Remote write not yet completed
    #[default]
    Pending,
    /// Remote record reflects the local draft
    Synced,
    /// Last remote write failed
    Failed(String),
}

/// A saved analysis not yet submitted for grading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftAnalysis {
    /// Local identity
    pub id: DraftId,
    /// Selected tokens, in selection order
    pub selected_token_ids: Vec<TokenId>,
    /// Display strings of the selected tokens
    pub selected_words: Vec<String>,
    /// Free text analysis
    pub analysis_text: String,
    /// Stanza the analysis is attributed to
    pub stanza_index: usize,
    /// Id of the remote mirror, once created
    pub remote_id: Option<RecordId>,
    /// Remote mirror status
    pub sync: SyncState,
}

impl DraftAnalysis {
    /// An analysis with no selected words covers the whole displayed text
    #[inline]
    #[must_use]
    pub fn is_general_analysis(&self) -> bool {
        self.selected_token_ids.is_empty()
    }

    /// Remote document body for this draft
    #[must_use]
    pub fn to_fields(&self, context: &PoemContext) -> AnalysisFields {
        AnalysisFields {
            user_id: context.user_id.clone(),
            poem_id: context.poem_id.clone(),
            poem_title: context.poem_title.clone(),
            stanza_index: self.stanza_index,
            selected_words: self.selected_token_ids.clone(),
            analysis_text: self.analysis_text.clone(),
            completed: false,
        }
    }
}

/// Body of an analysis record
///
/// `selected_words` holds token ids, not display strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisFields {
    pub user_id: String,
    pub poem_id: String,
    pub poem_title: String,
    pub stanza_index: usize,
    pub selected_words: Vec<TokenId>,
    pub analysis_text: String,
    pub completed: bool,
}

/// A stored analysis record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRecord {
    /// Store-assigned id
    pub id: RecordId,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Document body
    pub fields: AnalysisFields,
}

impl AnalysisRecord {
    /// Decode a generic record
    pub fn from_record(record: &Record) -> Result<Self, PersistenceError> {
        Ok(Self {
            id: record.id.clone(),
            created_at: record.created_at,
            fields: record.decode()?,
        })
    }
}

/// One draft as sent to the grader
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingDraft {
    /// Words the analysis is about; empty for a general analysis
    pub selected_words: Vec<String>,
    /// Student's text
    pub analysis_text: String,
}

/// Grader verdict for one draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    /// Score out of the configured maximum
    pub score: f64,
    pub feedback: String,
    #[serde(default)]
    pub missed_points: Vec<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
    /// Copied from the graded draft
    #[serde(default)]
    pub selected_words: Vec<String>,
    /// Copied from the graded draft
    #[serde(default)]
    pub user_analysis: String,
}

/// Grader response for a whole batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEvaluation {
    /// One evaluation per draft, in draft order
    pub evaluations: Vec<Evaluation>,
    pub global_feedback: String,
    pub average_score: f64,
}

/// A student's answer as kept in a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAnswer {
    pub stanza_index: usize,
    /// True for an analysis without selected words
    pub general: bool,
    pub selected_words: Vec<String>,
    pub analysis_text: String,
}

impl UserAnswer {
    /// Answer derived from a draft
    #[must_use]
    pub fn from_draft(draft: &DraftAnalysis) -> Self {
        Self {
            stanza_index: draft.stanza_index,
            general: draft.is_general_analysis(),
            selected_words: draft.selected_words.clone(),
            analysis_text: draft.analysis_text.clone(),
        }
    }
}

/// What a successful submission hands back to the application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionOutcome {
    pub poem_id: String,
    pub poem_title: String,
    /// One answer per submitted draft, in draft order
    pub answers: Vec<UserAnswer>,
    /// One evaluation per submitted draft, in draft order
    pub evaluations: Vec<Evaluation>,
    pub global_feedback: String,
    pub average_score: f64,
    /// Incomplete remote records deleted before grading
    pub retired_drafts: usize,
}

/// Body of a finalized result record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultFields {
    pub user_id: String,
    pub poem_id: String,
    pub poem_title: String,
    pub answers: Vec<UserAnswer>,
    pub evaluations: Vec<Evaluation>,
    pub global_feedback: String,
    pub average_score: f64,
}

impl ResultFields {
    /// Result body for `outcome` submitted by `user_id`
    #[must_use]
    pub fn from_outcome(user_id: &str, outcome: &SubmissionOutcome) -> Self {
        Self {
            user_id: user_id.to_string(),
            poem_id: outcome.poem_id.clone(),
            poem_title: outcome.poem_title.clone(),
            answers: outcome.answers.clone(),
            evaluations: outcome.evaluations.clone(),
            global_feedback: outcome.global_feedback.clone(),
            average_score: outcome.average_score,
        }
    }
}

/// A stored graded submission
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    /// Store-assigned id
    pub id: RecordId,
    /// Submission time
    pub created_at: DateTime<Utc>,
    /// Document body
    pub fields: ResultFields,
}

impl ResultRecord {
    /// Decode a generic record
    pub fn from_record(record: &Record) -> Result<Self, PersistenceError> {
        Ok(Self {
            id: record.id.clone(),
            created_at: record.created_at,
            fields: record.decode()?,
        })
    }
}

/// Result of a non-critical remote write
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum SyncOutcome {
    /// Remote record written
    Synced(RecordId),
    /// Remote write failed and was logged; local state kept
    Failed(String),
    /// Nothing was written
    Skipped,
}

impl SyncOutcome {
    /// True if the remote write went through
    #[inline]
    #[must_use]
    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced(_))
    }
}
