//! Error types for Lineaire Core
//!
//! Provides error handling for:
//! - Remote persistence calls
//! - The grading collaborator
//! - Draft lifecycle operations
//! - Batched submission
//! - Configuration loading

use crate::persistence::{RecordId, RecordKind};
use std::path::PathBuf;

/// Persistence collaborator errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum PersistenceError {
    /// No record with this id
    #[error("record not found: {kind}/{id}")]
    NotFound { kind: RecordKind, id: RecordId },

    /// Call exceeded the configured timeout
    #[error("persistence call timed out after {millis}ms")]
    Timeout { millis: u64 },

    /// Backend refused or failed the call
    #[error("backend error: {0}")]
    Backend(String),

    /// Record fields could not be (de)serialized
    #[error("malformed record: {0}")]
    Serialization(String),
}

impl PersistenceError {
    /// Check if the call may succeed when repeated
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Backend(_))
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Grading collaborator errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum GradingError {
    /// Request could not be delivered or answered
    #[error("grading transport failed: {0}")]
    Transport(String),

    /// Response is missing fields or does not match the request
    #[error("malformed grading response: {0}")]
    Malformed(String),

    /// No answer within the configured timeout
    #[error("grading timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// Draft lifecycle errors
#[derive(Debug, thiserror::Error)]
pub enum DraftError {
    /// Analysis text is empty or whitespace
    #[error("analysis text is empty")]
    EmptyAnalysis,

    /// Previously saved drafts must be resumed or discarded first
    #[error("{count} saved draft(s) await a resume or discard decision")]
    ResumeDecisionPending { count: usize },

    /// Operation not allowed in the current phase
    #[error("operation requires phase {expected}, manager is {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    /// No draft at this position
    #[error("no draft at index {index} (have {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// `save_edit` without `begin_edit`
    #[error("no draft is being edited")]
    NoEditInProgress,

    /// Remote call failed on a path that must report it
    #[error("persistence failed: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Submission errors
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    /// Nothing to submit
    #[error("no drafts to submit")]
    NoDrafts,

    /// Submission attempted outside the active phase
    #[error("cannot submit while manager is {0}")]
    InvalidState(&'static str),

    /// Retiring remote drafts failed
    #[error("failed to clean up saved drafts: {0}")]
    Cleanup(#[source] PersistenceError),

    /// Grading failed or returned garbage
    #[error("grading failed: {0}")]
    Grading(#[from] GradingError),
}

impl SubmissionError {
    /// Message suitable for the student
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NoDrafts => "Aucune analyse à soumettre.".to_string(),
            Self::InvalidState(_) => {
                "Réglez d'abord les brouillons en attente avant de soumettre.".to_string()
            }
            Self::Cleanup(_) => {
                "Impossible de préparer vos analyses pour la correction. Réessayez.".to_string()
            }
            Self::Grading(GradingError::Timeout { .. }) => {
                "La correction prend trop de temps. Vos analyses sont conservées, réessayez."
                    .to_string()
            }
            Self::Grading(_) => {
                "La correction a échoué. Vos analyses sont conservées, réessayez.".to_string()
            }
        }
    }

    /// Check if submitting again may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NoDrafts | Self::InvalidState(_) => false,
            Self::Cleanup(e) => e.is_retryable(),
            Self::Grading(_) => true,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file unreadable
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`crate::LineaireConfig`]
    #[error("invalid config syntax: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values out of range
    #[error("invalid config value: {0}")]
    Invalid(String),
}
