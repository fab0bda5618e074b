//! Token annotations with a linear undo/redo history
//!
//! At most one [`Annotation`] lives on a token. Every mutation appends one
//! [`HistoryEntry`]; applying a new mutation after an undo drops the entries
//! that could have been redone.

use crate::token::TokenId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Visual style of a mark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    /// Background highlight
    Highlight,
    /// Underline
    Underline,
}

/// Marker palette
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationColor {
    /// Yellow
    #[default]
    Yellow,
    /// Green
    Green,
    /// Blue
    Blue,
    /// Pink
    Pink,
    /// Orange
    Orange,
    /// Purple
    Purple,
}

impl AnnotationColor {
    /// Every palette entry, in toolbar order
    pub const ALL: [AnnotationColor; 6] = [
        Self::Yellow,
        Self::Green,
        Self::Blue,
        Self::Pink,
        Self::Orange,
        Self::Purple,
    ];

    /// CSS hex value
    #[must_use]
    pub fn hex(self) -> &'static str {
        match self {
            Self::Yellow => "#fef08a",
            Self::Green => "#bbf7d0",
            Self::Blue => "#bfdbfe",
            Self::Pink => "#fbcfe8",
            Self::Orange => "#fed7aa",
            Self::Purple => "#e9d5ff",
        }
    }
}

/// A mark attached to one token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Annotated token
    pub token_id: TokenId,
    /// Highlight or underline
    pub kind: AnnotationKind,
    /// Marker color
    pub color: AnnotationColor,
    /// Optional margin note
    pub note: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Annotation {
    /// Create an annotation without a note
    #[must_use]
    pub fn new(token_id: TokenId, kind: AnnotationKind, color: AnnotationColor) -> Self {
        Self {
            token_id,
            kind,
            color,
            note: None,
            created_at: Utc::now(),
        }
    }

    fn same_style(&self, kind: AnnotationKind, color: AnnotationColor) -> bool {
        self.kind == kind && self.color == color
    }
}

/// What a history entry did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    /// Annotation set (possibly replacing `previous`)
    Add,
    /// Annotation toggled off
    Remove,
    /// Note changed on an existing annotation
    Edit,
}

/// One undoable step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Kind of step
    pub action: HistoryAction,
    /// Annotation after the step (for `Remove`: the removed annotation)
    pub annotation: Annotation,
    /// Annotation before the step, when one was overwritten
    pub previous: Option<Annotation>,
    /// When the step happened
    pub timestamp: DateTime<Utc>,
}

/// Result of [`AnnotationStore::apply_annotation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationChange {
    /// Token had no annotation
    Added,
    /// Token had an annotation of another style
    Replaced,
    /// Same style applied twice: annotation toggled off
    Removed,
}

/// Annotation map plus its history
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnotationStore {
    annotations: BTreeMap<TokenId, Annotation>,
    history: Vec<HistoryEntry>,
    /// Number of entries currently applied
    applied: usize,
}

impl AnnotationStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle a mark on `token_id`
    pub fn apply_annotation(
        &mut self,
        token_id: &TokenId,
        kind: AnnotationKind,
        color: AnnotationColor,
    ) -> AnnotationChange {
        match self.annotations.get(token_id) {
            Some(existing) if existing.same_style(kind, color) => {
                let removed = existing.clone();
                self.annotations.remove(token_id);
                self.record(HistoryAction::Remove, removed, None);
                AnnotationChange::Removed
            }
            existing => {
                let previous = existing.cloned();
                let annotation = Annotation::new(token_id.clone(), kind, color);
                self.annotations.insert(token_id.clone(), annotation.clone());
                let change = if previous.is_some() {
                    AnnotationChange::Replaced
                } else {
                    AnnotationChange::Added
                };
                self.record(HistoryAction::Add, annotation, previous);
                change
            }
        }
    }

    /// Attach or overwrite the note of an existing annotation
    ///
    /// Returns `false` (and changes nothing) when `token_id` is not annotated.
    /// An empty `text` clears the note. The change is undoable.
    pub fn set_note(&mut self, token_id: &TokenId, text: &str) -> bool {
        let Some(current) = self.annotations.get_mut(token_id) else {
            return false;
        };
        let before = current.clone();
        current.note = if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        };
        if current.note == before.note {
            return true;
        }
        let after = current.clone();
        self.record(HistoryAction::Edit, after, Some(before));
        true
    }

    /// Step back once; silent no-op at the start of history
    pub fn undo(&mut self) -> bool {
        if self.applied == 0 {
            return false;
        }
        self.applied -= 1;
        let entry = self.history[self.applied].clone();
        match entry.action {
            HistoryAction::Add | HistoryAction::Edit => match entry.previous {
                Some(previous) => {
                    self.annotations.insert(previous.token_id.clone(), previous);
                }
                None => {
                    self.annotations.remove(&entry.annotation.token_id);
                }
            },
            HistoryAction::Remove => {
                self.annotations
                    .insert(entry.annotation.token_id.clone(), entry.annotation);
            }
        }
        true
    }

    /// Step forward once; silent no-op at the end of history
    pub fn redo(&mut self) -> bool {
        let Some(entry) = self.history.get(self.applied).cloned() else {
            return false;
        };
        self.applied += 1;
        match entry.action {
            HistoryAction::Add | HistoryAction::Edit => {
                self.annotations
                    .insert(entry.annotation.token_id.clone(), entry.annotation);
            }
            HistoryAction::Remove => {
                self.annotations.remove(&entry.annotation.token_id);
            }
        }
        true
    }

    /// Drop every annotation and the whole history
    pub fn clear_all(&mut self) {
        self.annotations.clear();
        self.history.clear();
        self.applied = 0;
    }

    /// Annotation on `token_id`
    #[inline]
    #[must_use]
    pub fn get(&self, token_id: &TokenId) -> Option<&Annotation> {
        self.annotations.get(token_id)
    }

    /// All annotations, ordered by token id
    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.annotations.values()
    }

    /// Number of annotated tokens
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    /// True if nothing is annotated
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Full history, including undone entries
    #[inline]
    #[must_use]
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Index of the last applied entry, `None` before the first one
    #[inline]
    #[must_use]
    pub fn cursor(&self) -> Option<usize> {
        self.applied.checked_sub(1)
    }

    /// True if [`undo`](Self::undo) would do something
    #[inline]
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.applied > 0
    }

    /// True if [`redo`](Self::redo) would do something
    #[inline]
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.applied < self.history.len()
    }

    fn record(
        &mut self,
        action: HistoryAction,
        annotation: Annotation,
        previous: Option<Annotation>,
    ) {
        self.history.truncate(self.applied);
        self.history.push(HistoryEntry {
            action,
            annotation,
            previous,
            timestamp: Utc::now(),
        });
        self.applied = self.history.len();
    }
}
