//! Testing utilities for the Lineaire workspace
//!
//! Shared fixtures, a scripted grader and a persistence backend with
//! switchable faults.

#![allow(missing_docs)]

use lineaire_core::{
    BatchEvaluation, DraftStore, Evaluation, Fields, Grader, GradingDraft, GradingError,
    LineaireConfig, MemoryPersistence, Persistence, PersistenceError, PoemContext, Query, Record,
    RecordId, RecordKind, ResilientPersistence,
};
use lineaire_text::{tokenize, DisplayedStanza, IndexMode, TokenId, Tokenization};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Ronsard, "Mignonne, allons voir si la rose"
pub const MIGNONNE: [&[&str]; 3] = [
    &[
        "Mignonne, allons voir si la rose",
        "Qui ce matin avoit desclose",
        "Sa robe de pourpre au Soleil,",
        "A point perdu ceste vesprée",
        "Les plis de sa robe pourprée,",
        "Et son teint au vostre pareil.",
    ],
    &[
        "Las ! voyez comme en peu d'espace,",
        "Mignonne, elle a dessus la place",
        "Las ! las ses beautez laissé cheoir !",
        "Ô vrayment marastre Nature,",
        "Puis qu'une telle fleur ne dure",
        "Que du matin jusques au soir !",
    ],
    &[
        "Donc, si vous me croyez, mignonne,",
        "Tandis que vostre âge fleuronne",
        "En sa plus verte nouveauté,",
        "Cueillez, cueillez vostre jeunesse :",
        "Comme à ceste fleur la vieillesse",
        "Fera ternir vostre beauté.",
    ],
];

/// Every stanza of [`MIGNONNE`] with its original index
pub fn mignonne_stanzas() -> Vec<DisplayedStanza> {
    MIGNONNE
        .iter()
        .enumerate()
        .map(|(i, lines)| DisplayedStanza::new(i, lines.iter().copied()))
        .collect()
}

/// Tokens of the whole poem
pub fn mignonne_tokens() -> Tokenization {
    tokenize(&mignonne_stanzas(), IndexMode::Global)
}

/// Session context on the whole poem
pub fn poem_context(user_id: &str) -> PoemContext {
    PoemContext::new(user_id, "ronsard-mignonne", "Mignonne, allons voir si la rose")
        .with_author("Pierre de Ronsard")
        .with_stanzas(mignonne_stanzas())
}

/// Ids of the first occurrence of each word, in the given order
///
/// # Panics
///
/// Panics if a word is not in `tokens`.
pub fn token_ids(tokens: &Tokenization, words: &[&str]) -> Vec<TokenId> {
    words
        .iter()
        .map(|w| {
            tokens
                .tokens()
                .iter()
                .find(|t| t.clean_word == *w)
                .map(|t| t.id.clone())
                .unwrap_or_else(|| panic!("word {w:?} not in poem"))
        })
        .collect()
}

/// Draft store over `backend` with default limits
pub fn draft_store(backend: Arc<dyn Persistence>) -> DraftStore {
    DraftStore::new(resilient(backend))
}

/// Hardened backend with default limits
pub fn resilient(backend: Arc<dyn Persistence>) -> ResilientPersistence {
    ResilientPersistence::from_config(backend, &LineaireConfig::default())
}

/// How [`ScriptedGrader`] answers
#[derive(Debug, Clone)]
pub enum GraderScript {
    /// One evaluation per draft, all with this score
    Score(f64),
    /// Fail with this error
    Fail(GradingError),
    /// One evaluation fewer than drafts
    DropOne,
}

/// Grader answering from a script and counting its calls
#[derive(Debug)]
pub struct ScriptedGrader {
    script: Mutex<GraderScript>,
    calls: AtomicUsize,
    last_batch: Mutex<Vec<GradingDraft>>,
}

impl ScriptedGrader {
    pub fn new(script: GraderScript) -> Self {
        Self {
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
            last_batch: Mutex::new(Vec::new()),
        }
    }

    pub fn scoring(score: f64) -> Self {
        Self::new(GraderScript::Score(score))
    }

    pub fn failing() -> Self {
        Self::new(GraderScript::Fail(GradingError::Transport(
            "grader unavailable".into(),
        )))
    }

    pub fn set_script(&self, script: GraderScript) {
        *self.script.lock() = script;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_batch(&self) -> Vec<GradingDraft> {
        self.last_batch.lock().clone()
    }
}

#[async_trait::async_trait]
impl Grader for ScriptedGrader {
    async fn evaluate_batch(
        &self,
        _context: &PoemContext,
        drafts: &[GradingDraft],
    ) -> Result<BatchEvaluation, GradingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_batch.lock() = drafts.to_vec();

        let script = self.script.lock().clone();
        let (score, count) = match script {
            GraderScript::Score(score) => (score, drafts.len()),
            GraderScript::DropOne => (10.0, drafts.len().saturating_sub(1)),
            GraderScript::Fail(e) => return Err(e),
        };
        Ok(BatchEvaluation {
            evaluations: (0..count)
                .map(|i| Evaluation {
                    score,
                    feedback: format!("Analyse {}", i + 1),
                    missed_points: Vec::new(),
                    strengths: Vec::new(),
                    selected_words: Vec::new(),
                    user_analysis: String::new(),
                })
                .collect(),
            global_feedback: "Travail sérieux".into(),
            average_score: score,
        })
    }
}

/// In-memory backend whose operations can be made to fail or stall
#[derive(Debug, Default)]
pub struct FaultyPersistence {
    inner: MemoryPersistence,
    fail_create: AtomicBool,
    fail_update: AtomicBool,
    fail_delete: AtomicBool,
    fail_list: AtomicBool,
    create_delay: Mutex<Option<Duration>>,
    creates: AtomicUsize,
    updates: AtomicUsize,
}

impl FaultyPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn memory(&self) -> &MemoryPersistence {
        &self.inner
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_update.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub fn fail_lists(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    /// Delay every create by `delay` before it reaches the store
    pub fn delay_creates(&self, delay: Option<Duration>) {
        *self.create_delay.lock() = delay;
    }

    /// Creates that reached the store
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    /// Updates that reached the store
    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    fn check(flag: &AtomicBool, op: &str) -> Result<(), PersistenceError> {
        if flag.load(Ordering::SeqCst) {
            Err(PersistenceError::Backend(format!("{op} refused")))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl Persistence for FaultyPersistence {
    async fn create(&self, kind: RecordKind, fields: Fields) -> Result<Record, PersistenceError> {
        let delay = *self.create_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Self::check(&self.fail_create, "create")?;
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.inner.create(kind, fields).await
    }

    async fn update(
        &self,
        kind: RecordKind,
        id: &RecordId,
        fields: Fields,
    ) -> Result<Record, PersistenceError> {
        Self::check(&self.fail_update, "update")?;
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update(kind, id, fields).await
    }

    async fn get(&self, kind: RecordKind, id: &RecordId) -> Result<Record, PersistenceError> {
        self.inner.get(kind, id).await
    }

    async fn list(&self, kind: RecordKind, query: &Query) -> Result<Vec<Record>, PersistenceError> {
        Self::check(&self.fail_list, "list")?;
        self.inner.list(kind, query).await
    }

    async fn delete(&self, kind: RecordKind, id: &RecordId) -> Result<(), PersistenceError> {
        Self::check(&self.fail_delete, "delete")?;
        self.inner.delete(kind, id).await
    }
}
