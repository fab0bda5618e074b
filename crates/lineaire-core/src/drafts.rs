//! Draft analysis lifecycle
//!
//! One [`DraftManager`] per (user, poem) session. It mirrors local drafts into
//! incomplete remote analysis records, offers previously saved drafts for
//! resume, and hands the final list to the [`SubmissionCoordinator`].
//!
//! State lives behind a synchronous mutex that is never held across an
//! await. Remote writes for one draft are serialized by a per-draft async
//! lock, taken while the state mutex is held so that submission can wait
//! for every in-flight write before retiring remote records.

use crate::error::{DraftError, PersistenceError, SubmissionError};
use crate::model::{
    AnalysisRecord, DraftAnalysis, DraftId, PoemContext, SubmissionOutcome, SyncOutcome, SyncState,
};
use crate::persistence::RecordId;
use crate::store::DraftStore;
use crate::submission::SubmissionCoordinator;
use dashmap::DashMap;
use futures::future::join_all;
use lineaire_text::{TokenId, Tokenization};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

/// Lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum DraftPhase {
    /// Saved drafts not yet queried
    NoDraftsLoaded,
    /// Saved drafts found; the student must resume or discard them
    PendingResumeDecision {
        /// Number of saved drafts
        count: usize,
    },
    /// Drafts can be saved, edited and submitted
    Active,
    /// Submission in flight
    Submitting,
    /// Drafts graded
    Submitted,
}

impl DraftPhase {
    /// Short name for errors and logs
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::NoDraftsLoaded => "no_drafts_loaded",
            Self::PendingResumeDecision { .. } => "pending_resume_decision",
            Self::Active => "active",
            Self::Submitting => "submitting",
            Self::Submitted => "submitted",
        }
    }
}

/// Result of discarding saved drafts
#[derive(Debug, Default)]
pub struct DiscardReport {
    /// Remote records deleted
    pub deleted: usize,
    /// Records that could not be deleted
    pub failed: Vec<(RecordId, PersistenceError)>,
}

/// Result of [`DraftManager::reconcile`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Local drafts whose remote mirror was re-created
    pub recreated: usize,
    /// Local drafts still without a remote mirror
    pub failed: usize,
}

#[derive(Debug)]
struct ManagerState {
    phase: DraftPhase,
    drafts: Vec<DraftAnalysis>,
    pending: Vec<AnalysisRecord>,
    offered: bool,
    editing: Option<DraftId>,
    needs_reconcile: bool,
}

impl ManagerState {
    fn require_active(&self) -> Result<(), DraftError> {
        match self.phase {
            DraftPhase::Active => Ok(()),
            DraftPhase::PendingResumeDecision { count } => {
                Err(DraftError::ResumeDecisionPending { count })
            }
            other => Err(DraftError::InvalidState {
                expected: DraftPhase::Active.name(),
                actual: other.name(),
            }),
        }
    }

    fn draft_mut(&mut self, id: DraftId) -> Option<&mut DraftAnalysis> {
        self.drafts.iter_mut().find(|d| d.id == id)
    }
}

/// Local drafts of one student on one poem, mirrored remotely
pub struct DraftManager {
    context: PoemContext,
    store: DraftStore,
    state: Mutex<ManagerState>,
    locks: DashMap<DraftId, Arc<tokio::sync::Mutex<()>>>,
}

impl std::fmt::Debug for DraftManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DraftManager")
            .field("user", &self.context.user_id)
            .field("poem", &self.context.poem_id)
            .field("phase", &self.state.lock().phase)
            .finish_non_exhaustive()
    }
}

/// Write lock for one draft, either already held or still to acquire
enum WriteLock {
    Held(OwnedMutexGuard<()>),
    Wait(Arc<tokio::sync::Mutex<()>>),
}

impl WriteLock {
    async fn acquire(self) -> OwnedMutexGuard<()> {
        match self {
            Self::Held(guard) => guard,
            Self::Wait(lock) => lock.lock_owned().await,
        }
    }
}

impl DraftManager {
    /// Create a manager for `context`
    #[must_use]
    pub fn new(context: PoemContext, store: DraftStore) -> Self {
        Self {
            context,
            store,
            state: Mutex::new(ManagerState {
                phase: DraftPhase::NoDraftsLoaded,
                drafts: Vec::new(),
                pending: Vec::new(),
                offered: false,
                editing: None,
                needs_reconcile: false,
            }),
            locks: DashMap::new(),
        }
    }

    /// Session context
    #[inline]
    #[must_use]
    pub fn context(&self) -> &PoemContext {
        &self.context
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> DraftPhase {
        self.state.lock().phase
    }

    /// Copy of the local drafts, in save order
    #[must_use]
    pub fn drafts(&self) -> Vec<DraftAnalysis> {
        self.state.lock().drafts.clone()
    }

    /// Index of the draft being edited
    #[must_use]
    pub fn editing(&self) -> Option<usize> {
        let state = self.state.lock();
        let id = state.editing?;
        state.drafts.iter().position(|d| d.id == id)
    }

    /// True once a remote write failed and [`Self::reconcile`] has not repaired it
    #[must_use]
    pub fn needs_reconcile(&self) -> bool {
        self.state.lock().needs_reconcile
    }

    /// Update the stanza attributed to general analyses
    pub fn set_current_stanza(&mut self, stanza: usize) {
        self.context.current_stanza = stanza;
    }

    /// Query saved drafts once and decide whether to offer a resume
    ///
    /// On failure the manager stays in [`DraftPhase::NoDraftsLoaded`] and
    /// `load` may be called again.
    #[tracing::instrument(
        skip(self),
        fields(user = %self.context.user_id, poem = %self.context.poem_id)
    )]
    pub async fn load(&self) -> Result<DraftPhase, DraftError> {
        {
            let state = self.state.lock();
            if state.phase != DraftPhase::NoDraftsLoaded {
                return Err(DraftError::InvalidState {
                    expected: DraftPhase::NoDraftsLoaded.name(),
                    actual: state.phase.name(),
                });
            }
        }

        let records = self.store.list_incomplete(&self.context).await?;

        let mut state = self.state.lock();
        if state.phase != DraftPhase::NoDraftsLoaded {
            return Ok(state.phase);
        }
        state.phase = if records.is_empty() || state.offered {
            DraftPhase::Active
        } else {
            state.offered = true;
            DraftPhase::PendingResumeDecision {
                count: records.len(),
            }
        };
        state.pending = records;
        tracing::info!(phase = state.phase.name(), "drafts loaded");
        Ok(state.phase)
    }

    /// Re-enter the analysis screen in the same session
    ///
    /// Local drafts are kept and saved drafts are not offered again.
    pub fn reopen(&self) {
        let mut state = self.state.lock();
        if matches!(state.phase, DraftPhase::Active | DraftPhase::Submitted) {
            state.phase = DraftPhase::NoDraftsLoaded;
            state.pending.clear();
        }
    }

    /// Materialize saved drafts against the current rendering
    ///
    /// Token ids missing from `tokens` display as the raw id.
    #[tracing::instrument(
        skip(self, tokens),
        fields(user = %self.context.user_id, poem = %self.context.poem_id)
    )]
    pub fn resume(&self, tokens: &Tokenization) -> Result<usize, DraftError> {
        let mut state = self.state.lock();
        let DraftPhase::PendingResumeDecision { count } = state.phase else {
            return Err(DraftError::InvalidState {
                expected: "pending_resume_decision",
                actual: state.phase.name(),
            });
        };

        let pending = std::mem::take(&mut state.pending);
        for record in pending {
            let draft = DraftAnalysis {
                id: DraftId::new(),
                selected_words: record
                    .fields
                    .selected_words
                    .iter()
                    .map(|id| tokens.display_word(id))
                    .collect(),
                selected_token_ids: record.fields.selected_words,
                analysis_text: record.fields.analysis_text,
                stanza_index: record.fields.stanza_index,
                remote_id: Some(record.id),
                sync: SyncState::Synced,
            };
            self.locks.insert(draft.id, Arc::default());
            state.drafts.push(draft);
        }
        state.phase = DraftPhase::Active;
        tracing::info!(count, "drafts resumed");
        Ok(count)
    }

    /// Delete every saved draft and start with an empty list
    #[tracing::instrument(
        skip(self),
        fields(user = %self.context.user_id, poem = %self.context.poem_id)
    )]
    pub async fn discard_pending(&self) -> Result<DiscardReport, DraftError> {
        let pending = {
            let state = self.state.lock();
            if !matches!(state.phase, DraftPhase::PendingResumeDecision { .. }) {
                return Err(DraftError::InvalidState {
                    expected: "pending_resume_decision",
                    actual: state.phase.name(),
                });
            }
            state.pending.clone()
        };

        let results = join_all(pending.iter().map(|r| self.store.delete(&r.id))).await;
        let mut report = DiscardReport::default();
        for (record, result) in pending.into_iter().zip(results) {
            match result {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    tracing::warn!(record = %record.id, error = %e, "failed to delete saved draft");
                    report.failed.push((record.id, e));
                }
            }
        }

        let mut state = self.state.lock();
        state.pending.clear();
        state.drafts.clear();
        state.phase = DraftPhase::Active;
        tracing::info!(
            deleted = report.deleted,
            failed = report.failed.len(),
            "saved drafts discarded"
        );
        Ok(report)
    }

    /// Append a draft locally, then mirror it remotely
    ///
    /// A remote failure is logged and reported in the outcome; the local
    /// draft stays.
    #[tracing::instrument(
        skip(self, selection, tokens, text),
        fields(user = %self.context.user_id, poem = %self.context.poem_id, words = selection.len())
    )]
    pub async fn save_draft(
        &self,
        selection: &[TokenId],
        tokens: &Tokenization,
        text: &str,
    ) -> Result<SyncOutcome, DraftError> {
        if text.trim().is_empty() {
            return Err(DraftError::EmptyAnalysis);
        }

        let (id, fields, lock) = {
            let mut state = self.state.lock();
            state.require_active()?;
            let draft = DraftAnalysis {
                id: DraftId::new(),
                selected_token_ids: selection.to_vec(),
                selected_words: selection.iter().map(|t| tokens.display_word(t)).collect(),
                analysis_text: text.to_string(),
                stanza_index: self.stanza_for(selection, tokens),
                remote_id: None,
                sync: SyncState::Pending,
            };
            let lock = self.lock_new(draft.id);
            let fields = draft.to_fields(&self.context);
            let id = draft.id;
            state.drafts.push(draft);
            (id, fields, lock)
        };

        let _guard = lock.acquire().await;
        let outcome = match self.store.create(&fields).await {
            Ok(remote) => {
                tracing::debug!(draft = %id, record = %remote, "draft created remotely");
                self.mark(id, Some(remote.clone()), SyncState::Synced);
                SyncOutcome::Synced(remote)
            }
            Err(e) => {
                tracing::warn!(draft = %id, error = %e, "failed to create remote draft");
                self.mark(id, None, SyncState::Failed(e.to_string()));
                SyncOutcome::Failed(e.to_string())
            }
        };
        Ok(outcome)
    }

    /// Start editing the draft at `index`; returns its current content
    pub fn begin_edit(&self, index: usize) -> Result<DraftAnalysis, DraftError> {
        let mut state = self.state.lock();
        state.require_active()?;
        let len = state.drafts.len();
        let draft = state
            .drafts
            .get(index)
            .cloned()
            .ok_or(DraftError::IndexOutOfRange { index, len })?;
        state.editing = Some(draft.id);
        Ok(draft)
    }

    /// Leave edit mode without saving
    pub fn cancel_edit(&self) -> bool {
        self.state.lock().editing.take().is_some()
    }

    /// Replace the edited draft's selection and text, locally then remotely
    ///
    /// The draft's own remote record is updated in place. A draft whose
    /// remote create never succeeded is created now.
    #[tracing::instrument(
        skip(self, selection, tokens, text),
        fields(user = %self.context.user_id, poem = %self.context.poem_id)
    )]
    pub async fn save_edit(
        &self,
        selection: &[TokenId],
        tokens: &Tokenization,
        text: &str,
    ) -> Result<SyncOutcome, DraftError> {
        if text.trim().is_empty() {
            return Err(DraftError::EmptyAnalysis);
        }

        let (id, lock) = {
            let mut state = self.state.lock();
            state.require_active()?;
            let id = state.editing.take().ok_or(DraftError::NoEditInProgress)?;
            let stanza_index = self.stanza_for(selection, tokens);
            let draft = state.draft_mut(id).ok_or(DraftError::NoEditInProgress)?;
            draft.selected_token_ids = selection.to_vec();
            draft.selected_words = selection.iter().map(|t| tokens.display_word(t)).collect();
            draft.analysis_text = text.to_string();
            draft.stanza_index = stanza_index;
            draft.sync = SyncState::Pending;
            (id, self.lock_for(id))
        };

        let _guard = lock.acquire().await;
        Ok(self.push_remote(id).await)
    }

    /// Drop a draft from the local list; its remote record is untouched
    pub fn discard_draft(&self, index: usize) -> Result<DraftAnalysis, DraftError> {
        let mut state = self.state.lock();
        state.require_active()?;
        let len = state.drafts.len();
        if index >= len {
            return Err(DraftError::IndexOutOfRange { index, len });
        }
        let draft = state.drafts.remove(index);
        if state.editing == Some(draft.id) {
            state.editing = None;
        }
        // A create still in flight keeps its lock so submit waits for it
        self.locks.remove_if(&draft.id, |_, lock| lock.try_lock().is_ok());
        Ok(draft)
    }

    /// Re-create remote records for local drafts that have none
    #[tracing::instrument(
        skip(self),
        fields(user = %self.context.user_id, poem = %self.context.poem_id)
    )]
    pub async fn reconcile(&self) -> Result<ReconcileReport, DraftError> {
        self.state.lock().require_active()?;

        let remote: HashSet<RecordId> = self
            .store
            .incomplete_ids(&self.context)
            .await?
            .into_iter()
            .collect();

        let orphans: Vec<(DraftId, WriteLock)> = {
            let mut state = self.state.lock();
            let ids: Vec<DraftId> = state
                .drafts
                .iter()
                .filter(|d| d.remote_id.as_ref().map_or(true, |r| !remote.contains(r)))
                .map(|d| d.id)
                .collect();
            for id in &ids {
                if let Some(draft) = state.draft_mut(*id) {
                    draft.remote_id = None;
                }
            }
            ids.into_iter().map(|id| (id, self.lock_for(id))).collect()
        };

        let mut report = ReconcileReport::default();
        for (id, lock) in orphans {
            let _guard = lock.acquire().await;
            if self.push_remote(id).await.is_synced() {
                report.recreated += 1;
            } else {
                report.failed += 1;
            }
        }

        self.state.lock().needs_reconcile = report.failed > 0;
        tracing::info!(recreated = report.recreated, failed = report.failed, "drafts reconciled");
        Ok(report)
    }

    /// Submit every local draft for grading
    ///
    /// In-flight remote writes are awaited first. On success the manager is
    /// [`DraftPhase::Submitted`] with an empty list; on failure the drafts are
    /// kept and the manager is active again.
    #[tracing::instrument(
        skip(self, coordinator),
        fields(user = %self.context.user_id, poem = %self.context.poem_id)
    )]
    pub async fn submit(
        &self,
        coordinator: &SubmissionCoordinator,
    ) -> Result<SubmissionOutcome, SubmissionError> {
        let locks: Vec<_> = {
            let mut state = self.state.lock();
            match state.phase {
                DraftPhase::Active => {}
                other => return Err(SubmissionError::InvalidState(other.name())),
            }
            if state.drafts.is_empty() {
                return Err(SubmissionError::NoDrafts);
            }
            state.phase = DraftPhase::Submitting;
            self.locks.iter().map(|e| Arc::clone(e.value())).collect()
        };

        for lock in locks {
            drop(lock.lock_owned().await);
        }

        let drafts = self.drafts();
        let result = coordinator.submit_all(&self.context, &drafts).await;

        let mut state = self.state.lock();
        match &result {
            Ok(_) => {
                state.phase = DraftPhase::Submitted;
                state.drafts.clear();
                state.editing = None;
                state.needs_reconcile = false;
                self.locks.clear();
                tracing::info!("drafts submitted");
            }
            Err(e) => {
                state.phase = DraftPhase::Active;
                tracing::error!(error = %e, "submission failed, drafts kept");
            }
        }
        result
    }

    fn stanza_for(&self, selection: &[TokenId], tokens: &Tokenization) -> usize {
        selection
            .first()
            .and_then(|id| tokens.stanza_of(id))
            .unwrap_or(self.context.current_stanza)
    }

    /// Register and take the write lock of a new draft
    fn lock_new(&self, id: DraftId) -> WriteLock {
        let lock: Arc<tokio::sync::Mutex<()>> = Arc::default();
        self.locks.insert(id, Arc::clone(&lock));
        match Arc::clone(&lock).try_lock_owned() {
            Ok(guard) => WriteLock::Held(guard),
            Err(_) => WriteLock::Wait(lock),
        }
    }

    /// Take the write lock of an existing draft, or queue behind the holder
    fn lock_for(&self, id: DraftId) -> WriteLock {
        let lock = Arc::clone(self.locks.entry(id).or_default().value());
        match Arc::clone(&lock).try_lock_owned() {
            Ok(guard) => WriteLock::Held(guard),
            Err(_) => WriteLock::Wait(lock),
        }
    }

    fn mark(&self, id: DraftId, remote: Option<RecordId>, sync: SyncState) {
        let mut state = self.state.lock();
        let failed = matches!(sync, SyncState::Failed(_));
        if let Some(draft) = state.draft_mut(id) {
            if remote.is_some() {
                draft.remote_id = remote;
            }
            draft.sync = sync;
        }
        if failed {
            state.needs_reconcile = true;
        }
    }

    /// Write the current content of draft `id` to its remote record
    ///
    /// Caller holds the draft's write lock. Nothing is written once a
    /// submission has started.
    async fn push_remote(&self, id: DraftId) -> SyncOutcome {
        let snapshot = {
            let state = self.state.lock();
            if state.phase != DraftPhase::Active {
                return SyncOutcome::Skipped;
            }
            state
                .drafts
                .iter()
                .find(|d| d.id == id)
                .map(|d| (d.remote_id.clone(), d.to_fields(&self.context)))
        };
        let Some((remote_id, fields)) = snapshot else {
            return SyncOutcome::Skipped;
        };

        let result = match &remote_id {
            Some(remote) => self.store.update(remote, &fields).await.map(|()| remote.clone()),
            None => self.store.create(&fields).await,
        };
        match result {
            Ok(remote) => {
                tracing::debug!(draft = %id, record = %remote, "draft written remotely");
                self.mark(id, Some(remote.clone()), SyncState::Synced);
                SyncOutcome::Synced(remote)
            }
            Err(e) => {
                tracing::warn!(draft = %id, error = %e, "failed to write remote draft");
                self.mark(id, None, SyncState::Failed(e.to_string()));
                SyncOutcome::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LineaireConfig;
    use crate::persistence::{MemoryPersistence, RecordKind};
    use crate::store::ResilientPersistence;
    use lineaire_text::{tokenize, DisplayedStanza, IndexMode};

    fn setup() -> (Arc<MemoryPersistence>, DraftManager, Tokenization) {
        let memory = Arc::new(MemoryPersistence::new());
        let store = DraftStore::new(ResilientPersistence::from_config(
            memory.clone(),
            &LineaireConfig::default(),
        ));
        let stanzas = vec![DisplayedStanza::new(0, ["les mots clés du poème"])];
        let tokens = tokenize(&stanzas, IndexMode::Global);
        let ctx = PoemContext::new("u1", "p1", "Poème").with_stanzas(stanzas);
        (memory, DraftManager::new(ctx, store), tokens)
    }

    fn ids(tokens: &Tokenization, words: &[&str]) -> Vec<TokenId> {
        words
            .iter()
            .filter_map(|w| tokens.tokens().iter().find(|t| t.clean_word == *w))
            .map(|t| t.id.clone())
            .collect()
    }

    #[tokio::test]
    async fn load_without_saved_drafts_is_active() {
        let (_, manager, _) = setup();
        assert_eq!(manager.load().await.unwrap(), DraftPhase::Active);
        assert!(manager.load().await.is_err());
    }

    #[tokio::test]
    async fn whitespace_text_is_rejected_before_any_write() {
        let (memory, manager, tokens) = setup();
        manager.load().await.unwrap();
        let err = manager.save_draft(&[], &tokens, "   \n").await.unwrap_err();
        assert!(matches!(err, DraftError::EmptyAnalysis));
        assert!(manager.drafts().is_empty());
        assert!(memory.is_empty(RecordKind::Analyses));
    }

    #[tokio::test]
    async fn save_records_remote_id_and_stanza() {
        let (memory, manager, tokens) = setup();
        manager.load().await.unwrap();
        let selection = ids(&tokens, &["mots"]);
        let outcome = manager.save_draft(&selection, &tokens, "Analyse").await.unwrap();

        let SyncOutcome::Synced(remote) = outcome else {
            panic!("expected synced outcome");
        };
        let drafts = manager.drafts();
        assert_eq!(drafts[0].remote_id.as_ref(), Some(&remote));
        assert_eq!(drafts[0].selected_words, vec!["mots"]);
        assert_eq!(drafts[0].sync, SyncState::Synced);
        assert_eq!(memory.len(RecordKind::Analyses), 1);
    }

    #[tokio::test]
    async fn edit_requires_begin() {
        let (_, manager, tokens) = setup();
        manager.load().await.unwrap();
        let err = manager.save_edit(&[], &tokens, "x").await.unwrap_err();
        assert!(matches!(err, DraftError::NoEditInProgress));
        assert!(matches!(
            manager.begin_edit(0),
            Err(DraftError::IndexOutOfRange { index: 0, len: 0 })
        ));
    }

    #[tokio::test]
    async fn cancel_edit_keeps_draft() {
        let (_, manager, tokens) = setup();
        manager.load().await.unwrap();
        manager.save_draft(&[], &tokens, "Avant").await.unwrap();
        manager.begin_edit(0).unwrap();
        assert_eq!(manager.editing(), Some(0));
        assert!(manager.cancel_edit());
        assert_eq!(manager.editing(), None);
        assert_eq!(manager.drafts()[0].analysis_text, "Avant");
    }

    #[tokio::test]
    async fn discard_draft_is_local_only() {
        let (memory, manager, tokens) = setup();
        manager.load().await.unwrap();
        manager.save_draft(&[], &tokens, "Texte").await.unwrap();
        let removed = manager.discard_draft(0).unwrap();
        assert_eq!(removed.analysis_text, "Texte");
        assert!(manager.drafts().is_empty());
        assert_eq!(memory.len(RecordKind::Analyses), 1);
    }

    #[tokio::test]
    async fn reconcile_recreates_missing_mirrors() {
        let (memory, manager, tokens) = setup();
        manager.load().await.unwrap();
        manager.save_draft(&[], &tokens, "Texte").await.unwrap();

        let remote = manager.drafts()[0].remote_id.clone().unwrap();
        crate::persistence::Persistence::delete(memory.as_ref(), RecordKind::Analyses, &remote)
            .await
            .unwrap();

        let report = manager.reconcile().await.unwrap();
        assert_eq!(report, ReconcileReport { recreated: 1, failed: 0 });
        assert_eq!(memory.len(RecordKind::Analyses), 1);
        assert_ne!(manager.drafts()[0].remote_id, Some(remote));
        assert!(!manager.needs_reconcile());
    }

    #[test]
    fn phase_names() {
        assert_eq!(
            DraftPhase::PendingResumeDecision { count: 3 }.name(),
            "pending_resume_decision"
        );
        assert_eq!(DraftPhase::Submitting.name(), "submitting");
    }
}
