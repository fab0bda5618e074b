//! Lineaire Core - draft analyses from first save to graded result
//!
//! The lifecycle of a student's analyses on one poem:
//! - Saves local drafts and mirrors them as incomplete remote records
//! - Offers saved drafts for resume or discard when the poem is reopened
//! - Submits every draft to the grader in one batch
//! - Keeps a history of graded submissions
//!
//! The document store and the grader are collaborators behind the
//! [`Persistence`] and [`Grader`] traits.
//!
//! # Example
//!
//! ```rust,ignore
//! use lineaire_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(
//! #     tokens: Tokenization,
//! #     grader: Arc<dyn Grader>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let config = LineaireConfig::new();
//! let backend = ResilientPersistence::from_config(Arc::new(MemoryPersistence::new()), &config);
//! let store = DraftStore::new(backend);
//!
//! let manager = DraftManager::new(PoemContext::new("user", "poem", "Titre"), store.clone());
//! manager.load().await?;
//! manager.save_draft(&[], &tokens, "Le poète s'adresse à sa bien-aimée.").await?;
//!
//! let coordinator = SubmissionCoordinator::new(store, grader, &config);
//! let outcome = manager.submit(&coordinator).await?;
//! println!("moyenne : {}", outcome.average_score);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod drafts;
pub mod error;
pub mod grading;
pub mod history;
pub mod model;
pub mod persistence;
pub mod store;
pub mod submission;

pub use config::LineaireConfig;
pub use drafts::{DiscardReport, DraftManager, DraftPhase, ReconcileReport};
pub use error::{ConfigError, DraftError, GradingError, PersistenceError, SubmissionError};
pub use grading::{
    validate_batch, CacheKey, CachedGrader, CompletionClient, Grader, GradingCache, LlmGrader,
    MokaGradingCache,
};
pub use history::ResultHistory;
pub use model::{
    AnalysisFields, AnalysisRecord, BatchEvaluation, DraftAnalysis, DraftId, Evaluation,
    GradingDraft, PoemContext, ResultFields, ResultRecord, SubmissionOutcome, SyncOutcome,
    SyncState, UserAnswer,
};
pub use persistence::{
    Fields, MemoryPersistence, Order, Persistence, Query, Record, RecordId, RecordKind,
};
pub use store::{DraftStore, ResilientPersistence};
pub use submission::SubmissionCoordinator;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Lineaire Core
    pub use crate::{
        DraftAnalysis, DraftManager, DraftPhase, DraftStore, Grader, LineaireConfig,
        MemoryPersistence, Persistence, PoemContext, ResilientPersistence, ResultHistory,
        SubmissionCoordinator, SubmissionOutcome, SyncOutcome,
    };
    pub use lineaire_text::{TokenId, Tokenization};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
