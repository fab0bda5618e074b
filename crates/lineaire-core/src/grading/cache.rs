//! Batch evaluation cache using moka
//!
//! Identical submissions (same poem text, same drafts) are graded once per
//! TTL. The cache is injected so callers choose its lifetime and backend.

use super::{validate_batch, Grader};
use crate::error::GradingError;
use crate::model::{BatchEvaluation, GradingDraft, PoemContext};
use moka::future::Cache;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

/// SHA-256 of a canonical grading request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

#[derive(Serialize)]
struct CanonicalRequest<'a> {
    poem_id: &'a str,
    poem_title: &'a str,
    text: String,
    drafts: &'a [GradingDraft],
}

impl CacheKey {
    /// Key for grading `drafts` against the stanzas shown in `context`
    #[must_use]
    pub fn for_request(context: &PoemContext, drafts: &[GradingDraft]) -> Self {
        let canonical = CanonicalRequest {
            poem_id: &context.poem_id,
            poem_title: &context.poem_title,
            text: context.stanza_text(),
            drafts,
        };
        // Plain structs of strings always serialize
        let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
        Self(hex::encode(Sha256::digest(&bytes)))
    }

    /// Hex digest
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Storage for batch evaluations
#[async_trait::async_trait]
pub trait GradingCache: Send + Sync {
    /// Cached evaluation, if still live
    async fn get(&self, key: &CacheKey) -> Option<BatchEvaluation>;

    /// Store an evaluation
    async fn set(&self, key: CacheKey, value: BatchEvaluation);

    /// Drop an entry
    async fn invalidate(&self, key: &CacheKey);
}

/// In-memory [`GradingCache`] with capacity and TTL
#[derive(Debug, Clone)]
pub struct MokaGradingCache {
    inner: Cache<CacheKey, Arc<BatchEvaluation>>,
}

impl MokaGradingCache {
    /// Create cache with time-based expiration
    #[inline]
    #[must_use]
    pub fn with_ttl(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Number of live entries (approximate)
    #[inline]
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

#[async_trait::async_trait]
impl GradingCache for MokaGradingCache {
    async fn get(&self, key: &CacheKey) -> Option<BatchEvaluation> {
        self.inner.get(key).await.map(|v| (*v).clone())
    }

    async fn set(&self, key: CacheKey, value: BatchEvaluation) {
        self.inner.insert(key, Arc::new(value)).await;
    }

    async fn invalidate(&self, key: &CacheKey) {
        self.inner.invalidate(key).await;
    }
}

/// Grader that consults a [`GradingCache`] before delegating
///
/// Only answers passing [`validate_batch`] are stored.
pub struct CachedGrader<G> {
    inner: G,
    cache: Arc<dyn GradingCache>,
    max_score: f64,
}

impl<G> std::fmt::Debug for CachedGrader<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedGrader").finish_non_exhaustive()
    }
}

impl<G: Grader> CachedGrader<G> {
    /// Wrap `inner` with `cache`; answers are checked against `max_score`
    #[must_use]
    pub fn new(inner: G, cache: Arc<dyn GradingCache>, max_score: f64) -> Self {
        Self {
            inner,
            cache,
            max_score,
        }
    }

    /// Forget the cached evaluation of one request
    pub async fn invalidate(&self, context: &PoemContext, drafts: &[GradingDraft]) {
        self.cache
            .invalidate(&CacheKey::for_request(context, drafts))
            .await;
    }
}

#[async_trait::async_trait]
impl<G: Grader> Grader for CachedGrader<G> {
    async fn evaluate_batch(
        &self,
        context: &PoemContext,
        drafts: &[GradingDraft],
    ) -> Result<BatchEvaluation, GradingError> {
        let key = CacheKey::for_request(context, drafts);
        if let Some(hit) = self.cache.get(&key).await {
            tracing::debug!(key = key.as_str(), "grading cache hit");
            return Ok(hit);
        }
        let batch = self.inner.evaluate_batch(context, drafts).await?;
        if let Err(e) = validate_batch(&batch, drafts.len(), self.max_score) {
            tracing::warn!(key = key.as_str(), error = %e, "grading answer not cached");
            return Err(e);
        }
        self.cache.set(key, batch.clone()).await;
        Ok(batch)
    }
}
