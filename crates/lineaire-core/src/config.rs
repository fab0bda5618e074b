//! Runtime configuration

use crate::error::ConfigError;
use lineaire_text::OverlaySettings;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Lineaire configuration
///
/// Every field has a default, so a TOML file only needs the values it
/// overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LineaireConfig {
    /// Timeout applied to every persistence call, in seconds
    pub persistence_timeout_secs: u64,
    /// Extra attempts for idempotent reads (`get`, `list`)
    pub read_retries: u32,
    /// Timeout for one batched grading call, in seconds
    pub grading_timeout_secs: u64,
    /// Lifetime of a cached batch evaluation, in seconds
    pub grading_cache_ttl_secs: u64,
    /// Maximum cached batch evaluations
    pub grading_cache_capacity: u64,
    /// Upper bound of a valid score
    pub max_score: f64,
    /// Stanzas shown in quick mode
    pub quick_mode_stanzas: usize,
    /// Sticky note and ink constants
    pub overlay: OverlaySettings,
}

impl LineaireConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With persistence timeout
    #[inline]
    #[must_use]
    pub fn with_persistence_timeout(mut self, timeout: Duration) -> Self {
        self.persistence_timeout_secs = timeout.as_secs();
        self
    }

    /// With read retries
    #[inline]
    #[must_use]
    pub fn with_read_retries(mut self, retries: u32) -> Self {
        self.read_retries = retries;
        self
    }

    /// With grading timeout
    #[inline]
    #[must_use]
    pub fn with_grading_timeout(mut self, timeout: Duration) -> Self {
        self.grading_timeout_secs = timeout.as_secs();
        self
    }

    /// With grading cache TTL
    #[inline]
    #[must_use]
    pub fn with_grading_cache_ttl(mut self, ttl: Duration) -> Self {
        self.grading_cache_ttl_secs = ttl.as_secs();
        self
    }

    /// With maximum score
    #[inline]
    #[must_use]
    pub fn with_max_score(mut self, max: f64) -> Self {
        self.max_score = max;
        self
    }

    /// With quick mode size
    #[inline]
    #[must_use]
    pub fn with_quick_mode_stanzas(mut self, count: usize) -> Self {
        self.quick_mode_stanzas = count;
        self
    }

    /// Persistence timeout as a [`Duration`]
    #[inline]
    #[must_use]
    pub fn persistence_timeout(&self) -> Duration {
        Duration::from_secs(self.persistence_timeout_secs)
    }

    /// Grading timeout as a [`Duration`]
    #[inline]
    #[must_use]
    pub fn grading_timeout(&self) -> Duration {
        Duration::from_secs(self.grading_timeout_secs)
    }

    /// Grading cache TTL as a [`Duration`]
    #[inline]
    #[must_use]
    pub fn grading_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.grading_cache_ttl_secs)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Reject values the lifecycle cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.persistence_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "persistence_timeout_secs must be positive".into(),
            ));
        }
        if self.grading_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "grading_timeout_secs must be positive".into(),
            ));
        }
        if !self.max_score.is_finite() || self.max_score <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "max_score must be positive, got {}",
                self.max_score
            )));
        }
        if self.quick_mode_stanzas == 0 {
            return Err(ConfigError::Invalid(
                "quick_mode_stanzas must be at least 1".into(),
            ));
        }
        let overlay = &self.overlay;
        if !overlay.erase_radius.is_finite()
            || !overlay.stroke_width.is_finite()
            || overlay.erase_radius < 0.0
            || overlay.stroke_width <= 0.0
        {
            return Err(ConfigError::Invalid(
                "overlay stroke width and erase radius must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl Default for LineaireConfig {
    fn default() -> Self {
        Self {
            persistence_timeout_secs: 10,
            read_retries: 1,
            grading_timeout_secs: 120,
            grading_cache_ttl_secs: 3600,
            grading_cache_capacity: 256,
            max_score: 20.0,
            quick_mode_stanzas: 1,
            overlay: OverlaySettings::default(),
        }
    }
}
