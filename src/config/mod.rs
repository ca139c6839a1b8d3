//! Configuration management.
//!
//! Thresholds and rule tables are an explicit struct passed to constructors,
//! validated once at startup and immutable afterwards.

mod rules;

pub use rules::{DEFAULT_ANTAGONIST_DENYLIST, RuleTables};

use crate::models::{Antagonist, Dimension};
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Similarity thresholds for the duplicate classifier.
///
/// # Environment Variables
///
/// | Variable | Type | Default |
/// |----------|------|---------|
/// | `TALEPRINT_DEDUP_LOW_BOUND` | f32 | `0.70` |
/// | `TALEPRINT_DEDUP_HIGH_BOUND` | f32 | `0.85` |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DedupThresholds {
    /// Similarities below this are `Low`.
    pub low_bound: f32,
    /// Similarities at or above this are `High`.
    pub high_bound: f32,
    /// Neighbours fetched per query.
    pub query_k: usize,
}

impl Default for DedupThresholds {
    fn default() -> Self {
        Self {
            low_bound: 0.70,
            high_bound: 0.85,
            query_k: 5,
        }
    }
}

impl DedupThresholds {
    /// Checks `0 <= low_bound < high_bound <= 1` and `query_k >= 1`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when the bounds are out of order or range.
    pub fn validate(&self) -> Result<()> {
        let ordered = 0.0 <= self.low_bound
            && self.low_bound < self.high_bound
            && self.high_bound <= 1.0;
        if !ordered {
            return Err(Error::InvalidConfig(format!(
                "dedup thresholds must satisfy 0 <= low ({}) < high ({}) <= 1",
                self.low_bound, self.high_bound
            )));
        }
        if self.query_k == 0 {
            return Err(Error::InvalidConfig("dedup query_k must be >= 1".to_string()));
        }
        Ok(())
    }
}

/// Compatibility score thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringConfig {
    /// Minimum accumulated score for acceptance.
    pub accept_threshold: f32,
    /// Minimum score for the `Good` tier.
    pub good_threshold: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            accept_threshold: 3.0,
            good_threshold: 4.0,
        }
    }
}

impl ScoringConfig {
    /// Checks `0 <= accept <= good <= 5`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when the thresholds are out of order or range.
    pub fn validate(&self) -> Result<()> {
        let ordered = 0.0 <= self.accept_threshold
            && self.accept_threshold <= self.good_threshold
            && self.good_threshold <= 5.0;
        if ordered {
            Ok(())
        } else {
            Err(Error::InvalidConfig(format!(
                "scoring thresholds must satisfy 0 <= accept ({}) <= good ({}) <= 5",
                self.accept_threshold, self.good_threshold
            )))
        }
    }
}

/// Embedding provider limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddingConfig {
    /// Maximum simultaneous in-flight provider calls.
    pub max_concurrent: usize,
    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,
    /// Vector dimensionality expected by the index.
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            timeout_ms: 10_000,
            dimensions: crate::embedding::DEFAULT_DIMENSIONS,
        }
    }
}

impl EmbeddingConfig {
    /// Returns the per-call timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Registry storage settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryConfig {
    /// `SQLite` database path. `None` keeps the registry in memory only.
    pub path: Option<PathBuf>,
}

/// Main configuration for taleprint.
#[derive(Debug, Clone, Default)]
pub struct TaleprintConfig {
    /// Duplicate classifier thresholds.
    pub dedup: DedupThresholds,
    /// Compatibility scoring thresholds.
    pub scoring: ScoringConfig,
    /// Embedding limits.
    pub embedding: EmbeddingConfig,
    /// Registry storage.
    pub registry: RegistryConfig,
    /// Rule tables.
    pub rules: RuleTables,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Dedup section.
    pub dedup: Option<ConfigFileDedup>,
    /// Scoring section.
    pub scoring: Option<ConfigFileScoring>,
    /// Embedding section.
    pub embedding: Option<ConfigFileEmbedding>,
    /// Registry section.
    pub registry: Option<ConfigFileRegistry>,
    /// Rules section.
    pub rules: Option<ConfigFileRules>,
}

/// Dedup section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileDedup {
    /// Low bound.
    pub low_bound: Option<f32>,
    /// High bound.
    pub high_bound: Option<f32>,
    /// Neighbours per query.
    pub query_k: Option<usize>,
}

/// Scoring section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileScoring {
    /// Acceptance threshold.
    pub accept_threshold: Option<f32>,
    /// Good-tier threshold.
    pub good_threshold: Option<f32>,
}

/// Embedding section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileEmbedding {
    /// Max in-flight calls.
    pub max_concurrent: Option<usize>,
    /// Per-call timeout.
    pub timeout_ms: Option<u64>,
    /// Vector dimensionality.
    pub dimensions: Option<usize>,
}

/// Registry section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileRegistry {
    /// `SQLite` path.
    pub path: Option<String>,
}

/// Rules section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileRules {
    /// Enabled values per dimension name.
    #[serde(default)]
    pub domains: BTreeMap<String, Vec<String>>,
    /// Extra mutually exclusive antagonist pairs.
    #[serde(default)]
    pub antagonist_denylist: Vec<[String; 2]>,
    /// Extra keywords keyed by `dimension.value`.
    #[serde(default)]
    pub avoid_keywords: BTreeMap<String, Vec<String>>,
}

impl TaleprintConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if it names
    /// unknown dimensions or values.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::operation("read_config_file", e))?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text cannot be parsed or names unknown values.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| Error::operation("parse_config_file", e))?;
        Self::from_config_file(file)
    }

    /// Loads configuration from the platform config directory
    /// (`<config_dir>/taleprint/config.toml`).
    ///
    /// Returns defaults if no readable config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let path = base_dirs.config_dir().join("taleprint").join("config.toml");
        if path.exists() {
            match Self::load_from_file(&path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config file");
                },
            }
        }

        Self::default()
    }

    /// Converts a `ConfigFile` to `TaleprintConfig`.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(dedup) = file.dedup {
            if let Some(low) = dedup.low_bound {
                config.dedup.low_bound = low;
            }
            if let Some(high) = dedup.high_bound {
                config.dedup.high_bound = high;
            }
            if let Some(k) = dedup.query_k {
                config.dedup.query_k = k;
            }
        }

        if let Some(scoring) = file.scoring {
            if let Some(accept) = scoring.accept_threshold {
                config.scoring.accept_threshold = accept;
            }
            if let Some(good) = scoring.good_threshold {
                config.scoring.good_threshold = good;
            }
        }

        if let Some(embedding) = file.embedding {
            if let Some(max) = embedding.max_concurrent {
                config.embedding.max_concurrent = max;
            }
            if let Some(timeout_ms) = embedding.timeout_ms {
                config.embedding.timeout_ms = timeout_ms;
            }
            if let Some(dimensions) = embedding.dimensions {
                config.embedding.dimensions = dimensions;
            }
        }

        if let Some(path) = file.registry.and_then(|r| r.path) {
            config.registry.path = Some(PathBuf::from(path));
        }

        if let Some(rules) = file.rules {
            apply_rules(&mut config.rules, rules)?;
        }

        Ok(config)
    }

    /// Applies environment variable overrides.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `TALEPRINT_DEDUP_LOW_BOUND` | `dedup.low_bound` |
    /// | `TALEPRINT_DEDUP_HIGH_BOUND` | `dedup.high_bound` |
    /// | `TALEPRINT_SCORE_ACCEPT_THRESHOLD` | `scoring.accept_threshold` |
    /// | `TALEPRINT_EMBED_MAX_CONCURRENT` | `embedding.max_concurrent` |
    /// | `TALEPRINT_EMBED_TIMEOUT_MS` | `embedding.timeout_ms` |
    /// | `TALEPRINT_REGISTRY_PATH` | `registry.path` |
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = parse_env("TALEPRINT_DEDUP_LOW_BOUND") {
            self.dedup.low_bound = v;
        }
        if let Some(v) = parse_env("TALEPRINT_DEDUP_HIGH_BOUND") {
            self.dedup.high_bound = v;
        }
        if let Some(v) = parse_env("TALEPRINT_SCORE_ACCEPT_THRESHOLD") {
            self.scoring.accept_threshold = v;
        }
        if let Some(v) = parse_env("TALEPRINT_EMBED_MAX_CONCURRENT") {
            self.embedding.max_concurrent = v;
        }
        if let Some(v) = parse_env("TALEPRINT_EMBED_TIMEOUT_MS") {
            self.embedding.timeout_ms = v;
        }
        if let Ok(path) = std::env::var("TALEPRINT_REGISTRY_PATH")
            && !path.trim().is_empty()
        {
            self.registry.path = Some(PathBuf::from(path));
        }
        self
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        self.dedup.validate()?;
        self.scoring.validate()?;
        if self.embedding.max_concurrent == 0 {
            return Err(Error::InvalidConfig(
                "embedding max_concurrent must be >= 1".to_string(),
            ));
        }
        if self.embedding.dimensions == 0 {
            return Err(Error::InvalidConfig(
                "embedding dimensions must be >= 1".to_string(),
            ));
        }
        self.rules.validate()
    }

    /// Validates and returns the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if validation fails.
    pub fn validated(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }

    /// Builder method to set the dedup thresholds.
    #[must_use]
    pub const fn with_dedup(mut self, dedup: DedupThresholds) -> Self {
        self.dedup = dedup;
        self
    }

    /// Builder method to set the embedding limits.
    #[must_use]
    pub const fn with_embedding(mut self, embedding: EmbeddingConfig) -> Self {
        self.embedding = embedding;
        self
    }

    /// Builder method to set the registry path.
    #[must_use]
    pub fn with_registry_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.registry.path = Some(path.into());
        self
    }

    /// Builder method to replace the rule tables.
    #[must_use]
    pub fn with_rules(mut self, rules: RuleTables) -> Self {
        self.rules = rules;
        self
    }
}

fn apply_rules(tables: &mut RuleTables, rules: ConfigFileRules) -> Result<()> {
    for (name, values) in &rules.domains {
        let dimension = parse_dimension(name)?;
        tables.restrict_domain(dimension, values)?;
    }

    for [a, b] in &rules.antagonist_denylist {
        let a: Antagonist = a.parse()?;
        let b: Antagonist = b.parse()?;
        tables.deny_antagonists(a, b);
    }

    for (key, words) in &rules.avoid_keywords {
        let (dimension, value) = key.split_once('.').ok_or_else(|| {
            Error::InvalidConfig(format!("avoid keyword key '{key}' must be 'dimension.value'"))
        })?;
        tables.add_keywords(parse_dimension(dimension)?, value, words)?;
    }

    Ok(())
}

fn parse_dimension(name: &str) -> Result<Dimension> {
    Dimension::parse(name)
        .ok_or_else(|| Error::InvalidConfig(format!("unknown dimension '{name}'")))
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
