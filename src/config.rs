//! Screening engine configuration
//!
//! Loads engine defaults, scoring weights and list source descriptors from
//! YAML and provides strongly-typed access with named defaults.
//!
//! Path resolution order for [`ScreeningConfig::from_env`]:
//! 1. `SCREENING_CONFIG` environment variable (explicit override)
//! 2. Relative `config/screening.yaml`

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Default configuration path
pub const DEFAULT_CONFIG_PATH: &str = "config/screening.yaml";

pub const DEFAULT_THRESHOLD: f64 = 0.7;
pub const DEFAULT_CONFIRM_THRESHOLD: f64 = 0.95;
pub const MAX_BATCH_SIZE: usize = 1000;
pub const MIN_NAME_LENGTH: usize = 2;

/// Root configuration structure for the screening engine
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ScreeningConfig {
    #[serde(default)]
    pub defaults: EngineDefaults,
    #[serde(default)]
    pub scoring: ScoringWeights,
    /// Watchlist sources the engine should load
    #[serde(default)]
    pub lists: Vec<ListSourceConfig>,
}

/// Batch-level limits and defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineDefaults {
    /// Threshold substituted when the caller sends none or garbage
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Composite score at or above which a match is confirmed
    #[serde(default = "default_confirm_threshold")]
    pub confirm_threshold: f64,
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    #[serde(default = "default_min_name_length")]
    pub min_name_length: usize,
    /// Overall per-batch deadline; unset means no deadline
    #[serde(default)]
    pub deadline_ms: Option<u64>,
    /// Worker pool size; unset means one per available core
    #[serde(default)]
    pub workers: Option<usize>,
}

impl Default for EngineDefaults {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            confirm_threshold: DEFAULT_CONFIRM_THRESHOLD,
            max_batch_size: MAX_BATCH_SIZE,
            min_name_length: MIN_NAME_LENGTH,
            deadline_ms: None,
            workers: None,
        }
    }
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_confirm_threshold() -> f64 {
    DEFAULT_CONFIRM_THRESHOLD
}

fn default_max_batch_size() -> usize {
    MAX_BATCH_SIZE
}

fn default_min_name_length() -> usize {
    MIN_NAME_LENGTH
}

/// Tunable constants for the similarity model
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScoringWeights {
    #[serde(default = "default_name_weight")]
    pub name_weight: f64,
    #[serde(default = "default_dob_weight")]
    pub dob_weight: f64,
    #[serde(default = "default_country_weight")]
    pub country_weight: f64,
    /// Share of token-set similarity in the name score (rest is character similarity)
    #[serde(default = "default_token_weight")]
    pub token_weight: f64,
    /// Credit for same day and month with a different year
    #[serde(default = "default_dob_day_month_credit")]
    pub dob_day_month_credit: f64,
    /// Composite floor applied on an exact identifier match
    #[serde(default = "default_identifier_floor")]
    pub identifier_floor: f64,
    /// Subtracted from the name score when both sides carry disjoint legal suffixes
    #[serde(default = "default_suffix_mismatch_penalty")]
    pub suffix_mismatch_penalty: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            name_weight: default_name_weight(),
            dob_weight: default_dob_weight(),
            country_weight: default_country_weight(),
            token_weight: default_token_weight(),
            dob_day_month_credit: default_dob_day_month_credit(),
            identifier_floor: default_identifier_floor(),
            suffix_mismatch_penalty: default_suffix_mismatch_penalty(),
        }
    }
}

fn default_name_weight() -> f64 {
    0.65
}

fn default_dob_weight() -> f64 {
    0.20
}

fn default_country_weight() -> f64 {
    0.15
}

fn default_token_weight() -> f64 {
    0.5
}

fn default_dob_day_month_credit() -> f64 {
    0.5
}

fn default_identifier_floor() -> f64 {
    0.90
}

fn default_suffix_mismatch_penalty() -> f64 {
    0.05
}

impl ScoringWeights {
    /// Reject weight sets the scorer cannot use
    pub fn validate(&self) -> Result<()> {
        let unit_interval = [
            ("token_weight", self.token_weight),
            ("dob_day_month_credit", self.dob_day_month_credit),
            ("identifier_floor", self.identifier_floor),
            ("suffix_mismatch_penalty", self.suffix_mismatch_penalty),
        ];
        for (name, value) in unit_interval {
            if !(0.0..=1.0).contains(&value) {
                bail!("scoring.{} must be within [0, 1], got {}", name, value);
            }
        }

        let field_weights = [
            ("name_weight", self.name_weight),
            ("dob_weight", self.dob_weight),
            ("country_weight", self.country_weight),
        ];
        for (name, value) in field_weights {
            if !value.is_finite() || value < 0.0 {
                bail!(
                    "scoring.{} must be a non-negative number, got {}",
                    name,
                    value
                );
            }
        }
        if self.name_weight <= 0.0 {
            bail!("scoring.name_weight must be positive");
        }
        Ok(())
    }
}

/// A single watchlist source
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListSourceConfig {
    /// Source code used in requests (e.g., "OFAC_SDN", "UN", "PEP")
    pub code: String,
    /// Human-readable name
    pub name: String,
    /// JSON or YAML file with the list entries
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Disabled sources are reported as unavailable
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl ScreeningConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_yaml(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;

        // Relative list paths resolve against the config file's directory
        if let Some(base) = path.parent() {
            for list in &mut config.lists {
                if let Some(list_path) = &list.path {
                    if list_path.is_relative() {
                        list.path = Some(base.join(list_path));
                    }
                }
            }
        }

        info!(path = %path.display(), lists = config.lists.len(), "Loaded screening config");
        Ok(config)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: ScreeningConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `SCREENING_CONFIG` or the default path, applying
    /// `SCREENING_WORKERS` as a worker-count override
    pub fn from_env() -> Result<Self> {
        let path = std::env::var("SCREENING_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file(&path)?;

        if let Ok(workers) = std::env::var("SCREENING_WORKERS") {
            let workers: usize = workers.parse().with_context(|| {
                format!(
                    "SCREENING_WORKERS must be a positive integer, got '{}'",
                    workers
                )
            })?;
            config.defaults.workers = Some(workers);
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.scoring.validate()?;

        let d = &self.defaults;
        if !(0.0..=1.0).contains(&d.threshold) {
            bail!(
                "defaults.threshold must be within [0, 1], got {}",
                d.threshold
            );
        }
        if !(0.0..=1.0).contains(&d.confirm_threshold) {
            bail!(
                "defaults.confirm_threshold must be within [0, 1], got {}",
                d.confirm_threshold
            );
        }
        if d.max_batch_size == 0 {
            bail!("defaults.max_batch_size must be positive");
        }
        if d.workers == Some(0) {
            bail!("defaults.workers must be positive when set");
        }

        let mut seen = std::collections::HashSet::new();
        for list in &self.lists {
            if !seen.insert(list.code.as_str()) {
                bail!("duplicate list code '{}'", list.code);
            }
        }
        Ok(())
    }

    /// Look up a list source by code
    pub fn get_list(&self, code: &str) -> Option<&ListSourceConfig> {
        self.lists.iter().find(|l| l.code == code)
    }
}
