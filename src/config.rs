//! Dashboard configuration
//!
//! Plain values consumed by the pipeline. Defaults come from the environment
//! (like the server config), can be loaded from a JSON file and are finally
//! overridden by CLI flags or API requests.

use crate::error::{KolosalError, Result};
use crate::explainability::{Scoring, DEFAULT_SEED};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Smallest accepted permutation repeat count
pub const MIN_PERMUTATION_REPEATS: usize = 3;
/// Largest accepted permutation repeat count
pub const MAX_PERMUTATION_REPEATS: usize = 20;

/// Permutation importance settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermutationConfig {
    /// Opt-in switch; the computation is expensive
    pub enabled: bool,
    /// Shuffles per feature
    pub repeats: usize,
    /// Metric whose degradation is measured
    pub scoring: Scoring,
    /// Seed for the shuffles
    pub seed: u64,
}

impl Default for PermutationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            repeats: 10,
            scoring: Scoring::RocAuc,
            seed: DEFAULT_SEED,
        }
    }
}

/// Configuration for a dashboard session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Customer snapshot CSV
    pub data_path: PathBuf,
    /// Folder holding `*.model` artifacts and schema files
    pub models_dir: PathBuf,
    /// Artifact name prefixes never offered for selection
    pub hidden_prefixes: Vec<String>,
    /// Probability cutoff for `predicted_churn`
    pub threshold: f64,
    /// Permutation importance settings
    pub permutation: PermutationConfig,
    /// Rows shown in the top churners table
    pub top_churners: usize,
    /// Rows shown in the at-risk table
    pub at_risk_limit: usize,
    /// Capacity of the parsed table cache
    pub table_cache_size: usize,
    /// Capacity of the loaded model cache
    pub model_cache_size: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_path: std::env::var("CHURN_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/processed/customer_features_v2.csv")),
            models_dir: std::env::var("CHURN_MODELS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./models")),
            hidden_prefixes: vec!["best_".to_string()],
            threshold: std::env::var("CHURN_THRESHOLD")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(0.5),
            permutation: PermutationConfig::default(),
            top_churners: 50,
            at_risk_limit: 500,
            table_cache_size: 8,
            model_cache_size: 16,
        }
    }
}

impl DashboardConfig {
    /// Create a configuration with environment defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file; missing keys keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            KolosalError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Builder method to set the data path
    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = path.into();
        self
    }

    /// Builder method to set the models directory
    pub fn with_models_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.models_dir = dir.into();
        self
    }

    /// Builder method to set the classification threshold
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Builder method to replace the hidden prefixes
    pub fn with_hidden_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hidden_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Builder method to enable permutation importance
    pub fn with_permutation(mut self, repeats: usize, scoring: Scoring) -> Self {
        self.permutation.enabled = true;
        self.permutation.repeats = repeats;
        self.permutation.scoring = scoring;
        self
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        validate_threshold(self.threshold)?;
        validate_repeats(self.permutation.repeats)?;
        if self.table_cache_size == 0 || self.model_cache_size == 0 {
            return Err(KolosalError::ConfigError(
                "cache sizes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Threshold must lie in [0, 1]
pub fn validate_threshold(threshold: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(KolosalError::InvalidParameter {
            name: "threshold".to_string(),
            value: threshold.to_string(),
            reason: "must be within [0, 1]".to_string(),
        });
    }
    Ok(())
}

/// Repeat count must lie in [3, 20]
pub fn validate_repeats(repeats: usize) -> Result<()> {
    if !(MIN_PERMUTATION_REPEATS..=MAX_PERMUTATION_REPEATS).contains(&repeats) {
        return Err(KolosalError::InvalidParameter {
            name: "repeats".to_string(),
            value: repeats.to_string(),
            reason: format!(
                "must be within [{}, {}]",
                MIN_PERMUTATION_REPEATS, MAX_PERMUTATION_REPEATS
            ),
        });
    }
    Ok(())
}
