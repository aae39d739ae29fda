//! Dashboard session: one linear pass per interaction

use super::report::{
    prediction_frame, rank_by_probability, AtRiskList, DashboardReport, PermutationOutcome,
    PredictionSummary, ProbabilityHistogram, RiskRowBuilder, HISTOGRAM_BINS,
};
use crate::artifacts::{self, ArtifactEntry, ResolvedSchema, DIRECTORY_SCHEMA_FILE};
use crate::cache::{CacheStats, LruCache};
use crate::config::{validate_threshold, DashboardConfig, PermutationConfig};
use crate::data::{CustomerTable, DataLoader};
use crate::error::{KolosalError, Result};
use crate::explainability::{builtin_importance, permutation_importance_detailed};
use crate::inference::{classify, score, LoadedModel};
use crate::models::Estimator;
use crate::preprocessing::{align, AlignedMatrix};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn};

/// What the user picked for this pass; unset fields fall back to the config
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Selection {
    /// Artifact stem; the first visible artifact when absent
    pub model: Option<String>,
    pub threshold: Option<f64>,
    pub permutation: Option<PermutationConfig>,
    pub top_churners: Option<usize>,
    pub at_risk_limit: Option<usize>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, name: impl Into<String>) -> Self {
        self.model = Some(name.into());
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_permutation(mut self, permutation: PermutationConfig) -> Self {
        self.permutation = Some(permutation);
        self
    }
}

/// Owns the configuration and the two read-through caches
pub struct DashboardSession {
    config: DashboardConfig,
    loader: DataLoader,
    tables: LruCache<PathBuf, Arc<CustomerTable>>,
    models: LruCache<PathBuf, Arc<LoadedModel>>,
}

impl std::fmt::Debug for DashboardSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardSession")
            .field("config", &self.config)
            .field("cached_tables", &self.tables.len())
            .field("cached_models", &self.models.len())
            .finish()
    }
}

impl DashboardSession {
    /// Create a session after validating the configuration
    pub fn new(config: DashboardConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            tables: LruCache::new(config.table_cache_size),
            models: LruCache::new(config.model_cache_size),
            loader: DataLoader::new(),
            config,
        })
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Visible artifacts in the models directory
    pub fn available_models(&self) -> Result<Vec<ArtifactEntry>> {
        artifacts::discover(&self.config.models_dir, &self.config.hidden_prefixes)
    }

    /// Parsed customer table at `path`, cached by path
    pub fn load_table(&self, path: &Path) -> Result<Arc<CustomerTable>> {
        self.tables.get_or_try_insert_with(path.to_path_buf(), || {
            let frame = self.loader.load_csv(path)?;
            Ok(Arc::new(CustomerTable::new(frame)?))
        })
    }

    /// Loaded model at `path`, cached by path
    pub fn load_model(&self, path: &Path) -> Result<Arc<LoadedModel>> {
        self.models
            .get_or_try_insert_with(path.to_path_buf(), || Ok(Arc::new(LoadedModel::load(path)?)))
    }

    /// Pick a visible artifact by name, or the first one
    pub fn select_model(&self, name: Option<&str>) -> Result<ArtifactEntry> {
        let mut entries = self.available_models()?;
        match name {
            None => Ok(entries.remove(0)),
            Some(name) => match entries.iter().position(|e| e.name == name) {
                Some(idx) => Ok(entries.swap_remove(idx)),
                None => Err(KolosalError::InvalidParameter {
                    name: "model".to_string(),
                    value: name.to_string(),
                    reason: format!(
                        "not a visible model; available: {}",
                        entries.iter().map(|e| e.name.as_str()).collect::<Vec<_>>().join(", ")
                    ),
                }),
            },
        }
    }

    /// Feature schema of an artifact; absence or an empty feature list is
    /// `MissingSchema`
    pub fn resolve_schema(&self, entry: &ArtifactEntry) -> Result<ResolvedSchema> {
        let schema = artifacts::resolve_schema(&entry.path, &self.config.models_dir)?;
        if let Some(empty) = schema.as_ref().filter(|s| s.features.is_empty()) {
            warn!(source = %empty.source, "Feature schema is empty");
        }
        schema.filter(|s| !s.features.is_empty()).ok_or_else(|| KolosalError::MissingSchema {
            artifact: entry.path.clone(),
            per_model: artifacts::per_model_schema_path(&entry.path),
            directory: self.config.models_dir.join(DIRECTORY_SCHEMA_FILE),
        })
    }

    /// Cache statistics for (tables, models)
    pub fn cache_stats(&self) -> (CacheStats, CacheStats) {
        (self.tables.stats(), self.models.stats())
    }

    /// Run the full pipeline: data, model, schema, alignment, scoring,
    /// thresholding, importances
    pub fn run(&self, selection: &Selection) -> Result<DashboardReport> {
        let start = Instant::now();
        let threshold = selection.threshold.unwrap_or(self.config.threshold);
        validate_threshold(threshold)?;

        let table = self.load_table(&self.config.data_path)?;
        let entry = self.select_model(selection.model.as_deref())?;
        let span = info_span!("dashboard_pass", model = %entry.name);
        let _guard = span.enter();

        let model = self.load_model(&entry.path)?;
        let schema = self.resolve_schema(&entry)?;
        info!(source = %schema.source, features = schema.features.len(), "Feature schema resolved");

        let aligned = align(&table.feature_frame()?, &schema.features);
        let probabilities = score(&model, &aligned)?;
        let labels = classify(&probabilities, threshold)?;

        let predictions = prediction_frame(&table, &probabilities, &labels)?;
        let summary = PredictionSummary::compute(table.customer_count()?, &probabilities, &labels);

        let order = rank_by_probability(&probabilities);
        let rows = RiskRowBuilder::new(&table, &probabilities, &labels)?;
        let top_n = selection.top_churners.unwrap_or(self.config.top_churners);
        let top_churners = rows.rows(&order[..top_n.min(order.len())]);

        let at_risk_idx: Vec<usize> = order
            .iter()
            .copied()
            .take_while(|&i| probabilities[i] >= threshold)
            .collect();
        let limit = selection.at_risk_limit.unwrap_or(self.config.at_risk_limit);
        let at_risk = AtRiskList {
            threshold,
            total: at_risk_idx.len(),
            rows: rows.rows(&at_risk_idx[..limit.min(at_risk_idx.len())]),
        };

        let builtin = builtin_importance(model.estimator(), &schema.features)?;
        if builtin.is_empty() {
            debug!(kind = model.estimator().kind(), "Built-in feature importance not available");
        }

        let permutation_config = selection
            .permutation
            .clone()
            .unwrap_or_else(|| self.config.permutation.clone());
        let permutation = self.permutation_outcome(&model, &aligned, &table, &permutation_config);

        info!(
            rows = summary.scored_rows,
            churners = summary.predicted_churners,
            at_risk = at_risk.total,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Dashboard pass complete"
        );

        Ok(DashboardReport {
            model_name: entry.name.clone(),
            model_kind: model.estimator().kind().to_string(),
            artifact_path: entry.path.clone(),
            capability: model.capability(),
            schema_source: schema.source,
            features: schema.features,
            alignment: aligned.report().clone(),
            threshold,
            summary,
            distribution: ProbabilityHistogram::from_probabilities(&probabilities, HISTOGRAM_BINS),
            top_churners,
            at_risk,
            builtin_importance: builtin,
            permutation,
            predictions,
        })
    }

    fn permutation_outcome(
        &self,
        model: &LoadedModel,
        aligned: &AlignedMatrix,
        table: &CustomerTable,
        config: &PermutationConfig,
    ) -> PermutationOutcome {
        if !config.enabled {
            return PermutationOutcome::Disabled;
        }

        match permutation_importance_detailed(
            model,
            aligned,
            table.labels(),
            config.repeats,
            config.scoring,
            config.seed,
        )
        .and_then(|result| Ok((result.baseline_score, result.to_ranking()?)))
        {
            Ok((baseline_score, ranking)) => PermutationOutcome::Computed {
                scoring: config.scoring,
                repeats: config.repeats,
                baseline_score,
                ranking,
            },
            Err(e @ KolosalError::PermutationUnavailable { .. }) => {
                warn!(error = %e, "Permutation importance unavailable");
                PermutationOutcome::Unavailable { reason: e.to_string() }
            }
            Err(e) => {
                warn!(error = %e, "Permutation importance failed");
                PermutationOutcome::Failed { message: e.to_string() }
            }
        }
    }
}
