//! Everything one dashboard pass produces

use crate::artifacts::SchemaSource;
use crate::data::CustomerTable;
use crate::error::Result;
use crate::explainability::{ImportanceRanking, Scoring};
use crate::models::ScoringCapability;
use crate::preprocessing::AlignmentReport;
use ndarray::Array1;
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Probability column appended to the input table
pub const PROBABILITY_COLUMN: &str = "churn_probability";
/// Thresholded label column appended to the input table
pub const PREDICTION_COLUMN: &str = "predicted_churn";
/// Attributes shown next to each at-risk customer, when present
pub const DISPLAY_COLUMNS: [&str; 4] = ["Recency", "Frequency", "Monetary", "Tenure"];
/// Bins of the probability distribution
pub const HISTOGRAM_BINS: usize = 40;

/// Headline numbers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionSummary {
    /// Unique customer ids, or rows when there is no id column
    pub total_customers: usize,
    pub scored_rows: usize,
    /// Fraction of rows predicted to churn
    pub churn_rate: f64,
    pub predicted_churners: usize,
    pub average_probability: f64,
}

impl PredictionSummary {
    pub fn compute(total_customers: usize, probabilities: &Array1<f64>, labels: &Array1<i32>) -> Self {
        let churners = labels.iter().filter(|&&l| l == 1).count();
        let n = labels.len();
        Self {
            total_customers,
            scored_rows: n,
            churn_rate: if n > 0 { churners as f64 / n as f64 } else { 0.0 },
            predicted_churners: churners,
            average_probability: probabilities.mean().unwrap_or(0.0),
        }
    }
}

/// Equal-width histogram of churn probabilities over [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbabilityHistogram {
    /// Lower edge of every bin
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl ProbabilityHistogram {
    pub fn from_probabilities(probabilities: &Array1<f64>, bins: usize) -> Self {
        let bins = bins.max(1);
        let width = 1.0 / bins as f64;
        let mut counts = vec![0usize; bins];
        for &p in probabilities.iter().filter(|p| p.is_finite()) {
            let idx = ((p.clamp(0.0, 1.0) / width) as usize).min(bins - 1);
            counts[idx] += 1;
        }
        Self {
            edges: (0..bins).map(|i| i as f64 * width).collect(),
            counts,
        }
    }
}

/// One customer row in a risk table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskRow {
    /// Position in the input table
    pub row: usize,
    pub customer_id: Option<String>,
    pub churn_probability: f64,
    pub predicted_churn: i32,
    /// Present display attributes; null cells are `None`
    pub attributes: BTreeMap<String, Option<f64>>,
}

/// Customers at or above the threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AtRiskList {
    pub threshold: f64,
    /// All qualifying rows, not only the listed ones
    pub total: usize,
    /// Highest probabilities first, truncated to the display limit
    pub rows: Vec<RiskRow>,
}

/// Outcome of the optional permutation importance panel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PermutationOutcome {
    /// Not requested
    Disabled,
    /// Requested but impossible, e.g. no ground truth column
    Unavailable { reason: String },
    Computed {
        scoring: Scoring,
        repeats: usize,
        baseline_score: f64,
        ranking: ImportanceRanking,
    },
    /// Requested, attempted and failed; predictions are still valid
    Failed { message: String },
}

/// Result of [`DashboardSession::run`](super::DashboardSession::run)
#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub model_name: String,
    pub model_kind: String,
    pub artifact_path: PathBuf,
    pub capability: ScoringCapability,
    pub schema_source: SchemaSource,
    pub features: Vec<String>,
    pub alignment: AlignmentReport,
    pub threshold: f64,
    pub summary: PredictionSummary,
    pub distribution: ProbabilityHistogram,
    pub top_churners: Vec<RiskRow>,
    pub at_risk: AtRiskList,
    /// Empty when the model exposes neither importances nor coefficients
    pub builtin_importance: ImportanceRanking,
    pub permutation: PermutationOutcome,
    /// Input table plus probability and label columns
    #[serde(skip)]
    pub predictions: DataFrame,
}

/// Row indices sorted by probability, highest first
pub(crate) fn rank_by_probability(probabilities: &Array1<f64>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..probabilities.len()).collect();
    order.sort_by(|&a, &b| probabilities[b].total_cmp(&probabilities[a]));
    order
}

/// Append the probability and label columns to the full input table
pub(crate) fn prediction_frame(
    table: &CustomerTable,
    probabilities: &Array1<f64>,
    labels: &Array1<i32>,
) -> Result<DataFrame> {
    let mut out = table.frame().clone();
    out.with_column(Column::new(PROBABILITY_COLUMN.into(), probabilities.to_vec()))?;
    out.with_column(Column::new(PREDICTION_COLUMN.into(), labels.to_vec()))?;
    Ok(out)
}

/// Materializes risk rows for selected row indices
pub(crate) struct RiskRowBuilder<'a> {
    ids: Option<Vec<Option<String>>>,
    attributes: Vec<(&'static str, Vec<Option<f64>>)>,
    probabilities: &'a Array1<f64>,
    labels: &'a Array1<i32>,
}

impl<'a> RiskRowBuilder<'a> {
    pub(crate) fn new(
        table: &CustomerTable,
        probabilities: &'a Array1<f64>,
        labels: &'a Array1<i32>,
    ) -> Result<Self> {
        let mut attributes = Vec::new();
        for name in DISPLAY_COLUMNS {
            if let Some(values) = table.numeric_column(name)? {
                attributes.push((name, values));
            }
        }
        Ok(Self {
            ids: table.customer_ids()?,
            attributes,
            probabilities,
            labels,
        })
    }

    pub(crate) fn row(&self, idx: usize) -> RiskRow {
        RiskRow {
            row: idx,
            customer_id: self.ids.as_ref().and_then(|ids| ids[idx].clone()),
            churn_probability: self.probabilities[idx],
            predicted_churn: self.labels[idx],
            attributes: self
                .attributes
                .iter()
                .map(|(name, values)| (name.to_string(), values[idx]))
                .collect(),
        }
    }

    pub(crate) fn rows(&self, indices: &[usize]) -> Vec<RiskRow> {
        indices.iter().map(|&i| self.row(i)).collect()
    }
}
