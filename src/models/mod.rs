//! Serialized classifier artifacts
//!
//! A model artifact is a JSON document tagged by `kind`. Every kind implements
//! [`Estimator`], which states up front which scoring capability it offers
//! instead of being probed for optional methods at call time:
//! - `logistic_regression` - probabilities, decision scores, coefficients
//! - `linear_svc` - decision scores, coefficients
//! - `linear_regression` - coefficients only (cannot score churn)
//! - `decision_tree` / `random_forest` - probabilities, native importances
//! - `mlp_classifier` - probabilities only
//! - `pipeline` - scalers followed by a final estimator, usually named `"model"`

mod decision_tree;
mod linear_models;
mod neural_network;
mod pipeline;
mod random_forest;

pub use decision_tree::{DecisionTreeClassifier, TreeNode};
pub use linear_models::{LinearRegression, LinearSvc, LogisticRegression};
pub use neural_network::{Activation, DenseLayer, MlpClassifier};
pub use pipeline::{MinMaxScaler, Pipeline, PipelineStep, StandardScaler, Step, MODEL_STEP};
pub use random_forest::RandomForestClassifier;

use crate::error::{KolosalError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::debug;

/// How an estimator turns features into a churn score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringCapability {
    /// Native positive-class probabilities
    ProbabilityScorer,
    /// Unbounded decision scores, mapped through the logistic function
    DecisionScorer,
    /// Neither; the model cannot score churn
    Unsupported,
}

impl fmt::Display for ScoringCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScoringCapability::ProbabilityScorer => "probability",
            ScoringCapability::DecisionScorer => "decision function",
            ScoringCapability::Unsupported => "unsupported",
        };
        f.write_str(s)
    }
}

/// Common interface of every loaded classifier
pub trait Estimator: fmt::Debug + Send + Sync {
    /// Short name of the estimator kind
    fn kind(&self) -> &'static str;

    /// Scoring capability, fixed for the lifetime of the estimator
    fn capability(&self) -> ScoringCapability;

    /// Number of input features the estimator was fitted on, when known
    fn n_features_in(&self) -> Option<usize> {
        None
    }

    /// Probability of the positive class for each row
    fn predict_proba(&self, _x: &Array2<f64>) -> Result<Array1<f64>> {
        Err(KolosalError::InferenceError(format!(
            "{} does not produce probabilities",
            self.kind()
        )))
    }

    /// Raw decision score for each row
    fn decision_function(&self, _x: &Array2<f64>) -> Result<Array1<f64>> {
        Err(KolosalError::InferenceError(format!(
            "{} does not produce decision scores",
            self.kind()
        )))
    }

    /// Native importance vector (tree ensembles)
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }

    /// Linear coefficients, one row per output
    fn coefficients(&self) -> Option<Array2<f64>> {
        None
    }

    /// The wrapped estimator of a composite model; non-composite estimators
    /// return themselves
    fn inner_estimator(&self) -> &dyn Estimator;
}

/// Every supported artifact kind
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    LogisticRegression(LogisticRegression),
    LinearSvc(LinearSvc),
    LinearRegression(LinearRegression),
    DecisionTree(DecisionTreeClassifier),
    RandomForest(RandomForestClassifier),
    MlpClassifier(MlpClassifier),
    Pipeline(Pipeline),
}

impl ModelArtifact {
    /// View as a trait object
    pub fn as_estimator(&self) -> &dyn Estimator {
        match self {
            ModelArtifact::LogisticRegression(m) => m,
            ModelArtifact::LinearSvc(m) => m,
            ModelArtifact::LinearRegression(m) => m,
            ModelArtifact::DecisionTree(m) => m,
            ModelArtifact::RandomForest(m) => m,
            ModelArtifact::MlpClassifier(m) => m,
            ModelArtifact::Pipeline(m) => m,
        }
    }

    /// Structural checks run once after deserialization
    pub fn validate(&self) -> Result<()> {
        match self {
            ModelArtifact::LogisticRegression(m) => m.validate(),
            ModelArtifact::LinearSvc(m) => m.validate(),
            ModelArtifact::LinearRegression(m) => m.validate(),
            ModelArtifact::DecisionTree(m) => m.validate(),
            ModelArtifact::RandomForest(m) => m.validate(),
            ModelArtifact::MlpClassifier(m) => m.validate(),
            ModelArtifact::Pipeline(m) => m.validate(),
        }
    }

    /// Parse an artifact from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let artifact: Self = serde_json::from_str(json)?;
        artifact.validate()?;
        Ok(artifact)
    }

    /// Load an artifact file; any failure is an `ArtifactLoadFailure`
    pub fn load(path: &Path) -> Result<Self> {
        let fail = |reason: String| KolosalError::ArtifactLoadFailure {
            path: path.to_path_buf(),
            reason,
        };

        let json = std::fs::read_to_string(path).map_err(|e| fail(e.to_string()))?;
        let artifact = Self::from_json(&json).map_err(|e| fail(e.to_string()))?;
        debug!(path = %path.display(), kind = artifact.as_estimator().kind(), "Loaded model artifact");
        Ok(artifact)
    }
}

impl Estimator for ModelArtifact {
    fn kind(&self) -> &'static str {
        self.as_estimator().kind()
    }

    fn capability(&self) -> ScoringCapability {
        self.as_estimator().capability()
    }

    fn n_features_in(&self) -> Option<usize> {
        self.as_estimator().n_features_in()
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.as_estimator().predict_proba(x)
    }

    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.as_estimator().decision_function(x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.as_estimator().feature_importances()
    }

    fn coefficients(&self) -> Option<Array2<f64>> {
        self.as_estimator().coefficients()
    }

    fn inner_estimator(&self) -> &dyn Estimator {
        self.as_estimator().inner_estimator()
    }
}

/// Standard logistic function
pub fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

/// Build a dense matrix from equally sized rows
pub(crate) fn matrix_from_rows(rows: &[Vec<f64>]) -> Result<Array2<f64>> {
    let n_rows = rows.len();
    let n_cols = rows.first().map(Vec::len).unwrap_or(0);
    if let Some(bad) = rows.iter().find(|r| r.len() != n_cols) {
        return Err(KolosalError::ShapeError {
            expected: format!("{} values per row", n_cols),
            actual: format!("{} values", bad.len()),
        });
    }
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Ok(Array2::from_shape_vec((n_rows, n_cols), flat)?)
}

/// Reject inputs whose width differs from the fitted width
pub(crate) fn check_n_features(kind: &str, expected: usize, x: &Array2<f64>) -> Result<()> {
    if x.ncols() != expected {
        return Err(KolosalError::ShapeError {
            expected: format!("{} features for {}", expected, kind),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

/// Row-wise softmax, returning the probability of class index 1
pub(crate) fn softmax_positive(logits: &Array2<f64>) -> Array1<f64> {
    logits
        .rows()
        .into_iter()
        .map(|row| {
            let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let exp_sum: f64 = row.iter().map(|&v| (v - max).exp()).sum();
            (row[1] - max).exp() / exp_sum
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_parse_tagged_artifact() {
        let json = r#"{
            "kind": "logistic_regression",
            "coef": [[0.5, -0.25]],
            "intercept": [0.1]
        }"#;
        let artifact = ModelArtifact::from_json(json).unwrap();
        assert_eq!(artifact.kind(), "logistic_regression");
        assert_eq!(artifact.capability(), ScoringCapability::ProbabilityScorer);
        assert_eq!(artifact.n_features_in(), Some(2));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let json = r#"{"kind": "kmeans", "centers": []}"#;
        assert!(ModelArtifact::from_json(json).is_err());
    }

    #[test]
    fn test_load_failure_names_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("Broken.model");
        std::fs::write(&path, "not json").unwrap();

        let err = ModelArtifact::load(&path).unwrap_err();
        match err {
            KolosalError::ArtifactLoadFailure { path: p, .. } => assert_eq!(p, path),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("LinearSvc.model");
        let artifact = ModelArtifact::LinearSvc(LinearSvc::new(vec![vec![1.0, 2.0]], vec![0.0]));
        std::fs::write(&path, serde_json::to_string_pretty(&artifact).unwrap()).unwrap();

        let loaded = ModelArtifact::load(&path).unwrap();
        assert_eq!(loaded.capability(), ScoringCapability::DecisionScorer);
    }

    #[test]
    fn test_matrix_from_rows_rejects_ragged() {
        assert!(matrix_from_rows(&[vec![1.0, 2.0], vec![3.0]]).is_err());
        let m = matrix_from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(m, array![[1.0, 2.0], [3.0, 4.0]]);
    }

    #[test]
    fn test_softmax_positive() {
        let p = softmax_positive(&array![[0.0, 0.0], [0.0, 100.0]]);
        assert!((p[0] - 0.5).abs() < 1e-12);
        assert!(p[1] > 0.999);
    }
}
