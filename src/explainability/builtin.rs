//! Importances the model carries itself

use crate::error::{KolosalError, Result};
use crate::models::Estimator;
use ndarray::{Array1, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One row of an importance table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Features sorted by importance, highest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportanceRanking {
    pub entries: Vec<FeatureImportance>,
}

impl ImportanceRanking {
    /// Pair names with values and sort descending. Ties keep schema order.
    pub fn from_values(features: &[String], values: &[f64]) -> Result<Self> {
        if features.len() != values.len() {
            return Err(KolosalError::ShapeError {
                expected: format!("{} importances (one per feature)", features.len()),
                actual: format!("{} importances", values.len()),
            });
        }

        let mut entries: Vec<FeatureImportance> = features
            .iter()
            .zip(values.iter())
            .map(|(feature, &importance)| FeatureImportance {
                feature: feature.clone(),
                importance,
            })
            .collect();
        entries.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The `k` most important features
    pub fn top(&self, k: usize) -> &[FeatureImportance] {
        &self.entries[..k.min(self.entries.len())]
    }

    /// Importance of a named feature
    pub fn get(&self, feature: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.feature == feature)
            .map(|e| e.importance)
    }
}

/// Rank features by the model's own importances.
///
/// Composite models are unwrapped first. Native importances win; otherwise
/// absolute coefficients are used, averaged over rows for multi-output
/// models. A model with neither yields an empty ranking.
pub fn builtin_importance(estimator: &dyn Estimator, features: &[String]) -> Result<ImportanceRanking> {
    let inner = estimator.inner_estimator();

    let values: Option<Array1<f64>> = match inner.feature_importances() {
        Some(native) => Some(native),
        None => inner.coefficients().map(|coef| {
            let abs = coef.mapv(f64::abs);
            if abs.nrows() == 1 {
                abs.row(0).to_owned()
            } else {
                abs.mean_axis(Axis(0))
                    .unwrap_or_else(|| Array1::zeros(abs.ncols()))
            }
        }),
    };

    match values {
        Some(values) => {
            debug!(kind = inner.kind(), features = features.len(), "Built-in importance");
            ImportanceRanking::from_values(features, &values.to_vec())
        }
        None => {
            debug!(kind = inner.kind(), "Model exposes no built-in importance");
            Ok(ImportanceRanking::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Activation, DecisionTreeClassifier, DenseLayer, LinearRegression, LogisticRegression,
        MlpClassifier, ModelArtifact, Pipeline, StandardScaler, TreeNode,
    };

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_pipeline_logistic_uses_abs_coefficients() {
        let pipeline = Pipeline::scaled(
            StandardScaler {
                mean: vec![0.0; 3],
                scale: vec![1.0; 3],
            },
            ModelArtifact::LogisticRegression(LogisticRegression::new(vec![0.4, -1.2, 0.05], 0.0)),
        );
        let ranking = builtin_importance(&pipeline, &names(&["Recency", "Frequency", "Monetary"])).unwrap();

        let order: Vec<&str> = ranking.entries.iter().map(|e| e.feature.as_str()).collect();
        assert_eq!(order, vec!["Frequency", "Recency", "Monetary"]);
        assert_eq!(ranking.get("Frequency"), Some(1.2));
    }

    #[test]
    fn test_multi_row_coefficients_are_averaged() {
        let model = LogisticRegression::multinomial(
            vec![vec![1.0, -2.0], vec![-3.0, 0.0], vec![2.0, 1.0]],
            vec![0.0, 0.0, 0.0],
        );
        let ranking = builtin_importance(&model, &names(&["a", "b"])).unwrap();
        assert!((ranking.get("a").unwrap() - 2.0).abs() < 1e-12);
        assert!((ranking.get("b").unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_one_dimensional_coefficients() {
        let model = LinearRegression::new(vec![-0.5, 0.25], 0.0);
        let ranking = builtin_importance(&model, &names(&["a", "b"])).unwrap();
        assert_eq!(ranking.top(1)[0].feature, "a");
    }

    #[test]
    fn test_tree_native_importances() {
        let mut tree = DecisionTreeClassifier::new(
            TreeNode::Leaf { value: 0.5, n_samples: 1, impurity: 0.0 },
            2,
        );
        tree.feature_importances = Some(vec![0.3, 0.7]);
        let ranking = builtin_importance(&tree, &names(&["a", "b"])).unwrap();
        assert_eq!(ranking.top(5).len(), 2);
        assert_eq!(ranking.entries[0].feature, "b");
    }

    #[test]
    fn test_mlp_has_empty_ranking() {
        let mlp = MlpClassifier::new(
            vec![DenseLayer {
                weights: vec![vec![1.0]],
                biases: vec![0.0],
            }],
            Activation::Relu,
        );
        assert!(builtin_importance(&mlp, &names(&["a"])).unwrap().is_empty());
    }

    #[test]
    fn test_nan_importance_keeps_ranking_ordered() {
        let values = [0.2, f64::NAN, 0.9, -0.1, f64::NAN, 0.4];
        let features = names(&["a", "b", "c", "d", "e", "f"]);
        let ranking = ImportanceRanking::from_values(&features, &values).unwrap();

        assert_eq!(ranking.len(), 6);
        assert!(ranking
            .entries
            .windows(2)
            .all(|w| w[0].importance.total_cmp(&w[1].importance) != std::cmp::Ordering::Less));
        let finite: Vec<&str> = ranking
            .entries
            .iter()
            .filter(|e| e.importance.is_finite())
            .map(|e| e.feature.as_str())
            .collect();
        assert_eq!(finite, vec!["c", "f", "a", "d"]);
    }

    #[test]
    fn test_length_mismatch_is_shape_error() {
        let model = LogisticRegression::new(vec![1.0, 2.0], 0.0);
        let err = builtin_importance(&model, &names(&["a", "b", "c"])).unwrap_err();
        assert!(matches!(err, KolosalError::ShapeError { .. }));
    }
}
