//! Random forest classifier artifact

use super::{check_n_features, DecisionTreeClassifier, Estimator, ScoringCapability};
use crate::error::{KolosalError, Result};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Fitted random forest: the mean of its trees' positive-class probabilities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    pub trees: Vec<DecisionTreeClassifier>,
    pub n_features: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_importances: Option<Vec<f64>>,
}

impl RandomForestClassifier {
    pub fn new(trees: Vec<DecisionTreeClassifier>, n_features: usize) -> Self {
        Self {
            trees,
            n_features,
            feature_importances: None,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(KolosalError::InvalidInput("random forest has no trees".to_string()));
        }
        for tree in &self.trees {
            if tree.n_features != self.n_features {
                return Err(KolosalError::ShapeError {
                    expected: format!("{} features per tree", self.n_features),
                    actual: format!("{} features", tree.n_features),
                });
            }
            tree.validate()?;
        }
        Ok(())
    }

    /// Average of the trees' importances, renormalized
    fn averaged_importances(&self) -> Array1<f64> {
        let mut total: Array1<f64> = self
            .trees
            .par_iter()
            .map(|tree| tree.feature_importances().unwrap_or_else(|| Array1::zeros(self.n_features)))
            .reduce(|| Array1::zeros(self.n_features), |a, b| a + b);

        let sum = total.sum();
        if sum > 0.0 {
            total /= sum;
        }
        total
    }
}

impl Estimator for RandomForestClassifier {
    fn kind(&self) -> &'static str {
        "random_forest"
    }

    fn capability(&self) -> ScoringCapability {
        ScoringCapability::ProbabilityScorer
    }

    fn n_features_in(&self) -> Option<usize> {
        Some(self.n_features)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        check_n_features(self.kind(), self.n_features, x)?;

        let per_tree: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict_proba(x))
            .collect::<Result<_>>()?;

        let n_trees = per_tree.len() as f64;
        let sum = per_tree
            .into_iter()
            .fold(Array1::zeros(x.nrows()), |acc, p| acc + p);
        Ok(sum / n_trees)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        match &self.feature_importances {
            Some(stored) => Some(Array1::from_vec(stored.clone())),
            None => Some(self.averaged_importances()),
        }
    }

    fn inner_estimator(&self) -> &dyn Estimator {
        self
    }
}
