//! Decision tree classifier artifact

use super::{check_n_features, Estimator, ScoringCapability};
use crate::error::{KolosalError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeNode {
    /// Leaf node; `value` is the fraction of positive samples that reached it
    Leaf {
        value: f64,
        n_samples: usize,
        #[serde(default)]
        impurity: f64,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

impl TreeNode {
    fn n_samples(&self) -> usize {
        match self {
            TreeNode::Leaf { n_samples, .. } | TreeNode::Split { n_samples, .. } => *n_samples,
        }
    }

    fn impurity(&self) -> f64 {
        match self {
            TreeNode::Leaf { impurity, .. } | TreeNode::Split { impurity, .. } => *impurity,
        }
    }

    fn check(&self, n_features: usize) -> Result<()> {
        match self {
            TreeNode::Leaf { value, .. } => {
                if !(0.0..=1.0).contains(value) {
                    return Err(KolosalError::InvalidInput(format!(
                        "leaf probability {} outside [0, 1]",
                        value
                    )));
                }
                Ok(())
            }
            TreeNode::Split { feature_idx, left, right, .. } => {
                if *feature_idx >= n_features {
                    return Err(KolosalError::InvalidInput(format!(
                        "split on feature {} but tree has {} features",
                        feature_idx, n_features
                    )));
                }
                left.check(n_features)?;
                right.check(n_features)
            }
        }
    }
}

/// Fitted binary decision tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeClassifier {
    pub root: TreeNode,
    pub n_features: usize,
    /// Stored importances; computed from impurity decrease when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_importances: Option<Vec<f64>>,
}

impl DecisionTreeClassifier {
    pub fn new(root: TreeNode, n_features: usize) -> Self {
        Self {
            root,
            n_features,
            feature_importances: None,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        self.root.check(self.n_features)?;
        if let Some(imp) = &self.feature_importances {
            if imp.len() != self.n_features {
                return Err(KolosalError::ShapeError {
                    expected: format!("{} importances", self.n_features),
                    actual: format!("{} importances", imp.len()),
                });
            }
        }
        Ok(())
    }

    fn predict_sample(&self, node: &TreeNode, sample: &[f64]) -> f64 {
        match node {
            TreeNode::Leaf { value, .. } => *value,
            TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                if sample[*feature_idx] <= *threshold {
                    self.predict_sample(left, sample)
                } else {
                    self.predict_sample(right, sample)
                }
            }
        }
    }

    /// Mean decrease in impurity, normalized to sum to one
    pub fn impurity_importances(&self) -> Array1<f64> {
        let mut importances = Array1::zeros(self.n_features);
        accumulate_decrease(&self.root, &mut importances);

        let total = importances.sum();
        if total > 0.0 {
            importances /= total;
        }
        importances
    }
}

fn accumulate_decrease(node: &TreeNode, importances: &mut Array1<f64>) {
    if let TreeNode::Split { feature_idx, left, right, n_samples, impurity, .. } = node {
        let decrease = *n_samples as f64 * impurity
            - left.n_samples() as f64 * left.impurity()
            - right.n_samples() as f64 * right.impurity();
        importances[*feature_idx] += decrease.max(0.0);
        accumulate_decrease(left, importances);
        accumulate_decrease(right, importances);
    }
}

impl Estimator for DecisionTreeClassifier {
    fn kind(&self) -> &'static str {
        "decision_tree"
    }

    fn capability(&self) -> ScoringCapability {
        ScoringCapability::ProbabilityScorer
    }

    fn n_features_in(&self) -> Option<usize> {
        Some(self.n_features)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        check_n_features(self.kind(), self.n_features, x)?;
        let predictions: Vec<f64> = x
            .rows()
            .into_iter()
            .map(|row| self.predict_sample(&self.root, &row.to_vec()))
            .collect();
        Ok(Array1::from_vec(predictions))
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        match &self.feature_importances {
            Some(stored) => Some(Array1::from_vec(stored.clone())),
            None => Some(self.impurity_importances()),
        }
    }

    fn inner_estimator(&self) -> &dyn Estimator {
        self
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ndarray::array;

    fn leaf(value: f64, n_samples: usize, impurity: f64) -> Box<TreeNode> {
        Box::new(TreeNode::Leaf { value, n_samples, impurity })
    }

    /// Splits on feature 0 at 50, then on feature 1 at 2 on the right side
    pub(crate) fn stump_tree() -> DecisionTreeClassifier {
        let right = TreeNode::Split {
            feature_idx: 1,
            threshold: 2.0,
            left: leaf(0.6, 20, 0.48),
            right: leaf(0.95, 20, 0.095),
            n_samples: 40,
            impurity: 0.4,
        };
        let root = TreeNode::Split {
            feature_idx: 0,
            threshold: 50.0,
            left: leaf(0.1, 60, 0.18),
            right: Box::new(right),
            n_samples: 100,
            impurity: 0.5,
        };
        DecisionTreeClassifier::new(root, 3)
    }

    #[test]
    fn test_predict_proba_follows_splits() {
        let tree = stump_tree();
        let x = array![[10.0, 0.0, 0.0], [90.0, 1.0, 0.0], [90.0, 5.0, 0.0]];
        let p = tree.predict_proba(&x).unwrap();
        assert_eq!(p.to_vec(), vec![0.1, 0.6, 0.95]);
    }

    #[test]
    fn test_impurity_importances_normalized() {
        let tree = stump_tree();
        let imp = tree.feature_importances().unwrap();

        assert_eq!(imp.len(), 3);
        assert!((imp.sum() - 1.0).abs() < 1e-9);
        assert!(imp[0] > imp[1]);
        assert_eq!(imp[2], 0.0);
    }

    #[test]
    fn test_stored_importances_take_precedence() {
        let mut tree = stump_tree();
        tree.feature_importances = Some(vec![0.2, 0.3, 0.5]);
        assert_eq!(tree.feature_importances().unwrap().to_vec(), vec![0.2, 0.3, 0.5]);
    }

    #[test]
    fn test_validate_rejects_out_of_range_feature() {
        let tree = DecisionTreeClassifier::new(
            TreeNode::Split {
                feature_idx: 4,
                threshold: 0.0,
                left: leaf(0.0, 1, 0.0),
                right: leaf(1.0, 1, 0.0),
                n_samples: 2,
                impurity: 0.5,
            },
            2,
        );
        assert!(tree.validate().is_err());
    }
}
