//! Classification metrics used to score permutations
//!
//! Labels are 0/1 encoded as `f64`; anything above 0.5 is the positive class.

use crate::error::{KolosalError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Metric evaluated before and after each permutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    /// Area under the ROC curve on probability (or decision) scores
    #[default]
    RocAuc,
    /// F1 of the positive class on predicted labels
    F1,
    /// Fraction of correct predicted labels
    Accuracy,
}

impl Scoring {
    /// All supported metrics
    pub const ALL: [Scoring; 3] = [Scoring::RocAuc, Scoring::F1, Scoring::Accuracy];

    /// Whether the metric consumes continuous scores rather than labels
    pub fn needs_scores(self) -> bool {
        matches!(self, Scoring::RocAuc)
    }

    /// Evaluate the metric; higher is better for all three
    pub fn evaluate(self, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
        if y_true.len() != y_pred.len() {
            return Err(KolosalError::ShapeError {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }
        match self {
            Scoring::RocAuc => roc_auc_score(y_true, y_pred),
            Scoring::F1 => Ok(f1_score(y_true, y_pred)),
            Scoring::Accuracy => Ok(accuracy_score(y_true, y_pred)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scoring::RocAuc => "roc_auc",
            Scoring::F1 => "f1",
            Scoring::Accuracy => "accuracy",
        }
    }
}

impl fmt::Display for Scoring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scoring {
    type Err = KolosalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "roc_auc" | "auc" => Ok(Scoring::RocAuc),
            "f1" => Ok(Scoring::F1),
            "accuracy" => Ok(Scoring::Accuracy),
            other => Err(KolosalError::InvalidParameter {
                name: "scoring".to_string(),
                value: other.to_string(),
                reason: "expected one of roc_auc, f1, accuracy".to_string(),
            }),
        }
    }
}

#[inline]
fn is_positive(label: f64) -> bool {
    label > 0.5
}

/// ROC AUC via the Mann-Whitney rank statistic, averaging ranks over ties.
///
/// Undefined when only one class is present.
pub fn roc_auc_score(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<f64> {
    let n_pos = y_true.iter().filter(|&&y| is_positive(y)).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(KolosalError::ComputationError(
            "ROC AUC is undefined when labels contain a single class".to_string(),
        ));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    // 1-based ranks, ties share their average rank
    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg_rank;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = y_true
        .iter()
        .zip(ranks.iter())
        .filter(|(&y, _)| is_positive(y))
        .map(|(_, &r)| r)
        .sum();

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Ok((pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

/// F1 of the positive class; 0 when there are no true or predicted positives
pub fn f1_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut fn_ = 0usize;
    for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
        match (is_positive(t), is_positive(p)) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }

    let denom = 2 * tp + fp + fn_;
    if denom == 0 {
        0.0
    } else {
        2.0 * tp as f64 / denom as f64
    }
}

/// Fraction of matching labels
pub fn accuracy_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| (*t - *p).abs() < 0.5)
        .count();
    correct as f64 / y_true.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_roc_auc_perfect_and_inverted() {
        let y = array![0.0, 0.0, 1.0, 1.0];
        let auc = roc_auc_score(&y, &array![0.1, 0.2, 0.8, 0.9]).unwrap();
        assert!((auc - 1.0).abs() < 1e-12);
        let auc = roc_auc_score(&y, &array![0.9, 0.8, 0.2, 0.1]).unwrap();
        assert!(auc.abs() < 1e-12);
    }

    #[test]
    fn test_roc_auc_ties_count_half() {
        let y = array![0.0, 1.0];
        let auc = roc_auc_score(&y, &array![0.5, 0.5]).unwrap();
        assert!((auc - 0.5).abs() < 1e-12);

        // one of four pairs is tied, the rest are ordered correctly
        let y = array![0.0, 0.0, 1.0, 1.0];
        let auc = roc_auc_score(&y, &array![0.1, 0.4, 0.4, 0.9]).unwrap();
        assert!((auc - 0.875).abs() < 1e-12);
    }

    #[test]
    fn test_roc_auc_single_class_is_error() {
        let y = array![1.0, 1.0];
        assert!(roc_auc_score(&y, &array![0.2, 0.7]).is_err());
    }

    #[test]
    fn test_f1_and_accuracy() {
        let y = array![1.0, 1.0, 0.0, 0.0];
        let pred = array![1.0, 0.0, 1.0, 0.0];
        assert!((f1_score(&y, &pred) - 0.5).abs() < 1e-12);
        assert!((accuracy_score(&y, &pred) - 0.5).abs() < 1e-12);
        assert_eq!(f1_score(&array![0.0], &array![0.0]), 0.0);
    }

    #[test]
    fn test_scoring_parse_and_display() {
        assert_eq!("ROC_AUC".parse::<Scoring>().unwrap(), Scoring::RocAuc);
        assert_eq!("f1".parse::<Scoring>().unwrap(), Scoring::F1);
        assert!("precision".parse::<Scoring>().is_err());
        for scoring in Scoring::ALL {
            assert_eq!(scoring.to_string().parse::<Scoring>().unwrap(), scoring);
        }
        assert_eq!(serde_json::to_string(&Scoring::Accuracy).unwrap(), "\"accuracy\"");
    }
}
