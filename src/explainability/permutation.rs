//! Permutation feature importance

use super::{ImportanceRanking, Scoring};
use crate::data::TARGET_COLUMN;
use crate::error::{KolosalError, Result};
use crate::inference::LoadedModel;
use crate::preprocessing::AlignedMatrix;
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Default seed; each feature draws its own stream from it
pub const DEFAULT_SEED: u64 = 42;

/// Result of feature importance computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportanceResult {
    /// Feature names, in column order
    pub feature_names: Vec<String>,
    /// Metric on the unshuffled data
    pub baseline_score: f64,
    /// Mean drop in the metric per feature
    pub importances_mean: Vec<f64>,
    /// Standard deviation of the drop per feature
    pub importances_std: Vec<f64>,
    /// Raw drops per repetition
    pub importances_raw: Vec<Vec<f64>>,
}

impl ImportanceResult {
    /// Mean importances as a ranking
    pub fn to_ranking(&self) -> Result<ImportanceRanking> {
        ImportanceRanking::from_values(&self.feature_names, &self.importances_mean)
    }
}

/// Permutation feature importance calculator
pub struct PermutationImportance<F>
where
    F: Fn(&Array2<f64>) -> Result<Array1<f64>> + Sync,
{
    /// Prediction function
    predict_fn: F,
    /// Number of permutation repeats
    n_repeats: usize,
    /// Random seed
    seed: u64,
    /// Feature names
    feature_names: Option<Vec<String>>,
}

impl<F> PermutationImportance<F>
where
    F: Fn(&Array2<f64>) -> Result<Array1<f64>> + Sync,
{
    /// Create new permutation importance calculator
    pub fn new(predict_fn: F) -> Self {
        Self {
            predict_fn,
            n_repeats: 10,
            seed: DEFAULT_SEED,
            feature_names: None,
        }
    }

    /// Set number of permutation repeats
    pub fn with_n_repeats(mut self, n_repeats: usize) -> Self {
        self.n_repeats = n_repeats.max(1);
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set feature names
    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = Some(names);
        self
    }

    /// Importance as `baseline - permuted` of a higher-is-better scorer.
    ///
    /// Features are processed in parallel; every feature owns an RNG seeded
    /// from the master seed, so results do not depend on scheduling.
    pub fn compute_with_scorer<S>(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        scorer: S,
    ) -> Result<ImportanceResult>
    where
        S: Fn(&Array1<f64>, &Array1<f64>) -> Result<f64> + Sync,
    {
        let n_features = x.ncols();
        let feature_names = match &self.feature_names {
            Some(names) if names.len() == n_features => names.clone(),
            Some(names) => {
                return Err(KolosalError::ShapeError {
                    expected: format!("{} feature names", n_features),
                    actual: format!("{} feature names", names.len()),
                })
            }
            None => (0..n_features).map(|i| format!("feature_{}", i)).collect(),
        };

        let baseline_pred = (self.predict_fn)(x)?;
        let baseline_score = scorer(y, &baseline_pred)?;

        let mut master = StdRng::seed_from_u64(self.seed);
        let feature_seeds: Vec<u64> = (0..n_features).map(|_| master.gen()).collect();

        let importances_raw: Vec<Vec<f64>> = feature_seeds
            .par_iter()
            .enumerate()
            .map(|(feature_idx, &seed)| -> Result<Vec<f64>> {
                let mut rng = StdRng::seed_from_u64(seed);
                let mut x_permuted = x.clone();
                let mut col: Vec<f64> = x.column(feature_idx).to_vec();
                let mut drops = Vec::with_capacity(self.n_repeats);

                for _ in 0..self.n_repeats {
                    col.shuffle(&mut rng);
                    x_permuted
                        .column_mut(feature_idx)
                        .iter_mut()
                        .zip(col.iter())
                        .for_each(|(cell, &v)| *cell = v);

                    let permuted_pred = (self.predict_fn)(&x_permuted)?;
                    let permuted_score = scorer(y, &permuted_pred)?;
                    drops.push(baseline_score - permuted_score);
                }
                Ok(drops)
            })
            .collect::<Result<_>>()?;

        let importances_mean: Vec<f64> = importances_raw
            .iter()
            .map(|scores| scores.iter().sum::<f64>() / scores.len() as f64)
            .collect();

        let importances_std: Vec<f64> = importances_raw
            .iter()
            .zip(importances_mean.iter())
            .map(|(scores, mean)| {
                let variance: f64 =
                    scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64;
                variance.sqrt()
            })
            .collect();

        Ok(ImportanceResult {
            feature_names,
            baseline_score,
            importances_mean,
            importances_std,
            importances_raw,
        })
    }
}

/// Permutation importance of a loaded model on aligned data, one row per
/// feature sorted descending.
///
/// Requires ground truth; without labels nothing is computed.
pub fn permutation_importance(
    model: &LoadedModel,
    aligned: &AlignedMatrix,
    labels: Option<&Array1<f64>>,
    repeats: usize,
    scoring: Scoring,
) -> Result<ImportanceRanking> {
    permutation_importance_detailed(model, aligned, labels, repeats, scoring, DEFAULT_SEED)?
        .to_ranking()
}

/// Same as [`permutation_importance`] with an explicit seed, keeping the
/// per-repeat scores
pub fn permutation_importance_detailed(
    model: &LoadedModel,
    aligned: &AlignedMatrix,
    labels: Option<&Array1<f64>>,
    repeats: usize,
    scoring: Scoring,
    seed: u64,
) -> Result<ImportanceResult> {
    let labels = labels.ok_or_else(|| KolosalError::PermutationUnavailable {
        label_column: TARGET_COLUMN.to_string(),
    })?;
    crate::config::validate_repeats(repeats)?;
    if labels.len() != aligned.nrows() {
        return Err(KolosalError::ShapeError {
            expected: format!("{} labels", aligned.nrows()),
            actual: format!("{} labels", labels.len()),
        });
    }

    info!(
        model = %model.name(),
        features = aligned.ncols(),
        repeats,
        scoring = %scoring,
        "Computing permutation importance"
    );
    let start = Instant::now();

    let calc = PermutationImportance::new(|x: &Array2<f64>| {
        if scoring.needs_scores() {
            model.ranking_scores(x)
        } else {
            model.predict_labels(x)
        }
    })
    .with_n_repeats(repeats)
    .with_seed(seed)
    .with_feature_names(aligned.columns().to_vec());

    let result = calc.compute_with_scorer(aligned.values(), labels, |y, pred| scoring.evaluate(y, pred))?;

    debug!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        baseline = result.baseline_score,
        "Permutation importance done"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LogisticRegression, ModelArtifact};
    use ndarray::array;

    fn informative_data() -> (Array2<f64>, Array1<f64>) {
        // label follows feature 0, feature 1 is noise
        let x = array![
            [0.1, 5.0],
            [0.2, 1.0],
            [0.3, 4.0],
            [0.4, 2.0],
            [0.6, 3.0],
            [0.7, 2.0],
            [0.8, 5.0],
            [0.9, 1.0]
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    fn model() -> LoadedModel {
        LoadedModel::new(
            "LogReg.model",
            ModelArtifact::LogisticRegression(LogisticRegression::new(vec![10.0, 0.0], -5.0)),
        )
    }

    #[test]
    fn test_informative_feature_ranks_first() {
        let (x, y) = informative_data();
        let aligned = AlignedMatrix::from_parts(vec!["signal".into(), "noise".into()], x);
        let result =
            permutation_importance_detailed(&model(), &aligned, Some(&y), 5, Scoring::RocAuc, DEFAULT_SEED).unwrap();

        assert!((result.baseline_score - 1.0).abs() < 1e-12);
        assert!(result.importances_mean[0] > 0.0);
        assert_eq!(result.importances_mean[1], 0.0);

        let ranking = result.to_ranking().unwrap();
        assert_eq!(ranking.len(), 2);
        assert_eq!(ranking.entries[0].feature, "signal");
    }

    #[test]
    fn test_reproducible_with_fixed_seed() {
        let (x, y) = informative_data();
        let aligned = AlignedMatrix::from_parts(vec!["signal".into(), "noise".into()], x);
        let a = permutation_importance_detailed(&model(), &aligned, Some(&y), 4, Scoring::Accuracy, DEFAULT_SEED).unwrap();
        let b = permutation_importance_detailed(&model(), &aligned, Some(&y), 4, Scoring::Accuracy, DEFAULT_SEED).unwrap();
        assert_eq!(a.importances_raw, b.importances_raw);
        assert_eq!(a.importances_raw[0].len(), 4);
    }

    #[test]
    fn test_missing_labels_is_unavailable() {
        let (x, _) = informative_data();
        let aligned = AlignedMatrix::from_parts(vec!["signal".into(), "noise".into()], x);
        let err = permutation_importance(&model(), &aligned, None, 5, Scoring::F1).unwrap_err();
        assert!(matches!(err, KolosalError::PermutationUnavailable { .. }));
    }

    #[test]
    fn test_repeats_out_of_range() {
        let (x, y) = informative_data();
        let aligned = AlignedMatrix::from_parts(vec!["signal".into(), "noise".into()], x);
        assert!(permutation_importance(&model(), &aligned, Some(&y), 1, Scoring::F1).is_err());
        assert!(permutation_importance(&model(), &aligned, Some(&y), 21, Scoring::F1).is_err());
    }

    #[test]
    fn test_generic_calculator_with_custom_scorer() {
        let predict_fn = |x: &Array2<f64>| -> Result<Array1<f64>> { Ok(x.column(0).to_owned()) };
        let x = Array2::from_shape_fn((10, 3), |(i, j)| if j == 0 { i as f64 } else { 1.0 });
        let y = Array1::from_shape_fn(10, |i| i as f64);

        let neg_mse = |t: &Array1<f64>, p: &Array1<f64>| -> Result<f64> {
            Ok(-t.iter().zip(p.iter()).map(|(a, b)| (a - b).powi(2)).sum::<f64>() / t.len() as f64)
        };
        let result = PermutationImportance::new(predict_fn)
            .with_n_repeats(3)
            .with_seed(7)
            .compute_with_scorer(&x, &y, neg_mse)
            .unwrap();

        assert_eq!(result.feature_names[2], "feature_2");
        assert_eq!(result.to_ranking().unwrap().entries[0].feature, "feature_0");
    }
}
