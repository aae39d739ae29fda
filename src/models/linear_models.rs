//! Linear model artifacts

use super::{check_n_features, matrix_from_rows, sigmoid, softmax_positive, Estimator, ScoringCapability};
use crate::error::{KolosalError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Validate a coefficient matrix against its intercepts
fn validate_linear(kind: &str, coef: &[Vec<f64>], intercept: &[f64]) -> Result<()> {
    if coef.is_empty() || coef[0].is_empty() {
        return Err(KolosalError::InvalidInput(format!("{} has no coefficients", kind)));
    }
    matrix_from_rows(coef)?;
    if intercept.len() != coef.len() {
        return Err(KolosalError::ShapeError {
            expected: format!("{} intercepts", coef.len()),
            actual: format!("{} intercepts", intercept.len()),
        });
    }
    Ok(())
}

/// `X W^T + b`, one column per coefficient row
fn linear_scores(kind: &str, coef: &[Vec<f64>], intercept: &[f64], x: &Array2<f64>) -> Result<Array2<f64>> {
    let w = matrix_from_rows(coef)?;
    check_n_features(kind, w.ncols(), x)?;
    let b = Array1::from_vec(intercept.to_vec());
    Ok(x.dot(&w.t()) + &b)
}

/// Fitted logistic regression.
///
/// A single coefficient row is a binary model; several rows are a
/// multinomial model whose class index 1 is the positive class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Coefficients, one row per output
    pub coef: Vec<Vec<f64>>,
    /// Intercepts, one per coefficient row
    pub intercept: Vec<f64>,
}

impl LogisticRegression {
    /// Create a binary model
    pub fn new(coef: Vec<f64>, intercept: f64) -> Self {
        Self {
            coef: vec![coef],
            intercept: vec![intercept],
        }
    }

    /// Create a multinomial model
    pub fn multinomial(coef: Vec<Vec<f64>>, intercept: Vec<f64>) -> Self {
        Self { coef, intercept }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        validate_linear(self.kind(), &self.coef, &self.intercept)
    }
}

impl Estimator for LogisticRegression {
    fn kind(&self) -> &'static str {
        "logistic_regression"
    }

    fn capability(&self) -> ScoringCapability {
        ScoringCapability::ProbabilityScorer
    }

    fn n_features_in(&self) -> Option<usize> {
        self.coef.first().map(Vec::len)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scores = linear_scores(self.kind(), &self.coef, &self.intercept, x)?;
        if scores.ncols() == 1 {
            Ok(scores.column(0).mapv(sigmoid))
        } else {
            Ok(softmax_positive(&scores))
        }
    }

    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.coef.len() != 1 {
            return Err(KolosalError::InferenceError(
                "decision scores of a multinomial model are not a single column".to_string(),
            ));
        }
        let scores = linear_scores(self.kind(), &self.coef, &self.intercept, x)?;
        Ok(scores.column(0).to_owned())
    }

    fn coefficients(&self) -> Option<Array2<f64>> {
        matrix_from_rows(&self.coef).ok()
    }

    fn inner_estimator(&self) -> &dyn Estimator {
        self
    }
}

/// Fitted linear support vector classifier (decision scores only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSvc {
    pub coef: Vec<Vec<f64>>,
    pub intercept: Vec<f64>,
}

impl LinearSvc {
    pub fn new(coef: Vec<Vec<f64>>, intercept: Vec<f64>) -> Self {
        Self { coef, intercept }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        validate_linear(self.kind(), &self.coef, &self.intercept)
    }
}

impl Estimator for LinearSvc {
    fn kind(&self) -> &'static str {
        "linear_svc"
    }

    fn capability(&self) -> ScoringCapability {
        ScoringCapability::DecisionScorer
    }

    fn n_features_in(&self) -> Option<usize> {
        self.coef.first().map(Vec::len)
    }

    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scores = linear_scores(self.kind(), &self.coef, &self.intercept, x)?;
        if scores.ncols() != 1 {
            return Err(KolosalError::InferenceError(format!(
                "expected one decision column, got {}",
                scores.ncols()
            )));
        }
        Ok(scores.column(0).to_owned())
    }

    fn coefficients(&self) -> Option<Array2<f64>> {
        matrix_from_rows(&self.coef).ok()
    }

    fn inner_estimator(&self) -> &dyn Estimator {
        self
    }
}

/// Fitted linear regression. Produces neither probabilities nor decision
/// scores, so it cannot score churn, but its coefficients still rank features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    /// One-dimensional coefficient vector
    pub coef: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
}

impl LinearRegression {
    pub fn new(coef: Vec<f64>, intercept: f64) -> Self {
        Self { coef, intercept }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.coef.is_empty() {
            return Err(KolosalError::InvalidInput(format!("{} has no coefficients", self.kind())));
        }
        Ok(())
    }
}

impl Estimator for LinearRegression {
    fn kind(&self) -> &'static str {
        "linear_regression"
    }

    fn capability(&self) -> ScoringCapability {
        ScoringCapability::Unsupported
    }

    fn n_features_in(&self) -> Option<usize> {
        Some(self.coef.len())
    }

    // 1-D coefficients are treated as a single row
    fn coefficients(&self) -> Option<Array2<f64>> {
        Array2::from_shape_vec((1, self.coef.len()), self.coef.clone()).ok()
    }

    fn inner_estimator(&self) -> &dyn Estimator {
        self
    }
}
