//! Composite artifacts: fitted scalers followed by a final estimator

use super::{check_n_features, Estimator, ModelArtifact, ScoringCapability};
use crate::error::{KolosalError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Conventional name of the wrapped estimator step
pub const MODEL_STEP: &str = "model";

fn check_params(kind: &str, a: &[f64], b: &[f64]) -> Result<()> {
    if a.is_empty() || a.len() != b.len() {
        return Err(KolosalError::ShapeError {
            expected: format!("{} parameters of equal, non-zero length", kind),
            actual: format!("{} and {}", a.len(), b.len()),
        });
    }
    Ok(())
}

/// `(x - mean) / scale`; a zero scale leaves the column centered only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        check_n_features("standard_scaler", self.mean.len(), x)?;
        let mut out = x.clone();
        for (j, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
            let center = self.mean[j];
            let scale = if self.scale[j] == 0.0 { 1.0 } else { self.scale[j] };
            col.mapv_inplace(|v| (v - center) / scale);
        }
        Ok(out)
    }
}

/// `x * scale + min`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinMaxScaler {
    pub min: Vec<f64>,
    pub scale: Vec<f64>,
}

impl MinMaxScaler {
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        check_n_features("min_max_scaler", self.min.len(), x)?;
        let mut out = x.clone();
        for (j, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (offset, scale) = (self.min[j], self.scale[j]);
            col.mapv_inplace(|v| v * scale + offset);
        }
        Ok(out)
    }
}

/// One pipeline stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    StandardScaler(StandardScaler),
    MinMaxScaler(MinMaxScaler),
    Estimator { estimator: Box<ModelArtifact> },
}

/// Named pipeline stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStep {
    pub name: String,
    pub step: Step,
}

/// Ordered transforms ending in an estimator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub steps: Vec<PipelineStep>,
}

impl Pipeline {
    /// Scale with `scaler`, then score with `estimator` under [`MODEL_STEP`]
    pub fn scaled(scaler: StandardScaler, estimator: ModelArtifact) -> Self {
        Self {
            steps: vec![
                PipelineStep {
                    name: "scaler".to_string(),
                    step: Step::StandardScaler(scaler),
                },
                PipelineStep {
                    name: MODEL_STEP.to_string(),
                    step: Step::Estimator {
                        estimator: Box::new(estimator),
                    },
                },
            ],
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let Some((last, transforms)) = self.steps.split_last() else {
            return Err(KolosalError::InvalidInput("pipeline has no steps".to_string()));
        };

        for named in transforms {
            match &named.step {
                Step::StandardScaler(s) => check_params("standard_scaler", &s.mean, &s.scale)?,
                Step::MinMaxScaler(s) => check_params("min_max_scaler", &s.min, &s.scale)?,
                Step::Estimator { .. } => {
                    return Err(KolosalError::InvalidInput(format!(
                        "pipeline step '{}' is an estimator but is not last",
                        named.name
                    )))
                }
            }
        }

        match &last.step {
            Step::Estimator { estimator } => estimator.validate(),
            _ => Err(KolosalError::InvalidInput(
                "pipeline must end with an estimator".to_string(),
            )),
        }
    }

    fn final_estimator(&self) -> Option<&ModelArtifact> {
        match self.steps.last().map(|s| &s.step) {
            Some(Step::Estimator { estimator }) => Some(estimator.as_ref()),
            _ => None,
        }
    }

    fn final_estimator_or_err(&self) -> Result<&ModelArtifact> {
        self.final_estimator()
            .ok_or_else(|| KolosalError::InferenceError("pipeline has no final estimator".to_string()))
    }

    /// Apply every transform step in order
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let mut out = x.clone();
        for named in &self.steps {
            out = match &named.step {
                Step::StandardScaler(s) => s.transform(&out)?,
                Step::MinMaxScaler(s) => s.transform(&out)?,
                Step::Estimator { .. } => break,
            };
        }
        Ok(out)
    }
}

impl Estimator for Pipeline {
    fn kind(&self) -> &'static str {
        "pipeline"
    }

    fn capability(&self) -> ScoringCapability {
        self.final_estimator()
            .map(|e| e.capability())
            .unwrap_or(ScoringCapability::Unsupported)
    }

    fn n_features_in(&self) -> Option<usize> {
        match &self.steps.first()?.step {
            Step::StandardScaler(s) => Some(s.mean.len()),
            Step::MinMaxScaler(s) => Some(s.min.len()),
            Step::Estimator { estimator } => estimator.n_features_in(),
        }
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let estimator = self.final_estimator_or_err()?;
        estimator.predict_proba(&self.transform(x)?)
    }

    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let estimator = self.final_estimator_or_err()?;
        estimator.decision_function(&self.transform(x)?)
    }

    /// The step named [`MODEL_STEP`] when it is an estimator, else the
    /// pipeline itself (which exposes no importances)
    fn inner_estimator(&self) -> &dyn Estimator {
        self.steps
            .iter()
            .find_map(|named| match &named.step {
                Step::Estimator { estimator } if named.name == MODEL_STEP => {
                    Some(estimator.as_estimator())
                }
                _ => None,
            })
            .unwrap_or(self as &dyn Estimator)
    }
}
