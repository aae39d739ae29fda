//! Churn scoring on aligned feature matrices

use crate::error::{KolosalError, Result};
use crate::models::{sigmoid, Estimator, ModelArtifact, ScoringCapability};
use crate::preprocessing::AlignedMatrix;
use ndarray::{Array1, Array2};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// A deserialized artifact together with its fixed scoring capability
#[derive(Debug, Clone)]
pub struct LoadedModel {
    path: PathBuf,
    artifact: ModelArtifact,
    capability: ScoringCapability,
}

impl LoadedModel {
    /// Wrap an artifact that was loaded from `path`
    pub fn new(path: impl Into<PathBuf>, artifact: ModelArtifact) -> Self {
        let capability = artifact.capability();
        Self {
            path: path.into(),
            artifact,
            capability,
        }
    }

    /// Read and validate an artifact file
    pub fn load(path: &Path) -> Result<Self> {
        let artifact = ModelArtifact::load(path)?;
        let model = Self::new(path, artifact);
        info!(
            path = %path.display(),
            kind = model.artifact.kind(),
            capability = %model.capability,
            "Model loaded"
        );
        Ok(model)
    }

    /// Artifact path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Model name (artifact file stem)
    pub fn name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn capability(&self) -> ScoringCapability {
        self.capability
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    pub fn estimator(&self) -> &dyn Estimator {
        self.artifact.as_estimator()
    }

    /// Churn probability for every row of `x`
    pub fn score_matrix(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scores = match self.capability {
            ScoringCapability::ProbabilityScorer => self
                .artifact
                .predict_proba(x)
                .map_err(|e| KolosalError::prediction_failure(&self.path, e))?,
            ScoringCapability::DecisionScorer => self
                .artifact
                .decision_function(x)
                .map_err(|e| KolosalError::prediction_failure(&self.path, e))?
                .mapv(sigmoid),
            ScoringCapability::Unsupported => {
                return Err(KolosalError::UnsupportedModel {
                    artifact: self.path.clone(),
                })
            }
        };

        if scores.len() != x.nrows() {
            return Err(KolosalError::prediction_failure(
                &self.path,
                format!("expected {} scores, got {}", x.nrows(), scores.len()),
            ));
        }
        Ok(scores)
    }

    /// Class predictions: probability above 0.5, or positive decision score
    pub fn predict_labels(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let labels = match self.capability {
            ScoringCapability::ProbabilityScorer => self
                .score_matrix(x)?
                .mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }),
            ScoringCapability::DecisionScorer => self
                .artifact
                .decision_function(x)
                .map_err(|e| KolosalError::prediction_failure(&self.path, e))?
                .mapv(|s| if s > 0.0 { 1.0 } else { 0.0 }),
            ScoringCapability::Unsupported => {
                return Err(KolosalError::UnsupportedModel {
                    artifact: self.path.clone(),
                })
            }
        };
        Ok(labels)
    }

    /// Scores for ranking metrics: probability when available, else the raw
    /// decision score
    pub fn ranking_scores(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self.capability {
            ScoringCapability::DecisionScorer => self
                .artifact
                .decision_function(x)
                .map_err(|e| KolosalError::prediction_failure(&self.path, e)),
            _ => self.score_matrix(x),
        }
    }
}

/// Churn probability for each aligned row. All-or-nothing per batch.
pub fn score(model: &LoadedModel, aligned: &AlignedMatrix) -> Result<Array1<f64>> {
    let start = Instant::now();
    let probabilities = model.score_matrix(aligned.values())?;
    debug!(
        model = %model.name(),
        rows = aligned.nrows(),
        latency_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Scored batch"
    );
    Ok(probabilities)
}

/// `1` when the probability reaches the threshold, else `0`
pub fn classify(probabilities: &Array1<f64>, threshold: f64) -> Result<Array1<i32>> {
    crate::config::validate_threshold(threshold)?;
    Ok(probabilities.mapv(|p| i32::from(p >= threshold)))
}
