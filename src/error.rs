//! Error types for the Kolosal churn pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for churn pipeline operations
pub type Result<T> = std::result::Result<T, KolosalError>;

/// Main error type for the churn pipeline.
///
/// The first block of variants is the pipeline taxonomy: each one is terminal
/// for the current interaction and names the offending path together with the
/// manual remediation. The remaining variants are the general-purpose errors
/// raised by the building blocks underneath.
#[derive(Error, Debug)]
pub enum KolosalError {
    #[error("Dataset not found or empty: {path}")]
    MissingData { path: PathBuf },

    #[error("No models available in {dir} (hidden prefixes: {hidden:?}). Put e.g. LogReg.model or RandomForest.model in the folder")]
    NoArtifacts { dir: PathBuf, hidden: Vec<String> },

    #[error("Could not find feature schema for {artifact}. Generate one of: 1) {per_model} 2) {directory}")]
    MissingSchema {
        artifact: PathBuf,
        per_model: PathBuf,
        directory: PathBuf,
    },

    #[error("Failed to load model {path}: {reason}")]
    ArtifactLoadFailure { path: PathBuf, reason: String },

    #[error("Selected model {artifact} has no probability or decision scoring capability")]
    UnsupportedModel { artifact: PathBuf },

    #[error("Prediction failed for model {artifact}: {reason}")]
    PredictionFailure { artifact: PathBuf, reason: String },

    #[error("Permutation importance needs ground truth: dataset has no '{label_column}' column")]
    PermutationUnavailable { label_column: String },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Inference error: {0}")]
    InferenceError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl KolosalError {
    /// Wrap any failure raised while scoring with the artifact that produced it
    pub fn prediction_failure(artifact: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        KolosalError::PredictionFailure {
            artifact: artifact.into(),
            reason: err.to_string(),
        }
    }
}

impl From<polars::error::PolarsError> for KolosalError {
    fn from(err: polars::error::PolarsError) -> Self {
        KolosalError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for KolosalError {
    fn from(err: serde_json::Error) -> Self {
        KolosalError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for KolosalError {
    fn from(err: ndarray::ShapeError) -> Self {
        KolosalError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
