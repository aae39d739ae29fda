//! Multi-layer perceptron classifier artifact
//!
//! Feedforward only: weights come from training elsewhere. The output layer
//! is a logistic unit when it has one neuron and a softmax otherwise.

use super::{check_n_features, matrix_from_rows, sigmoid, softmax_positive, Estimator, ScoringCapability};
use crate::error::{KolosalError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Hidden-layer activation function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// Rectified Linear Unit
    #[default]
    Relu,
    /// Logistic sigmoid
    Logistic,
    /// Hyperbolic tangent
    Tanh,
    /// Linear (identity)
    Identity,
}

impl Activation {
    fn apply(self, v: f64) -> f64 {
        match self {
            Activation::Relu => v.max(0.0),
            Activation::Logistic => sigmoid(v),
            Activation::Tanh => v.tanh(),
            Activation::Identity => v,
        }
    }
}

/// Dense layer; `weights` has one row per input and one column per output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f64>>,
    pub biases: Vec<f64>,
}

impl DenseLayer {
    fn n_inputs(&self) -> usize {
        self.weights.len()
    }

    fn n_outputs(&self) -> usize {
        self.biases.len()
    }

    fn forward(&self, input: &Array2<f64>) -> Result<Array2<f64>> {
        let w = matrix_from_rows(&self.weights)?;
        let b = Array1::from_vec(self.biases.clone());
        Ok(input.dot(&w) + &b)
    }
}

/// Fitted MLP classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlpClassifier {
    pub layers: Vec<DenseLayer>,
    #[serde(default)]
    pub activation: Activation,
}

impl MlpClassifier {
    pub fn new(layers: Vec<DenseLayer>, activation: Activation) -> Self {
        Self { layers, activation }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let Some(first) = self.layers.first() else {
            return Err(KolosalError::InvalidInput("MLP has no layers".to_string()));
        };
        if first.n_inputs() == 0 {
            return Err(KolosalError::InvalidInput("MLP input layer is empty".to_string()));
        }

        let mut width = first.n_inputs();
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.n_inputs() != width {
                return Err(KolosalError::ShapeError {
                    expected: format!("layer {} with {} inputs", i, width),
                    actual: format!("{} inputs", layer.n_inputs()),
                });
            }
            if layer.weights.iter().any(|row| row.len() != layer.n_outputs()) {
                return Err(KolosalError::ShapeError {
                    expected: format!("layer {} rows of {} weights", i, layer.n_outputs()),
                    actual: "ragged weight rows".to_string(),
                });
            }
            width = layer.n_outputs();
        }
        if width == 0 {
            return Err(KolosalError::InvalidInput("MLP output layer is empty".to_string()));
        }
        Ok(())
    }
}

impl Estimator for MlpClassifier {
    fn kind(&self) -> &'static str {
        "mlp_classifier"
    }

    fn capability(&self) -> ScoringCapability {
        ScoringCapability::ProbabilityScorer
    }

    fn n_features_in(&self) -> Option<usize> {
        self.layers.first().map(DenseLayer::n_inputs)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if let Some(n) = self.n_features_in() {
            check_n_features(self.kind(), n, x)?;
        }

        let last = self.layers.len().saturating_sub(1);
        let mut activations = x.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            activations = layer.forward(&activations)?;
            if i < last {
                let act = self.activation;
                activations.mapv_inplace(|v| act.apply(v));
            }
        }

        if activations.ncols() == 1 {
            Ok(activations.column(0).mapv(sigmoid))
        } else {
            Ok(softmax_positive(&activations))
        }
    }

    fn inner_estimator(&self) -> &dyn Estimator {
        self
    }
}
