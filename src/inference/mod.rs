//! Inference module
//!
//! Turns an aligned feature matrix into churn probabilities and labels:
//! - Probability scorers return the positive-class probability directly
//! - Decision scorers are mapped through the logistic function
//! - Anything else is rejected as unsupported

mod predictor;

pub use predictor::{classify, score, LoadedModel};
