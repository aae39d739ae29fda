//! Model explainability module
//!
//! Two rankings of which features drive churn predictions:
//! - Built-in importance read straight from the model (tree importances or
//!   absolute linear coefficients)
//! - Permutation importance measured against ground-truth labels

mod builtin;
mod metrics;
mod permutation;

pub use builtin::{builtin_importance, FeatureImportance, ImportanceRanking};
pub use metrics::{accuracy_score, f1_score, roc_auc_score, Scoring};
pub use permutation::{
    permutation_importance, permutation_importance_detailed, ImportanceResult,
    PermutationImportance, DEFAULT_SEED,
};
