//! Kolosal Churn - customer churn scoring dashboard core
//!
//! Loads a pre-trained binary classifier from a folder of model artifacts,
//! aligns a customer snapshot to the feature schema the model was trained
//! on, scores churn probabilities, applies a threshold and ranks features by
//! importance.
//!
//! # Modules
//!
//! ## Pipeline
//! - [`artifacts`] - Model discovery and feature schema resolution
//! - [`data`] - CSV loading and the customer table
//! - [`preprocessing`] - Feature alignment to a schema
//! - [`models`] - Serialized estimators and their scoring capability
//! - [`inference`] - Churn probabilities and thresholding
//! - [`explainability`] - Built-in and permutation feature importance
//! - [`dashboard`] - One full pass, from table to report
//!
//! ## Infrastructure
//! - [`cache`] - Read-through LRU cache for tables and models
//! - [`config`] - Dashboard configuration
//!
//! ## Services
//! - [`server`] - JSON API
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Pipeline
pub mod artifacts;
pub mod data;
pub mod preprocessing;
pub mod models;
pub mod inference;
pub mod explainability;
pub mod dashboard;

// Infrastructure
pub mod cache;

// Services
pub mod server;
pub mod cli;

/// Prelude for convenient imports
pub mod prelude {
    // Error handling
    pub use crate::error::{KolosalError, Result};

    // Configuration
    pub use crate::config::{DashboardConfig, PermutationConfig};

    // Artifacts and data
    pub use crate::artifacts::{ArtifactEntry, ResolvedSchema, SchemaSource};
    pub use crate::data::{CustomerTable, DataLoader};

    // Alignment and scoring
    pub use crate::preprocessing::{align, AlignedMatrix, AlignmentReport};
    pub use crate::models::{Estimator, ModelArtifact, ScoringCapability};
    pub use crate::inference::{classify, score, LoadedModel};

    // Explainability
    pub use crate::explainability::{
        builtin_importance, permutation_importance, ImportanceRanking, PermutationImportance, Scoring,
    };

    // Dashboard
    pub use crate::dashboard::{DashboardReport, DashboardSession, Selection};
}
