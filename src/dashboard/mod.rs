//! Churn dashboard pipeline
//!
//! A [`DashboardSession`] wires the building blocks together for one user
//! interaction: load the customer table, pick a visible artifact, resolve its
//! feature schema, align, score, threshold and rank features. The result is a
//! [`DashboardReport`] that the CLI prints and the HTTP API serializes.

mod report;
mod session;

pub use report::{
    AtRiskList, DashboardReport, PermutationOutcome, PredictionSummary, ProbabilityHistogram,
    RiskRow, DISPLAY_COLUMNS, HISTOGRAM_BINS, PREDICTION_COLUMN, PROBABILITY_COLUMN,
};
pub use session::{DashboardSession, Selection};
