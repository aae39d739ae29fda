//! Data preprocessing module
//!
//! Reconciles an arbitrary input table with the ordered feature schema a
//! model was trained on.

mod align;

pub use align::{align, AlignedMatrix, AlignmentReport, MISSING_FEATURE_FILL};
