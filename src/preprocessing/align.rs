//! Feature alignment
//!
//! Projects an input table onto a model's feature schema: same rows, exactly
//! the schema columns in schema order. Absent features are synthesized with
//! [`MISSING_FEATURE_FILL`], unexpected columns are dropped. Alignment never
//! fails; drift is reported through [`AlignmentReport`] instead.

use crate::data::column_as_f64;
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Value used for absent features and for cells that are not numeric.
/// Churn features are non-negative counts and recencies, so zero is the
/// least informative choice.
pub const MISSING_FEATURE_FILL: f64 = 0.0;

/// What alignment had to paper over
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignmentReport {
    /// Schema features absent from the input (filled with zeros)
    pub missing: Vec<String>,
    /// Input columns not in the schema (discarded)
    pub dropped: Vec<String>,
    /// Present cells that were null or not numeric (filled with zeros)
    pub coerced_cells: usize,
}

impl AlignmentReport {
    /// True when the input matched the schema exactly
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.coerced_cells == 0
    }
}

/// Feature matrix whose columns are exactly the schema, in order
#[derive(Debug, Clone)]
pub struct AlignedMatrix {
    feature_names: Vec<String>,
    values: Array2<f64>,
    report: AlignmentReport,
}

impl AlignedMatrix {
    /// Build directly from values (mostly useful in tests)
    pub fn from_parts(feature_names: Vec<String>, values: Array2<f64>) -> Self {
        Self {
            feature_names,
            values,
            report: AlignmentReport::default(),
        }
    }

    /// Column names, identical to the schema
    pub fn columns(&self) -> &[String] {
        &self.feature_names
    }

    /// Row-major feature values
    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Number of rows
    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    /// Number of features
    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    /// Values of a single feature
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.feature_names.iter().position(|f| f == name)?;
        Some(self.values.column(idx).to_vec())
    }

    /// Drift observed while aligning
    pub fn report(&self) -> &AlignmentReport {
        &self.report
    }
}

/// Align `table` to `features`. Deterministic and side-effect free.
pub fn align(table: &DataFrame, features: &[String]) -> AlignedMatrix {
    let n_rows = table.height();
    let present: HashSet<String> = table
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    let expected: HashSet<&str> = features.iter().map(String::as_str).collect();

    let mut report = AlignmentReport {
        dropped: table
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .filter(|c| !expected.contains(c.as_str()))
            .collect(),
        ..Default::default()
    };

    let col_data: Vec<Vec<f64>> = features
        .iter()
        .map(|name| {
            if !present.contains(name) {
                report.missing.push(name.clone());
                return vec![MISSING_FEATURE_FILL; n_rows];
            }
            match column_as_f64(table, name) {
                Ok(values) => values
                    .into_iter()
                    .map(|v| match v {
                        Some(x) if x.is_finite() => x,
                        _ => {
                            report.coerced_cells += 1;
                            MISSING_FEATURE_FILL
                        }
                    })
                    .collect(),
                Err(e) => {
                    warn!(feature = %name, error = %e, "Column is not numeric, filling with zeros");
                    report.coerced_cells += n_rows;
                    vec![MISSING_FEATURE_FILL; n_rows]
                }
            }
        })
        .collect();

    let col_refs: Vec<&[f64]> = col_data.iter().map(|c| c.as_slice()).collect();
    let values = Array2::from_shape_fn((n_rows, features.len()), |(r, c)| col_refs[c][r]);

    if !report.missing.is_empty() {
        warn!(
            missing = ?report.missing,
            expected = features.len(),
            "Input is missing schema features; filled with zeros"
        );
    }
    if report.coerced_cells > 0 {
        warn!(cells = report.coerced_cells, "Non-numeric or null cells filled with zeros");
    }
    debug!(
        rows = n_rows,
        features = features.len(),
        dropped = report.dropped.len(),
        "Aligned input to feature schema"
    );

    AlignedMatrix {
        feature_names: features.to_vec(),
        values,
        report,
    }
}
