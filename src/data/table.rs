//! Customer table: the input snapshot with its special columns identified

use crate::error::{KolosalError, Result};
use ndarray::Array1;
use polars::prelude::*;
use tracing::debug;

/// Ground-truth churn label column
pub const TARGET_COLUMN: &str = "is_churned";
/// Accepted spellings of the customer id column
pub const ID_COLUMN_CANDIDATES: [&str; 2] = ["CustomerID", "Customer ID"];

/// An input table plus the columns the pipeline treats specially
#[derive(Debug, Clone)]
pub struct CustomerTable {
    frame: DataFrame,
    id_column: Option<String>,
    labels: Option<Array1<f64>>,
}

impl CustomerTable {
    /// Wrap a loaded frame, detecting the id column and extracting labels
    pub fn new(frame: DataFrame) -> Result<Self> {
        let id_column = ID_COLUMN_CANDIDATES
            .iter()
            .find(|name| has_column(&frame, name))
            .map(|name| name.to_string());

        let labels = if has_column(&frame, TARGET_COLUMN) {
            Some(extract_labels(&frame, TARGET_COLUMN)?)
        } else {
            None
        };

        debug!(
            id_column = ?id_column,
            has_labels = labels.is_some(),
            "Identified special columns"
        );

        Ok(Self {
            frame,
            id_column,
            labels,
        })
    }

    /// The full, unfiltered table
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Number of customer rows
    pub fn height(&self) -> usize {
        self.frame.height()
    }

    /// Name of the detected id column
    pub fn id_column(&self) -> Option<&str> {
        self.id_column.as_deref()
    }

    /// Integer churn labels (as f64), if the table carries ground truth
    pub fn labels(&self) -> Option<&Array1<f64>> {
        self.labels.as_ref()
    }

    /// The table without the label and id columns, i.e. the candidate features
    pub fn feature_frame(&self) -> Result<DataFrame> {
        let keep: Vec<String> = self
            .frame
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .filter(|name| name != TARGET_COLUMN && !ID_COLUMN_CANDIDATES.contains(&name.as_str()))
            .collect();

        Ok(self.frame.select(keep)?)
    }

    /// Distinct customers: unique ids when an id column exists, else rows
    pub fn customer_count(&self) -> Result<usize> {
        match &self.id_column {
            Some(name) => Ok(self.frame.column(name)?.as_materialized_series().n_unique()?),
            None => Ok(self.frame.height()),
        }
    }

    /// Customer id of each row rendered as text
    pub fn customer_ids(&self) -> Result<Option<Vec<Option<String>>>> {
        let Some(name) = &self.id_column else {
            return Ok(None);
        };
        let series = self
            .frame
            .column(name)?
            .as_materialized_series()
            .cast(&DataType::String)?;
        let ids = series
            .str()?
            .into_iter()
            .map(|v| v.map(|s| s.to_string()))
            .collect();
        Ok(Some(ids))
    }

    /// Numeric view of a column (nulls and unparseable cells are `None`)
    pub fn numeric_column(&self, name: &str) -> Result<Option<Vec<Option<f64>>>> {
        if !has_column(&self.frame, name) {
            return Ok(None);
        }
        Ok(Some(column_as_f64(&self.frame, name)?))
    }
}

fn has_column(frame: &DataFrame, name: &str) -> bool {
    frame.get_column_names().iter().any(|c| c.as_str() == name)
}

/// Cast a column to Float64 without failing on bad cells
pub(crate) fn column_as_f64(frame: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = frame
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    let values = series.f64()?.into_iter().collect();
    Ok(values)
}

/// Coerce the label column to integers: unparseable or missing become 0,
/// fractional values are truncated.
fn extract_labels(frame: &DataFrame, name: &str) -> Result<Array1<f64>> {
    let raw = column_as_f64(frame, name).map_err(|e| {
        KolosalError::DataError(format!("label column '{}': {}", name, e))
    })?;
    Ok(raw
        .into_iter()
        .map(|v| match v {
            Some(x) if x.is_finite() => x.trunc(),
            _ => 0.0,
        })
        .collect())
}
