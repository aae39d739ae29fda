//! Data loading utilities

use crate::error::{KolosalError, Result};
use polars::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// CSV loader for customer snapshots
#[derive(Debug, Clone, Copy, Default)]
pub struct DataLoader;

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self
    }

    /// Load a CSV file with a header row and whitespace-trimmed column names.
    ///
    /// Column types are inferred from every row, so a late float or junk cell
    /// widens the column instead of failing the read; the aligner coerces
    /// what is left. A missing file or a file without rows is `MissingData`.
    pub fn load_csv(&self, path: &Path) -> Result<DataFrame> {
        if !path.is_file() {
            return Err(KolosalError::MissingData {
                path: path.to_path_buf(),
            });
        }

        let mut df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(None)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()
            .map_err(|e| KolosalError::DataError(format!("{}: {}", path.display(), e)))?;

        if df.height() == 0 || df.width() == 0 {
            return Err(KolosalError::MissingData {
                path: path.to_path_buf(),
            });
        }

        trim_column_names(&mut df)?;
        info!(
            path = %path.display(),
            rows = df.height(),
            cols = df.width(),
            "Loaded customer table"
        );
        Ok(df)
    }
}

/// Strip surrounding whitespace from every column name
pub fn trim_column_names(df: &mut DataFrame) -> Result<()> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.trim().to_string())
        .collect();

    let changed = df
        .get_column_names()
        .iter()
        .zip(names.iter())
        .any(|(old, new)| old.as_str() != new.as_str());

    if changed {
        debug!("Trimming whitespace from column names");
        df.set_column_names(names)
            .map_err(|e| KolosalError::DataError(format!("column names after trimming: {}", e)))?;
    }
    Ok(())
}
