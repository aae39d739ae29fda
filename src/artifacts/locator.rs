//! Artifact locator

use crate::error::{KolosalError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Extension of serialized model artifacts
pub const ARTIFACT_EXTENSION: &str = "model";
/// Suffix replacing the artifact extension for per-model schemas
pub const SCHEMA_SUFFIX: &str = "features.json";
/// Directory-wide fallback schema file
pub const DIRECTORY_SCHEMA_FILE: &str = "model_features.json";

/// A selectable model artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    /// File stem, used as the model name
    pub name: String,
    /// Full path to the artifact
    pub path: PathBuf,
}

impl ArtifactEntry {
    fn from_path(path: PathBuf) -> Self {
        Self {
            name: artifact_stem(&path),
            path,
        }
    }
}

/// Where a feature schema was read from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum SchemaSource {
    /// `<model>.features.json` next to the artifact
    PerModel(PathBuf),
    /// `model_features.json` shared by the whole folder
    Directory(PathBuf),
}

impl SchemaSource {
    /// Path of the schema file
    pub fn path(&self) -> &Path {
        match self {
            SchemaSource::PerModel(p) | SchemaSource::Directory(p) => p,
        }
    }
}

impl fmt::Display for SchemaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaSource::PerModel(p) => write!(f, "per-model schema {}", p.display()),
            SchemaSource::Directory(p) => write!(f, "directory schema {}", p.display()),
        }
    }
}

/// Ordered feature list together with its origin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSchema {
    pub features: Vec<String>,
    pub source: SchemaSource,
}

fn artifact_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// List every `*.model` file in `dir`, sorted by file name.
///
/// A missing directory yields an empty list; callers report emptiness.
pub fn list_artifacts(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "Models directory does not exist");
        return Ok(Vec::new());
    }

    let mut artifacts = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file()
            && path.extension().and_then(|e| e.to_str()) == Some(ARTIFACT_EXTENSION)
        {
            artifacts.push(path);
        }
    }

    artifacts.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(artifacts)
}

/// Drop artifacts whose name starts with any hidden prefix (case-insensitive)
pub fn filter_visible<S: AsRef<str>>(artifacts: &[PathBuf], hidden_prefixes: &[S]) -> Vec<PathBuf> {
    let prefixes: Vec<String> = hidden_prefixes
        .iter()
        .map(|p| p.as_ref().to_lowercase())
        .collect();

    artifacts
        .iter()
        .filter(|path| {
            let stem = artifact_stem(path).to_lowercase();
            !prefixes.iter().any(|p| stem.starts_with(p.as_str()))
        })
        .cloned()
        .collect()
}

/// List and filter in one go; an empty selection is `NoArtifacts`
pub fn discover<S: AsRef<str>>(dir: &Path, hidden_prefixes: &[S]) -> Result<Vec<ArtifactEntry>> {
    let all = list_artifacts(dir)?;
    let visible = filter_visible(&all, hidden_prefixes);
    info!(
        dir = %dir.display(),
        total = all.len(),
        visible = visible.len(),
        "Discovered model artifacts"
    );

    if visible.is_empty() {
        return Err(KolosalError::NoArtifacts {
            dir: dir.to_path_buf(),
            hidden: hidden_prefixes.iter().map(|p| p.as_ref().to_string()).collect(),
        });
    }

    Ok(visible.into_iter().map(ArtifactEntry::from_path).collect())
}

/// `models/RandomForest.model` -> `models/RandomForest.features.json`
pub fn per_model_schema_path(artifact_path: &Path) -> PathBuf {
    artifact_path.with_extension(SCHEMA_SUFFIX)
}

/// Read a JSON array of unique feature names
pub fn read_schema(path: &Path) -> Result<Vec<String>> {
    let json = std::fs::read_to_string(path)?;
    let features: Vec<String> = serde_json::from_str(&json).map_err(|e| {
        KolosalError::SerializationError(format!("{}: {}", path.display(), e))
    })?;

    let mut seen = HashSet::with_capacity(features.len());
    if let Some(dup) = features.iter().find(|f| !seen.insert(f.as_str())) {
        return Err(KolosalError::InvalidInput(format!(
            "duplicate feature '{}' in schema {}",
            dup,
            path.display()
        )));
    }

    Ok(features)
}

/// Resolve the schema for an artifact: per-model file first, then the
/// directory-wide file. `Ok(None)` when neither exists.
pub fn resolve_schema(artifact_path: &Path, dir: &Path) -> Result<Option<ResolvedSchema>> {
    let per_model = per_model_schema_path(artifact_path);
    if per_model.is_file() {
        let features = read_schema(&per_model)?;
        return Ok(Some(ResolvedSchema {
            features,
            source: SchemaSource::PerModel(per_model),
        }));
    }

    let global = dir.join(DIRECTORY_SCHEMA_FILE);
    if global.is_file() {
        let features = read_schema(&global)?;
        return Ok(Some(ResolvedSchema {
            features,
            source: SchemaSource::Directory(global),
        }));
    }

    Ok(None)
}
