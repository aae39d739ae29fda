//! HTTP request handlers

use axum::{extract::State, Json};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::artifacts;
use crate::dashboard::{DashboardReport, Selection};

use super::error::{Result, ServerError};
use super::state::AppState;

/// One entry of `GET /api/models`
#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub name: String,
    pub path: PathBuf,
    /// Where the feature schema was found; `None` when it is missing
    pub schema_source: Option<String>,
    pub n_features: Option<usize>,
    /// Set when the schema file exists but cannot be read
    pub schema_error: Option<String>,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let (tables, models) = state.session.cache_stats();
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "cache": { "tables": tables, "models": models },
    }))
}

pub async fn list_models(State(state): State<Arc<AppState>>) -> Result<Json<Vec<ModelSummary>>> {
    let entries = state.session.available_models()?;
    let models_dir = &state.session.config().models_dir;

    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        let (schema, schema_error) = match artifacts::resolve_schema(&entry.path, models_dir) {
            Ok(schema) => (schema, None),
            Err(e) => {
                warn!(model = %entry.name, error = %e, "Unreadable feature schema");
                (None, Some(e.to_string()))
            }
        };
        out.push(ModelSummary {
            schema_source: schema.as_ref().map(|s| s.source.to_string()),
            n_features: schema.as_ref().map(|s| s.features.len()),
            schema_error,
            name: entry.name,
            path: entry.path,
        });
    }
    Ok(Json(out))
}

/// Run one dashboard pass. Scoring is CPU bound, so it runs on the blocking pool.
pub async fn score(
    State(state): State<Arc<AppState>>,
    Json(selection): Json<Selection>,
) -> Result<Json<DashboardReport>> {
    info!(model = ?selection.model, threshold = ?selection.threshold, "Score request");
    let report = tokio::task::spawn_blocking(move || state.session.run(&selection))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))??;
    Ok(Json(report))
}
