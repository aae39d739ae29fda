//! Error types for the server

use crate::error::KolosalError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Pipeline(#[from] KolosalError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Pipeline(e) => match e {
                KolosalError::MissingData { .. }
                | KolosalError::NoArtifacts { .. }
                | KolosalError::MissingSchema { .. } => StatusCode::NOT_FOUND,
                KolosalError::InvalidParameter { .. } | KolosalError::InvalidInput(_) => {
                    StatusCode::BAD_REQUEST
                }
                KolosalError::UnsupportedModel { .. }
                | KolosalError::PermutationUnavailable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(detail = %self, "Request failed");
        }

        let body = Json(json!({
            "error": true,
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_status_mapping() {
        let not_found: ServerError = KolosalError::NoArtifacts {
            dir: PathBuf::from("models"),
            hidden: vec!["best_".to_string()],
        }
        .into();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let bad: ServerError = KolosalError::InvalidParameter {
            name: "threshold".to_string(),
            value: "2".to_string(),
            reason: "must be within [0, 1]".to_string(),
        }
        .into();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let unsupported: ServerError = KolosalError::UnsupportedModel {
            artifact: PathBuf::from("models/LinReg.model"),
        }
        .into();
        assert_eq!(unsupported.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let failed: ServerError = KolosalError::prediction_failure("m.model", "boom").into();
        assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
