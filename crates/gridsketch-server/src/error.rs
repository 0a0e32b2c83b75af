//! Error types and their HTTP mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gridsketch_core::{DocumentError, StorageError};
use serde_json::json;
use thiserror::Error;

/// A failed request, rendered as `{error, details}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{error}: {details}")]
    BadRequest { error: String, details: String },
    #[error("{error}: {details}")]
    NotFound { error: String, details: String },
    #[error("{error}: {details}")]
    Internal { error: String, details: String },
}

impl ApiError {
    pub fn bad_request(error: impl Into<String>, details: impl ToString) -> Self {
        ApiError::BadRequest {
            error: error.into(),
            details: details.to_string(),
        }
    }

    pub fn internal(error: impl Into<String>, details: impl ToString) -> Self {
        ApiError::Internal {
            error: error.into(),
            details: details.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DocumentError> for ApiError {
    fn from(err: DocumentError) -> Self {
        match &err {
            DocumentError::Parse(_) | DocumentError::Validation(_) => ApiError::bad_request("Invalid document", &err),
            DocumentError::UnknownAction(_) => ApiError::bad_request("Unknown action", &err),
            DocumentError::EntityNotFound(id) => ApiError::NotFound {
                error: "Entity not found".to_string(),
                details: id.clone(),
            },
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match &err {
            StorageError::NotFound(id) => ApiError::NotFound {
                error: "File not found".to_string(),
                details: id.clone(),
            },
            StorageError::Serialization(_) => ApiError::internal("Failed to load file", &err),
            StorageError::Io(_) | StorageError::Other(_) => ApiError::internal("Storage failure", &err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{self}");
        } else {
            tracing::warn!("{self}");
        }
        let (ApiError::BadRequest { error, details }
        | ApiError::NotFound { error, details }
        | ApiError::Internal { error, details }) = self;
        (status, Json(json!({ "error": error, "details": details }))).into_response()
    }
}

/// Failures while starting the server.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
