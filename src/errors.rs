use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::services::dataset::DatasetError;
use crate::services::model::ModelError;
use crate::services::quota::QuotaError;
use crate::services::sources::SourceError;
use crate::store::files::StoreError;

/// Standard error response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Quota error: {0}")]
    Quota(#[from] QuotaError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::ExternalServiceError(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            AppError::InternalError(msg) | AppError::Config(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            AppError::Store(StoreError::Missing(path)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("{} has not been produced yet", path.display()),
            ),
            AppError::Store(err) => {
                tracing::error!("Storage error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal storage error".to_string(),
                )
            }
            AppError::Dataset(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            AppError::Model(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            AppError::Quota(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        };

        (status, axum::Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<SourceError> for AppError {
    fn from(err: SourceError) -> Self {
        AppError::ExternalServiceError(err.to_string())
    }
}
