use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// --- Domain/Infrastructure Errors ---

#[derive(Error, Debug)]
pub enum RepoError {
    #[error("Database backend error: {0}")]
    BackendError(#[from] anyhow::Error), // Wrap Anyhow errors from DB layer

    #[error("Stored document is malformed: {0}")]
    DataCorruption(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File upload failed: {0}")]
    UploadFailed(String),

    #[error("File not found with key: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    BackendError(#[from] anyhow::Error), // Wrap Anyhow errors from Storage layer
}

// --- Web Layer Error ---

#[derive(Error, Debug)]
pub enum AppError {
    // Input validation / request parsing errors
    #[error("{0}")]
    Validation(String),
    #[error("Invalid {kind} ID")]
    InvalidId {
        kind: &'static str,
        #[source]
        source: uuid::Error,
    },
    #[error("Error processing multipart form data: {0}")]
    MultipartError(#[from] axum::extract::multipart::MultipartError),
    #[error("Invalid request body: {0}")]
    JsonRejection(#[from] JsonRejection),

    // Identifier valid but no matching (owned) document
    #[error("{0}")]
    NotFound(String),

    // Storage not connected yet, or connecting failed
    #[error("Database is not available: {0}")]
    DatabaseUnavailable(String),

    // Storage failures with an operation-specific message for the caller
    #[error("{message}")]
    Internal {
        message: &'static str,
        #[source]
        source: anyhow::Error,
    },

    // Configuration / Startup errors
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Initialization error: {0}")]
    InitError(String),

    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    /// Wraps a storage failure into a 500 carrying `message` for the caller.
    ///
    /// Meant for `map_err`: `.map_err(AppError::internal("Failed to add comment"))`.
    pub fn internal<E>(message: &'static str) -> impl FnOnce(E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        move |err| AppError::Internal {
            message,
            source: err.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::InvalidId { .. }
            | AppError::MultipartError(_)
            | AppError::JsonRejection(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DatabaseUnavailable(_)
            | AppError::Internal { .. }
            | AppError::ConfigError(_)
            | AppError::InitError(_)
            | AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// --- Conversions from Domain Errors to AppError ---

impl From<crate::config::ConfigError> for AppError {
    fn from(err: crate::config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<aws_smithy_types::error::operation::BuildError> for AppError {
    fn from(err: aws_smithy_types::error::operation::BuildError) -> Self {
        AppError::InitError(format!("Failed to build AWS request: {}", err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

/// JSON error body shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

// --- Axum Response Implementation ---

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error, details) = match &self {
            // 4xx Client Errors
            AppError::Validation(msg) | AppError::NotFound(msg) => (msg.clone(), None),
            AppError::InvalidId { source, .. } => (self.to_string(), Some(source.to_string())),
            AppError::MultipartError(e) => ("Invalid multipart form data".to_string(), Some(e.body_text())),
            AppError::JsonRejection(e) => ("Invalid request body".to_string(), Some(e.body_text())),

            // 5xx Server Errors
            AppError::DatabaseUnavailable(reason) => {
                tracing::warn!(%reason, "Rejecting request, database not ready");
                ("Database not connected".to_string(), None)
            }
            AppError::Internal { message, source } => {
                tracing::error!(error.source = ?source, "{}", message);
                (message.to_string(), None)
            }
            AppError::ConfigError(msg) => {
                tracing::error!("Configuration error: {}", msg);
                ("Server configuration error".to_string(), None)
            }
            AppError::InitError(msg) => {
                tracing::error!("Initialization error: {}", msg);
                ("Server initialization error".to_string(), None)
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal server error: {}", msg);
                ("An internal server error occurred".to_string(), None)
            }
        };

        if status.is_client_error() {
            tracing::debug!(error.message = %error, error.status = %status, "Responding with client error");
        }

        (status, Json(ErrorBody { error, details })).into_response()
    }
}
