use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias used throughout the core.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unique error codes for client identification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationFailed = 1001,

    // Conflict errors (2xxx)
    DuplicateContentHash = 2002,
    DuplicateDoi = 2003,
    AlreadyInactive = 2004,
    ReviewerAlreadyAssigned = 2005,
    AssignmentAlreadyRequested = 2006,

    // Authorization errors (3xxx)
    NotAuthorized = 3001,

    // Resource errors (4xxx)
    NotFound = 4001,

    // External service errors (5xxx)
    EmbeddingServiceUnavailable = 5001,
    EmbeddingServiceTimeout = 5002,
    EmbeddingServiceError = 5003,
    OracleRequestFailed = 5004,
    ContentStoreError = 5005,

    // Internal errors (9xxx)
    InternalError = 9001,
    ConfigurationError = 9002,
}

impl ErrorCode {
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }
}

/// Error taxonomy of the registry core.
///
/// The four caller-facing kinds map one-to-one onto the operation contracts:
/// `Validation` (malformed input, never retried), `Conflict` (invariant
/// violation against current state), `Authorization` (acting identity lacks
/// permission), `NotFound` (unknown id/token/DOI). Everything else is
/// ambient: collaborator failures and internal faults.
#[derive(Error, Debug)]
pub enum AppError {
    // Core taxonomy
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {detail}")]
    Conflict { code: ErrorCode, detail: String },

    #[error("Not authorized: {0}")]
    Authorization(String),

    #[error("Not found: {resource_type} {resource_id}")]
    NotFound {
        resource_type: &'static str,
        resource_id: String,
    },

    // External collaborators
    #[error("Embedding service unavailable: {0}")]
    EmbeddingServiceUnavailable(String),

    #[error("Embedding service timeout after {timeout_secs}s")]
    EmbeddingServiceTimeout { timeout_secs: u64 },

    #[error("Embedding service error: {0}")]
    EmbeddingError(String),

    #[error("Randomness oracle rejected request: {0}")]
    OracleRequestFailed(String),

    #[error("Content store error: {0}")]
    ContentStoreError(String),

    // Internal
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl AppError {
    pub fn not_found(resource_type: &'static str, resource_id: impl ToString) -> Self {
        Self::NotFound {
            resource_type,
            resource_id: resource_id.to_string(),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::ValidationFailed,
            Self::Conflict { code, .. } => *code,
            Self::Authorization(_) => ErrorCode::NotAuthorized,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::EmbeddingServiceUnavailable(_) => ErrorCode::EmbeddingServiceUnavailable,
            Self::EmbeddingServiceTimeout { .. } => ErrorCode::EmbeddingServiceTimeout,
            Self::EmbeddingError(_) => ErrorCode::EmbeddingServiceError,
            Self::OracleRequestFailed(_) => ErrorCode::OracleRequestFailed,
            Self::ContentStoreError(_) => ErrorCode::ContentStoreError,
            Self::Internal(_) => ErrorCode::InternalError,
            Self::Config(_) => ErrorCode::ConfigurationError,
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Authorization(_) => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::EmbeddingServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::EmbeddingServiceTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::EmbeddingError(_) => StatusCode::BAD_GATEWAY,
            Self::OracleRequestFailed(_) => StatusCode::BAD_GATEWAY,
            Self::ContentStoreError(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        // Log based on severity
        match &self {
            AppError::Validation(_) | AppError::Conflict { .. } | AppError::NotFound { .. } => {
                tracing::debug!(error_code = error_code.as_u16(), %message, "Client error");
            }
            AppError::Authorization(_) => {
                tracing::info!(error_code = error_code.as_u16(), %message, "Authorization denied");
            }
            _ => {
                tracing::error!(error_code = error_code.as_u16(), %message, error = ?self, "Server error");
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code.as_u16(),
                "status": status.as_u16(),
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_taxonomy_status_mapping() {
        assert_eq!(
            AppError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        let conflict = AppError::Conflict {
            code: ErrorCode::DuplicateContentHash,
            detail: "x".into(),
        };
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::Authorization("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::not_found("paper", 7).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_conflict_carries_specific_code() {
        let err = AppError::Conflict {
            code: ErrorCode::DuplicateDoi,
            detail: "DOI already exists".into(),
        };
        assert_eq!(err.error_code(), ErrorCode::DuplicateDoi);
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }
}
