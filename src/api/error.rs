//! Unified API error handling
//!
//! Every endpoint answers failures with the same JSON body.

use actix_web::error::PayloadError;
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::service::PaperServiceError;

/// Standard error response format
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Error type/code
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Unique request ID for tracing
    pub request_id: String,
}

/// Unified API error type
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Job or claim absent or expired (404)
    #[error("{0}")]
    NotFound(String),

    /// Bad request / validation error (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upload over the configured size limit (413)
    #[error("Document exceeds the upload limit")]
    PayloadTooLarge,

    /// Provider rejected the API key (401)
    #[error("API key was rejected by the provider")]
    InvalidCredential,

    /// Reasoning provider or citation search failed (502)
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Job store unreachable (503)
    #[error("{0}")]
    StorageUnavailable(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::InvalidCredential => StatusCode::UNAUTHORIZED,
            ApiError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            ApiError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error_type = match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::PayloadTooLarge => "payload_too_large",
            ApiError::InvalidCredential => "invalid_api_key",
            ApiError::ExternalService(_) => "external_service_error",
            ApiError::StorageUnavailable(_) => "storage_unavailable",
            ApiError::Internal(_) => "internal_error",
        };

        if status.is_server_error() {
            tracing::error!(error_type = error_type, status = status.as_u16(), message = %self, "API error");
        } else {
            tracing::info!(error_type = error_type, status = status.as_u16(), message = %self, "Request rejected");
        }

        HttpResponse::build(status).json(ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
            request_id: Uuid::new_v4().to_string(),
        })
    }
}

// ============================================================================
// From conversions for service errors
// ============================================================================

impl From<PaperServiceError> for ApiError {
    fn from(err: PaperServiceError) -> Self {
        match err {
            PaperServiceError::NotFound(msg) => ApiError::NotFound(msg),
            PaperServiceError::InvalidInput(msg) => ApiError::BadRequest(msg),
            PaperServiceError::InvalidCredential => ApiError::InvalidCredential,
            PaperServiceError::Upstream(msg) => ApiError::ExternalService(msg),
            PaperServiceError::StorageUnavailable(msg) => ApiError::StorageUnavailable(msg),
            PaperServiceError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<PayloadError> for ApiError {
    fn from(err: PayloadError) -> Self {
        match err {
            PayloadError::Overflow => ApiError::PayloadTooLarge,
            other => ApiError::BadRequest(format!("request body could not be read: {other}")),
        }
    }
}
