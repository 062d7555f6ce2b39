// HTTP API Error Types
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use std::collections::HashMap;

use crate::api::envelope::Envelope;

/// Message returned for every authentication failure. Missing, malformed and
/// expired credentials are indistinguishable on the wire.
pub const UNAUTHENTICATED_MESSAGE: &str = "Authentication required";

/// Classified pipeline failure. Every failing request is reported through
/// exactly one of these variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    // 401 Unauthorized
    Unauthenticated,

    // 403 Forbidden
    Forbidden(String),

    // 429 Too Many Requests
    RateLimited { retry_after_secs: u64 },

    // 400 Bad Request
    ValidationFailed {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 500 Internal Server Error; the payload is server-side detail only
    InternalError(String),

    // 504 Gateway Timeout
    Timeout,
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ValidationFailed { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated => "Unauthenticated",
            ApiError::Forbidden(_) => "Forbidden",
            ApiError::RateLimited { .. } => "RateLimited",
            ApiError::ValidationFailed { .. } => "ValidationFailed",
            ApiError::NotFound(_) => "NotFound",
            ApiError::Conflict(_) => "Conflict",
            ApiError::InternalError(_) => "InternalError",
            ApiError::Timeout => "Timeout",
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> String {
        match self {
            ApiError::Unauthenticated => UNAUTHENTICATED_MESSAGE.to_string(),
            ApiError::Forbidden(msg) => msg.clone(),
            ApiError::RateLimited { retry_after_secs } => {
                format!("Too many requests, retry in {} seconds", retry_after_secs)
            }
            ApiError::ValidationFailed { message, .. } => message.clone(),
            ApiError::NotFound(msg) => msg.clone(),
            ApiError::Conflict(msg) => msg.clone(),
            ApiError::InternalError(_) => "An unexpected error occurred".to_string(),
            ApiError::Timeout => "The request took too long to process".to_string(),
        }
    }

    /// Build the failure envelope for this error
    pub fn to_envelope(&self, path: Option<&str>) -> Envelope {
        let mut envelope = Envelope::failure(self.error_code(), self.message());
        if let ApiError::ValidationFailed { field_errors: Some(field_errors), .. } = self {
            envelope.data = Some(json!({ "field_errors": field_errors }));
        }
        if let Some(path) = path {
            envelope.path = Some(path.to_string());
        }
        envelope
    }

    /// Render the full HTTP response, optionally stamping the request path
    pub fn render(&self, path: Option<&str>) -> Response {
        let mut response = (self.status_code(), Json(self.to_envelope(path))).into_response();
        if let ApiError::RateLimited { retry_after_secs } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }

    /// Classify a framework-generated failure that never passed through ApiError
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthenticated,
            StatusCode::FORBIDDEN => ApiError::forbidden("Access denied"),
            StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED => {
                ApiError::not_found("Route not found")
            }
            StatusCode::CONFLICT => ApiError::conflict("Request conflicts with current state"),
            StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited { retry_after_secs: 1 },
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ApiError::Timeout,
            s if s.is_client_error() => ApiError::validation_failed("Invalid request", None),
            s => ApiError::internal_error(format!("unclassified response status {}", s)),
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn validation_failed(
        message: impl Into<String>,
        field_errors: Option<HashMap<String, String>>,
    ) -> Self {
        ApiError::ValidationFailed {
            message: message.into(),
            field_errors,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal_error(detail: impl Into<String>) -> Self {
        ApiError::InternalError(detail.into())
    }
}

// Convert other error types to ApiError
impl From<crate::auth::AuthError> for ApiError {
    fn from(err: crate::auth::AuthError) -> Self {
        match err {
            crate::auth::AuthError::SecretMissing | crate::auth::AuthError::Encoding(_) => {
                ApiError::internal_error(err.to_string())
            }
            // Failure class is logged by the caller, never returned
            _ => ApiError::Unauthenticated,
        }
    }
}

impl From<crate::store::StoreError> for ApiError {
    fn from(err: crate::store::StoreError) -> Self {
        match err {
            crate::store::StoreError::NotFound { kind, id } => {
                ApiError::not_found(format!("{} {} not found", kind.singular(), id))
            }
            crate::store::StoreError::Conflict(msg) => ApiError::conflict(msg),
            crate::store::StoreError::Unavailable(msg) => ApiError::internal_error(msg),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation_failed(rejection.body_text(), None)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation_failed(rejection.body_text(), None)
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::validation_failed(rejection.body_text(), None)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::internal_error(format!("JSON serialization error: {}", err))
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::InternalError(detail) => write!(f, "internal error: {}", detail),
            other => write!(f, "{}: {}", other.error_code(), other.message()),
        }
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum. The error rides along in the
// response extensions so the translator can log it and stamp the path.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = self.render(None);
        response.extensions_mut().insert(self);
        response
    }
}
