//! API error taxonomy and its HTTP mapping.

use crate::store::StoreError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use std::fmt;

/// Errors surfaced by repositories and handlers.
#[derive(Debug)]
pub enum ApiError {
    /// Client supplied a missing, malformed or out-of-range value
    Validation(String),
    /// A unique field or pair already exists
    Conflict(String),
    NotFound(String),
    /// No credentials were presented
    Unauthorized(String),
    /// Credentials were rejected or the principal lacks the right
    Forbidden(String),
    TooManyRequests { retry_after_seconds: u64 },
    Store(StoreError),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Validation(msg) => write!(f, "{}", msg),
            ApiError::Conflict(msg) => write!(f, "{}", msg),
            ApiError::NotFound(msg) => write!(f, "{}", msg),
            ApiError::Unauthorized(msg) => write!(f, "{}", msg),
            ApiError::Forbidden(msg) => write!(f, "{}", msg),
            ApiError::TooManyRequests {
                retry_after_seconds,
            } => write!(
                f,
                "Too many requests. Please try again in {} seconds.",
                retry_after_seconds
            ),
            ApiError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{} not found", what))
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ApiError::Forbidden(msg.into())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(index) => {
                log::debug!("Unique index rejected write: {}", index);
                ApiError::Conflict("Resource already exists".to_string())
            }
            other => ApiError::Store(other),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(e: validator::ValidationErrors) -> Self {
        log::debug!("Request validation failed: {}", e);
        let mut fields: Vec<&str> = e.field_errors().keys().copied().collect();
        fields.sort_unstable();
        ApiError::Validation(format!("Invalid value for: {}", fields.join(", ")))
    }
}

impl From<crate::rate_limit::RateLimitError> for ApiError {
    fn from(e: crate::rate_limit::RateLimitError) -> Self {
        ApiError::TooManyRequests {
            retry_after_seconds: e.retry_after_seconds,
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            ApiError::Store(e) => {
                log::error!("Store failure: {}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let mut response = HttpResponse::build(self.status_code());
        if let ApiError::TooManyRequests {
            retry_after_seconds,
        } = self
        {
            response.insert_header(("Retry-After", retry_after_seconds.to_string()));
        }
        response.json(serde_json::json!({ "error": message }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::validation("bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Conflict("dup".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(ApiError::not_found("Tag").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Unauthorized("no token".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::forbidden("nope").status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::TooManyRequests {
                retry_after_seconds: 3
            }
            .status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_duplicate_store_error_becomes_conflict() {
        let err: ApiError = StoreError::Duplicate("Tags(tagSTR)".into()).into();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[test]
    fn test_backend_store_error_is_internal() {
        let err: ApiError = StoreError::Backend("connection reset".into()).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(ApiError::not_found("Product").to_string(), "Product not found");
    }
}
