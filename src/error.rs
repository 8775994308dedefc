use actix_web::http::{header, StatusCode};
use actix_web::{error, HttpRequest, HttpResponse, ResponseError};
use thiserror::Error;

use crate::models::ErrorResponse;
use crate::services::{Limited, PostgresError, SessionError};

/// Error type returned by every handler
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{message}")]
    RateLimited { message: String, retry_after_secs: u64 },

    #[error("Database error: {0}")]
    Database(PostgresError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        ApiError::NotFound(what.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn rate_limited(message: impl Into<String>, limited: Limited) -> Self {
        ApiError::RateLimited {
            message: message.into(),
            retry_after_secs: limited.retry_after_secs(),
        }
    }

    /// Short machine-readable kind used in the `error` field
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "bad_request",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::RateLimited { .. } => "rate_limited",
            ApiError::Database(_) | ApiError::Internal(_) => "internal_error",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        // Internal details stay in the logs
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {}", self);
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let mut builder = HttpResponse::build(status);
        if let ApiError::RateLimited { retry_after_secs, .. } = self {
            builder.insert_header((header::RETRY_AFTER, retry_after_secs.to_string()));
        }

        builder.json(ErrorResponse {
            error: self.kind().to_string(),
            message,
            status_code: status.as_u16(),
        })
    }
}

impl From<PostgresError> for ApiError {
    fn from(err: PostgresError) -> Self {
        match err {
            PostgresError::NotFound(what) => ApiError::NotFound(format!("{} not found", what)),
            PostgresError::Conflict(what) => ApiError::Conflict(what),
            PostgresError::InvalidInput(message) => ApiError::Validation(message),
            other => ApiError::Database(other),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Expired | SessionError::Invalid => ApiError::Unauthorized(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::Validation(format!("Validation failed: {}", errors))
    }
}

/// Malformed JSON bodies become a 400 in the usual error shape
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    ApiError::Validation(format!("Invalid JSON: {}", err)).into()
}

/// Malformed query strings become a 400 in the usual error shape
pub fn handle_query_payload_error(err: error::QueryPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("Query payload error on {}: {}", req.path(), err);
    ApiError::Validation(format!("Invalid query: {}", err)).into()
}

/// Malformed path segments (e.g. a non-UUID id) become a 400 as well
pub fn handle_path_error(err: error::PathError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("Path error on {}: {}", req.path(), err);
    ApiError::Validation(format!("Invalid path: {}", err)).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn test_status_mapping() {
        let cases = [
            (ApiError::validation("bad"), 400),
            (ApiError::Unauthorized("no".into()), 401),
            (ApiError::forbidden("no"), 403),
            (ApiError::not_found("user"), 404),
            (ApiError::conflict("dup"), 409),
            (ApiError::Internal("boom".into()), 500),
        ];

        for (err, expected) in cases {
            assert_eq!(err.status_code().as_u16(), expected);
        }
    }

    #[actix_web::test]
    async fn test_error_body_shape() {
        let response = ApiError::conflict("already swiped").error_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = to_bytes(response.into_body()).await.unwrap();
        let parsed: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.error, "conflict");
        assert_eq!(parsed.message, "already swiped");
        assert_eq!(parsed.status_code, 409);
    }

    #[actix_web::test]
    async fn test_internal_message_hidden() {
        let response = ApiError::Internal("secret connection string".into()).error_response();
        let body = to_bytes(response.into_body()).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("secret"));
        assert!(text.contains("\"statusCode\":500"));
    }

    #[actix_web::test]
    async fn test_rate_limited_sets_retry_after() {
        let err = ApiError::RateLimited {
            message: "slow down".into(),
            retry_after_secs: 42,
        };
        let response = err.error_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            "42"
        );
    }

    #[test]
    fn test_postgres_error_classification() {
        assert!(matches!(
            ApiError::from(PostgresError::Conflict("users_email_lower_idx".into())),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from(PostgresError::NotFound("match".into())),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from(PostgresError::InvalidInput("coupon".into())),
            ApiError::Validation(_)
        ));
    }
}
