//! Unified error handling for the HTTP API.
//!
//! Presence and room operations are idempotent by design and treat unknown
//! keys as no-ops; only entity operations surface `NotFound`. Broadcast
//! delivery failures never appear here at all - they are swallowed at the
//! broadcaster (fire-and-forget delivery).

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by API handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing, invalid, or expired bearer token.
    #[error("could not validate credentials")]
    Unauthorized,

    /// Authenticated, but the caller's role does not permit the operation.
    #[error("not authorized")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    BadRequest(String),

    #[error("database error")]
    Database(#[from] crate::db::DbError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Database(_) => "database_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        crate::metrics::api_error(self.error_code());

        // Database/internal details stay in the log, not the response body.
        let detail = match &self {
            Self::Database(e) => {
                tracing::error!(error = %e, "Database error in API handler");
                "internal server error".to_string()
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error in API handler");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorBody { detail })).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes() {
        assert_eq!(ApiError::Unauthorized.error_code(), "unauthorized");
        assert_eq!(ApiError::Forbidden.error_code(), "forbidden");
        assert_eq!(ApiError::NotFound("incident").error_code(), "not_found");
        assert_eq!(
            ApiError::Internal("test".into()).error_code(),
            "internal_error"
        );
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            ApiError::Unauthorized.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::NotFound("message").status_code(),
            StatusCode::NOT_FOUND
        );
    }
}
