//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Errors a handler can surface to the client.
///
/// The waiting response itself (`429`) is not an error: it is the check
/// protocol's regular answer for a queued client and is built in the
/// handler.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request payload or parameters failed validation.
    #[error("{0}")]
    Validation(String),

    /// The addressed entity does not exist.
    #[error("not found")]
    NotFound,

    /// The engine or the shared store failed.
    #[error(transparent)]
    Core(#[from] waitingroom_core::Error),

    /// Gateway-side failure outside the engine.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Core(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Not-found is routine; everything else is worth an operator's
        // attention.
        if status != StatusCode::NOT_FOUND {
            tracing::error!(status = %status, error = %self, "request failed");
        }

        // Store and internal details stay out of the response body.
        let message = match &self {
            Self::Validation(m) => m.clone(),
            Self::NotFound => "not found".to_string(),
            Self::Core(_) | Self::Internal(_) => "internal server error".to_string(),
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(
            ApiError::Validation("bad domain".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::Core(waitingroom_core::Error::Config("x".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let response = ApiError::Internal("secret connection string".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
