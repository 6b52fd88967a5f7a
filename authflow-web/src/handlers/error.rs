//! HTTP error responses
//!
//! Every failure leaves the server as `{"error": <code>, "message": <text>}`.

use crate::WebError;
use authflow_session::SessionError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Login session not found: {0}")]
    SessionNotFound(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    SessionFinished(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidState(_) | ApiError::SessionFinished(_) => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::SessionNotFound(_) => "session_not_found",
            ApiError::InvalidState(_) => "invalid_state",
            ApiError::SessionFinished(_) => "session_finished",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound { session_id } => ApiError::SessionNotFound(session_id),
            err @ SessionError::InvalidState { .. } => ApiError::InvalidState(err.to_string()),
            err @ SessionError::Finished { .. } => ApiError::SessionFinished(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<WebError> for ApiError {
    fn from(err: WebError) -> Self {
        match err {
            WebError::Session(err) => err.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(message) = &self {
            error!("Internal error: {}", message);
        }

        let body = Json(json!({
            "error": self.error_code(),
            "message": self.to_string(),
        }));

        (self.status_code(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authflow_core::SessionState;

    #[test]
    fn test_session_error_mapping() {
        let not_found: ApiError = SessionError::not_found("abc").into();
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.error_code(), "session_not_found");

        let invalid: ApiError = SessionError::InvalidState {
            session_id: "abc".to_string(),
            state: SessionState::AwaitingTwoFactor,
            operation: "submit_credentials",
        }
        .into();
        assert_eq!(invalid.status_code(), StatusCode::CONFLICT);
        assert!(invalid.to_string().contains("awaiting_2fa"));

        let finished: ApiError = SessionError::Finished {
            session_id: "abc".to_string(),
            state: SessionState::Failed,
        }
        .into();
        assert_eq!(finished.error_code(), "session_finished");

        let internal: ApiError = SessionError::verifier("boom").into();
        assert_eq!(internal.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
