//! Request and response bodies of the HTTP API

use super::ApiError;
use authflow_core::SessionState;
use axum::extract::FromRequest;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// JSON extractor whose rejections use the API error body
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[schema(example = "0.1.0")]
    pub version: String,
    /// Login sessions currently held in memory
    pub active_sessions: usize,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct StartLoginRequest {
    /// Account label; defaults to `default`
    #[serde(default)]
    #[schema(example = "default")]
    pub account: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StartLoginResponse {
    pub session_id: String,
    pub status: SessionState,
    pub account: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Deserialize, ToSchema)]
pub struct CredentialsRequest {
    pub session_id: String,
    #[schema(example = "octocat")]
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TwoFactorRequest {
    pub session_id: String,
    #[schema(example = "123456")]
    pub code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MobileWaitRequest {
    pub session_id: String,
    /// Seconds to wait; clamped to the server maximum
    #[serde(default)]
    #[schema(example = 30.0)]
    pub timeout_seconds: Option<f64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CancelResponse {
    pub session_id: String,
    pub status: SessionState,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct NeedsLoginQuery {
    pub account: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NeedsLoginResponse {
    pub needs_login: bool,
    pub account: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ReloadRequest {
    #[serde(default)]
    pub account: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReloadResponse {
    pub account: String,
    /// Whether the account holds an authenticated login
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authenticated_at: Option<chrono::DateTime<chrono::Utc>>,
}
