//! OpenAPI specification for the authflow web server

use axum::response::Json;
use utoipa::OpenApi;

use crate::handlers::{
    CancelRequest, CancelResponse, CredentialsRequest, HealthResponse, MobileWaitRequest,
    NeedsLoginResponse, ReloadRequest, ReloadResponse, StartLoginRequest, StartLoginResponse,
    TwoFactorRequest,
};
use crate::site_auth::{SiteAuthResponse, SiteLoginRequest};
use authflow_core::{LoginOutcome, SessionSnapshot, SessionState, TwoFactorMethod};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Authflow API",
        version = "0.1.0",
        description = "Server-held multi-step login sessions",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    paths(
        crate::handlers::health_check,

        crate::handlers::start_login,
        crate::handlers::submit_credentials,
        crate::handlers::submit_two_factor,
        crate::handlers::mobile_wait,
        crate::handlers::cancel_login,
        crate::handlers::login_status,
        crate::handlers::needs_login,
        crate::handlers::reload_login,

        crate::site_auth::site_login,
        crate::site_auth::site_logout,
    ),
    components(
        schemas(
            HealthResponse,
            StartLoginRequest,
            StartLoginResponse,
            CredentialsRequest,
            TwoFactorRequest,
            MobileWaitRequest,
            CancelRequest,
            CancelResponse,
            NeedsLoginResponse,
            ReloadRequest,
            ReloadResponse,
            SiteLoginRequest,
            SiteAuthResponse,
            LoginOutcome,
            SessionSnapshot,
            SessionState,
            TwoFactorMethod,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Login", description = "Login session protocol"),
        (name = "Site", description = "Site password gate"),
    )
)]
pub struct ApiDoc;

/// Serve the OpenAPI document
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
