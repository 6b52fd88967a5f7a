//! Login session handlers
//!
//! Thin translation layer: validate the request shape, call the state machine,
//! return its outcome as JSON.

use super::types::*;
use super::ApiError;
use crate::AppState;
use authflow_core::{LoginOutcome, SessionSnapshot};
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use tracing::info;

fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{} is required", field)));
    }
    Ok(())
}

/// Start a new login session
#[utoipa::path(
    post,
    path = "/api/login/start",
    tag = "Login",
    request_body = StartLoginRequest,
    responses(
        (status = 200, description = "Session created", body = StartLoginResponse)
    )
)]
pub async fn start_login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<StartLoginRequest>,
) -> Json<StartLoginResponse> {
    let snapshot = state.machine.start(request.account.as_deref()).await;

    Json(StartLoginResponse {
        session_id: snapshot.session_id,
        status: snapshot.status,
        account: snapshot.account,
        expires_at: snapshot.expires_at,
    })
}

/// Submit username and password
#[utoipa::path(
    post,
    path = "/api/login/credentials",
    tag = "Login",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Outcome of the credential check", body = LoginOutcome),
        (status = 404, description = "Unknown or expired session"),
        (status = 409, description = "Credentials already submitted or session finished")
    )
)]
pub async fn submit_credentials(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CredentialsRequest>,
) -> Result<Json<LoginOutcome>, ApiError> {
    require("session_id", &request.session_id)?;
    require("username", &request.username)?;
    require("password", &request.password)?;

    info!("Credential submission for session {}", request.session_id);

    let outcome = state
        .machine
        .submit_credentials(&request.session_id, request.username.trim(), &request.password)
        .await?;

    info!(
        "Session {} credentials resolved to {}",
        request.session_id,
        outcome.status()
    );
    Ok(Json(outcome))
}

/// Submit a TOTP or SMS code
#[utoipa::path(
    post,
    path = "/api/login/2fa",
    tag = "Login",
    request_body = TwoFactorRequest,
    responses(
        (status = 200, description = "Outcome of the code check", body = LoginOutcome),
        (status = 404, description = "Unknown or expired session"),
        (status = 409, description = "Session is not waiting for a code")
    )
)]
pub async fn submit_two_factor(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<TwoFactorRequest>,
) -> Result<Json<LoginOutcome>, ApiError> {
    require("session_id", &request.session_id)?;
    require("code", &request.code)?;

    let outcome = state
        .machine
        .submit_code(&request.session_id, request.code.trim())
        .await?;

    info!(
        "Session {} code check resolved to {}",
        request.session_id,
        outcome.status()
    );
    Ok(Json(outcome))
}

/// Wait for a mobile push approval
///
/// Returns `waiting_mobile` when the timeout elapses first; the caller may
/// simply wait again.
#[utoipa::path(
    post,
    path = "/api/login/mobile-wait",
    tag = "Login",
    request_body = MobileWaitRequest,
    responses(
        (status = 200, description = "Approval outcome or still pending", body = LoginOutcome),
        (status = 404, description = "Unknown or expired session"),
        (status = 409, description = "Session is not waiting for approval")
    )
)]
pub async fn mobile_wait(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<MobileWaitRequest>,
) -> Result<Json<LoginOutcome>, ApiError> {
    require("session_id", &request.session_id)?;

    let timeout = state
        .machine
        .settings()
        .wait_timeout(request.timeout_seconds);

    let outcome = state
        .machine
        .wait_approval(&request.session_id, timeout)
        .await?;
    Ok(Json(outcome))
}

/// Cancel a login session
#[utoipa::path(
    post,
    path = "/api/login/cancel",
    tag = "Login",
    request_body = CancelRequest,
    responses(
        (status = 200, description = "Session cancelled", body = CancelResponse),
        (status = 404, description = "Unknown, expired or already cancelled session"),
        (status = 409, description = "Session already finished")
    )
)]
pub async fn cancel_login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CancelRequest>,
) -> Result<Json<CancelResponse>, ApiError> {
    require("session_id", &request.session_id)?;

    let snapshot = state.machine.cancel(&request.session_id).await?;

    Ok(Json(CancelResponse {
        session_id: snapshot.session_id,
        status: snapshot.status,
    }))
}

/// Read a session snapshot
#[utoipa::path(
    get,
    path = "/api/login/status/{session_id}",
    tag = "Login",
    params(("session_id" = String, Path, description = "Login session id")),
    responses(
        (status = 200, description = "Current session state", body = SessionSnapshot),
        (status = 404, description = "Unknown or expired session")
    )
)]
pub async fn login_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let snapshot = state.machine.status(&session_id).await?;
    Ok(Json(snapshot))
}

/// Whether an account still needs to log in
#[utoipa::path(
    get,
    path = "/api/login/needs-login",
    tag = "Login",
    params(NeedsLoginQuery),
    responses(
        (status = 200, description = "Login requirement", body = NeedsLoginResponse)
    )
)]
pub async fn needs_login(
    State(state): State<AppState>,
    Query(query): Query<NeedsLoginQuery>,
) -> Json<NeedsLoginResponse> {
    let (account, needs_login) = state.machine.needs_login(query.account.as_deref()).await;
    Json(NeedsLoginResponse {
        needs_login,
        account,
    })
}

/// Re-read persisted logins and report the account's status
#[utoipa::path(
    post,
    path = "/api/login/reload",
    tag = "Login",
    request_body = ReloadRequest,
    responses(
        (status = 200, description = "Account status after reload", body = ReloadResponse),
        (status = 500, description = "Registry could not be read")
    )
)]
pub async fn reload_login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ReloadRequest>,
) -> Result<Json<ReloadResponse>, ApiError> {
    let (account, record) = state.machine.reload(request.account.as_deref()).await?;

    Ok(Json(ReloadResponse {
        account,
        active: record.is_some(),
        username: record.as_ref().map(|r| r.username.clone()),
        authenticated_at: record.map(|r| r.authenticated_at),
    }))
}
