//! Site password gate
//!
//! A single shared password protects the whole site. A correct password buys a
//! signed session cookie valid for seven days. The signing key is derived from
//! a persisted server secret and the password, so changing either invalidates
//! every issued cookie.

use crate::handlers::ApiError;
use crate::{AppState, WebError, WebResult};
use axum::{
    extract::{FromRequest, Request, State},
    http::{
        header::{CONTENT_TYPE, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue,
    },
    middleware::Next,
    response::{IntoResponse, Response},
    Form, Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

/// Cookie carrying the site session token
pub const SITE_COOKIE: &str = "authflow_site_session";

const SECRET_FILE: &str = "site_secret";
const SECRET_LEN: usize = 32;
const TOKEN_LIFETIME_DAYS: i64 = 7;
const SUBJECT: &str = "site";

/// Reachable without a site session
const EXEMPT_PREFIX: &str = "/site-auth/";
const HEALTH_PATH: &str = "/api/health";

/// Site session token claims
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Signing keys plus the password they were derived from
pub struct SiteAuth {
    encoding: EncodingKey,
    decoding: DecodingKey,
    password_digest: [u8; 32],
}

impl SiteAuth {
    /// Build the gate from the secret stored in `dir`, creating it if missing
    pub fn open<P: AsRef<Path>>(dir: P, password: &str) -> WebResult<Self> {
        let secret = load_or_create_secret(dir.as_ref())?;
        Ok(Self::new(&secret, password))
    }

    pub fn new(secret: &[u8], password: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(secret);
        hasher.update(password.as_bytes());
        let key = hasher.finalize();

        Self {
            encoding: EncodingKey::from_secret(&key),
            decoding: DecodingKey::from_secret(&key),
            password_digest: Sha256::digest(password.as_bytes()).into(),
        }
    }

    /// Compare digests so the comparison length never depends on the input
    pub fn verify_password(&self, candidate: &str) -> bool {
        let candidate: [u8; 32] = Sha256::digest(candidate.as_bytes()).into();
        candidate
            .iter()
            .zip(self.password_digest.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }

    pub fn issue_token(&self) -> WebResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: SUBJECT.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::days(TOKEN_LIFETIME_DAYS)).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| WebError::SiteAuth(format!("Failed to sign site token: {}", e)))
    }

    pub fn validate_token(&self, token: &str) -> bool {
        match decode::<Claims>(token, &self.decoding, &Validation::default()) {
            Ok(data) => data.claims.sub == SUBJECT,
            Err(e) => {
                debug!("Rejected site token: {}", e);
                false
            }
        }
    }
}

fn load_or_create_secret(dir: &Path) -> WebResult<Vec<u8>> {
    let path = dir.join(SECRET_FILE);

    if path.exists() {
        let encoded = std::fs::read_to_string(&path)?;
        let secret = STANDARD
            .decode(encoded.trim())
            .map_err(|e| WebError::SiteAuth(format!("Corrupt site secret: {}", e)))?;
        if secret.len() == SECRET_LEN {
            return Ok(secret);
        }
        warn!(
            "Site secret at {} has the wrong length, generating a new one",
            path.display()
        );
    }

    let mut secret = vec![0u8; SECRET_LEN];
    rand::thread_rng().fill_bytes(&mut secret);

    std::fs::create_dir_all(dir)?;
    std::fs::write(&path, STANDARD.encode(&secret))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
    }

    info!("Generated site secret at {}", path.display());
    Ok(secret)
}

fn is_exempt(path: &str) -> bool {
    path.starts_with(EXEMPT_PREFIX) || path == HEALTH_PATH
}

/// Pull the site session token out of the `Cookie` header
fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|cookie| {
            cookie
                .trim()
                .strip_prefix(SITE_COOKIE)
                .and_then(|rest| rest.strip_prefix('='))
                .map(str::to_string)
        })
}

/// Middleware rejecting requests without a valid site session
pub async fn require_site_session(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(site_auth) = &state.site_auth else {
        return next.run(request).await;
    };

    if is_exempt(request.uri().path()) {
        return next.run(request).await;
    }

    match extract_token(request.headers()) {
        Some(token) if site_auth.validate_token(&token) => next.run(request).await,
        _ => ApiError::Unauthorized("Site password required".to_string()).into_response(),
    }
}

/// Site login request body
#[derive(Debug, Deserialize, ToSchema)]
pub struct SiteLoginRequest {
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SiteAuthResponse {
    pub authenticated: bool,
}

fn session_cookie(token: &str, max_age_seconds: i64) -> WebResult<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SITE_COOKIE, token, max_age_seconds
    ))
    .map_err(|e| WebError::SiteAuth(format!("Invalid cookie value: {}", e)))
}

/// Exchange the site password for a session cookie
///
/// Accepts either a JSON body or an HTML form post.
#[utoipa::path(
    post,
    path = "/site-auth/login",
    tag = "Site",
    request_body = SiteLoginRequest,
    responses(
        (status = 200, description = "Cookie issued", body = SiteAuthResponse),
        (status = 401, description = "Wrong password")
    )
)]
pub async fn site_login(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, ApiError> {
    let is_json = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));

    let body = if is_json {
        let Json(body) = Json::<SiteLoginRequest>::from_request(request, &()).await?;
        body
    } else {
        let Form(body) = Form::<SiteLoginRequest>::from_request(request, &())
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        body
    };

    let Some(site_auth) = &state.site_auth else {
        return Ok(Json(SiteAuthResponse {
            authenticated: true,
        })
        .into_response());
    };

    if !site_auth.verify_password(&body.password) {
        warn!("Rejected site password attempt");
        return Err(ApiError::Unauthorized("Invalid site password".to_string()));
    }

    let token = site_auth.issue_token().map_err(ApiError::from)?;
    let cookie = session_cookie(&token, Duration::days(TOKEN_LIFETIME_DAYS).num_seconds())
        .map_err(ApiError::from)?;

    let mut response = Json(SiteAuthResponse {
        authenticated: true,
    })
    .into_response();
    response.headers_mut().insert(SET_COOKIE, cookie);
    Ok(response)
}

/// Clear the site session cookie
#[utoipa::path(
    post,
    path = "/site-auth/logout",
    tag = "Site",
    responses((status = 200, description = "Cookie cleared", body = SiteAuthResponse))
)]
pub async fn site_logout() -> Result<Response, ApiError> {
    let cookie = session_cookie("", 0).map_err(ApiError::from)?;
    let mut response = Json(SiteAuthResponse {
        authenticated: false,
    })
    .into_response();
    response.headers_mut().insert(SET_COOKIE, cookie);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> SiteAuth {
        SiteAuth::new(&[7u8; SECRET_LEN], "hunter2")
    }

    #[test]
    fn test_password_check() {
        let gate = gate();
        assert!(gate.verify_password("hunter2"));
        assert!(!gate.verify_password("hunter3"));
        assert!(!gate.verify_password(""));
    }

    #[test]
    fn test_token_round_trip() {
        let gate = gate();
        let token = gate.issue_token().unwrap();
        assert!(gate.validate_token(&token));
        assert!(!gate.validate_token("not-a-token"));
    }

    #[test]
    fn test_password_change_invalidates_tokens() {
        let token = gate().issue_token().unwrap();
        let rotated = SiteAuth::new(&[7u8; SECRET_LEN], "correct horse");
        assert!(!rotated.validate_token(&token));
    }

    #[test]
    fn test_secret_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let first = load_or_create_secret(dir.path()).unwrap();
        let second = load_or_create_secret(dir.path()).unwrap();
        assert_eq!(first.len(), SECRET_LEN);
        assert_eq!(first, second);
    }

    #[test]
    fn test_exempt_paths() {
        assert!(is_exempt("/site-auth/login"));
        assert!(is_exempt("/api/health"));
        assert!(!is_exempt("/api/login/start"));
        assert!(!is_exempt("/api/healthz"));
    }

    #[test]
    fn test_extract_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; authflow_site_session=abc.def; other=1"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("abc.def"));

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("authflow_site_session_x=1"));
        assert!(extract_token(&headers).is_none());
    }
}
