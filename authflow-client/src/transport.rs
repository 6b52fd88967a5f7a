//! HTTP transport for the login protocol
//!
//! [`LoginApi`] is the seam between the session driver and the wire. The
//! reqwest implementation maps a 404 on any session endpoint to
//! [`ClientError::SessionExpired`] so callers can drop their session id.

use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use authflow_core::{LoginOutcome, SessionSnapshot, SessionState};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Extra time given to a mobile-wait request on top of the wait itself
const WAIT_REQUEST_SLACK: Duration = Duration::from_secs(10);

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server root, e.g. `http://127.0.0.1:8080`
    pub base_url: String,
    pub timeout_seconds: u64,
    pub user_agent: String,
    /// Site password, sent once before the first API call when set
    pub site_password: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            timeout_seconds: 30,
            user_agent: format!("authflow-client/{}", env!("CARGO_PKG_VERSION")),
            site_password: None,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    pub fn with_site_password(mut self, password: Option<String>) -> Self {
        self.site_password = password;
        self
    }
}

/// Reply to `start`
#[derive(Debug, Clone, Deserialize)]
pub struct StartReply {
    pub session_id: String,
    pub status: SessionState,
    pub account: String,
}

/// Reply to `reload`
#[derive(Debug, Clone, Deserialize)]
pub struct ReloadReply {
    pub account: String,
    pub active: bool,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NeedsLoginReply {
    needs_login: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    message: String,
}

/// Operations of the login HTTP API
#[async_trait]
pub trait LoginApi: Send + Sync {
    async fn start(&self, account: &str) -> ClientResult<StartReply>;

    async fn credentials(
        &self,
        session_id: &str,
        username: &str,
        password: &str,
    ) -> ClientResult<LoginOutcome>;

    async fn two_factor(&self, session_id: &str, code: &str) -> ClientResult<LoginOutcome>;

    async fn mobile_wait(
        &self,
        session_id: &str,
        timeout: Option<Duration>,
    ) -> ClientResult<LoginOutcome>;

    async fn cancel(&self, session_id: &str) -> ClientResult<()>;

    async fn status(&self, session_id: &str) -> ClientResult<SessionSnapshot>;

    async fn needs_login(&self, account: &str) -> ClientResult<bool>;

    async fn reload(&self, account: &str) -> ClientResult<ReloadReply>;
}

/// Create HTTP client with common configuration
pub fn create_http_client(config: &ClientConfig) -> ClientResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .user_agent(&config.user_agent)
        .cookie_store(true)
        .build()
        .map_err(|e| ClientError::transport("Failed to create HTTP client", e))
}

/// [`LoginApi`] over reqwest
pub struct HttpLoginApi {
    client: Client,
    config: ClientConfig,
    site_authenticated: tokio::sync::OnceCell<()>,
}

impl HttpLoginApi {
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let client = create_http_client(&config)?;
        Ok(Self {
            client,
            config,
            site_authenticated: tokio::sync::OnceCell::new(),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Pass the site gate once; the cookie store keeps the session cookie
    async fn ensure_site_session(&self) -> ClientResult<()> {
        let Some(password) = self.config.site_password.as_deref() else {
            return Ok(());
        };

        self.site_authenticated
            .get_or_try_init(|| async {
                debug!("Authenticating against the site gate");
                let response = self
                    .client
                    .post(self.url("/site-auth/login"))
                    .json(&json!({ "password": password }))
                    .send()
                    .await
                    .map_err(|e| ClientError::transport("Site login request failed", e))?;
                handle_response::<serde_json::Value>(response).await?;
                Ok::<(), ClientError>(())
            })
            .await
            .map(|_| ())
    }

    async fn post<B, R>(&self, path: &str, body: &B, timeout: Option<Duration>) -> ClientResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.ensure_site_session().await?;

        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        debug!("POST {}", path);
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::transport(&format!("Request to {} failed", path), e))?;
        handle_response(response).await
    }

    async fn get<R: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> ClientResult<R> {
        self.ensure_site_session().await?;

        debug!("GET {}", path);
        let response = self
            .client
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .map_err(|e| ClientError::transport(&format!("Request to {} failed", path), e))?;
        handle_response(response).await
    }
}

/// Decode a success body or turn the error reply into a [`ClientError`]
async fn handle_response<R: DeserializeOwned>(response: Response) -> ClientResult<R> {
    let status = response.status();

    if status == StatusCode::NOT_FOUND {
        return Err(ClientError::SessionExpired);
    }

    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => ClientError::Server {
                status: status.as_u16(),
                code: body.error,
                message: body.message,
            },
            Err(_) => ClientError::Server {
                status: status.as_u16(),
                code: "unknown".to_string(),
                message: text,
            },
        });
    }

    response
        .json::<R>()
        .await
        .map_err(|e| ClientError::Protocol(format!("Failed to decode response: {}", e)))
}

#[async_trait]
impl LoginApi for HttpLoginApi {
    async fn start(&self, account: &str) -> ClientResult<StartReply> {
        self.post("/api/login/start", &json!({ "account": account }), None)
            .await
    }

    async fn credentials(
        &self,
        session_id: &str,
        username: &str,
        password: &str,
    ) -> ClientResult<LoginOutcome> {
        self.post(
            "/api/login/credentials",
            &json!({
                "session_id": session_id,
                "username": username,
                "password": password,
            }),
            None,
        )
        .await
    }

    async fn two_factor(&self, session_id: &str, code: &str) -> ClientResult<LoginOutcome> {
        self.post(
            "/api/login/2fa",
            &json!({ "session_id": session_id, "code": code }),
            None,
        )
        .await
    }

    async fn mobile_wait(
        &self,
        session_id: &str,
        timeout: Option<Duration>,
    ) -> ClientResult<LoginOutcome> {
        let body = match timeout {
            Some(timeout) => json!({
                "session_id": session_id,
                "timeout_seconds": timeout.as_secs_f64(),
            }),
            None => json!({ "session_id": session_id }),
        };
        // The server may hold the request for the whole wait
        let request_timeout = timeout
            .unwrap_or(Duration::from_secs(self.config.timeout_seconds))
            + WAIT_REQUEST_SLACK;

        self.post("/api/login/mobile-wait", &body, Some(request_timeout))
            .await
    }

    async fn cancel(&self, session_id: &str) -> ClientResult<()> {
        let _: serde_json::Value = self
            .post(
                "/api/login/cancel",
                &json!({ "session_id": session_id }),
                None,
            )
            .await?;
        Ok(())
    }

    async fn status(&self, session_id: &str) -> ClientResult<SessionSnapshot> {
        self.get(&format!("/api/login/status/{}", session_id), &[])
            .await
    }

    async fn needs_login(&self, account: &str) -> ClientResult<bool> {
        let reply: NeedsLoginReply = self
            .get("/api/login/needs-login", &[("account", account)])
            .await?;
        Ok(reply.needs_login)
    }

    async fn reload(&self, account: &str) -> ClientResult<ReloadReply> {
        self.post("/api/login/reload", &json!({ "account": account }), None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_trims_trailing_slash() {
        let config = ClientConfig::new("http://localhost:8080/");
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.timeout_seconds, 30);
        assert!(config.user_agent.starts_with("authflow-client/"));
    }

    #[test]
    fn test_url_joining() {
        let api = HttpLoginApi::new(ClientConfig::new("http://localhost:9000")).unwrap();
        assert_eq!(
            api.url("/api/login/start"),
            "http://localhost:9000/api/login/start"
        );
    }
}
