//! Authflow Web Server
//!
//! HTTP gateway in front of the login session state machine. Every request is
//! dispatched to [`authflow_session::SessionStateMachine`] and its outcome is
//! translated into a JSON response.

pub mod handlers;
pub mod openapi;
pub mod routes;
pub mod server;
pub mod site_auth;
pub mod state;

// Re-export main types
pub use server::{AuthflowServer, AuthflowServerBuilder};
pub use state::AppState;

use authflow_core::{AuthflowConfig, SessionSettings, StaticAccount};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware, Router,
};
use std::path::PathBuf;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the main application router
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST])
        .allow_credentials(true)
        .allow_headers([ACCEPT, CONTENT_TYPE]);

    Router::new()
        .nest("/api", routes::api_routes())
        .nest("/site-auth", routes::site_auth_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            site_auth::require_site_session,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .with_state(state)
}

/// Configuration for the web server
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Holds the site secret and the account registry
    pub auth_state_dir: PathBuf,
    /// Shared site password; the gate is off when unset
    pub site_password: Option<String>,
    /// Bypass the site password gate
    pub test_mode: bool,
    pub sessions: SessionSettings,
    /// Accounts for the config-driven identity verifier
    pub accounts: Vec<StaticAccount>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self::from(AuthflowConfig::default())
    }
}

impl From<AuthflowConfig> for WebConfig {
    fn from(config: AuthflowConfig) -> Self {
        Self {
            host: config.server.host,
            port: config.server.port,
            auth_state_dir: config.server.auth_state_dir,
            site_password: config.server.site_password,
            test_mode: config.server.test_mode,
            sessions: config.sessions,
            accounts: config.accounts,
        }
    }
}

impl WebConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = AuthflowConfig::default();
        config.apply_env_overrides();
        Self::from(config)
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether requests must carry a site session cookie
    pub fn site_gate_enabled(&self) -> bool {
        self.site_password.is_some() && !self.test_mode
    }
}

/// Error types for the web server
#[derive(thiserror::Error, Debug)]
pub enum WebError {
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Session error: {0}")]
    Session(#[from] authflow_session::SessionError),

    #[error("Site authentication error: {0}")]
    SiteAuth(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for web operations
pub type WebResult<T> = Result<T, WebError>;

/// Initialize logging for the web server
pub fn init_logging(config: &authflow_core::LoggingConfig) -> WebResult<()> {
    authflow_core::init_logging(config)
        .map_err(|e| WebError::Config(format!("Failed to initialize logging: {}", e)))
}
