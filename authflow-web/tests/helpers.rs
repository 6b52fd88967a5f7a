//! Integration test helpers
//!
//! Spawns the full application on a random port and talks to it over HTTP.

#![allow(dead_code)]

use authflow_core::{SecondFactor, SessionSettings, StaticAccount};
use authflow_web::{AppState, WebConfig};
use serde_json::{json, Value};
use std::sync::LazyLock;
use tempfile::TempDir;
use tokio::net::TcpListener;

// Initialize tracing once for all tests
static TRACING: LazyLock<()> = LazyLock::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    } else {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_writer(std::io::sink)
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    }
});

pub const PASSWORD: &str = "pw";

/// Test application instance
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub api_client: reqwest::Client,
    pub state: AppState,
    pub state_dir: TempDir,
}

impl TestApp {
    pub async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.api_client
            .post(format!("{}{}", &self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.api_client
            .get(format!("{}{}", &self.address, path))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Start a session and return its id
    pub async fn start_session(&self) -> String {
        let response = self.post_json("/api/login/start", &json!({})).await;
        assert_eq!(response.status().as_u16(), 200);
        let body: Value = response.json().await.unwrap();
        body["session_id"].as_str().unwrap().to_string()
    }

    pub async fn submit_credentials(&self, session_id: &str, username: &str, password: &str) -> reqwest::Response {
        self.post_json(
            "/api/login/credentials",
            &json!({"session_id": session_id, "username": username, "password": password}),
        )
        .await
    }

    pub async fn submit_code(&self, session_id: &str, code: &str) -> reqwest::Response {
        self.post_json(
            "/api/login/2fa",
            &json!({"session_id": session_id, "code": code}),
        )
        .await
    }

    pub async fn mobile_wait(&self, session_id: &str, timeout_seconds: f64) -> reqwest::Response {
        self.post_json(
            "/api/login/mobile-wait",
            &json!({"session_id": session_id, "timeout_seconds": timeout_seconds}),
        )
        .await
    }

    pub async fn cancel(&self, session_id: &str) -> reqwest::Response {
        self.post_json("/api/login/cancel", &json!({"session_id": session_id}))
            .await
    }

    pub async fn status(&self, session_id: &str) -> reqwest::Response {
        self.get(&format!("/api/login/status/{}", session_id)).await
    }
}

/// Accounts covering every second-factor branch
pub fn test_accounts() -> Vec<StaticAccount> {
    let account = |username: &str, second_factor: SecondFactor| StaticAccount {
        username: username.to_string(),
        password: PASSWORD.to_string(),
        resolved_username: None,
        second_factor,
    };

    vec![
        StaticAccount {
            resolved_username: Some("Plain-User".to_string()),
            ..account("plain", SecondFactor::None)
        },
        account(
            "totp",
            SecondFactor::Totp {
                code: "123456".to_string(),
            },
        ),
        account(
            "push",
            SecondFactor::Mobile {
                verification_code: Some("42".to_string()),
                approve_after_seconds: None,
                deny: false,
            },
        ),
        account(
            "auto-push",
            SecondFactor::Mobile {
                verification_code: None,
                approve_after_seconds: Some(1),
                deny: false,
            },
        ),
        account("robot", SecondFactor::Captcha),
    ]
}

pub fn test_config(state_dir: &TempDir) -> WebConfig {
    WebConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        auth_state_dir: state_dir.path().to_path_buf(),
        site_password: None,
        test_mode: false,
        sessions: SessionSettings {
            approval_poll_interval_ms: 20,
            max_wait_seconds: 5,
            default_wait_seconds: 1,
            ..SessionSettings::default()
        },
        accounts: test_accounts(),
    }
}

/// Start the test application
pub async fn spawn_app() -> TestApp {
    let state_dir = tempfile::tempdir().unwrap();
    let config = test_config(&state_dir);
    spawn_app_with_config(config, state_dir).await
}

/// Start the test application behind the site password gate
pub async fn spawn_app_with_site_password(password: &str) -> TestApp {
    let state_dir = tempfile::tempdir().unwrap();
    let config = WebConfig {
        site_password: Some(password.to_string()),
        ..test_config(&state_dir)
    };
    spawn_app_with_config(config, state_dir).await
}

pub async fn spawn_app_with_config(config: WebConfig, state_dir: TempDir) -> TestApp {
    LazyLock::force(&TRACING);

    let state = AppState::new(config).await.unwrap();
    let app = authflow_web::create_app(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .cookie_store(true)
        .build()
        .unwrap();

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        port,
        api_client: client,
        state,
        state_dir,
    }
}
