//! SessionClient against a live authflow-web server

use authflow_client::{ClientConfig, ClientError, HttpLoginApi, LoginApi, SessionClient};
use authflow_core::{LoginOutcome, SecondFactor, SessionSettings, SessionState, StaticAccount};
use authflow_web::{AppState, WebConfig};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

const PASSWORD: &str = "pw";

struct TestServer {
    base_url: String,
    // Dropping the directory would pull the registry out from under the server
    _state_dir: TempDir,
}

fn accounts() -> Vec<StaticAccount> {
    let account = |username: &str, second_factor: SecondFactor| StaticAccount {
        username: username.to_string(),
        password: PASSWORD.to_string(),
        resolved_username: None,
        second_factor,
    };

    vec![
        account("plain", SecondFactor::None),
        account(
            "sms",
            SecondFactor::Sms {
                code: "654321".to_string(),
            },
        ),
        account(
            "push",
            SecondFactor::Mobile {
                verification_code: Some("17".to_string()),
                approve_after_seconds: None,
                deny: false,
            },
        ),
    ]
}

async fn spawn_server(site_password: Option<&str>) -> TestServer {
    let state_dir = tempfile::tempdir().unwrap();
    let config = WebConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        auth_state_dir: state_dir.path().to_path_buf(),
        site_password: site_password.map(str::to_string),
        test_mode: false,
        sessions: SessionSettings {
            approval_poll_interval_ms: 20,
            max_wait_seconds: 5,
            ..SessionSettings::default()
        },
        accounts: accounts(),
    };

    let state = AppState::new(config).await.unwrap();
    let app = authflow_web::create_app(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base_url: format!("http://127.0.0.1:{}", port),
        _state_dir: state_dir,
    }
}

fn client_for(server: &TestServer, site_password: Option<&str>) -> SessionClient {
    let config =
        ClientConfig::new(&server.base_url).with_site_password(site_password.map(str::to_string));
    SessionClient::new(Arc::new(HttpLoginApi::new(config).unwrap()))
}

#[tokio::test]
async fn test_password_login_end_to_end() {
    let server = spawn_server(None).await;
    let mut client = client_for(&server, None);

    assert!(client.needs_login(None).await.unwrap());

    let outcome = client.login(None, "plain", PASSWORD).await.unwrap();
    assert_eq!(
        outcome,
        LoginOutcome::Success {
            username: "plain".to_string()
        }
    );
    assert!(!client.context().is_active());
    assert!(!client.needs_login(None).await.unwrap());
}

#[tokio::test]
async fn test_sms_code_retry_end_to_end() {
    let server = spawn_server(None).await;
    let mut client = client_for(&server, None);

    let outcome = client.login(Some("work"), "sms", PASSWORD).await.unwrap();
    assert_eq!(outcome.status(), "waiting_2fa");
    let session_id = client.session_id().unwrap().to_string();

    let outcome = client.submit_two_factor("000000").await.unwrap();
    assert_eq!(outcome.status(), "waiting_2fa");
    assert_eq!(client.session_id(), Some(session_id.as_str()));

    let outcome = client.submit_two_factor("654321").await.unwrap();
    assert_eq!(outcome.status(), "success");
    assert!(!client.needs_login(Some("work")).await.unwrap());
    assert!(client.needs_login(None).await.unwrap());
}

#[tokio::test]
async fn test_bad_password_clears_session() {
    let server = spawn_server(None).await;
    let mut client = client_for(&server, None);

    let outcome = client.login(None, "plain", "wrong").await.unwrap();
    assert_eq!(
        outcome,
        LoginOutcome::Error {
            error: "invalid credentials".to_string()
        }
    );
    assert!(!client.context().is_active());

    // A fresh attempt starts a new session
    let outcome = client.login(None, "plain", PASSWORD).await.unwrap();
    assert_eq!(outcome.status(), "success");
}

#[tokio::test]
async fn test_mobile_wait_then_cancel_end_to_end() {
    let server = spawn_server(None).await;
    let mut client = client_for(&server, None);

    let outcome = client.login(None, "push", PASSWORD).await.unwrap();
    assert_eq!(
        outcome,
        LoginOutcome::WaitingMobile {
            verification_code: Some("17".to_string())
        }
    );

    let outcome = client
        .wait_for_mobile(Some(Duration::from_millis(100)))
        .await
        .unwrap();
    assert_eq!(outcome.status(), "waiting_mobile");

    let snapshot = client.status().await.unwrap();
    assert_eq!(snapshot.status, SessionState::AwaitingMobileApproval);

    client.cancel().await.unwrap();
    assert!(!client.context().is_active());
    assert!(matches!(
        client.wait_for_mobile(None).await,
        Err(ClientError::NoSession)
    ));
}

#[tokio::test]
async fn test_server_side_expiry_reports_session_expired() {
    let server = spawn_server(None).await;
    let api = Arc::new(HttpLoginApi::new(ClientConfig::new(&server.base_url)).unwrap());
    let mut client = SessionClient::new(api.clone());

    client.login(None, "sms", PASSWORD).await.unwrap();
    let session_id = client.session_id().unwrap().to_string();

    // Another caller cancels the session behind the client's back
    api.cancel(&session_id).await.unwrap();

    let err = client.submit_two_factor("654321").await.unwrap_err();
    assert!(err.is_session_expired());
    assert!(!client.context().is_active());
}

#[tokio::test]
async fn test_client_passes_site_gate() {
    let server = spawn_server(Some("hunter2")).await;

    let mut gated = client_for(&server, None);
    let err = gated.login(None, "plain", PASSWORD).await.unwrap_err();
    assert!(matches!(err, ClientError::Server { status: 401, .. }));

    let mut client = client_for(&server, Some("hunter2"));
    let outcome = client.login(None, "plain", PASSWORD).await.unwrap();
    assert_eq!(outcome.status(), "success");
}
