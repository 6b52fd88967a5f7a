//! Route definitions for the authflow web server

use crate::{handlers, openapi, site_auth, AppState};
use axum::{
    routing::{get, post},
    Router,
};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // API description
        .route("/openapi.json", get(openapi::openapi_json))
        // Login protocol
        .nest("/login", login_routes())
}

/// Login session protocol
pub fn login_routes() -> Router<AppState> {
    Router::new()
        .route("/start", post(handlers::start_login))
        .route("/credentials", post(handlers::submit_credentials))
        .route("/2fa", post(handlers::submit_two_factor))
        .route("/mobile-wait", post(handlers::mobile_wait))
        .route("/cancel", post(handlers::cancel_login))
        .route("/status/{session_id}", get(handlers::login_status))
        .route("/needs-login", get(handlers::needs_login))
        .route("/reload", post(handlers::reload_login))
}

/// Site password gate
pub fn site_auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(site_auth::site_login))
        .route("/logout", post(site_auth::site_logout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AppState, WebConfig};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn test_state() -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = WebConfig {
            auth_state_dir: dir.path().to_path_buf(),
            ..WebConfig::default()
        };
        (AppState::new(config).await.unwrap(), dir)
    }

    #[tokio::test]
    async fn test_health_check_route() {
        let (state, _dir) = test_state().await;
        let app = api_routes().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_start_and_status_routes() {
        let (state, _dir) = test_state().await;
        let app = api_routes().with_state(state);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/login/start")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "initialized");
        let session_id = body["session_id"].as_str().unwrap().to_string();

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/login/status/{}", session_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let (state, _dir) = test_state().await;
        let app = api_routes().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/login/credentials")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"session_id": 1}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "bad_request");
    }
}
