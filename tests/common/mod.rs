//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, HeaderMap, Method, Request, StatusCode},
};
use http_body_util::BodyExt;
use records_api::config::AppConfig;
use records_api::db::{DataStoreConnector, SqlConnector};
use records_api::{build_app, App, AppState};
use serde_json::Value;
use tower::ServiceExt;

pub const CLIENT_A: &str = "192.0.2.10:40000";
pub const CLIENT_B: &str = "192.0.2.20:40000";

/// Defaults with a private in-memory database and an OS-assigned port.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.listener.host = "127.0.0.1".to_string();
    config.listener.port = 0;
    config.auth.jwt_secret = "integration-test-secret-0123456789".to_string();
    config
}

pub async fn test_state(config: AppConfig) -> AppState {
    let db = SqlConnector::new(config.database.clone())
        .connect()
        .await
        .expect("in-memory database should connect");
    AppState::new(config, db)
}

pub async fn test_router(config: AppConfig) -> App {
    build_app(test_state(config).await)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn error_code(&self) -> &str {
        self.body["error"]["code"].as_str().unwrap_or_default()
    }
}

/// Request builder that always carries a peer address, as a real socket would.
pub struct TestRequest {
    builder: axum::http::request::Builder,
    body: Body,
    peer: SocketAddr,
}

impl TestRequest {
    pub fn new(method: Method, uri: &str) -> Self {
        Self {
            builder: Request::builder().method(method).uri(uri),
            body: Body::empty(),
            peer: CLIENT_A.parse().unwrap(),
        }
    }

    pub fn get(uri: &str) -> Self {
        Self::new(Method::GET, uri)
    }

    pub fn post(uri: &str) -> Self {
        Self::new(Method::POST, uri)
    }

    pub fn from_peer(mut self, peer: &str) -> Self {
        self.peer = peer.parse().unwrap();
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header(header::AUTHORIZATION.as_str(), &format!("Bearer {}", token))
    }

    pub fn json(self, value: Value) -> Self {
        self.raw("application/json", value.to_string())
    }

    pub fn raw(mut self, content_type: &str, body: impl Into<String>) -> Self {
        self.builder = self.builder.header(header::CONTENT_TYPE, content_type);
        self.body = Body::from(body.into());
        self
    }

    pub async fn send(self, router: &App) -> TestResponse {
        let mut request = self.builder.body(self.body).unwrap();
        request.extensions_mut().insert(ConnectInfo(self.peer));

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

/// Register a user and return its token.
pub async fn register(router: &App, email: &str) -> String {
    let res = TestRequest::post("/api/auth/register")
        .json(serde_json::json!({
            "email": email,
            "password": "correct-horse-battery",
            "name": "Test User",
        }))
        .send(router)
        .await;
    assert_eq!(res.status, StatusCode::CREATED, "register failed: {}", res.body);
    res.body["token"].as_str().unwrap().to_string()
}
