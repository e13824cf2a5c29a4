#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use quillpost::{ServerConfig, create_app, db::Database, jwt::TokenLifetimes};
use serde_json::{Value, json};
use tower::ServiceExt;

pub const ACCESS_SECRET: &[u8] = b"test-access-secret-key-for-testing";
pub const REFRESH_SECRET: &[u8] = b"test-refresh-secret-key-for-testing";

pub struct TestApp {
    pub app: Router,
    pub db: Database,
}

/// Create a test app backed by an in-memory database.
pub async fn create_test_app() -> TestApp {
    create_test_app_with_lifetimes(TokenLifetimes::default()).await
}

pub async fn create_test_app_with_lifetimes(lifetimes: TokenLifetimes) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = ServerConfig {
        db: db.clone(),
        access_secret: ACCESS_SECRET.to_vec(),
        refresh_secret: REFRESH_SECRET.to_vec(),
        lifetimes,
    };
    TestApp {
        app: create_app(&config),
        db,
    }
}

/// A user registered through the API.
pub struct Account {
    pub id: String,
    pub access_token: String,
    pub refresh_token: String,
}

impl TestApp {
    /// Send a request and return the status and parsed JSON body (Null if empty).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    pub async fn post(&self, uri: &str, body: Value, token: Option<&str>) -> (StatusCode, Value) {
        self.send(json_request("POST", uri, body, token)).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> Account {
        let (status, body) = self
            .post(
                "/api/users/register",
                json!({ "username": username, "email": email, "password": password }),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        account_from(&body)
    }

    pub async fn login(&self, email: &str, password: &str) -> Account {
        let (status, body) = self
            .post(
                "/api/users/login",
                json!({ "email": email, "password": password }),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        account_from(&body)
    }

    pub async fn refresh(&self, refresh_token: &str) -> (StatusCode, Value) {
        self.post(
            "/api/users/refresh",
            json!({ "refreshToken": refresh_token }),
            None,
        )
        .await
    }
}

/// Build a JSON request with an optional bearer token.
pub fn json_request(method: &str, uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn account_from(body: &Value) -> Account {
    Account {
        id: body["user"]["id"].as_str().unwrap().to_string(),
        access_token: body["accessToken"].as_str().unwrap().to_string(),
        refresh_token: body["refreshToken"].as_str().unwrap().to_string(),
    }
}

pub async fn register_alice(app: &TestApp) -> Account {
    app.register("alice", "alice@example.com", "secret1").await
}

pub fn message(body: &Value) -> &str {
    body["message"].as_str().unwrap_or_default()
}
