//! Shared test utilities for integration tests.
//!
//! This module provides common test infrastructure including:
//! - `TestApp` - the router wired to in-memory storages and a recording notifier
//! - Test constants and helper functions

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use pinboard_services::{
    auth::generate_session_token,
    config::Config,
    database::MockSqlStorage,
    notifications::RecordingNotifier,
    routes,
    users::{MockUserStorage, StoredUser},
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

/// Fixed user IDs so tokens and storage agree.
pub const ALICE_ID: Uuid = Uuid::from_u128(0x00000000_0000_0000_0000_000000000001);
pub const BOB_ID: Uuid = Uuid::from_u128(0x00000000_0000_0000_0000_000000000002);

/// Category seeded into every test app.
pub const CATEGORY_ID: Uuid = Uuid::from_u128(0x00000000_0000_0000_0000_0000000000c1);

/// JWT secret used for test token generation.
pub const TEST_JWT_SECRET: &str = "test-jwt-secret-key-for-local-development";

pub fn alice() -> StoredUser {
    StoredUser::with_id(ALICE_ID, "alice", "alice@example.com").with_name("Alice")
}

pub fn bob() -> StoredUser {
    StoredUser::with_id(BOB_ID, "bob", "bob@example.com")
}

/// Generate a valid session token for a user.
pub fn token_for(user: &StoredUser) -> String {
    generate_session_token(user.id, &user.email, TEST_JWT_SECRET).unwrap()
}

pub struct TestApp {
    pub router: Router,
    pub sql: MockSqlStorage,
    pub users: MockUserStorage,
    pub notifier: RecordingNotifier,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(Config::new_for_test()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let sql = MockSqlStorage::new().with_category(CATEGORY_ID, "Travel");
        let users = MockUserStorage::new().with_user(alice()).with_user(bob());
        let notifier = RecordingNotifier::new();
        let router = routes(
            sql.clone(),
            users.clone(),
            Arc::new(notifier.clone()),
            config,
        )
        .await;

        Self {
            router,
            sql,
            users,
            notifier,
        }
    }

    /// Sends a request and returns the status and the JSON body (`Null` when
    /// the body is empty or not JSON).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(request("GET", uri, token, None)).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        self.send(request("POST", uri, token, body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(request("PATCH", uri, token, Some(body))).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(request("DELETE", uri, token, None)).await
    }

    /// Creates a pin through the API and returns its id.
    pub async fn create_pin(&self, token: &str, description: &str, hashtags: &[&str]) -> String {
        let (status, json) = self
            .post(
                "/v1/pins",
                Some(token),
                Some(serde_json::json!({
                    "image": "https://img.example/pin.png",
                    "description": description,
                    "categoryId": CATEGORY_ID,
                    "hashtags": hashtags,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create pin failed: {json}");
        json["id"].as_str().unwrap().to_owned()
    }
}

/// Builds a request with an optional bearer token and JSON body.
pub fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}
