//! Session token handling across the /v1 routes.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::Utc;
use common::{ALICE_ID, TEST_JWT_SECRET, TestApp, alice, bob, token_for};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use pinboard_services::auth::{ISSUER, SessionClaims, generate_session_token};
use uuid::Uuid;

fn me_with_header(name: header::HeaderName, value: &str) -> Request<Body> {
    Request::builder()
        .uri("/v1/me")
        .header(name, value)
        .body(Body::empty())
        .unwrap()
}

fn signed(claims: &SessionClaims) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

#[tokio::test]
async fn test_me_with_bearer_token() {
    let app = TestApp::new().await;

    let (status, json) = app.get("/v1/me", Some(token_for(&alice()).as_str())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], ALICE_ID.to_string());
    assert_eq!(json["username"], "alice");
    assert_eq!(json["email"], "alice@example.com");
    assert_eq!(json["name"], "Alice");
    assert_eq!(json["pinsCount"], 0);
}

#[tokio::test]
async fn test_me_without_token() {
    let app = TestApp::new().await;

    let (status, json) = app.get("/v1/me", None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "missing_token");
}

#[tokio::test]
async fn test_me_with_jwt_cookie() {
    let app = TestApp::new().await;
    let cookie = format!("jwt={}", token_for(&bob()));

    let (status, json) = app.send(me_with_header(header::COOKIE, &cookie)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["username"], "bob");
}

#[tokio::test]
async fn test_me_with_auth_token_cookie() {
    let app = TestApp::new().await;
    let cookie = format!("theme=dark; auth-token={}", token_for(&alice()));

    let (status, json) = app.send(me_with_header(header::COOKIE, &cookie)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["username"], "alice");
}

#[tokio::test]
async fn test_cookie_wins_over_bearer_header() {
    let app = TestApp::new().await;
    let request = Request::builder()
        .uri("/v1/me")
        .header(header::COOKIE, format!("jwt={}", token_for(&bob())))
        .header(
            header::AUTHORIZATION,
            format!("Bearer {}", token_for(&alice())),
        )
        .body(Body::empty())
        .unwrap();

    let (_, json) = app.send(request).await;

    assert_eq!(json["username"], "bob");
}

#[tokio::test]
async fn test_malformed_authorization_header() {
    let app = TestApp::new().await;
    let token = token_for(&alice());

    let (status, json) = app
        .send(me_with_header(header::AUTHORIZATION, &format!("Token {token}")))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "invalid_format");
}

#[tokio::test]
async fn test_token_signed_with_other_secret() {
    let app = TestApp::new().await;
    let token = generate_session_token(ALICE_ID, "alice@example.com", "another-secret").unwrap();

    let (status, json) = app.get("/v1/me", Some(token.as_str())).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "invalid_token");
}

#[tokio::test]
async fn test_expired_token() {
    let app = TestApp::new().await;
    let now = Utc::now().timestamp();
    let token = signed(&SessionClaims {
        sub: ALICE_ID.to_string(),
        email: "alice@example.com".to_owned(),
        is_admin: false,
        iat: now - 7200,
        exp: now - 3600,
        iss: ISSUER.to_owned(),
    });

    let (status, json) = app.get("/v1/me", Some(token.as_str())).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["message"], "Token has expired");
}

#[tokio::test]
async fn test_valid_token_for_unknown_user() {
    let app = TestApp::new().await;
    let token = generate_session_token(Uuid::new_v4(), "ghost@example.com", TEST_JWT_SECRET)
        .unwrap();

    let (status, json) = app.get("/v1/me", Some(token.as_str())).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "User not found.");
}

#[tokio::test]
async fn test_public_routes_need_no_token() {
    let app = TestApp::new().await;

    let uris = [
        "/v1/pins".to_owned(),
        "/v1/pins/search?q=x".to_owned(),
        "/v1/categories".to_owned(),
        format!("/v1/users/{ALICE_ID}/pins"),
        format!("/v1/users/{ALICE_ID}/pins/count"),
    ];
    for uri in &uris {
        let (status, _) = app.get(uri, None).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
    }
}

#[tokio::test]
async fn test_protected_routes_reject_anonymous() {
    let app = TestApp::new().await;
    let pin = app.create_pin(&token_for(&alice()), "x", &[]).await;

    let (status, _) = app.get("/v1/saves", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.post(&format!("/v1/pins/{pin}/save"), None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.post(&format!("/v1/pins/{pin}/views"), None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.delete(&format!("/v1/pins/{pin}"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
