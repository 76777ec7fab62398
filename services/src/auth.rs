//! Session JWT authentication for `/v1/*` routes.
//!
//! Tokens are issued by the identity collaborator (and by the internal
//! user-creation route) and carried either in a cookie or in the
//! `Authorization` header.
//!
//! # Token lookup
//!
//! 1. cookie `jwt`
//! 2. cookie `auth-token`
//! 3. `Authorization: Bearer <token>`
//!
//! # Token Requirements
//!
//! The JWT must:
//! - Be signed (HS256) with the server's `JWT_SECRET`
//! - Have a valid `exp` (expiration) claim
//! - Have a `sub` (subject) claim containing the user id
//! - Have an `iss` (issuer) claim matching [`ISSUER`]

use std::convert::Infallible;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;

/// Issuer written into and required from every session token.
pub const ISSUER: &str = "Pinboard";

/// Lifetime of tokens issued by [`generate_session_token`].
pub const SESSION_TTL_DAYS: i64 = 7;

const COOKIE_NAMES: [&str; 2] = ["jwt", "auth-token"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    /// User id.
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// Issue a session token for `user_id`.
pub fn generate_session_token(
    user_id: Uuid,
    email: &str,
    jwt_secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = SessionClaims {
        sub: user_id.to_string(),
        email: email.to_owned(),
        is_admin: false,
        iat: now.timestamp(),
        exp: (now + Duration::days(SESSION_TTL_DAYS)).timestamp(),
        iss: ISSUER.to_owned(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
}

/// Validate a session JWT token and return the claims.
pub fn validate_session_token(token: &str, jwt_secret: &str) -> Result<SessionClaims, String> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;

    let token_data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => "Token has expired".to_owned(),
        jsonwebtoken::errors::ErrorKind::InvalidSignature => "Invalid token signature".to_owned(),
        jsonwebtoken::errors::ErrorKind::InvalidIssuer => "Invalid token issuer".to_owned(),
        _ => format!("Token validation failed: {}", e),
    })?;

    Ok(token_data.claims)
}

/// Where a request's token came from, or why none was usable.
#[derive(Debug, PartialEq, Eq)]
enum TokenLookup {
    Found(String),
    Malformed,
    Missing,
}

/// Extract the Bearer token from the Authorization header.
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let header_value = headers.get(AUTHORIZATION)?;
    let header_str = header_value.to_str().ok()?;

    let stripped = header_str.strip_prefix("Bearer ")?.trim();
    if stripped.is_empty() {
        return None;
    }
    Some(stripped)
}

fn extract_cookie_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    COOKIE_NAMES.iter().find_map(|name| {
        jar.get(name)
            .map(|cookie| cookie.value().to_owned())
            .filter(|value| !value.is_empty())
    })
}

fn lookup_token(headers: &HeaderMap) -> TokenLookup {
    if let Some(token) = extract_cookie_token(headers) {
        return TokenLookup::Found(token);
    }
    match extract_bearer_token(headers) {
        Some(token) => TokenLookup::Found(token.to_owned()),
        None if headers.get(AUTHORIZATION).is_some() => TokenLookup::Malformed,
        None => TokenLookup::Missing,
    }
}

/// Authenticated user context extracted from a valid session JWT.
///
/// # Rejection
///
/// Returns `SessionAuthError` (401 Unauthorized) if no token is provided,
/// the header is malformed, or the token fails validation.
#[derive(Debug, Clone)]
pub struct RequireAuth {
    user_id: Uuid,
}

impl RequireAuth {
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    fn from_token(token: &str, jwt_secret: &str) -> Result<Self, SessionAuthError> {
        let claims =
            validate_session_token(token, jwt_secret).map_err(SessionAuthError::invalid_token)?;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| SessionAuthError::invalid_token("Token subject is not a user id"))?;
        Ok(Self { user_id })
    }
}

/// Error type for session authentication failures.
#[derive(Debug, Serialize)]
pub struct SessionAuthError {
    pub error: String,
    pub message: String,
}

impl SessionAuthError {
    fn missing_token() -> Self {
        Self {
            error: "missing_token".to_owned(),
            message: "A session cookie or Bearer token is required".to_owned(),
        }
    }

    fn invalid_format() -> Self {
        Self {
            error: "invalid_format".to_owned(),
            message: "Authorization header must be in format: Bearer <token>".to_owned(),
        }
    }

    fn invalid_token(reason: impl Into<String>) -> Self {
        Self {
            error: "invalid_token".to_owned(),
            message: reason.into(),
        }
    }

    fn missing_config() -> Self {
        Self {
            error: "server_error".to_owned(),
            message: "Server configuration error".to_owned(),
        }
    }
}

impl IntoResponse for SessionAuthError {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, Json(self)).into_response()
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = SessionAuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Config is installed via the Extension layer in `routes`
        let config = parts
            .extensions
            .get::<Config>()
            .ok_or_else(SessionAuthError::missing_config)?;

        match lookup_token(&parts.headers) {
            TokenLookup::Found(token) => RequireAuth::from_token(&token, config.jwt_secret()),
            TokenLookup::Malformed => Err(SessionAuthError::invalid_format()),
            TokenLookup::Missing => Err(SessionAuthError::missing_token()),
        }
    }
}

/// Identity if the request carries a valid token, anonymous otherwise.
/// Never rejects.
#[derive(Debug, Clone)]
pub struct OptionalAuth(pub Option<RequireAuth>);

impl OptionalAuth {
    pub fn user_id(&self) -> Option<Uuid> {
        self.0.as_ref().map(RequireAuth::user_id)
    }
}

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match RequireAuth::from_request_parts(parts, state).await {
            Ok(auth) => Ok(OptionalAuth(Some(auth))),
            Err(err) => {
                tracing::debug!(reason = %err.message, "Treating request as anonymous");
                Ok(OptionalAuth(None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::COOKIE;

    const TEST_SECRET: &str = "test-jwt-secret-for-unit-tests";

    #[test]
    fn test_extract_bearer_token_valid() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer my-token-123".parse().unwrap());

        assert_eq!(extract_bearer_token(&headers), Some("my-token-123"));
    }

    #[test]
    fn test_extract_bearer_token_no_bearer_prefix() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "my-token-123".parse().unwrap());

        assert_eq!(extract_bearer_token(&headers), None);
        assert_eq!(lookup_token(&headers), TokenLookup::Malformed);
    }

    #[test]
    fn test_extract_bearer_token_empty_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer ".parse().unwrap());

        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn test_cookie_takes_precedence_over_header() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, "auth-token=from-cookie".parse().unwrap());
        headers.insert(AUTHORIZATION, "Bearer from-header".parse().unwrap());

        assert_eq!(
            lookup_token(&headers),
            TokenLookup::Found("from-cookie".to_owned())
        );
    }

    #[test]
    fn test_jwt_cookie_before_auth_token_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, "auth-token=second; jwt=first".parse().unwrap());

        assert_eq!(extract_cookie_token(&headers), Some("first".to_owned()));
    }

    #[test]
    fn test_missing_everything() {
        let headers = HeaderMap::new();
        assert_eq!(lookup_token(&headers), TokenLookup::Missing);
    }

    #[test]
    fn test_validate_session_token_success() {
        let user_id = Uuid::new_v4();
        let token = generate_session_token(user_id, "alice@example.com", TEST_SECRET).unwrap();
        let claims = validate_session_token(&token, TEST_SECRET).unwrap();

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.iss, ISSUER);
        assert!(!claims.is_admin);
        assert_eq!(claims.exp - claims.iat, SESSION_TTL_DAYS * 24 * 60 * 60);
    }

    #[test]
    fn test_validate_session_token_wrong_secret() {
        let token = generate_session_token(Uuid::new_v4(), "a@example.com", TEST_SECRET).unwrap();
        let result = validate_session_token(&token, "wrong-secret");

        assert!(result.unwrap_err().contains("Invalid token signature"));
    }

    #[test]
    fn test_validate_session_token_wrong_issuer() {
        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            sub: Uuid::new_v4().to_string(),
            email: "a@example.com".to_owned(),
            is_admin: false,
            iat: now,
            exp: now + 3600,
            iss: "Someone Else".to_owned(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap();

        let result = validate_session_token(&token, TEST_SECRET);
        assert!(result.unwrap_err().contains("issuer"));
    }

    #[test]
    fn test_require_auth_rejects_non_uuid_subject() {
        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            sub: "alice".to_owned(),
            email: "a@example.com".to_owned(),
            is_admin: false,
            iat: now,
            exp: now + 3600,
            iss: ISSUER.to_owned(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap();

        let err = RequireAuth::from_token(&token, TEST_SECRET).unwrap_err();
        assert_eq!(err.error, "invalid_token");
    }

    #[test]
    fn test_session_auth_error_into_response() {
        let response = SessionAuthError::missing_token().into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(SessionAuthError::missing_config().error, "server_error");
    }
}
