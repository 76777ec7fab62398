use crate::config::Config;
use crate::database::SqlStorage;
use crate::notifications::ActivityNotifier;
use crate::users::{AppState, UserStorage};
use axum::{
    Router,
    extract::{Extension, Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{any, get},
};
use opentelemetry::{global, propagation::Extractor};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_opentelemetry::OpenTelemetrySpanExt;

pub mod auth;
pub mod config;
pub mod database;
pub mod internal;
pub mod notifications;
pub mod pins;
pub mod telemetry;
pub mod users;
pub mod v1;
pub mod version;

struct HeaderExtractor<'a>(&'a axum::http::HeaderMap);

impl<'a> Extractor for HeaderExtractor<'a> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}

/// Builds the application router over the given storages and notifier.
pub async fn routes<S, U>(
    sql_storage: S,
    user_storage: U,
    notifier: Arc<dyn ActivityNotifier>,
    config: Config,
) -> Router
where
    S: SqlStorage,
    U: UserStorage,
{
    let state = AppState::new(sql_storage, user_storage, notifier);

    let internal_routes = internal::create_internal_routes::<S, U>(&config);

    Router::new()
        .route("/is-health", get(health_check::<S, U>))
        .nest("/v1", v1::routes::<S, U>())
        .nest("/internal", internal_routes)
        .fallback(any(catch_all))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                // Continue the caller's trace when a W3C context header is present
                let parent_context = global::get_text_map_propagator(|propagator| {
                    propagator.extract(&HeaderExtractor(request.headers()))
                });

                let span = tracing::info_span!(
                    "http_request",
                    http_request.method = ?request.method(),
                    http_request.uri = ?request.uri(),
                    http_request.version = ?request.version(),
                    http_request.user_agent = ?request.headers().get(axum::http::header::USER_AGENT),
                );

                span.set_parent(parent_context);

                span
            }),
        )
        .layer(Extension(config))
        .with_state(state)
}

async fn health_check<S, U>(
    State(state): State<AppState<S, U>>,
    Extension(config): Extension<Config>,
) -> impl IntoResponse
where
    S: SqlStorage,
    U: UserStorage,
{
    let mut response = if state.sql_storage.is_connected().await {
        (StatusCode::OK, "OK").into_response()
    } else {
        (StatusCode::BAD_GATEWAY, "502").into_response()
    };

    let headers = [
        ("x-service-env", config.environment().to_string()),
        (
            "x-service-version",
            version::format_version_for_env(config.environment()),
        ),
    ];
    for (name, value) in headers {
        if let Ok(value) = HeaderValue::from_str(&value) {
            response
                .headers_mut()
                .insert(HeaderName::from_static(name), value);
        }
    }

    response
}

async fn catch_all() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "nothing to see here")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MockSqlStorage;
    use crate::notifications::LogNotifier;
    use crate::users::MockUserStorage;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    async fn app(sql: MockSqlStorage) -> Router {
        routes(
            sql,
            MockUserStorage::new(),
            Arc::new(LogNotifier),
            Config::new_for_test(),
        )
        .await
    }

    #[tokio::test]
    async fn test_health_check_connected() {
        let response = app(MockSqlStorage::new())
            .await
            .oneshot(
                Request::builder()
                    .uri("/is-health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("x-service-env").unwrap(), "local");
        assert!(response.headers().contains_key("x-service-version"));
    }

    #[tokio::test]
    async fn test_health_check_disconnected() {
        let response = app(MockSqlStorage::disconnected())
            .await
            .oneshot(
                Request::builder()
                    .uri("/is-health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_unknown_route_falls_back() {
        let response = app(MockSqlStorage::new())
            .await
            .oneshot(
                Request::builder()
                    .uri("/definitely/not/here")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
