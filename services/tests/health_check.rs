use axum::http::StatusCode;
use axum_test::TestServer;
use pinboard_services::{
    config::{Config, Env},
    database::MockSqlStorage,
    notifications::LogNotifier,
    routes,
    users::MockUserStorage,
};
use std::sync::Arc;

#[tokio::test]
async fn test_health_check_integration() {
    // Case 1: Connected
    let config = Config::new_for_test();
    let app_connected = routes(
        MockSqlStorage::new(),
        MockUserStorage::new(),
        Arc::new(LogNotifier),
        config,
    )
    .await;
    let server_connected = TestServer::new(app_connected).unwrap();

    let response = server_connected.get("/is-health").await;
    response.assert_status(StatusCode::OK);
    response.assert_text("OK");

    // Case 2: Disconnected
    let config = Config::new_for_test();
    let app_disconnected = routes(
        MockSqlStorage::disconnected(),
        MockUserStorage::new(),
        Arc::new(LogNotifier),
        config,
    )
    .await;
    let server_disconnected = TestServer::new(app_disconnected).unwrap();

    let response = server_disconnected.get("/is-health").await;
    response.assert_status(StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_health_check_reports_environment() {
    let config = Config::new_for_test_with_env(Env::Nightly);
    let app = routes(
        MockSqlStorage::new(),
        MockUserStorage::new(),
        Arc::new(LogNotifier),
        config,
    )
    .await;
    let server = TestServer::new(app).unwrap();

    let response = server.get("/is-health").await;
    response.assert_status(StatusCode::OK);
    assert_eq!(response.header("x-service-env"), "nightly");
    assert!(
        response
            .header("x-service-version")
            .to_str()
            .unwrap()
            .starts_with("nightly:")
    );
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let app = routes(
        MockSqlStorage::new(),
        MockUserStorage::new(),
        Arc::new(LogNotifier),
        Config::new_for_test(),
    )
    .await;
    let server = TestServer::new(app).unwrap();

    let response = server.get("/nope").await;
    response.assert_status(StatusCode::NOT_FOUND);
    response.assert_text("nothing to see here");
}
