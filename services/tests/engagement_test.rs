//! Integration tests for likes, comments, views and saves.

mod common;

use axum::http::StatusCode;
use common::{ALICE_ID, TestApp, alice, bob, token_for};
use pinboard_services::notifications::ActivityKind;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn test_like_toggle_round_trip() {
    let app = TestApp::new().await;
    let pin = app.create_pin(&token_for(&alice()), "Sunset", &[]).await;
    let bob_token = token_for(&bob());
    let uri = format!("/v1/pins/{pin}/like");

    let (status, json) = app.post(&uri, Some(bob_token.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "liked": true, "likesCount": 1 }));

    let (_, json) = app.get(&uri, Some(bob_token.as_str())).await;
    assert_eq!(json, json!({ "liked": true, "likesCount": 1 }));

    let (_, json) = app.post(&uri, Some(bob_token.as_str()), None).await;
    assert_eq!(json, json!({ "liked": false, "likesCount": 0 }));

    let (_, json) = app.get(&uri, Some(bob_token.as_str())).await;
    assert_eq!(json, json!({ "liked": false, "likesCount": 0 }));
}

#[tokio::test]
async fn test_like_notifies_owner_only_for_other_users() {
    let app = TestApp::new().await;
    let alice_token = token_for(&alice());
    let pin = app.create_pin(&alice_token, "Sunset", &[]).await;

    app.post(&format!("/v1/pins/{pin}/like"), Some(alice_token.as_str()), None)
        .await;
    assert!(app.notifier.events().is_empty());

    app.post(
        &format!("/v1/pins/{pin}/like"),
        Some(token_for(&bob()).as_str()),
        None,
    )
    .await;

    let events = app.notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, ActivityKind::Like);
    assert_eq!(events[0].recipient_email, "alice@example.com");
    assert_eq!(events[0].photo_title, "Sunset");
}

#[tokio::test]
async fn test_like_missing_pin_returns_404() {
    let app = TestApp::new().await;

    let (status, json) = app
        .post(
            &format!("/v1/pins/{}/like", Uuid::new_v4()),
            Some(token_for(&bob()).as_str()),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "Pin not found");
}

#[tokio::test]
async fn test_like_requires_auth() {
    let app = TestApp::new().await;
    let pin = app.create_pin(&token_for(&alice()), "x", &[]).await;

    let (status, _) = app.post(&format!("/v1/pins/{pin}/like"), None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get(&format!("/v1/pins/{pin}/like"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_comment_lifecycle() {
    let app = TestApp::new().await;
    let alice_token = token_for(&alice());
    let bob_token = token_for(&bob());
    let pin = app.create_pin(&alice_token, "Harbor", &[]).await;
    let pin_id: Uuid = pin.parse().unwrap();

    let (status, json) = app
        .post(
            &format!("/v1/pins/{pin}/comments"),
            Some(bob_token.as_str()),
            Some(json!({ "text": "Lovely light" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["text"], "Lovely light");
    assert_eq!(json["user"]["username"], "bob");
    assert_eq!(json["user"]["name"], "bob");
    assert_eq!(json["pin"]["id"], pin);
    let comment_id = json["id"].as_str().unwrap().to_owned();

    let (_, json) = app.get(&format!("/v1/pins/{pin}/comments"), None).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["id"], comment_id);

    let (_, json) = app.get(&format!("/v1/pins/{pin}"), None).await;
    assert_eq!(json["comment"], 1);
    assert_eq!(json["comments"][0]["text"], "Lovely light");

    let (status, json) = app
        .patch(
            &format!("/v1/comments/{comment_id}"),
            Some(alice_token.as_str()),
            json!({ "text": "mine now" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["message"], "You are not allowed to modify this comment.");

    let (status, json) = app
        .patch(
            &format!("/v1/comments/{comment_id}"),
            Some(bob_token.as_str()),
            json!({ "text": "Lovely light, edited" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["text"], "Lovely light, edited");

    let (status, _) = app
        .delete(&format!("/v1/comments/{comment_id}"), Some(alice_token.as_str()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .delete(&format!("/v1/comments/{comment_id}"), Some(bob_token.as_str()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.sql.comment_count(pin_id), 0);

    let (_, json) = app.get(&format!("/v1/pins/{pin}"), None).await;
    assert_eq!(json["comment"], 0);

    let (status, _) = app
        .delete(&format!("/v1/comments/{comment_id}"), Some(bob_token.as_str()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_comment_notifies_owner() {
    let app = TestApp::new().await;
    let alice_token = token_for(&alice());
    let pin = app.create_pin(&alice_token, "Harbor", &[]).await;

    app.post(
        &format!("/v1/pins/{pin}/comments"),
        Some(token_for(&bob()).as_str()),
        Some(json!({ "text": "Wow" })),
    )
    .await;
    app.post(
        &format!("/v1/pins/{pin}/comments"),
        Some(alice_token.as_str()),
        Some(json!({ "text": "Thanks" })),
    )
    .await;

    let events = app.notifier.events();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.kind == ActivityKind::Comment));
    assert!(events.iter().all(|e| e.recipient_email == "alice@example.com"));
    assert_eq!(events[0].comment.as_deref(), Some("Wow"));
}

#[tokio::test]
async fn test_comment_rejects_empty_text_and_missing_pin() {
    let app = TestApp::new().await;
    let token = token_for(&bob());
    let pin = app.create_pin(&token_for(&alice()), "x", &[]).await;

    let (status, _) = app
        .post(
            &format!("/v1/pins/{pin}/comments"),
            Some(token.as_str()),
            Some(json!({ "text": "   " })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = app
        .post(
            &format!("/v1/pins/{}/comments", Uuid::new_v4()),
            Some(token.as_str()),
            Some(json!({ "text": "hello" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "Post not found.");

    let (status, json) = app
        .get(&format!("/v1/pins/{}/comments", Uuid::new_v4()), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!([]));
}

#[tokio::test]
async fn test_record_view_increments_counter() {
    let app = TestApp::new().await;
    let pin = app.create_pin(&token_for(&alice()), "x", &[]).await;
    let pin_id: Uuid = pin.parse().unwrap();
    let bob_token = token_for(&bob());

    for _ in 0..2 {
        let (status, json) = app
            .post(&format!("/v1/pins/{pin}/views"), Some(bob_token.as_str()), None)
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(json["id"].is_string());
    }

    assert_eq!(app.sql.view_count(pin_id), 2);
    let (_, json) = app.get(&format!("/v1/pins/{pin}"), None).await;
    assert_eq!(json["views"], 2);
}

#[tokio::test]
async fn test_save_lifecycle() {
    let app = TestApp::new().await;
    let pin = app.create_pin(&token_for(&alice()), "Keep me", &[]).await;
    let pin_id: Uuid = pin.parse().unwrap();
    let bob_token = token_for(&bob());
    let alice_token = token_for(&alice());

    let (status, json) = app
        .post(&format!("/v1/pins/{pin}/save"), Some(bob_token.as_str()), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let save_id = json["id"].as_str().unwrap().to_owned();

    let (status, json) = app
        .post(&format!("/v1/pins/{pin}/save"), Some(bob_token.as_str()), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "This post is already saved.");
    assert_eq!(app.sql.save_count(pin_id), 1);

    let (_, json) = app.get("/v1/saves", Some(bob_token.as_str())).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["description"], "Keep me");

    let (_, json) = app.get("/v1/saves", Some(alice_token.as_str())).await;
    assert_eq!(json, json!([]));

    let (status, _) = app
        .delete(&format!("/v1/saves/{save_id}"), Some(alice_token.as_str()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .delete(&format!("/v1/saves/{save_id}"), Some(bob_token.as_str()))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(app.sql.save_count(pin_id), 0);

    let (status, json) = app
        .delete(&format!("/v1/saves/{save_id}"), Some(bob_token.as_str()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "Item not found.");
}

#[tokio::test]
async fn test_pins_count_tracks_creates_and_deletes() {
    let app = TestApp::new().await;
    let token = token_for(&alice());
    let uri = format!("/v1/users/{ALICE_ID}/pins/count");

    let (status, json) = app.get(&uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "pinsCount": 0 }));

    let first = app.create_pin(&token, "one", &[]).await;
    app.create_pin(&token, "two", &[]).await;
    let (_, json) = app.get(&uri, None).await;
    assert_eq!(json["pinsCount"], 2);

    app.delete(&format!("/v1/pins/{first}"), Some(token.as_str())).await;
    let (_, json) = app.get(&uri, None).await;
    assert_eq!(json["pinsCount"], 1);
}
