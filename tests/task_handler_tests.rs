// SPDX-License-Identifier: MIT
// Copyright 2026 The Futurecard Authors

//! Integration tests for the deferred task handler.
//!
//! /taskHandler is only reachable from our Cloud Tasks queue, so the
//! first thing checked here is the queue-name guard. The rest covers
//! payload validation and the random ping card itself.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use futurecard::config::NOTIFICATION_QUEUE_NAME;
use serde_json::json;
use tower::ServiceExt;

const PING_TEXTS: [&str; 2] = [
    "I was true! I'm a random string for the user!",
    "I was false! I'm a random blah blah for the user!",
];

async fn post_task(
    app: &common::TestApp,
    queue_header: Option<&str>,
    body: String,
) -> axum::http::Response<Body> {
    let mut builder = Request::builder().method("POST").uri("/taskHandler");
    if let Some(queue) = queue_header {
        builder = builder.header("x-cloudtasks-queuename", queue);
    }

    app.router
        .clone()
        .oneshot(builder.body(Body::from(body)).unwrap())
        .await
        .unwrap()
}

fn notification_for(user_token: &str) -> String {
    json!({
        "collection": "timeline",
        "itemId": "item-42",
        "operation": ["UPDATE"],
        "userToken": user_token,
        "verifyToken": "verify-tok",
    })
    .to_string()
}

#[tokio::test]
async fn test_missing_queue_header_is_forbidden() {
    let app = common::create_test_app();
    let (_cookie, user_id) = common::connect_user(&app, "CODE_A").await;
    let items_before = app.timeline.item_count();

    let response = post_task(&app, None, notification_for(&user_id)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.timeline.item_count(), items_before);
}

#[tokio::test]
async fn test_wrong_queue_name_is_forbidden() {
    let app = common::create_test_app();
    let (_cookie, user_id) = common::connect_user(&app, "CODE_A").await;
    let items_before = app.timeline.item_count();

    let response = post_task(&app, Some("some-other-queue"), notification_for(&user_id)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.timeline.item_count(), items_before);
}

#[tokio::test]
async fn test_notification_inserts_ping_card() {
    let app = common::create_test_app();
    let (_cookie, user_id) = common::connect_user(&app, "CODE_A").await;

    // connect_user already inserted the welcome card.
    let items_before = app.timeline.item_count();

    let response = post_task(&app, Some(NOTIFICATION_QUEUE_NAME), notification_for(&user_id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.timeline.item_count(), items_before + 1);

    let items = app.timeline.items.lock().unwrap();
    let (token, card) = items.last().unwrap();
    assert_eq!(token, "mock-access-CODE_A");
    assert!(
        PING_TEXTS.contains(&card.text.as_str()),
        "unexpected card text: {}",
        card.text
    );
}

#[tokio::test]
async fn test_missing_user_token_is_rejected() {
    let app = common::create_test_app();

    let body = json!({"itemId": "item-42", "verifyToken": "verify-tok"}).to_string();
    let response = post_task(&app, Some(NOTIFICATION_QUEUE_NAME), body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    let message: String = serde_json::from_slice(&body).unwrap();
    assert!(message.starts_with("Invalid notification payload"));
    assert_eq!(app.timeline.item_count(), 0);
}

#[tokio::test]
async fn test_empty_user_token_is_rejected() {
    let app = common::create_test_app();

    let response = post_task(&app, Some(NOTIFICATION_QUEUE_NAME), notification_for("")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.timeline.item_count(), 0);
}

#[tokio::test]
async fn test_garbage_payload_is_rejected() {
    let app = common::create_test_app();

    let response =
        post_task(&app, Some(NOTIFICATION_QUEUE_NAME), "not json at all".to_string()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.timeline.item_count(), 0);
}

#[tokio::test]
async fn test_unknown_user_is_not_found() {
    let app = common::create_test_app();

    let response =
        post_task(&app, Some(NOTIFICATION_QUEUE_NAME), notification_for("user-nobody")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    let message: String = serde_json::from_slice(&body).unwrap();
    assert_eq!(message, "No stored credential for user.");
    assert_eq!(app.timeline.item_count(), 0);
}

#[tokio::test]
async fn test_mirror_failure_surfaces_as_bad_gateway() {
    let app = common::create_test_app();
    let (_cookie, user_id) = common::connect_user(&app, "CODE_A").await;

    app.timeline.set_fail(true);
    let response = post_task(&app, Some(NOTIFICATION_QUEUE_NAME), notification_for(&user_id)).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}
