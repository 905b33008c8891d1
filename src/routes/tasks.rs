// SPDX-License-Identifier: MIT
// Copyright 2026 The Futurecard Authors

//! Task handler route for Cloud Tasks callbacks.
//!
//! This endpoint is called by Cloud Tasks, not directly by users. A non-2xx
//! answer tells the queue to retry on its own policy; there is no retry
//! logic here.

use crate::error::{AppError, Result};
use crate::models::NotificationPayload;
use crate::services::mirror::TimelineItem;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Router,
};
use std::sync::Arc;
use validator::Validate;

const PING_HEADS: &str = "I was true! I'm a random string for the user!";
const PING_TAILS: &str = "I was false! I'm a random blah blah for the user!";

/// Task handler routes (called by Cloud Tasks).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/taskHandler", post(handle_notification))
}

/// Placeholder for checking the notification's verify token.
// TODO: compare against the verify token registered with the subscription
// once subscription records carry it per user.
fn verify_notification(_payload: &NotificationPayload) {}

/// Pick the ping text, 50/50.
fn random_ping_text() -> &'static str {
    if rand::random::<bool>() {
        PING_HEADS
    } else {
        PING_TAILS
    }
}

/// Handle a deferred timeline notification (POST, via Cloud Tasks).
async fn handle_notification(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse> {
    // Security Check: Ensure request comes from Cloud Tasks
    // The platform strips this header from external requests, so its presence
    // guarantees internal origin. We also verify the queue name.
    let queue_name_header = headers.get("x-cloudtasks-queuename");
    let is_valid_queue = queue_name_header
        .and_then(|h| h.to_str().ok())
        .map(|name| name == crate::config::NOTIFICATION_QUEUE_NAME)
        .unwrap_or(false);

    if !is_valid_queue {
        tracing::warn!(
            header = ?queue_name_header,
            "Security Alert: Blocked unauthorized access to task handler"
        );
        return Ok(StatusCode::FORBIDDEN.into_response());
    }

    let payload: NotificationPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::PayloadParse(e.to_string()))?;
    payload
        .validate()
        .map_err(|e| AppError::PayloadParse(e.to_string()))?;

    tracing::info!(
        user_id = %payload.user_token,
        item_id = %payload.item_id,
        "Processing timeline notification from Cloud Task"
    );

    verify_notification(&payload);

    let credential = state
        .credentials
        .get(&payload.user_token)
        .await?
        .ok_or_else(|| AppError::CredentialNotFound(payload.user_token.clone()))?;

    let card = TimelineItem::text_card(random_ping_text());
    state
        .timeline
        .insert_timeline_item(&credential.access_token, &card)
        .await?;

    tracing::info!(user_id = %payload.user_token, "Timeline card inserted");
    Ok(StatusCode::OK.into_response())
}
