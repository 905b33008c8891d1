// SPDX-License-Identifier: MIT
// Copyright 2026 The Futurecard Authors

//! Webhook route for Mirror API timeline notifications.
//!
//! The Mirror API expects its callback to answer fast, so this handler
//! does no work of its own: it hands the raw body to the task dispatcher
//! for delivery to `/taskHandler` about a minute later and acknowledges.

use crate::error::Result;
use crate::services::dispatch::Schedule;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Router,
};
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Seconds between receiving a notification and handling it.
const DEFER_SECS: u64 = 60;

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/glassCallback", post(timeline_notification))
}

/// Placeholder for validating the delivery itself (signature, source IP).
/// The notification content is checked later by the task handler.
fn validate_delivery(_body: &Bytes) {}

/// Handle an incoming timeline notification (POST).
async fn timeline_notification(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    tracing::info!(bytes = body.len(), "Timeline notification received");

    validate_delivery(&body);

    // Two ways to say "one minute from now"; Cloud Tasks treats both as a
    // not-before time. Picking one at random keeps both paths exercised.
    let schedule = if rand::random::<bool>() {
        Schedule::After(DEFER_SECS)
    } else {
        Schedule::At(Utc::now() + Duration::seconds(DEFER_SECS as i64))
    };

    state
        .dispatcher
        .dispatch(&state.config.service_url, "/taskHandler", body, schedule)
        .await?;

    Ok((StatusCode::OK, "OK"))
}
