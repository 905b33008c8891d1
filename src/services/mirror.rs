// SPDX-License-Identifier: MIT
// Copyright 2026 The Futurecard Authors

//! Google Mirror API client.
//!
//! Thin wrapper over the two timeline operations this service performs:
//! registering a notification subscription and inserting timeline cards.
//! The `TimelineClient` trait is the seam tests substitute with fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

const MIRROR_API_BASE: &str = "https://www.googleapis.com/mirror/v1";

// ─── Wire Types ──────────────────────────────────────────────────

/// How a timeline card announces itself on the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub level: String,
}

impl NotificationConfig {
    /// Standard chime-and-glow notification.
    pub fn default_level() -> Self {
        Self {
            level: "DEFAULT".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuValue {
    pub display_name: String,
}

/// Menu item attached to a timeline card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<MenuValue>,
}

impl MenuItem {
    /// Built-in delete action.
    pub fn delete() -> Self {
        Self {
            action: "DELETE".to_string(),
            id: None,
            values: Vec::new(),
        }
    }

    /// Custom action with a display name, reported back via userActions.
    pub fn custom(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            action: "CUSTOM".to_string(),
            id: Some(id.into()),
            values: vec![MenuValue {
                display_name: display_name.into(),
            }],
        }
    }
}

/// Timeline item insert body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineItem {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub menu_items: Vec<MenuItem>,
}

impl TimelineItem {
    /// A plain text card that notifies and can be deleted from the device.
    pub fn text_card(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            notification: Some(NotificationConfig::default_level()),
            menu_items: vec![MenuItem::delete()],
        }
    }
}

/// Timeline subscription body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub collection: String,
    pub user_token: String,
    pub verify_token: String,
    pub callback_url: String,
    pub operation: Vec<String>,
}

// ─── Client ──────────────────────────────────────────────────────

/// The two Mirror API operations request flows depend on.
#[async_trait]
pub trait TimelineClient: Send + Sync {
    /// Register a notification subscription for the authorized user.
    async fn insert_subscription(
        &self,
        access_token: &str,
        subscription: &Subscription,
    ) -> Result<()>;

    /// Insert a card into the authorized user's timeline.
    async fn insert_timeline_item(&self, access_token: &str, item: &TimelineItem) -> Result<()>;
}

/// HTTP Mirror API client.
#[derive(Clone)]
pub struct MirrorClient {
    client: reqwest::Client,
    base_url: String,
}

impl MirrorClient {
    pub fn new() -> Self {
        Self::with_base_url(MIRROR_API_BASE)
    }

    /// Point the client at a different base URL (local stub servers).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        access_token: &str,
        path: &str,
        body: &T,
    ) -> Result<()> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::MirrorApi(format!("Request failed: {}", e)))?;

        check_response(response).await
    }
}

impl Default for MirrorClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TimelineClient for MirrorClient {
    async fn insert_subscription(
        &self,
        access_token: &str,
        subscription: &Subscription,
    ) -> Result<()> {
        self.post_json(access_token, "/subscriptions", subscription)
            .await
    }

    async fn insert_timeline_item(&self, access_token: &str, item: &TimelineItem) -> Result<()> {
        self.post_json(access_token, "/timeline", item).await
    }
}

/// Map non-2xx Mirror responses to errors, keeping the body for logs.
async fn check_response(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    match status.as_u16() {
        401 => Err(AppError::MirrorApi(
            "Unauthorized: access token rejected".to_string(),
        )),
        429 => Err(AppError::MirrorApi("Rate limited by Mirror API".to_string())),
        _ => Err(AppError::MirrorApi(format!("HTTP {}: {}", status, body))),
    }
}
