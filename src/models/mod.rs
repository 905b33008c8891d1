// SPDX-License-Identifier: MIT
// Copyright 2026 The Futurecard Authors

//! Data models for the application.

pub mod credential;
pub mod notification;
pub mod user;

pub use credential::{EncryptedCredential, StoredCredential};
pub use notification::NotificationPayload;
pub use user::UserProperties;
