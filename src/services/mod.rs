// SPDX-License-Identifier: MIT
// Copyright 2026 The Futurecard Authors

//! Services module - business logic layer.

pub mod credentials;
pub mod dispatch;
pub mod google_identity;
pub mod kms;
pub mod mirror;
pub mod oauth;
pub mod session;

pub use credentials::{CredentialStore, EncryptedCredentialStore};
pub use dispatch::{Schedule, ScheduledTask, TaskDispatcher};
pub use google_identity::{GoogleIdVerifier, IdTokenError, VerifiedIdentity};
pub use kms::KmsService;
pub use mirror::{MirrorClient, Subscription, TimelineClient, TimelineItem};
pub use oauth::GoogleOAuthClient;
pub use session::{Session, SessionStore, SESSION_COOKIE};
