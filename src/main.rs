// SPDX-License-Identifier: MIT
// Copyright 2026 The Futurecard Authors

//! Futurecard API Server
//!
//! Accepts Mirror API timeline notifications, defers the work through
//! Cloud Tasks, and pings the user's timeline about a minute later.

use futurecard::{
    config::Config,
    db::FirestoreDb,
    services::{
        EncryptedCredentialStore, GoogleIdVerifier, GoogleOAuthClient, KmsService, MirrorClient,
        SessionStore, TaskDispatcher,
    },
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Futurecard API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");

    // Initialize KMS service for credential encryption at rest
    let kms = KmsService::new(
        &config.gcp_project_id,
        &config.gcp_location,
        "credential-encryption",
    )
    .await
    .expect("Failed to initialize KMS service");
    tracing::info!("KMS service initialized");

    let credentials = Arc::new(EncryptedCredentialStore::new(db.clone(), kms));

    // Mirror API client for subscriptions and timeline cards
    let timeline = Arc::new(MirrorClient::new());

    // Google OAuth client and ID token verifier
    let oauth = GoogleOAuthClient::new(&config.google_client_id, &config.google_client_secret);
    let identity = GoogleIdVerifier::new(&config.google_client_id);

    // Initialize Cloud Tasks dispatcher
    let dispatcher = TaskDispatcher::new(&config.gcp_project_id, &config.gcp_location);
    tracing::info!(
        project = %config.gcp_project_id,
        "Cloud Tasks dispatcher initialized"
    );

    // Session store keyed off the injected signing key
    let sessions = SessionStore::new(config.session_signing_key());

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        credentials,
        timeline,
        oauth,
        identity,
        dispatcher,
        sessions,
    });

    // Build router
    let app = futurecard::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("futurecard=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
