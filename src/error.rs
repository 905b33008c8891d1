// SPDX-License-Identifier: MIT
// Copyright 2026 The Futurecard Authors

//! Application error types with consistent API responses.
//!
//! Synchronous HTTP paths answer with a status code plus a short JSON
//! string body (the wire format the Glass frontend expects). Internal
//! detail is logged, never returned.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// OAuth state parameter did not match the session token.
    #[error("Invalid state parameter.")]
    StateMismatch,

    /// Authorization-code exchange with Google failed.
    #[error("Failed to upgrade the authorization code.")]
    CodeExchange(String),

    /// Session carries no stored credential.
    #[error("Current user not connected.")]
    NotConnected,

    /// Google refused to revoke the access token.
    #[error("Failed to revoke token for given user.")]
    RevocationFailed(String),

    /// Cloud Tasks enqueue failed; the webhook surfaces this as a 5xx.
    #[error("Failed to schedule notification task.")]
    Schedule(String),

    /// Deferred task body was not a usable notification payload.
    #[error("Invalid notification payload: {0}")]
    PayloadParse(String),

    /// No credential record for the notifying user.
    #[error("No stored credential for user.")]
    CredentialNotFound(String),

    #[error("Mirror API error.")]
    MirrorApi(String),

    #[error("Database error.")]
    Database(String),

    #[error("Internal server error.")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::StateMismatch => StatusCode::UNAUTHORIZED,
            AppError::CodeExchange(detail) => {
                tracing::warn!(error = %detail, "Authorization code exchange failed");
                StatusCode::UNAUTHORIZED
            }
            AppError::NotConnected => StatusCode::UNAUTHORIZED,
            AppError::RevocationFailed(detail) => {
                tracing::warn!(error = %detail, "Token revocation failed");
                StatusCode::BAD_REQUEST
            }
            AppError::Schedule(detail) => {
                tracing::error!(error = %detail, "Task dispatch failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::PayloadParse(_) => StatusCode::BAD_REQUEST,
            AppError::CredentialNotFound(user_id) => {
                tracing::warn!(user_id = %user_id, "No stored credential for notifying user");
                StatusCode::NOT_FOUND
            }
            AppError::MirrorApi(detail) => {
                tracing::error!(error = %detail, "Mirror API call failed");
                StatusCode::BAD_GATEWAY
            }
            AppError::Database(detail) => {
                tracing::error!(error = %detail, "Database error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(self.to_string())).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
