// SPDX-License-Identifier: MIT
// Copyright 2026 The Futurecard Authors

//! Futurecard: deferred timeline cards for Mirror API glassware
//!
//! This crate provides the backend that accepts timeline notifications on
//! a webhook, defers the real work through Cloud Tasks, and inserts a
//! random ping card into the user's timeline about a minute later.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use config::Config;
use db::FirestoreDb;
use services::{
    CredentialStore, GoogleIdVerifier, GoogleOAuthClient, SessionStore, TaskDispatcher,
    TimelineClient,
};

/// Shared application state.
///
/// The credential store and timeline client sit behind trait objects so
/// tests can swap in fakes without touching the handlers.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub credentials: Arc<dyn CredentialStore>,
    pub timeline: Arc<dyn TimelineClient>,
    pub oauth: GoogleOAuthClient,
    pub identity: GoogleIdVerifier,
    pub dispatcher: TaskDispatcher,
    pub sessions: SessionStore,
}
