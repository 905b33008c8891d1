// SPDX-License-Identifier: MIT
// Copyright 2026 The Futurecard Authors

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use futurecard::config::Config;
use futurecard::db::FirestoreDb;
use futurecard::error::AppError;
use futurecard::routes::create_router;
use futurecard::services::{
    EncryptedCredentialStore, GoogleIdVerifier, GoogleOAuthClient, KmsService, SessionStore,
    Subscription, TaskDispatcher, TimelineClient, TimelineItem,
};
use futurecard::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Timeline client that records calls instead of talking to the Mirror API.
#[derive(Default)]
pub struct RecordingTimeline {
    pub subscriptions: Mutex<Vec<(String, Subscription)>>,
    pub items: Mutex<Vec<(String, TimelineItem)>>,
    fail_all: AtomicBool,
}

impl RecordingTimeline {
    /// Make every timeline call fail, for error-path tests.
    #[allow(dead_code)]
    pub fn set_fail(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::Relaxed);
    }

    #[allow(dead_code)]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().unwrap().len()
    }

    #[allow(dead_code)]
    pub fn item_count(&self) -> usize {
        self.items.lock().unwrap().len()
    }
}

#[async_trait]
impl TimelineClient for RecordingTimeline {
    async fn insert_subscription(
        &self,
        access_token: &str,
        subscription: &Subscription,
    ) -> Result<(), AppError> {
        if self.fail_all.load(Ordering::Relaxed) {
            return Err(AppError::MirrorApi("mock subscription failure".to_string()));
        }
        self.subscriptions
            .lock()
            .unwrap()
            .push((access_token.to_string(), subscription.clone()));
        Ok(())
    }

    async fn insert_timeline_item(
        &self,
        access_token: &str,
        item: &TimelineItem,
    ) -> Result<(), AppError> {
        if self.fail_all.load(Ordering::Relaxed) {
            return Err(AppError::MirrorApi("mock timeline failure".to_string()));
        }
        self.items
            .lock()
            .unwrap()
            .push((access_token.to_string(), item.clone()));
        Ok(())
    }
}

/// Everything a test needs to drive and inspect the offline app.
pub struct TestApp {
    pub router: axum::Router,
    #[allow(dead_code)]
    pub state: Arc<AppState>,
    #[allow(dead_code)]
    pub timeline: Arc<RecordingTimeline>,
}

/// Create a test app with offline mock dependencies.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    let config = Config::default();
    let db = FirestoreDb::new_memory();

    let kms = KmsService::new_mock();
    let credentials = Arc::new(EncryptedCredentialStore::new(db.clone(), kms));

    let timeline = Arc::new(RecordingTimeline::default());
    let oauth = GoogleOAuthClient::new_mock(&config.google_client_id, &config.google_client_secret);
    let identity = GoogleIdVerifier::new_mock(&config.google_client_id);
    let dispatcher = TaskDispatcher::new_recording();
    let sessions = SessionStore::new(config.session_signing_key());

    let state = Arc::new(AppState {
        config,
        db,
        credentials,
        timeline: timeline.clone(),
        oauth,
        identity,
        dispatcher,
        sessions,
    });

    TestApp {
        router: create_router(state.clone()),
        state,
        timeline,
    }
}

/// Pull the `name=value` session cookie pair out of a response.
#[allow(dead_code)]
pub fn session_cookie_from(response: &axum::http::Response<Body>) -> String {
    response
        .headers()
        .get(axum::http::header::SET_COOKIE)
        .expect("response sets a session cookie")
        .to_str()
        .expect("cookie is ASCII")
        .split(';')
        .next()
        .expect("cookie has a name=value pair")
        .trim()
        .to_string()
}

/// Pull the anti-forgery state token out of the index page.
#[allow(dead_code)]
pub fn state_token_from(html: &str) -> String {
    let marker = "name=\"glass-daily-card-state\" content=\"";
    let start = html.find(marker).expect("index embeds the state meta tag") + marker.len();
    let end = html[start..].find('"').expect("meta content is quoted") + start;
    html[start..end].to_string()
}

/// GET `/` and return the session cookie pair plus the embedded state token.
#[allow(dead_code)]
pub async fn start_session(app: &TestApp) -> (String, String) {
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = session_cookie_from(&response);
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    let html = String::from_utf8(body.to_vec()).unwrap();

    (cookie, state_token_from(&html))
}

/// Drive a full successful connect with the mock OAuth client.
///
/// The mock exchange derives the account from the code, so the same code
/// always connects the same user. Returns the session cookie and user id.
#[allow(dead_code)]
pub async fn connect_user(app: &TestApp, code: &str) -> (String, String) {
    let (cookie, state_token) = start_session(app).await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/connect?state={state_token}"))
                .header("cookie", &cookie)
                .body(Body::from(code.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    (cookie, format!("user-{code}"))
}
