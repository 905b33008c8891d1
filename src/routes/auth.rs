// SPDX-License-Identifier: MIT
// Copyright 2026 The Futurecard Authors

//! Google OAuth connect and disconnect routes.
//!
//! The browser does the sign-in dance client-side and posts the one-time
//! authorization code here; this server exchanges it for its own tokens,
//! provisions the user's timeline subscription, and later revokes the
//! grant on disconnect.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::UserProperties;
use crate::services::google_identity::IdTokenError;
use crate::services::mirror::{MenuItem, NotificationConfig, Subscription, TimelineItem};
use crate::services::oauth::GLASS_SCOPES;
use crate::services::session::{Session, SESSION_COOKIE};
use crate::AppState;

/// Menu item id the device echoes back when the user picks "Random Ping!".
const RANDOM_PING_MENU_ID: &str = "random-ping-ahhhh";

const WELCOME_TEXT: &str = "Welcome to Futurecard! Choose Random Ping from menu for a future card.";

/// Client half of the sign-in flow, inlined in the page: posts the
/// one-time code to `/connect` with the embedded state token and wires
/// the disconnect button.
const SIGNIN_HELPER_JS: &str = r#"    var stateToken = document.querySelector('meta[name="glass-daily-card-state"]').content;

    function onSignInCallback(authResult) {
      if (authResult.code) {
        fetch('/connect?state=' + stateToken, {
          method: 'POST',
          headers: {'Content-Type': 'application/octet-stream; charset=utf-8'},
          body: authResult.code
        }).then(function (response) {
          if (response.ok) {
            document.getElementById('gConnect').hidden = true;
            document.getElementById('authOps').hidden = false;
          }
        });
      } else if (authResult.error) {
        console.log('Sign-in error: ' + authResult.error);
      }
    }

    document.getElementById('disconnect').addEventListener('click', function () {
      fetch('/disconnect', {method: 'POST'}).then(function (response) {
        if (response.ok) {
          document.getElementById('authOps').hidden = true;
          document.getElementById('gConnect').hidden = false;
        }
      });
    });"#;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index))
        .route("/connect", post(connect))
        .route("/disconnect", post(disconnect))
}

/// Resolve the session cookie, creating a fresh session when the jar has
/// none or the one presented no longer verifies.
fn ensure_session(state: &AppState, jar: CookieJar) -> Result<(CookieJar, String)> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        let value = cookie.value().to_string();
        if state.sessions.get(&value).is_some() {
            return Ok((jar, value));
        }
    }

    let value = state.sessions.create()?;
    let cookie = Cookie::build((SESSION_COOKIE, value.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::hours(12))
        .build();
    Ok((jar.add(cookie), value))
}

/// Display the main page.
///
/// Each render stores a fresh anti-forgery state token in the session and
/// embeds it in the page for the sign-in script to send back on `/connect`.
async fn index(State(state): State<Arc<AppState>>, jar: CookieJar) -> Result<impl IntoResponse> {
    let (jar, cookie_value) = ensure_session(&state, jar)?;

    let state_token = state.sessions.new_state_token()?;
    if !state
        .sessions
        .update(&cookie_value, |s| s.state_token = Some(state_token.clone()))
    {
        return Err(AppError::Internal(anyhow::anyhow!(
            "session disappeared while rendering index"
        )));
    }

    Ok((jar, Html(render_index(&state.config, &state_token))))
}

fn render_index(config: &Config, state_token: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <title>Futurecard</title>
  <meta name="glass-daily-card-state" content="{state_token}">
</head>
<body>
  <h1>Futurecard</h1>
  <p>Connect your timeline and every notification earns you a random ping one minute later.</p>
  <div id="gConnect">
    <button class="g-signin"
      data-scope="{scopes}"
      data-clientid="{client_id}"
      data-accesstype="offline"
      data-redirecturi="postmessage"
      data-cookiepolicy="single_host_origin"
      data-callback="onSignInCallback">
      Connect with Google
    </button>
  </div>
  <div id="authOps" hidden>
    <button id="disconnect">Disconnect</button>
  </div>
  <script>
{helper}
  </script>
  <script src="https://apis.google.com/js/client:platform.js" async defer></script>
</body>
</html>
"#,
        state_token = state_token,
        scopes = GLASS_SCOPES.join(" "),
        client_id = config.google_client_id,
        helper = SIGNIN_HELPER_JS,
    )
}

#[derive(Deserialize)]
pub struct ConnectParams {
    /// Missing state reads as empty, which can never match a real token.
    #[serde(default)]
    state: String,
}

/// Store the user's credentials and finish signing them in (POST).
///
/// The body is the one-time authorization code produced by the client-side
/// sign-in flow.
async fn connect(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ConnectParams>,
    jar: CookieJar,
    code: String,
) -> Result<impl IntoResponse> {
    // Ensure that the request is not a forgery and that the user sending
    // this connect request is the one we served the page to.
    let cookie_value = match jar.get(SESSION_COOKIE) {
        Some(cookie) => cookie.value().to_string(),
        None => {
            tracing::warn!("Connect attempt without a session cookie");
            return Err(AppError::StateMismatch);
        }
    };
    if !state.sessions.verify_state(&cookie_value, &params.state) {
        tracing::warn!("Connect attempt with a stale or forged state parameter");
        return Err(AppError::StateMismatch);
    }

    let tokens = state.oauth.exchange_code(&code).await?;

    // The account ID comes from the ID token, never from anything the
    // client could have typed in.
    let identity = state
        .identity
        .verify(&tokens.id_token)
        .await
        .map_err(|e| match e {
            IdTokenError::Rejected(detail) => AppError::CodeExchange(detail),
            IdTokenError::Transient(detail) => AppError::Internal(anyhow::anyhow!(detail)),
        })?;

    let session = state.sessions.get(&cookie_value).unwrap_or_default();
    if session.credential.is_some()
        && session.user_id.as_deref() == Some(identity.subject.as_str())
    {
        tracing::info!(user_id = %identity.subject, "User already connected");
        return Ok((StatusCode::OK, Json("Current user is already connected.")));
    }

    let credential = tokens.into_credential();
    state.sessions.update(&cookie_value, |s| {
        s.user_id = Some(identity.subject.clone());
        s.credential = Some(credential.clone());
    });

    // First connection: persist the credential and properties, register for
    // timeline notifications, and drop the welcome card. Returning users
    // just get their session refreshed.
    if state.credentials.get(&identity.subject).await?.is_none() {
        state.credentials.put(&identity.subject, &credential).await?;

        let props = UserProperties::new(identity.subject.clone());
        state.db.upsert_user_properties(&props).await?;

        let subscription = Subscription {
            collection: "timeline".to_string(),
            user_token: identity.subject.clone(),
            verify_token: state.config.subscription_verify_token(),
            callback_url: format!("{}/glassCallback", state.config.service_url),
            operation: vec!["UPDATE".to_string()],
        };
        state
            .timeline
            .insert_subscription(&credential.access_token, &subscription)
            .await?;

        let welcome = TimelineItem {
            text: WELCOME_TEXT.to_string(),
            notification: Some(NotificationConfig::default_level()),
            menu_items: vec![
                MenuItem::custom(RANDOM_PING_MENU_ID, "Random Ping!"),
                MenuItem::delete(),
            ],
        };
        state
            .timeline
            .insert_timeline_item(&credential.access_token, &welcome)
            .await?;

        tracing::info!(user_id = %identity.subject, "New user provisioned");
    }

    Ok((StatusCode::OK, Json("Successfully connected user.")))
}

/// Disconnect the user from the application (POST).
async fn disconnect(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse> {
    let cookie_value = match jar.get(SESSION_COOKIE) {
        Some(cookie) => cookie.value().to_string(),
        None => return Err(AppError::NotConnected),
    };
    let (user_id, credential) = match state.sessions.get(&cookie_value) {
        Some(Session {
            user_id: Some(user_id),
            credential: Some(credential),
            ..
        }) => (user_id, credential),
        _ => return Err(AppError::NotConnected),
    };

    // Revoke first. If the provider refuses, leave everything in place so
    // stored state never disagrees with the grant Google still honors.
    state.oauth.revoke_token(&credential.access_token).await?;

    let (creds_result, props_result) = futures_util::join!(
        state.credentials.delete(&user_id),
        state.db.delete_user_properties(&user_id)
    );
    creds_result?;
    props_result?;

    state.sessions.update(&cookie_value, |s| {
        s.user_id = None;
        s.credential = None;
    });

    tracing::info!(user_id = %user_id, "User disconnected");
    Ok((StatusCode::OK, Json("Successfully disconnected.")))
}
