// SPDX-License-Identifier: MIT
// Copyright 2026 The Futurecard Authors

//! Google OAuth2 client: authorization-code exchange and token revocation.
//!
//! The Glass frontend runs the sign-in flow with `postmessage` as the
//! redirect URI and hands the resulting one-time code to `/connect`.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Deserialize;

use crate::error::AppError;
use crate::models::StoredCredential;

const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_REVOKE_URL: &str = "https://accounts.google.com/o/oauth2/revoke";

/// Scopes the Glass frontend requests at sign-in.
pub const GLASS_SCOPES: [&str; 3] = [
    "https://www.googleapis.com/auth/glass.location",
    "https://www.googleapis.com/auth/glass.timeline",
    "https://www.googleapis.com/auth/plus.login",
];

/// Successful response from Google's token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenExchangeResponse {
    pub access_token: String,
    pub expires_in: i64,
    /// Absent when the user previously granted offline access
    pub refresh_token: Option<String>,
    /// Carries the user's Google account ID in its `sub` claim
    pub id_token: String,
    pub scope: Option<String>,
}

impl TokenExchangeResponse {
    /// Convert into the credential form that gets persisted.
    pub fn into_credential(self) -> StoredCredential {
        let expires_at = (chrono::Utc::now() + chrono::Duration::seconds(self.expires_in))
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        let scopes = match &self.scope {
            Some(scope) => scope.split_whitespace().map(str::to_string).collect(),
            None => GLASS_SCOPES.iter().map(|s| s.to_string()).collect(),
        };

        StoredCredential {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            scopes,
        }
    }
}

/// Google OAuth2 HTTP client.
pub struct GoogleOAuthClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    /// Present in offline mode; canned responses instead of HTTP calls.
    mock: Option<MockState>,
}

#[derive(Default)]
struct MockState {
    fail_codes: Mutex<HashSet<String>>,
    fail_revoke: AtomicBool,
}

impl GoogleOAuthClient {
    pub fn new(client_id: &str, client_secret: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            mock: None,
        }
    }

    /// Create an offline client for tests and local development.
    ///
    /// `exchange_code` mints a deterministic credential per code (the same
    /// code always maps to the same account), `revoke_token` succeeds.
    pub fn new_mock(client_id: &str, client_secret: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            mock: Some(MockState::default()),
        }
    }

    /// Codes that should fail exchange (offline mode only).
    pub fn set_mock_fail_codes<I, S>(&self, codes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(mock) = &self.mock {
            let mut guard = mock.fail_codes.lock().unwrap_or_else(|e| e.into_inner());
            guard.clear();
            guard.extend(codes.into_iter().map(Into::into));
        }
    }

    /// Make revocation fail (offline mode only).
    pub fn set_mock_revoke_failure(&self, fail: bool) {
        if let Some(mock) = &self.mock {
            mock.fail_revoke.store(fail, Ordering::Relaxed);
        }
    }

    /// Exchange a one-time authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenExchangeResponse, AppError> {
        if let Some(mock) = &self.mock {
            return self.mock_exchange(mock, code);
        }

        let response = self
            .http
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                // The Glass sign-in button runs the flow in the page and
                // posts the code back, so there is no real redirect URI.
                ("redirect_uri", "postmessage"),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::CodeExchange(format!("Token exchange request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Google token exchange failed");
            return Err(AppError::CodeExchange(format!(
                "Token exchange failed with status {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::CodeExchange(format!("Failed to parse token response: {}", e)))
    }

    /// Revoke an access or refresh token.
    ///
    /// GET https://accounts.google.com/o/oauth2/revoke?token={token}
    pub async fn revoke_token(&self, token: &str) -> Result<(), AppError> {
        if let Some(mock) = &self.mock {
            if mock.fail_revoke.load(Ordering::Relaxed) {
                return Err(AppError::RevocationFailed(
                    "mock revocation failure".to_string(),
                ));
            }
            return Ok(());
        }

        let url = format!("{}?token={}", GOOGLE_REVOKE_URL, urlencoding::encode(token));
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::RevocationFailed(format!("Revocation request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::RevocationFailed(format!(
                "Revocation failed with status {}",
                response.status()
            )));
        }

        tracing::info!("Google token revocation successful");
        Ok(())
    }

    fn mock_exchange(
        &self,
        mock: &MockState,
        code: &str,
    ) -> Result<TokenExchangeResponse, AppError> {
        let should_fail = mock
            .fail_codes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(code);
        if should_fail {
            return Err(AppError::CodeExchange(format!(
                "mock exchange failure for code {}",
                code
            )));
        }

        // Same code, same account: lets tests replay a connect.
        let subject = format!("user-{}", code);
        Ok(TokenExchangeResponse {
            access_token: format!("mock-access-{}", code),
            expires_in: 3600,
            refresh_token: Some(format!("mock-refresh-{}", code)),
            id_token: mock_id_token(&self.client_id, &subject),
            scope: None,
        })
    }
}

/// Mint an unsigned ID token for the offline exchange path. Only the
/// signature-skipping verifier mode accepts these.
fn mock_id_token(client_id: &str, subject: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT","kid":"mock-key"}"#);
    let claims = serde_json::json!({
        "iss": "https://accounts.google.com",
        "aud": client_id,
        "sub": subject,
        "iat": now,
        "exp": now + 3600,
    });
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.{}", header, payload, "sig")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject_of(id_token: &str) -> String {
        let payload = id_token.split('.').nth(1).unwrap();
        let claims: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap();
        claims["sub"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn mock_exchange_is_deterministic_per_code() {
        let oauth = GoogleOAuthClient::new_mock("client-1", "secret");

        let first = oauth.exchange_code("CODE_A").await.unwrap();
        let second = oauth.exchange_code("CODE_A").await.unwrap();
        assert_eq!(first.access_token, second.access_token);
        assert_eq!(subject_of(&first.id_token), subject_of(&second.id_token));

        let other = oauth.exchange_code("CODE_B").await.unwrap();
        assert_ne!(first.access_token, other.access_token);
        assert_ne!(subject_of(&first.id_token), subject_of(&other.id_token));
    }

    #[tokio::test]
    async fn mock_fail_codes_reject_exchange() {
        let oauth = GoogleOAuthClient::new_mock("client-1", "secret");
        oauth.set_mock_fail_codes(["BAD_CODE"]);

        assert!(matches!(
            oauth.exchange_code("BAD_CODE").await,
            Err(AppError::CodeExchange(_))
        ));
        assert!(oauth.exchange_code("GOOD_CODE").await.is_ok());
    }

    #[tokio::test]
    async fn mock_revocation_switch() {
        let oauth = GoogleOAuthClient::new_mock("client-1", "secret");
        assert!(oauth.revoke_token("tok").await.is_ok());

        oauth.set_mock_revoke_failure(true);
        assert!(matches!(
            oauth.revoke_token("tok").await,
            Err(AppError::RevocationFailed(_))
        ));
    }

    #[test]
    fn exchange_response_falls_back_to_glass_scopes() {
        let response = TokenExchangeResponse {
            access_token: "a".to_string(),
            expires_in: 3600,
            refresh_token: None,
            id_token: "t".to_string(),
            scope: None,
        };

        let credential = response.into_credential();
        assert_eq!(credential.scopes.len(), GLASS_SCOPES.len());
        assert!(credential
            .scopes
            .iter()
            .any(|s| s.ends_with("glass.timeline")));
    }
}
