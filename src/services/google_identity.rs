// SPDX-License-Identifier: MIT
// Copyright 2026 The Futurecard Authors

//! Google ID token verification for the OAuth connect flow.
//!
//! `/connect` trusts the `sub` claim of the ID token that comes back with
//! the code exchange, so the token is verified against Google's JWKS
//! before any account state is touched.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};

const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const GOOGLE_ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];
const HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const CLOCK_SKEW_SECS: u64 = 60;

/// Identity extracted from a valid Google ID token.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    /// Google account ID (`sub` claim); the user key everywhere else
    pub subject: String,
    pub email: Option<String>,
}

/// ID token verification error categories.
#[derive(Debug, Clone)]
pub enum IdTokenError {
    /// The token or its claims are unacceptable.
    Rejected(String),
    /// Key material could not be fetched; retrying may succeed.
    Transient(String),
}

enum VerifierMode {
    /// Full RS256 verification against Google's JWKS.
    Jwks,
    /// Claim checks only, signature ignored. Offline tests and local
    /// development; never built into a release configuration path.
    Unverified,
}

struct JwksCache {
    keys_by_kid: HashMap<String, Arc<DecodingKey>>,
    expires_at: Instant,
}

/// Verifier for Google-issued OAuth ID tokens.
pub struct GoogleIdVerifier {
    http_client: reqwest::Client,
    /// Expected audience: our OAuth client ID
    client_id: String,
    mode: VerifierMode,
    jwks_cache: RwLock<Option<JwksCache>>,
    refresh_lock: Mutex<()>,
}

impl GoogleIdVerifier {
    /// Create a production verifier that fetches and caches Google's JWKS.
    pub fn new(client_id: &str) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http_client,
            client_id: client_id.to_string(),
            mode: VerifierMode::Jwks,
            jwks_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Create a verifier that checks claims but not signatures, for use
    /// with the mock OAuth client's unsigned tokens.
    pub fn new_mock(client_id: &str) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            client_id: client_id.to_string(),
            mode: VerifierMode::Unverified,
            jwks_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Verify an ID token and extract the caller's identity.
    pub async fn verify(&self, token: &str) -> Result<VerifiedIdentity, IdTokenError> {
        match self.mode {
            VerifierMode::Unverified => self.verify_claims_only(token),
            VerifierMode::Jwks => self.verify_signed(token).await,
        }
    }

    async fn verify_signed(&self, token: &str) -> Result<VerifiedIdentity, IdTokenError> {
        let header = decode_header(token)
            .map_err(|e| IdTokenError::Rejected(format!("invalid JWT header: {e}")))?;

        if header.alg != Algorithm::RS256 {
            return Err(IdTokenError::Rejected(format!(
                "unexpected JWT alg: {:?}",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| IdTokenError::Rejected("missing JWT kid".to_string()))?;

        let decoding_key = self.key_for_kid(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&GOOGLE_ISSUERS);
        validation.set_audience(&[self.client_id.as_str()]);
        validation.leeway = CLOCK_SKEW_SECS;

        let token_data = decode::<IdTokenClaims>(token, decoding_key.as_ref(), &validation)
            .map_err(|e| IdTokenError::Rejected(format!("JWT validation failed: {e}")))?;

        let claims = token_data.claims;
        tracing::debug!(subject = %claims.sub, issuer = %claims.iss, "Verified Google ID token");

        Ok(VerifiedIdentity {
            subject: claims.sub,
            email: claims.email,
        })
    }

    /// Decode without signature verification, then apply the same claim
    /// policy the signed path enforces.
    fn verify_claims_only(&self, token: &str) -> Result<VerifiedIdentity, IdTokenError> {
        let mut segments = token.split('.');
        let (_header, payload) = match (segments.next(), segments.next(), segments.next()) {
            (Some(h), Some(p), Some(_sig)) => (h, p),
            _ => {
                return Err(IdTokenError::Rejected(
                    "token is not a three-segment JWT".to_string(),
                ))
            }
        };

        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| IdTokenError::Rejected(format!("invalid payload encoding: {e}")))?;
        let claims: IdTokenClaims = serde_json::from_slice(&payload)
            .map_err(|e| IdTokenError::Rejected(format!("invalid claims JSON: {e}")))?;

        if !GOOGLE_ISSUERS.contains(&claims.iss.as_str()) {
            return Err(IdTokenError::Rejected(format!(
                "unexpected issuer: {}",
                claims.iss
            )));
        }
        if claims.aud != self.client_id {
            return Err(IdTokenError::Rejected(format!(
                "unexpected audience: {}",
                claims.aud
            )));
        }
        let now = chrono::Utc::now().timestamp();
        if claims.exp + CLOCK_SKEW_SECS as i64 <= now {
            return Err(IdTokenError::Rejected("token is expired".to_string()));
        }

        Ok(VerifiedIdentity {
            subject: claims.sub,
            email: claims.email,
        })
    }

    async fn key_for_kid(&self, kid: &str) -> Result<Arc<DecodingKey>, IdTokenError> {
        if let Some(key) = self.cached_key(kid).await {
            return Ok(key);
        }

        // Second pass forces a refetch: Google rotates keys and a token
        // may be signed with one newer than our cache.
        for force_refresh in [false, true] {
            self.refresh_jwks(force_refresh).await?;
            if let Some(key) = self.cached_key(kid).await {
                return Ok(key);
            }
        }

        Err(IdTokenError::Rejected(format!(
            "JWT kid not found in JWKS after refresh: {kid}"
        )))
    }

    async fn cached_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        let cache = self.jwks_cache.read().await;
        cache
            .as_ref()
            .filter(|entry| entry.expires_at > Instant::now())
            .and_then(|entry| entry.keys_by_kid.get(kid))
            .cloned()
    }

    async fn refresh_jwks(&self, force_refresh: bool) -> Result<(), IdTokenError> {
        let _guard = self.refresh_lock.lock().await;

        if !force_refresh {
            let cache = self.jwks_cache.read().await;
            if cache
                .as_ref()
                .is_some_and(|entry| entry.expires_at > Instant::now())
            {
                return Ok(());
            }
        }

        tracing::debug!(jwks_url = GOOGLE_JWKS_URL, "Refreshing Google JWKS cache");

        let response = self
            .http_client
            .get(GOOGLE_JWKS_URL)
            .send()
            .await
            .map_err(|e| IdTokenError::Transient(format!("JWKS request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(IdTokenError::Transient(format!(
                "JWKS request returned status {}",
                response.status()
            )));
        }

        let ttl = response
            .headers()
            .get(CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_max_age)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CACHE_TTL);

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| IdTokenError::Transient(format!("invalid JWKS JSON: {e}")))?;

        let mut keys_by_kid = HashMap::new();
        for jwk in jwks.keys {
            let usable = jwk.kty == "RSA"
                && !jwk.kid.trim().is_empty()
                && jwk.alg.as_deref().is_none_or(|alg| alg == "RS256")
                && jwk.use_.as_deref().is_none_or(|use_| use_ == "sig");
            if !usable {
                continue;
            }

            match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => {
                    keys_by_kid.insert(jwk.kid, Arc::new(key));
                }
                Err(e) => {
                    tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA JWKS key");
                }
            }
        }

        if keys_by_kid.is_empty() {
            return Err(IdTokenError::Transient(
                "JWKS response did not include any usable RSA keys".to_string(),
            ));
        }

        *self.jwks_cache.write().await = Some(JwksCache {
            keys_by_kid,
            expires_at: Instant::now() + ttl,
        });

        tracing::debug!(ttl_secs = ttl.as_secs(), "Google JWKS cache refreshed");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    alg: Option<String>,
    n: String,
    e: String,
    #[serde(rename = "use")]
    use_: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    iss: String,
    aud: String,
    sub: String,
    exp: i64,
    email: Option<String>,
}

fn parse_max_age(value: &str) -> Option<u64> {
    value
        .split(',')
        .filter_map(|directive| directive.trim().strip_prefix("max-age="))
        .find_map(|raw| raw.trim_matches('"').parse().ok())
}
