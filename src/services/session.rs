// SPDX-License-Identifier: MIT
// Copyright 2026 The Futurecard Authors

//! Server-side sessions keyed by a signed cookie token.
//!
//! The cookie carries `sid.mac` where mac = HMAC-SHA256(session key, sid);
//! all state stays in process memory. A tampered, expired, or unknown
//! cookie reads as "no session". Single-instance deployment is assumed,
//! matching the one-process App Engine shape this service replaces.

use std::time::{Duration, Instant};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::AppError;
use crate::models::StoredCredential;

type HmacSha256 = Hmac<Sha256>;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "futurecard_session";

const SESSION_TTL: Duration = Duration::from_secs(12 * 60 * 60);
const SESSION_ID_BYTES: usize = 32;
const STATE_TOKEN_BYTES: usize = 24;

/// Per-browser session state.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Anti-forgery token expected by the next `/connect`
    pub state_token: Option<String>,
    /// Google account ID once connected
    pub user_id: Option<String>,
    /// Credential captured at connect time
    pub credential: Option<StoredCredential>,
}

struct SessionEntry {
    session: Session,
    expires_at: Instant,
}

/// In-memory session store.
pub struct SessionStore {
    signing_key: [u8; 32],
    rng: SystemRandom,
    sessions: DashMap<String, SessionEntry>,
}

impl SessionStore {
    pub fn new(signing_key: [u8; 32]) -> Self {
        Self {
            signing_key,
            rng: SystemRandom::new(),
            sessions: DashMap::new(),
        }
    }

    /// Create a fresh empty session and return its signed cookie value.
    pub fn create(&self) -> Result<String, AppError> {
        self.purge_expired();

        let sid = self.random_token(SESSION_ID_BYTES)?;
        self.sessions.insert(
            sid.clone(),
            SessionEntry {
                session: Session::default(),
                expires_at: Instant::now() + SESSION_TTL,
            },
        );

        Ok(format!("{}.{}", sid, self.sign(&sid)))
    }

    /// Look up the session for a cookie value.
    pub fn get(&self, cookie: &str) -> Option<Session> {
        let sid = self.verify_cookie(cookie)?;

        if let Some(entry) = self.sessions.get(&sid) {
            if entry.expires_at > Instant::now() {
                return Some(entry.session.clone());
            }
        }

        self.sessions.remove(&sid);
        None
    }

    /// Mutate the session for a cookie value. Returns false when the
    /// cookie does not resolve to a live session.
    pub fn update<F: FnOnce(&mut Session)>(&self, cookie: &str, f: F) -> bool {
        let Some(sid) = self.verify_cookie(cookie) else {
            return false;
        };

        match self.sessions.get_mut(&sid) {
            Some(mut entry) if entry.expires_at > Instant::now() => {
                f(&mut entry.session);
                entry.expires_at = Instant::now() + SESSION_TTL;
                true
            }
            _ => false,
        }
    }

    /// Generate a state token suitable for storing in a session.
    pub fn new_state_token(&self) -> Result<String, AppError> {
        self.random_token(STATE_TOKEN_BYTES)
    }

    /// Constant-time comparison of a presented state parameter against
    /// the session's stored token.
    pub fn verify_state(&self, cookie: &str, presented: &str) -> bool {
        let Some(session) = self.get(cookie) else {
            return false;
        };
        let Some(expected) = session.state_token else {
            return false;
        };
        expected.as_bytes().ct_eq(presented.as_bytes()).into()
    }

    fn purge_expired(&self) {
        let now = Instant::now();
        self.sessions.retain(|_, entry| entry.expires_at > now);
    }

    fn random_token(&self, len: usize) -> Result<String, AppError> {
        let mut bytes = vec![0u8; len];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("system RNG failure")))?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }

    fn verify_cookie(&self, cookie: &str) -> Option<String> {
        let (sid, mac_hex) = cookie.split_once('.')?;
        let presented = hex::decode(mac_hex).ok()?;
        let expected = self.mac_bytes(sid);

        if expected.as_slice().ct_eq(&presented).into() {
            Some(sid.to_string())
        } else {
            None
        }
    }

    fn sign(&self, sid: &str) -> String {
        hex::encode(self.mac_bytes(sid))
    }

    fn mac_bytes(&self, sid: &str) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.signing_key).expect("HMAC accepts any key length");
        mac.update(sid.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}
