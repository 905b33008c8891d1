//! Application configuration loaded from environment variables.
//!
//! Cloud Run injects secrets as environment variables via secret bindings,
//! so everything is read from the environment once at startup and cached
//! in memory.

use std::env;

use hkdf::Hkdf;
use sha2::Sha256;

/// Cloud Tasks queue that carries deferred notification tasks.
pub const NOTIFICATION_QUEUE_NAME: &str = "future-cards";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Google OAuth client ID (public)
    pub google_client_id: String,
    /// Public base URL of this service, used for the Mirror subscription
    /// callback and as the Cloud Tasks target
    pub service_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// GCP location for the task queue and KMS key ring
    pub gcp_location: String,
    /// Server port
    pub port: u16,

    // --- Secrets (injected via secret bindings) ---
    /// Google OAuth client secret
    pub google_client_secret: String,
    /// Master signing key. Never used directly; per-purpose keys are
    /// derived from it with HKDF under distinct labels.
    pub signing_key: Vec<u8>,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            google_client_id: "test-client-id.apps.googleusercontent.com".to_string(),
            service_url: "http://localhost:8080".to_string(),
            gcp_project_id: "test-project".to_string(),
            gcp_location: "us-central1".to_string(),
            port: 8080,
            google_client_secret: "test_secret".to_string(),
            signing_key: b"test_signing_key_32_bytes_min!!".to_vec(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            google_client_id: env::var("GOOGLE_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("GOOGLE_CLIENT_ID"))?,
            service_url: env::var("SERVICE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            gcp_location: env::var("GCP_LOCATION").unwrap_or_else(|_| "us-central1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            google_client_secret: env::var("GOOGLE_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("GOOGLE_CLIENT_SECRET"))?,
            signing_key: env::var("SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("SIGNING_KEY"))?
                .into_bytes(),
        })
    }

    /// Key used to MAC session cookie values.
    pub fn session_signing_key(&self) -> [u8; 32] {
        derive_key(&self.signing_key, b"futurecard:session-cookie")
    }

    /// Shared token sent with the Mirror timeline subscription and echoed
    /// back in notification payloads. Stable per deployment key.
    pub fn subscription_verify_token(&self) -> String {
        hex::encode(derive_key(&self.signing_key, b"futurecard:subscription-verify"))
    }
}

/// Derive a 32-byte purpose-specific key from the master signing key.
fn derive_key(master: &[u8], label: &[u8]) -> [u8; 32] {
    let hk = Hkdf::<Sha256>::new(None, master);
    let mut okm = [0u8; 32];
    hk.expand(label, &mut okm)
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    okm
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
