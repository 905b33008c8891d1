//! OAuth credential records.
//!
//! `StoredCredential` is the decrypted form handed to request flows and
//! held in sessions. `EncryptedCredential` is the at-rest Firestore form
//! with token material run through KMS.

use serde::{Deserialize, Serialize};

/// Decrypted OAuth credential for a connected user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    pub access_token: String,
    /// Absent when Google re-issues without a refresh token
    pub refresh_token: Option<String>,
    /// When the access token expires (ISO 8601)
    pub expires_at: String,
    /// Granted OAuth scopes
    pub scopes: Vec<String>,
}

/// Credential document as stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedCredential {
    /// Encrypted access token (base64)
    pub access_token_encrypted: String,
    /// Encrypted refresh token (base64)
    pub refresh_token_encrypted: Option<String>,
    /// When the access token expires (ISO 8601)
    pub expires_at: String,
    /// Granted OAuth scopes
    pub scopes: Vec<String>,
}
