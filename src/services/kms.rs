// SPDX-License-Identifier: MIT
// Copyright 2026 The Futurecard Authors

//! Cloud KMS service for encrypting/decrypting OAuth token material.
//!
//! Uses direct KMS encryption (not envelope encryption) for simplicity.
//! Every call passes the owning user's ID as additional authenticated
//! data, so a ciphertext copied into another user's document fails to
//! decrypt.

use crate::error::AppError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

/// KMS encryption service.
#[derive(Clone)]
pub struct KmsService {
    /// Full resource path to the KMS key
    /// Format: projects/{project}/locations/{location}/keyRings/{ring}/cryptoKeys/{key}
    key_path: String,

    /// GCP KMS client
    client: Option<std::sync::Arc<google_cloud_kms::client::Client>>,
}

impl KmsService {
    /// KMS Key Ring Name
    const KEY_RING_NAME: &str = "futurecard";

    /// Create a new KMS service.
    /// Connects to GCP KMS.
    pub async fn new(project_id: &str, location: &str, key_name: &str) -> Result<Self, AppError> {
        let key_path = format!(
            "projects/{}/locations/{}/keyRings/{}/cryptoKeys/{}",
            project_id,
            location,
            Self::KEY_RING_NAME,
            key_name
        );

        let config = google_cloud_kms::client::ClientConfig::default()
            .with_auth()
            .await
            .map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Failed to create KMS auth config: {}", e))
            })?;

        let client = google_cloud_kms::client::Client::new(config)
            .await
            .map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Failed to create KMS client: {}", e))
            })?;

        Ok(Self {
            key_path,
            client: Some(std::sync::Arc::new(client)),
        })
    }

    /// Create a mock KMS service for testing (offline mode).
    /// Only available in debug/test builds.
    #[cfg(debug_assertions)]
    pub fn new_mock() -> Self {
        Self {
            key_path: "projects/mock/locations/mock/keyRings/mock/cryptoKeys/mock".to_string(),
            client: None,
        }
    }

    /// Encrypt plaintext data using KMS.
    /// Returns base64-encoded ciphertext bound to `aad` when given.
    pub async fn encrypt(&self, plaintext: &str, aad: Option<&[u8]>) -> Result<String, AppError> {
        use google_cloud_googleapis::cloud::kms::v1::EncryptRequest;

        // Mock mode (Debug builds only): encode the AAD into the
        // ciphertext so mismatches fail at decrypt time, like real KMS.
        #[cfg(debug_assertions)]
        {
            if self.client.is_none() {
                let bound = match aad {
                    Some(aad) => format!("AAD:{}:{}", BASE64.encode(aad), BASE64.encode(plaintext)),
                    None => format!("NOAAD:{}", BASE64.encode(plaintext)),
                };
                return Ok(BASE64.encode(bound));
            }
        }

        // In release builds this check returns an error if the client is
        // missing rather than silently encoding.
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("KMS client not connected")))?;

        let req = EncryptRequest {
            name: self.key_path.clone(),
            plaintext: plaintext.as_bytes().to_vec(),
            additional_authenticated_data: aad.unwrap_or_default().to_vec(),
            ..Default::default()
        };

        let response = client
            .encrypt(req, None)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("KMS encrypt failed: {}", e)))?;

        Ok(BASE64.encode(response.ciphertext))
    }

    /// Decrypt ciphertext using KMS.
    /// Expects base64-encoded ciphertext and the same `aad` used to encrypt.
    pub async fn decrypt(
        &self,
        ciphertext_b64: &str,
        aad: Option<&[u8]>,
    ) -> Result<String, AppError> {
        use google_cloud_googleapis::cloud::kms::v1::DecryptRequest;

        // Mock mode (Debug builds only)
        #[cfg(debug_assertions)]
        {
            if self.client.is_none() {
                return Self::mock_decrypt(ciphertext_b64, aad);
            }
        }

        let client = self
            .client
            .as_ref()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("KMS client not connected")))?;

        let ciphertext = BASE64.decode(ciphertext_b64).map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Base64 output decode failed: {}", e))
        })?;

        let req = DecryptRequest {
            name: self.key_path.clone(),
            ciphertext,
            additional_authenticated_data: aad.unwrap_or_default().to_vec(),
            ..Default::default()
        };

        let response = client
            .decrypt(req, None)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("KMS decrypt failed: {}", e)))?;

        String::from_utf8(response.plaintext)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("UTF-8 decode failed: {}", e)))
    }

    /// Mock decrypt: unwrap the encoded envelope and enforce AAD equality.
    #[cfg(debug_assertions)]
    fn mock_decrypt(ciphertext_b64: &str, aad: Option<&[u8]>) -> Result<String, AppError> {
        let bound = BASE64
            .decode(ciphertext_b64)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Base64 decode failed (mock): {}", e)))
            .and_then(|bytes| {
                String::from_utf8(bytes).map_err(|e| {
                    AppError::Internal(anyhow::anyhow!("UTF-8 decode failed (mock): {}", e))
                })
            })?;

        let (stored_aad, plaintext_b64) = if let Some(rest) = bound.strip_prefix("AAD:") {
            let (aad_b64, plain) = rest.split_once(':').ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!("Malformed mock ciphertext"))
            })?;
            let aad_bytes = BASE64.decode(aad_b64).map_err(|e| {
                AppError::Internal(anyhow::anyhow!("AAD decode failed (mock): {}", e))
            })?;
            (Some(aad_bytes), plain.to_string())
        } else if let Some(rest) = bound.strip_prefix("NOAAD:") {
            (None, rest.to_string())
        } else {
            return Err(AppError::Internal(anyhow::anyhow!(
                "Malformed mock ciphertext"
            )));
        };

        if stored_aad.as_deref() != aad {
            return Err(AppError::Internal(anyhow::anyhow!(
                "AAD mismatch (mock): ciphertext bound to different context"
            )));
        }

        let bytes = BASE64.decode(plaintext_b64).map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Base64 output decode failed (mock): {}", e))
        })?;
        String::from_utf8(bytes)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("UTF-8 decode failed (mock): {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn aad_round_trip() {
        let kms = KmsService::new_mock();
        let ciphertext = kms
            .encrypt("secret_token_123", Some(b"user:alice"))
            .await
            .unwrap();

        assert_ne!(ciphertext, "secret_token_123");
        let decrypted = kms.decrypt(&ciphertext, Some(b"user:alice")).await.unwrap();
        assert_eq!(decrypted, "secret_token_123");
    }

    #[tokio::test]
    async fn wrong_aad_fails() {
        let kms = KmsService::new_mock();
        let ciphertext = kms.encrypt("secret", Some(b"user:alice")).await.unwrap();

        assert!(kms.decrypt(&ciphertext, Some(b"user:bob")).await.is_err());
        assert!(kms.decrypt(&ciphertext, None).await.is_err());
    }

    #[tokio::test]
    async fn no_aad_round_trip() {
        let kms = KmsService::new_mock();
        let ciphertext = kms.encrypt("secret", None).await.unwrap();
        assert_eq!(kms.decrypt(&ciphertext, None).await.unwrap(), "secret");
    }
}
