// SPDX-License-Identifier: MIT
// Copyright 2026 The Futurecard Authors

//! Credential storage behind a narrow trait.
//!
//! Request flows only ever need get/put/delete, so the store is injected
//! as a trait object and tests substitute fakes or the in-memory backend.

use async_trait::async_trait;

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{EncryptedCredential, StoredCredential};
use crate::services::KmsService;

/// Narrow interface over wherever credentials live.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch the credential for a user, or None when not connected.
    async fn get(&self, user_id: &str) -> Result<Option<StoredCredential>, AppError>;

    /// Persist the credential for a user, replacing any existing one.
    async fn put(&self, user_id: &str, credential: &StoredCredential) -> Result<(), AppError>;

    /// Remove the credential for a user.
    async fn delete(&self, user_id: &str) -> Result<(), AppError>;
}

/// Production store: Firestore documents with token material encrypted
/// through KMS. Ciphertexts are bound to the owning user ID as AAD, so a
/// document copied between users fails to decrypt.
#[derive(Clone)]
pub struct EncryptedCredentialStore {
    db: FirestoreDb,
    kms: KmsService,
}

impl EncryptedCredentialStore {
    pub fn new(db: FirestoreDb, kms: KmsService) -> Self {
        Self { db, kms }
    }

    fn aad(user_id: &str) -> Vec<u8> {
        format!("user_id:{}", user_id).into_bytes()
    }
}

#[async_trait]
impl CredentialStore for EncryptedCredentialStore {
    async fn get(&self, user_id: &str) -> Result<Option<StoredCredential>, AppError> {
        let doc = match self.db.get_credential_doc(user_id).await? {
            Some(doc) => doc,
            None => return Ok(None),
        };

        let aad = Self::aad(user_id);
        let access_token = self
            .kms
            .decrypt(&doc.access_token_encrypted, Some(&aad))
            .await?;
        let refresh_token = match &doc.refresh_token_encrypted {
            Some(ciphertext) => Some(self.kms.decrypt(ciphertext, Some(&aad)).await?),
            None => None,
        };

        Ok(Some(StoredCredential {
            access_token,
            refresh_token,
            expires_at: doc.expires_at,
            scopes: doc.scopes,
        }))
    }

    async fn put(&self, user_id: &str, credential: &StoredCredential) -> Result<(), AppError> {
        let aad = Self::aad(user_id);
        let access_token_encrypted = self
            .kms
            .encrypt(&credential.access_token, Some(&aad))
            .await?;
        let refresh_token_encrypted = match &credential.refresh_token {
            Some(token) => Some(self.kms.encrypt(token, Some(&aad)).await?),
            None => None,
        };

        let doc = EncryptedCredential {
            access_token_encrypted,
            refresh_token_encrypted,
            expires_at: credential.expires_at.clone(),
            scopes: credential.scopes.clone(),
        };

        self.db.set_credential_doc(user_id, &doc).await
    }

    async fn delete(&self, user_id: &str) -> Result<(), AppError> {
        self.db.delete_credential_doc(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_credential() -> StoredCredential {
        StoredCredential {
            access_token: "ya29.plaintext-access".to_string(),
            refresh_token: Some("1//plaintext-refresh".to_string()),
            expires_at: "2026-08-23T12:00:00Z".to_string(),
            scopes: vec!["https://www.googleapis.com/auth/glass.timeline".to_string()],
        }
    }

    fn memory_store() -> (EncryptedCredentialStore, FirestoreDb) {
        let db = FirestoreDb::new_memory();
        let store = EncryptedCredentialStore::new(db.clone(), KmsService::new_mock());
        (store, db)
    }

    #[tokio::test]
    async fn round_trip_through_encryption() {
        let (store, _db) = memory_store();
        let credential = sample_credential();

        assert!(store.get("user-1").await.unwrap().is_none());

        store.put("user-1", &credential).await.unwrap();
        let loaded = store.get("user-1").await.unwrap().unwrap();
        assert_eq!(loaded.access_token, credential.access_token);
        assert_eq!(loaded.refresh_token, credential.refresh_token);
        assert_eq!(loaded.expires_at, credential.expires_at);

        store.delete("user-1").await.unwrap();
        assert!(store.get("user-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn tokens_are_not_stored_in_plaintext() {
        let (store, db) = memory_store();
        store.put("user-1", &sample_credential()).await.unwrap();

        let doc = db.get_credential_doc("user-1").await.unwrap().unwrap();
        assert_ne!(doc.access_token_encrypted, "ya29.plaintext-access");
        assert_ne!(
            doc.refresh_token_encrypted.as_deref(),
            Some("1//plaintext-refresh")
        );
    }

    #[tokio::test]
    async fn ciphertext_is_bound_to_the_user() {
        let (store, db) = memory_store();
        store.put("user-1", &sample_credential()).await.unwrap();

        // Copy user-1's document into user-2's slot.
        let doc = db.get_credential_doc("user-1").await.unwrap().unwrap();
        db.set_credential_doc("user-2", &doc).await.unwrap();

        assert!(store.get("user-2").await.is_err());
    }

    #[tokio::test]
    async fn missing_refresh_token_is_preserved() {
        let (store, _db) = memory_store();
        let credential = StoredCredential {
            refresh_token: None,
            ..sample_credential()
        };

        store.put("user-1", &credential).await.unwrap();
        let loaded = store.get("user-1").await.unwrap().unwrap();
        assert!(loaded.refresh_token.is_none());
    }
}
