// SPDX-License-Identifier: MIT
// Copyright 2026 The Futurecard Authors

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - User properties (per-user settings)
//! - Credential documents (OAuth token material, encrypted by the caller)
//!
//! A functional in-memory backend serves tests and local development
//! without an emulator.

use std::sync::Arc;

use dashmap::DashMap;

use crate::db::collections;
use crate::error::AppError;
use crate::models::{EncryptedCredential, UserProperties};

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    backend: Backend,
}

#[derive(Clone)]
enum Backend {
    Remote(firestore::FirestoreDb),
    Memory(MemoryBackend),
}

#[derive(Clone, Default)]
struct MemoryBackend {
    user_properties: Arc<DashMap<String, UserProperties>>,
    credentials: Arc<DashMap<String, EncryptedCredential>>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            backend: Backend::Remote(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        // ExternalJwtFunctionSource hands the SDK a dummy token without
        // needing a custom TokenSource implementation struct.
        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            backend: Backend::Remote(client),
        })
    }

    /// Create an in-memory database for tests and offline development.
    ///
    /// Unlike a real Firestore connection this backend keeps documents in
    /// process memory, so writes are visible to later reads within the
    /// same instance only.
    pub fn new_memory() -> Self {
        Self {
            backend: Backend::Memory(MemoryBackend::default()),
        }
    }

    // ─── User Properties Operations ──────────────────────────────

    /// Get the settings record for a user.
    pub async fn get_user_properties(
        &self,
        user_id: &str,
    ) -> Result<Option<UserProperties>, AppError> {
        match &self.backend {
            Backend::Remote(client) => client
                .fluent()
                .select()
                .by_id_in(collections::USER_PROPERTIES)
                .obj()
                .one(user_id)
                .await
                .map_err(|e| AppError::Database(e.to_string())),
            Backend::Memory(mem) => {
                Ok(mem.user_properties.get(user_id).map(|r| r.value().clone()))
            }
        }
    }

    /// Create or update a settings record.
    pub async fn upsert_user_properties(&self, props: &UserProperties) -> Result<(), AppError> {
        match &self.backend {
            Backend::Remote(client) => {
                let _: () = client
                    .fluent()
                    .update()
                    .in_col(collections::USER_PROPERTIES)
                    .document_id(&props.id)
                    .object(props)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(())
            }
            Backend::Memory(mem) => {
                mem.user_properties.insert(props.id.clone(), props.clone());
                Ok(())
            }
        }
    }

    /// Delete a settings record (for disconnection).
    pub async fn delete_user_properties(&self, user_id: &str) -> Result<(), AppError> {
        match &self.backend {
            Backend::Remote(client) => {
                client
                    .fluent()
                    .delete()
                    .from(collections::USER_PROPERTIES)
                    .document_id(user_id)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(())
            }
            Backend::Memory(mem) => {
                mem.user_properties.remove(user_id);
                Ok(())
            }
        }
    }

    // ─── Credential Document Operations ──────────────────────────

    /// Get the encrypted credential document for a user.
    pub async fn get_credential_doc(
        &self,
        user_id: &str,
    ) -> Result<Option<EncryptedCredential>, AppError> {
        match &self.backend {
            Backend::Remote(client) => client
                .fluent()
                .select()
                .by_id_in(collections::CREDENTIALS)
                .obj()
                .one(user_id)
                .await
                .map_err(|e| AppError::Database(e.to_string())),
            Backend::Memory(mem) => Ok(mem.credentials.get(user_id).map(|r| r.value().clone())),
        }
    }

    /// Store the encrypted credential document for a user.
    pub async fn set_credential_doc(
        &self,
        user_id: &str,
        doc: &EncryptedCredential,
    ) -> Result<(), AppError> {
        match &self.backend {
            Backend::Remote(client) => {
                let _: () = client
                    .fluent()
                    .update()
                    .in_col(collections::CREDENTIALS)
                    .document_id(user_id)
                    .object(doc)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(())
            }
            Backend::Memory(mem) => {
                mem.credentials.insert(user_id.to_string(), doc.clone());
                Ok(())
            }
        }
    }

    /// Delete the credential document (for disconnection).
    pub async fn delete_credential_doc(&self, user_id: &str) -> Result<(), AppError> {
        match &self.backend {
            Backend::Remote(client) => {
                client
                    .fluent()
                    .delete()
                    .from(collections::CREDENTIALS)
                    .document_id(user_id)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(())
            }
            Backend::Memory(mem) => {
                mem.credentials.remove(user_id);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_round_trips_user_properties() {
        let db = FirestoreDb::new_memory();

        assert!(db.get_user_properties("user-1").await.unwrap().is_none());

        let props = UserProperties::new("user-1");
        db.upsert_user_properties(&props).await.unwrap();

        let loaded = db.get_user_properties("user-1").await.unwrap().unwrap();
        assert_eq!(loaded.id, "user-1");
        assert!(!loaded.email);
        assert!(!loaded.weekends);

        db.delete_user_properties("user-1").await.unwrap();
        assert!(db.get_user_properties("user-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_backend_round_trips_credential_docs() {
        let db = FirestoreDb::new_memory();

        let doc = EncryptedCredential {
            access_token_encrypted: "ciphertext-a".to_string(),
            refresh_token_encrypted: Some("ciphertext-r".to_string()),
            expires_at: "2026-08-23T12:00:00Z".to_string(),
            scopes: vec!["https://www.googleapis.com/auth/glass.timeline".to_string()],
        };

        db.set_credential_doc("user-1", &doc).await.unwrap();
        let loaded = db.get_credential_doc("user-1").await.unwrap().unwrap();
        assert_eq!(loaded.access_token_encrypted, "ciphertext-a");

        db.delete_credential_doc("user-1").await.unwrap();
        assert!(db.get_credential_doc("user-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_missing_documents_is_a_no_op() {
        let db = FirestoreDb::new_memory();
        db.delete_user_properties("ghost").await.unwrap();
        db.delete_credential_doc("ghost").await.unwrap();
    }
}
