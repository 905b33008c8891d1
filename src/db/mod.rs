//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    /// Per-user settings (keyed by Google account ID)
    pub const USER_PROPERTIES: &str = "user_properties";
    /// Encrypted OAuth credential documents (keyed by Google account ID)
    pub const CREDENTIALS: &str = "credentials";
}
