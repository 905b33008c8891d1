//! Per-user settings created when a user first connects.

use serde::{Deserialize, Serialize};

/// User preference record stored in Firestore.
///
/// Both flags are required; a document missing either one fails to
/// deserialize rather than defaulting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProperties {
    /// Google account ID (also used as document ID)
    pub id: String,
    /// Whether to send email digests
    pub email: bool,
    /// Whether to deliver cards on weekends
    pub weekends: bool,
}

impl UserProperties {
    /// Settings for a freshly connected user. Both opt-ins start off.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: false,
            weekends: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_flags_are_required() {
        let missing_weekends = serde_json::json!({"id": "user-1", "email": true});
        assert!(serde_json::from_value::<UserProperties>(missing_weekends).is_err());

        let complete = serde_json::json!({"id": "user-1", "email": false, "weekends": true});
        let props: UserProperties = serde_json::from_value(complete).unwrap();
        assert!(!props.email);
        assert!(props.weekends);
    }

    #[test]
    fn new_user_starts_with_everything_off() {
        let props = UserProperties::new("user-1");
        assert_eq!(props.id, "user-1");
        assert!(!props.email);
        assert!(!props.weekends);
    }
}
