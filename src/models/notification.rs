//! Mirror timeline notification payload.
//!
//! The webhook treats notification bodies as opaque bytes; this type is
//! only parsed in the deferred task handler.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// The three fields every notification must carry. Extra fields in the
/// payload (collection, operation, userActions, ...) are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    /// Google account ID the subscription was registered with
    #[validate(length(min = 1))]
    pub user_token: String,
    /// Timeline item the notification refers to
    #[validate(length(min = 1))]
    pub item_id: String,
    /// Token echoed back from the subscription
    #[validate(length(min = 1))]
    pub verify_token: String,
}
