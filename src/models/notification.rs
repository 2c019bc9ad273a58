use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::models::status::{Channel, NotificationStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: i64,
    pub channel: Channel,
    pub recipient: String,
    pub body: String,
    pub metadata: Option<JsonValue>,
    pub status: NotificationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a freshly accepted request. Always stored as `Pending`.
#[derive(Debug, Clone, Serialize)]
pub struct NewNotification {
    pub channel: Channel,
    pub recipient: String,
    pub body: String,
    pub metadata: Option<JsonValue>,
}

impl NewNotification {
    pub fn new(channel: Channel, recipient: String, body: String) -> Self {
        Self {
            channel,
            recipient,
            body,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Option<JsonValue>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Which record a worker should reconcile after a delivery attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordSelector {
    Id(i64),
    /// Legacy match for tasks published without an id. Picks the newest
    /// pending record with identical content.
    LatestPendingByContent {
        channel: Channel,
        recipient: String,
        body: String,
    },
}

impl RecordSelector {
    pub fn is_fallback(&self) -> bool {
        matches!(self, RecordSelector::LatestPendingByContent { .. })
    }
}
