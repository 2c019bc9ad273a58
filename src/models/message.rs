use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::models::{notification::RecordSelector, status::Channel};

/// Queue payload consumed by the delivery workers.
///
/// Older producers write `message`, `meta` and `retryCount`; those names are
/// accepted on decode, the current names are always written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryTask {
    pub recipient: String,

    #[serde(alias = "message")]
    pub body: String,

    #[serde(default, alias = "meta", skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_id: Option<i64>,

    #[serde(default, alias = "retryCount")]
    pub retry_attempt: u32,
}

impl DeliveryTask {
    pub fn new(notification_id: i64, recipient: String, body: String) -> Self {
        Self {
            recipient,
            body,
            metadata: None,
            notification_id: Some(notification_id),
            retry_attempt: 0,
        }
    }

    pub fn with_metadata(mut self, metadata: Option<JsonValue>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Copy of this task for the next bounded-retry attempt.
    pub fn next_attempt(&self) -> Self {
        Self {
            retry_attempt: self.retry_attempt + 1,
            ..self.clone()
        }
    }

    pub fn selector(&self, channel: Channel) -> RecordSelector {
        match self.notification_id {
            Some(id) => RecordSelector::Id(id),
            None => RecordSelector::LatestPendingByContent {
                channel,
                recipient: self.recipient.clone(),
                body: self.body.clone(),
            },
        }
    }

    /// `metadata.subject` when it is a string.
    pub fn subject(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("subject"))
            .and_then(|v| v.as_str())
    }
}
