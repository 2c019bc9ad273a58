use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub status: &'static str,
    pub notification_id: i64,
}

impl SendResponse {
    pub fn queued(notification_id: i64) -> Self {
        Self {
            status: "queued",
            notification_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<&'static str>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            fields: None,
            channel: None,
        }
    }

    pub fn with_fields(mut self, fields: Vec<&'static str>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn with_channel(mut self, channel: String) -> Self {
        self.channel = Some(channel);
        self
    }
}
