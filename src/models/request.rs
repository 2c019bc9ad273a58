use serde::Deserialize;
use serde_json::Value as JsonValue;

/// Body of `POST /send`. Every field is optional here so validation can
/// report exactly what is missing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendRequest {
    #[serde(default, alias = "type")]
    pub channel: Option<String>,

    #[serde(default)]
    pub recipient: Option<String>,

    #[serde(default, alias = "message")]
    pub body: Option<String>,

    #[serde(default, alias = "meta")]
    pub metadata: Option<JsonValue>,
}
