use serde_json::Value as JsonValue;

use crate::{
    error::ValidationError,
    models::{notification::NewNotification, request::SendRequest, status::Channel},
};

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

/// Checks an ingress request and turns it into an insert payload.
pub fn validate_send_request(request: SendRequest) -> Result<NewNotification, ValidationError> {
    let missing: Vec<&'static str> = [
        ("channel", present(&request.channel)),
        ("recipient", present(&request.recipient)),
        ("body", present(&request.body)),
    ]
    .into_iter()
    .filter(|(_, ok)| !ok)
    .map(|(name, _)| name)
    .collect();

    if !missing.is_empty() {
        return Err(ValidationError::MissingFields(missing));
    }

    let channel = request.channel.unwrap_or_default();
    let recipient = request.recipient.unwrap_or_default();
    let body = request.body.unwrap_or_default();

    let channel = channel
        .parse::<Channel>()
        .map_err(|_| ValidationError::UnsupportedChannel(channel))?;

    let metadata = match request.metadata {
        None | Some(JsonValue::Null) => None,
        Some(value @ JsonValue::Object(_)) => Some(value),
        Some(_) => return Err(ValidationError::InvalidMetadata),
    };

    Ok(NewNotification::new(channel, recipient, body).with_metadata(metadata))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn request(value: JsonValue) -> SendRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn reports_every_missing_field() {
        let err = validate_send_request(request(json!({"recipient": ""}))).unwrap_err();

        assert_eq!(
            err,
            ValidationError::MissingFields(vec!["channel", "recipient", "body"])
        );
    }

    #[test]
    fn missing_fields_win_over_bad_channel() {
        let err = validate_send_request(request(json!({"channel": "fax", "body": "y"})))
            .unwrap_err();

        assert_eq!(err, ValidationError::MissingFields(vec!["recipient"]));
    }

    #[test]
    fn rejects_unknown_channel() {
        let err = validate_send_request(request(
            json!({"channel": "fax", "recipient": "x", "body": "y"}),
        ))
        .unwrap_err();

        assert_eq!(err, ValidationError::UnsupportedChannel("fax".into()));
    }

    #[test]
    fn channel_match_is_case_sensitive() {
        let err = validate_send_request(request(
            json!({"channel": "EMAIL", "recipient": "x", "body": "y"}),
        ))
        .unwrap_err();

        assert!(matches!(err, ValidationError::UnsupportedChannel(_)));
    }

    #[test]
    fn rejects_non_object_metadata() {
        let err = validate_send_request(request(
            json!({"channel": "sms", "recipient": "x", "body": "y", "metadata": "subject"}),
        ))
        .unwrap_err();

        assert_eq!(err, ValidationError::InvalidMetadata);
    }

    #[test]
    fn accepts_legacy_field_names() {
        let new = validate_send_request(request(json!({
            "type": "email",
            "recipient": "a@b.com",
            "message": "hi",
            "meta": {"subject": "Welcome"}
        })))
        .unwrap();

        assert_eq!(new.channel, Channel::Email);
        assert_eq!(new.body, "hi");
        assert_eq!(new.metadata, Some(json!({"subject": "Welcome"})));
    }
}
