use anyhow::Result;
use notification_relay::{
    clients::{sender::NotificationSender, sms::TwilioSender},
    config::Config,
    error::DeliveryError,
    models::message::DeliveryTask,
};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string_contains, header_exists, method, path},
};

fn twilio_config(server: &MockServer) -> Result<Config> {
    Config::from_iter(vec![
        ("TWILIO_ACCOUNT_SID".to_string(), "AC123".to_string()),
        ("TWILIO_AUTH_TOKEN".to_string(), "secret".to_string()),
        ("TWILIO_PHONE_NUMBER".to_string(), "+15550000".to_string()),
        ("TWILIO_API_BASE".to_string(), server.uri()),
    ])
}

/// Test: A 201 from Twilio is a successful send with the form fields set
#[tokio::test]
async fn test_twilio_success() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2010-04-01/Accounts/AC123/Messages.json"))
        .and(header_exists("authorization"))
        .and(body_string_contains("To=%2B15550100"))
        .and(body_string_contains("From=%2B15550000"))
        .and(body_string_contains("Body=code+1234"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"sid": "SM1"})))
        .expect(1)
        .mount(&server)
        .await;

    let sender = TwilioSender::new(&twilio_config(&server)?);
    let task = DeliveryTask::new(1, "+15550100".into(), "code 1234".into());

    sender.send(&task).await?;

    Ok(())
}

/// Test: A 2xx with an unexpected body is still a successful send
#[tokio::test]
async fn test_twilio_accepted_with_unreadable_body() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_string("queued"))
        .expect(1)
        .mount(&server)
        .await;

    let sender = TwilioSender::new(&twilio_config(&server)?);
    let task = DeliveryTask::new(1, "+15550100".into(), "hi".into());

    sender.send(&task).await?;

    Ok(())
}

/// Test: A Twilio error response is a provider failure carrying the message
#[tokio::test]
async fn test_twilio_error_is_delivery_failure() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": 21211,
            "message": "The 'To' number is not a valid phone number."
        })))
        .mount(&server)
        .await;

    let sender = TwilioSender::new(&twilio_config(&server)?);
    let task = DeliveryTask::new(1, "nope".into(), "hi".into());

    let err = sender.send(&task).await.unwrap_err();

    match err {
        DeliveryError::Provider(detail) => {
            assert!(detail.contains("21211"), "detail: {}", detail);
        }
        other => panic!("unexpected error: {:?}", other),
    }

    Ok(())
}

/// Test: A server error without a JSON body is still a failure
#[tokio::test]
async fn test_twilio_server_error() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let sender = TwilioSender::new(&twilio_config(&server)?);
    let task = DeliveryTask::new(1, "+15550100".into(), "hi".into());

    assert!(matches!(
        sender.send(&task).await,
        Err(DeliveryError::Provider(_))
    ));

    Ok(())
}
