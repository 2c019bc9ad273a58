use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::{
    clients::sender::NotificationSender,
    config::Config,
    error::DeliveryError,
    models::{message::DeliveryTask, status::Channel},
};

#[derive(Debug, Deserialize)]
struct TwilioMessage {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct TwilioError {
    code: Option<i64>,
    message: Option<String>,
}

/// Sends SMS through the Twilio Messages REST API.
pub struct TwilioSender {
    http_client: Client,
    api_base: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl TwilioSender {
    pub fn new(config: &Config) -> Self {
        info!(account_sid = %config.twilio_account_sid, "Twilio sender initialized");

        Self {
            http_client: Client::new(),
            api_base: config.twilio_api_base.trim_end_matches('/').to_string(),
            account_sid: config.twilio_account_sid.clone(),
            auth_token: config.twilio_auth_token.clone(),
            from_number: config.twilio_phone_number.clone(),
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        )
    }
}

#[async_trait]
impl NotificationSender for TwilioSender {
    fn channel(&self) -> Channel {
        Channel::Sms
    }

    async fn send(&self, task: &DeliveryTask) -> Result<(), DeliveryError> {
        debug!(recipient = %task.recipient, "Sending SMS");

        let form = [
            ("To", task.recipient.as_str()),
            ("From", self.from_number.as_str()),
            ("Body", task.body.as_str()),
        ];

        let response = self
            .http_client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| DeliveryError::Provider(format!("Twilio request failed: {}", e)))?;

        let status = response.status();
        // Any 2xx means Twilio accepted the message; an unreadable body must
        // not turn into a retry and a second SMS.
        if status.is_success() {
            match response.json::<TwilioMessage>().await {
                Ok(message) => info!(recipient = %task.recipient, sid = %message.sid, "SMS sent"),
                Err(e) => warn!(
                    recipient = %task.recipient,
                    error = %e,
                    "SMS sent, Twilio response body unreadable"
                ),
            }
            return Ok(());
        }

        let detail = match response.json::<TwilioError>().await {
            Ok(TwilioError {
                code: Some(code),
                message: Some(message),
            }) => format!("{} (code {})", message, code),
            Ok(TwilioError {
                message: Some(message),
                ..
            }) => message,
            _ => "no error detail".to_string(),
        };

        Err(DeliveryError::Provider(format!(
            "Twilio returned {}: {}",
            status, detail
        )))
    }
}
