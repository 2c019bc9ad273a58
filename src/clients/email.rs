use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use tracing::{debug, info};

use crate::{
    clients::sender::NotificationSender,
    config::Config,
    error::DeliveryError,
    models::{message::DeliveryTask, status::Channel},
};

const DEFAULT_SUBJECT: &str = "Notification";

pub struct SmtpSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpSender {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let builder = if config.smtp_starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
                .map_err(|e| anyhow!("Invalid SMTP relay {}: {}", config.smtp_host, e))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
        };

        let mut builder = builder.port(config.smtp_port);
        if !config.smtp_user.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.smtp_user.clone(),
                config.smtp_pass.clone(),
            ));
        }

        let from = config
            .smtp_from
            .parse::<Mailbox>()
            .map_err(|e| anyhow!("Invalid SMTP_FROM address: {}", e))?;

        info!(
            host = %config.smtp_host,
            port = config.smtp_port,
            starttls = config.smtp_starttls,
            "SMTP sender initialized"
        );

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn build_message(&self, task: &DeliveryTask) -> Result<Message, DeliveryError> {
        let to = task
            .recipient
            .parse::<Mailbox>()
            .map_err(|e| DeliveryError::InvalidTask(format!("bad recipient address: {}", e)))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(task.subject().unwrap_or(DEFAULT_SUBJECT))
            .header(ContentType::TEXT_PLAIN)
            .body(task.body.clone())
            .map_err(|e| DeliveryError::InvalidTask(e.to_string()))
    }
}

#[async_trait]
impl NotificationSender for SmtpSender {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, task: &DeliveryTask) -> Result<(), DeliveryError> {
        let message = self.build_message(task)?;

        debug!(recipient = %task.recipient, "Sending email");

        self.transport
            .send(message)
            .await
            .map_err(|e| DeliveryError::Provider(e.to_string()))?;

        info!(recipient = %task.recipient, "Email sent");

        Ok(())
    }
}
