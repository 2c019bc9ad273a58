use std::{sync::Arc, time::Duration};

use anyhow::{Error, Result};
use futures_util::{Stream, StreamExt};
use tokio::time::{Instant, timeout};
use tracing::{error, info, warn};

use crate::{
    clients::{broker::ConsumedMessage, sender::NotificationSender},
    context::AppContext,
    error::DeliveryError,
    metrics,
    models::{
        message::DeliveryTask,
        policy::{RetryDecision, RetryPolicy},
        status::{Channel, NotificationStatus},
    },
};

/// What happened to one consumed message.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Sent, record marked `Sent`, message acked.
    Delivered,
    /// Failed, a copy with the next attempt number was published, original acked.
    Requeued(DeliveryTask),
    /// Failed, message nacked for broker redelivery.
    Redelivered,
    /// Failed at the retry cap, record marked `Failed`, message acked.
    Exhausted,
    /// Undecodable payload, rejected without requeue.
    Discarded,
}

impl Outcome {
    fn label(&self) -> &'static str {
        match self {
            Outcome::Delivered => "sent",
            Outcome::Requeued(_) => "requeued",
            Outcome::Redelivered => "redelivered",
            Outcome::Exhausted => "failed",
            Outcome::Discarded => "discarded",
        }
    }
}

/// Consumes one channel's queue and applies that channel's retry policy.
pub struct DeliveryWorker {
    context: AppContext,
    sender: Arc<dyn NotificationSender>,
    policy: RetryPolicy,
    queue: String,
    send_timeout: Duration,
}

impl DeliveryWorker {
    pub fn new(
        context: AppContext,
        sender: Arc<dyn NotificationSender>,
        policy: RetryPolicy,
        queue: impl Into<String>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            context,
            sender,
            policy,
            queue: queue.into(),
            send_timeout,
        }
    }

    pub fn channel(&self) -> Channel {
        self.sender.channel()
    }

    /// Handles deliveries one at a time until the stream ends or `shutdown`
    /// resolves. A delivery in progress is always finished and settled before
    /// shutdown is observed; a stream error stops the worker with that error.
    pub async fn run<C, S>(&self, messages: C, shutdown: S) -> Result<(), Error>
    where
        C: Stream<Item = Result<ConsumedMessage>>,
        S: std::future::Future<Output = ()>,
    {
        info!(
            channel = %self.channel(),
            queue = %self.queue,
            policy = %self.policy,
            "Delivery worker started"
        );

        tokio::pin!(messages);
        tokio::pin!(shutdown);

        loop {
            let message = tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!(channel = %self.channel(), "Shutdown requested, stopping consumer");
                    break;
                }
                next = messages.next() => match next {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        error!(error = %e, "Consumer error");
                        return Err(e);
                    }
                    None => {
                        warn!(channel = %self.channel(), "Consumer stream closed");
                        break;
                    }
                },
            };

            if let Err(e) = self
                .handle_delivery(message.delivery_tag, &message.payload)
                .await
            {
                error!(
                    delivery_tag = message.delivery_tag,
                    error = %e,
                    "Failed to settle delivery"
                );
            }
        }

        Ok(())
    }

    /// Decode, process and settle one message with the broker.
    ///
    /// Only broker settle errors are returned; everything else is turned into
    /// an ack, a requeue or a reject.
    pub async fn handle_delivery(&self, delivery_tag: u64, payload: &[u8]) -> Result<Outcome> {
        let broker = &self.context.broker;

        let task = match serde_json::from_slice::<DeliveryTask>(payload) {
            Ok(task) => task,
            Err(e) => {
                error!(
                    delivery_tag,
                    error = %e,
                    payload = %String::from_utf8_lossy(payload),
                    "Undecodable delivery task, rejecting"
                );
                broker.reject(delivery_tag).await?;
                metrics::record_delivery(self.channel(), Outcome::Discarded.label());
                return Ok(Outcome::Discarded);
            }
        };

        let outcome = match self.process(&task).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    delivery_tag,
                    notification_id = ?task.notification_id,
                    error = %e,
                    "Could not record delivery outcome, handing message back to broker"
                );
                Outcome::Redelivered
            }
        };

        let outcome = match outcome {
            Outcome::Requeued(next) => match broker.publish(&self.queue, &next).await {
                Ok(()) => {
                    broker.acknowledge(delivery_tag).await?;
                    Outcome::Requeued(next)
                }
                Err(e) => {
                    error!(
                        delivery_tag,
                        error = %e,
                        "Retry publish failed, handing message back to broker"
                    );
                    broker.requeue(delivery_tag).await?;
                    Outcome::Redelivered
                }
            },
            Outcome::Redelivered => {
                broker.requeue(delivery_tag).await?;
                Outcome::Redelivered
            }
            other => {
                broker.acknowledge(delivery_tag).await?;
                other
            }
        };

        metrics::record_delivery(self.channel(), outcome.label());

        Ok(outcome)
    }

    /// Attempt the send and reconcile the record. Does not touch the broker.
    ///
    /// `Err` means the store could not be updated; the caller must not ack.
    pub async fn process(&self, task: &DeliveryTask) -> Result<Outcome> {
        match self.attempt_send(task).await {
            Ok(()) => {
                self.record_status(task, NotificationStatus::Sent).await?;
                Ok(Outcome::Delivered)
            }
            Err(e) => {
                warn!(
                    channel = %self.channel(),
                    recipient = %task.recipient,
                    notification_id = ?task.notification_id,
                    retry_attempt = task.retry_attempt,
                    error = %e,
                    "Delivery attempt failed"
                );

                match self.policy.on_failure(task.retry_attempt) {
                    RetryDecision::Requeue { next_attempt } => {
                        info!(
                            notification_id = ?task.notification_id,
                            "Retrying ({}/{})",
                            next_attempt,
                            self.max_retries()
                        );
                        Ok(Outcome::Requeued(task.next_attempt()))
                    }
                    RetryDecision::GiveUp => {
                        error!(
                            notification_id = ?task.notification_id,
                            retry_attempt = task.retry_attempt,
                            "Reached max retries, marking as failed"
                        );
                        self.record_status(task, NotificationStatus::Failed).await?;
                        Ok(Outcome::Exhausted)
                    }
                    RetryDecision::Redeliver => Ok(Outcome::Redelivered),
                }
            }
        }
    }

    async fn attempt_send(&self, task: &DeliveryTask) -> Result<(), DeliveryError> {
        let start = Instant::now();

        let result = match timeout(self.send_timeout, self.sender.send(task)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout(self.send_timeout)),
        };

        metrics::observe_send_duration(self.channel(), start.elapsed().as_secs_f64());

        result
    }

    async fn record_status(&self, task: &DeliveryTask, status: NotificationStatus) -> Result<()> {
        let selector = task.selector(self.channel());

        if selector.is_fallback() {
            warn!(
                channel = %self.channel(),
                recipient = %task.recipient,
                "Task has no notificationId, matching newest pending record by content"
            );
            metrics::record_fallback_match(self.channel());
        }

        let updated = self.context.store.update_status(&selector, status).await?;

        if updated == 0 {
            warn!(
                ?selector,
                status = %status,
                "No notification record matched the delivery task"
            );
        }

        Ok(())
    }

    fn max_retries(&self) -> u32 {
        match self.policy {
            RetryPolicy::BoundedRetry { max_retries } => max_retries,
            RetryPolicy::UnboundedRedeliver => 0,
        }
    }
}
