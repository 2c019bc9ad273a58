use anyhow::Result;
use async_trait::async_trait;

use crate::models::message::DeliveryTask;

/// A message taken off a queue and not yet settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedMessage {
    pub delivery_tag: u64,
    pub payload: Vec<u8>,
}

/// Publish/settle side of the message broker.
///
/// Consumption is a stream of `ConsumedMessage` produced by the concrete
/// client; workers only need to publish retries and settle the delivery they
/// are holding.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    async fn publish(&self, queue: &str, task: &DeliveryTask) -> Result<()>;

    /// Remove the message from the queue.
    async fn acknowledge(&self, delivery_tag: u64) -> Result<()>;

    /// Hand the message back to the broker for redelivery.
    async fn requeue(&self, delivery_tag: u64) -> Result<()>;

    /// Drop the message without redelivery.
    async fn reject(&self, delivery_tag: u64) -> Result<()>;

    fn is_connected(&self) -> bool;
}
