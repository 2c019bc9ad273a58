use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
        BasicQosOptions, BasicRejectOptions, QueueDeclareOptions,
    },
    types::FieldTable,
};
use tracing::{debug, info};

use crate::{
    clients::{
        broker::{ConsumedMessage, MessageBroker},
        connector::RetryConnector,
    },
    config::Config,
    models::message::DeliveryTask,
};

/// One connection and one channel per process, shared by publishing and
/// consuming.
pub struct RabbitMqClient {
    connection: Connection,
    channel: Channel,
}

impl RabbitMqClient {
    /// Connects with the shared retry connector, then declares every queue
    /// this process role needs. Fails only after all attempts are used up.
    pub async fn connect(config: &Config) -> Result<Self, Error> {
        let mut connector = RetryConnector::new(
            "rabbitmq",
            config.connect_max_attempts,
            config.connect_retry_delay(),
        );

        let client = connector
            .connect(|| Self::open(&config.rabbitmq_url, config.prefetch_count))
            .await?;

        for queue in config.queues_to_declare() {
            client.declare_queue(&queue).await?;
        }

        Ok(client)
    }

    async fn open(url: &str, prefetch_count: u16) -> Result<Self, Error> {
        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| anyhow!("Failed to connect to RabbitMQ: {}", e))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| anyhow!("RabbitMQ channel creation failed: {}", e))?;

        channel
            .basic_qos(prefetch_count, BasicQosOptions::default())
            .await
            .map_err(|e| anyhow!("Failed to set up QoS: {}", e))?;

        debug!(prefetch_count, "RabbitMQ channel ready");

        Ok(Self {
            connection,
            channel,
        })
    }

    /// Durable declare; safe to repeat for an existing queue.
    pub async fn declare_queue(&self, queue: &str) -> Result<(), Error> {
        self.channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow!("Failed to declare queue {}: {}", queue, e))?;

        info!(queue, "Queue declared");

        Ok(())
    }

    pub async fn create_consumer(&self, queue: &str, consumer_tag: &str) -> Result<Consumer, Error> {
        let consumer = self
            .channel
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow!("Failed to create consumer: {}", e))?;

        info!(queue, consumer_tag, "Consumer created for queue");

        Ok(consumer)
    }

    /// Consumer deliveries as settle-able messages. Consumer errors are passed
    /// through so the worker can stop.
    pub fn messages(consumer: Consumer) -> impl Stream<Item = Result<ConsumedMessage>> {
        consumer.map(|delivery| {
            delivery
                .map(|delivery| ConsumedMessage {
                    delivery_tag: delivery.delivery_tag,
                    payload: delivery.data,
                })
                .map_err(|e| anyhow!("RabbitMQ consumer failed: {}", e))
        })
    }

    pub async fn close(&self) -> Result<(), Error> {
        self.connection
            .close(200, "shutdown")
            .await
            .map_err(|e| anyhow!("Failed to close RabbitMQ connection: {}", e))
    }
}

#[async_trait]
impl MessageBroker for RabbitMqClient {
    async fn publish(&self, queue: &str, task: &DeliveryTask) -> Result<()> {
        let payload = serde_json::to_vec(task)?;

        self.channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default()
                    .with_content_type("application/json".into())
                    .with_delivery_mode(2),
            )
            .await
            .map_err(|e| anyhow!("Failed to publish message to {}: {}", queue, e))?;

        Ok(())
    }

    async fn acknowledge(&self, delivery_tag: u64) -> Result<()> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|e| anyhow!("Failed to acknowledge message: {}", e))?;

        Ok(())
    }

    async fn requeue(&self, delivery_tag: u64) -> Result<()> {
        self.channel
            .basic_nack(
                delivery_tag,
                BasicNackOptions {
                    multiple: false,
                    requeue: true,
                },
            )
            .await
            .map_err(|e| anyhow!("Failed to nack message: {}", e))?;

        Ok(())
    }

    async fn reject(&self, delivery_tag: u64) -> Result<()> {
        self.channel
            .basic_reject(delivery_tag, BasicRejectOptions { requeue: false })
            .await
            .map_err(|e| anyhow!("Failed to reject message: {}", e))?;

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connection.status().connected() && self.channel.status().connected()
    }
}
