use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use notification_relay::{
    api::{AppState, router},
    clients::{
        broker::ConsumedMessage,
        health::HealthChecker,
        memory::{MemoryBroker, MemoryStore},
        sender::NotificationSender,
    },
    context::{AppContext, QueueRoutes},
    error::DeliveryError,
    gateway::Gateway,
    models::{message::DeliveryTask, policy::RetryPolicy, status::Channel},
    worker::{DeliveryWorker, Outcome},
};

pub const EMAIL_QUEUE: &str = "email_queue";
pub const SMS_QUEUE: &str = "sms_queue";

/// Sender that fails a fixed number of times before succeeding.
pub struct ScriptedSender {
    channel: Channel,
    failures_left: AtomicU32,
    delay: Duration,
    pub calls: AtomicU32,
}

impl ScriptedSender {
    pub fn succeeding(channel: Channel) -> Arc<Self> {
        Self::failing(channel, 0)
    }

    pub fn failing(channel: Channel, failures: u32) -> Arc<Self> {
        Arc::new(Self {
            channel,
            failures_left: AtomicU32::new(failures),
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
        })
    }

    pub fn always_failing(channel: Channel) -> Arc<Self> {
        Self::failing(channel, u32::MAX)
    }

    pub fn slow(channel: Channel, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            channel,
            failures_left: AtomicU32::new(0),
            delay,
            calls: AtomicU32::new(0),
        })
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationSender for ScriptedSender {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, task: &DeliveryTask) -> Result<(), DeliveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != u32::MAX {
                self.failures_left.store(remaining - 1, Ordering::SeqCst);
            }
            return Err(DeliveryError::Provider(format!(
                "provider refused {}",
                task.recipient
            )));
        }

        Ok(())
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub broker: Arc<MemoryBroker>,
    pub context: AppContext,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let broker = Arc::new(MemoryBroker::new());
        let context = AppContext::new(store.clone(), broker.clone());

        Self {
            store,
            broker,
            context,
        }
    }

    pub fn gateway(&self) -> Gateway {
        Gateway::new(self.context.clone(), QueueRoutes::default())
    }

    pub fn app(&self) -> axum::Router {
        router(
            AppState::new(HealthChecker::new(self.context.clone())).with_gateway(self.gateway()),
        )
    }

    /// Router of a worker role: health and metrics only.
    pub fn worker_app(&self) -> axum::Router {
        router(AppState::new(HealthChecker::new(self.context.clone())))
    }

    pub fn worker(
        &self,
        sender: Arc<dyn NotificationSender>,
        policy: RetryPolicy,
    ) -> DeliveryWorker {
        let queue = match sender.channel() {
            Channel::Email => EMAIL_QUEUE,
            Channel::Sms => SMS_QUEUE,
        };
        DeliveryWorker::new(
            self.context.clone(),
            sender,
            policy,
            queue,
            Duration::from_millis(200),
        )
    }

    /// Takes the head of `queue` as the RabbitMQ consumer stream would yield it.
    pub fn take_message(&self, queue: &str) -> Option<ConsumedMessage> {
        self.broker
            .deliver_next(queue)
            .map(|delivery| ConsumedMessage {
                delivery_tag: delivery.delivery_tag,
                payload: delivery.payload,
            })
    }

    /// Delivers the head of `queue` to `worker`, the way the consumer loop does.
    pub async fn pump(&self, worker: &DeliveryWorker, queue: &str) -> Option<Outcome> {
        let delivery = self.broker.deliver_next(queue)?;
        Some(
            worker
                .handle_delivery(delivery.delivery_tag, &delivery.payload)
                .await
                .expect("broker settle failed"),
        )
    }
}
