//! In-process store and broker backends.
//!
//! Both implement the same traits as the Postgres and RabbitMQ clients and
//! follow their semantics closely enough to exercise the gateway and the
//! delivery workers without external services. State lives in memory and is
//! lost with the process.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;

use crate::{
    clients::{broker::MessageBroker, store::NotificationStore},
    models::{
        message::DeliveryTask,
        notification::{NewNotification, NotificationRecord, RecordSelector},
        status::NotificationStatus,
    },
};

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<NotificationRecord>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail, as if the database went away.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<NotificationRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(anyhow!("store unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn create_pending(&self, notification: &NewNotification) -> Result<i64> {
        self.check_available()?;

        let mut records = self
            .records
            .lock()
            .map_err(|_| anyhow!("store lock poisoned"))?;
        let id = records.len() as i64 + 1;
        let now = Utc::now();

        records.push(NotificationRecord {
            id,
            channel: notification.channel,
            recipient: notification.recipient.clone(),
            body: notification.body.clone(),
            metadata: notification.metadata.clone(),
            status: NotificationStatus::Pending,
            created_at: now,
            updated_at: now,
        });

        Ok(id)
    }

    async fn update_status(
        &self,
        selector: &RecordSelector,
        status: NotificationStatus,
    ) -> Result<u64> {
        self.check_available()?;

        let mut records = self
            .records
            .lock()
            .map_err(|_| anyhow!("store lock poisoned"))?;

        // Ids are assigned in insertion order, so the last match is the newest.
        let target = match selector {
            RecordSelector::Id(id) => records.iter_mut().find(|r| r.id == *id),
            RecordSelector::LatestPendingByContent {
                channel,
                recipient,
                body,
            } => records.iter_mut().rev().find(|r| {
                r.status == NotificationStatus::Pending
                    && r.channel == *channel
                    && r.recipient == *recipient
                    && r.body == *body
            }),
        };

        match target {
            Some(record) => {
                record.status = status;
                record.updated_at = Utc::now();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn find(&self, id: i64) -> Result<Option<NotificationRecord>> {
        self.check_available()?;

        let records = self
            .records
            .lock()
            .map_err(|_| anyhow!("store lock poisoned"))?;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn ping(&self) -> Result<()> {
        self.check_available()
    }
}

/// A message handed to a consumer and not yet settled.
#[derive(Debug, Clone)]
pub struct InFlight {
    pub delivery_tag: u64,
    pub queue: String,
    pub payload: Vec<u8>,
}

#[derive(Default)]
struct BrokerState {
    queues: HashMap<String, VecDeque<Vec<u8>>>,
    in_flight: HashMap<u64, InFlight>,
    rejected: Vec<Vec<u8>>,
}

/// Queue semantics of a durable AMQP queue: publish appends, a delivery stays
/// in flight until acked, a requeue puts it back at the tail, a reject drops
/// it.
pub struct MemoryBroker {
    state: Mutex<BrokerState>,
    next_tag: AtomicU64,
    connected: AtomicBool,
    publish_failures: AtomicU64,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self {
            state: Mutex::new(BrokerState::default()),
            next_tag: AtomicU64::new(1),
            connected: AtomicBool::new(true),
            publish_failures: AtomicU64::new(0),
        }
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// The next `count` publishes fail.
    pub fn fail_next_publishes(&self, count: u64) {
        self.publish_failures.store(count, Ordering::SeqCst);
    }

    pub fn publish_raw(&self, queue: &str, payload: Vec<u8>) {
        if let Ok(mut state) = self.state.lock() {
            state
                .queues
                .entry(queue.to_string())
                .or_default()
                .push_back(payload);
        }
    }

    /// Takes the head of `queue` and marks it in flight.
    pub fn deliver_next(&self, queue: &str) -> Option<InFlight> {
        let mut state = self.state.lock().ok()?;
        let payload = state.queues.get_mut(queue)?.pop_front()?;
        let delivery = InFlight {
            delivery_tag: self.next_tag.fetch_add(1, Ordering::SeqCst),
            queue: queue.to_string(),
            payload,
        };
        state
            .in_flight
            .insert(delivery.delivery_tag, delivery.clone());
        Some(delivery)
    }

    /// Messages waiting in `queue`, decoded. Undecodable payloads are skipped.
    pub fn queued_tasks(&self, queue: &str) -> Vec<DeliveryTask> {
        self.state
            .lock()
            .map(|state| {
                state
                    .queues
                    .get(queue)
                    .map(|q| {
                        q.iter()
                            .filter_map(|p| serde_json::from_slice(p).ok())
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    pub fn depth(&self, queue: &str) -> usize {
        self.state
            .lock()
            .map(|state| state.queues.get(queue).map_or(0, VecDeque::len))
            .unwrap_or(0)
    }

    pub fn in_flight_count(&self) -> usize {
        self.state.lock().map(|s| s.in_flight.len()).unwrap_or(0)
    }

    pub fn rejected_count(&self) -> usize {
        self.state.lock().map(|s| s.rejected.len()).unwrap_or(0)
    }

    fn settle(&self, delivery_tag: u64) -> Result<(InFlight, std::sync::MutexGuard<'_, BrokerState>)> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow!("broker lock poisoned"))?;
        let delivery = state
            .in_flight
            .remove(&delivery_tag)
            .ok_or_else(|| anyhow!("unknown delivery tag {}", delivery_tag))?;
        Ok((delivery, state))
    }
}

#[async_trait]
impl MessageBroker for MemoryBroker {
    async fn publish(&self, queue: &str, task: &DeliveryTask) -> Result<()> {
        if !self.is_connected() {
            return Err(anyhow!("broker not connected"));
        }
        let pending_failures = self.publish_failures.load(Ordering::SeqCst);
        if pending_failures > 0 {
            self.publish_failures
                .store(pending_failures - 1, Ordering::SeqCst);
            return Err(anyhow!("publish to {} failed", queue));
        }

        self.publish_raw(queue, serde_json::to_vec(task)?);
        Ok(())
    }

    async fn acknowledge(&self, delivery_tag: u64) -> Result<()> {
        self.settle(delivery_tag).map(|_| ())
    }

    async fn requeue(&self, delivery_tag: u64) -> Result<()> {
        let (delivery, mut state) = self.settle(delivery_tag)?;
        state
            .queues
            .entry(delivery.queue)
            .or_default()
            .push_back(delivery.payload);
        Ok(())
    }

    async fn reject(&self, delivery_tag: u64) -> Result<()> {
        let (delivery, mut state) = self.settle(delivery_tag)?;
        state.rejected.push(delivery.payload);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
