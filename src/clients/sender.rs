use async_trait::async_trait;

use crate::{
    error::DeliveryError,
    models::{message::DeliveryTask, status::Channel},
};

/// External send capability for one channel.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    fn channel(&self) -> Channel;

    async fn send(&self, task: &DeliveryTask) -> Result<(), DeliveryError>;
}
