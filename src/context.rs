use std::sync::Arc;

use crate::{
    clients::{broker::MessageBroker, store::NotificationStore},
    config::Config,
    models::status::Channel,
};

/// Shared handles built once at startup and passed to every handler and
/// worker. Cloning is cheap.
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<dyn NotificationStore>,
    pub broker: Arc<dyn MessageBroker>,
}

impl AppContext {
    pub fn new(store: Arc<dyn NotificationStore>, broker: Arc<dyn MessageBroker>) -> Self {
        Self { store, broker }
    }
}

/// Queue name per channel.
#[derive(Debug, Clone)]
pub struct QueueRoutes {
    pub email: String,
    pub sms: String,
}

impl QueueRoutes {
    pub fn from_config(config: &Config) -> Self {
        Self {
            email: config.email_queue_name.clone(),
            sms: config.sms_queue_name.clone(),
        }
    }

    pub fn queue_for(&self, channel: Channel) -> &str {
        match channel {
            Channel::Email => &self.email,
            Channel::Sms => &self.sms,
        }
    }
}

impl Default for QueueRoutes {
    fn default() -> Self {
        Self {
            email: "email_queue".to_string(),
            sms: "sms_queue".to_string(),
        }
    }
}
