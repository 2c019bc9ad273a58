use std::{collections::BTreeMap, time::Instant};

use tracing::{debug, warn};

use crate::{
    context::AppContext,
    models::health::{HealthCheckResponse, ServiceHealth},
};

/// Readiness: the store answers a query and the broker connection is up.
pub struct HealthChecker {
    context: AppContext,
}

impl HealthChecker {
    pub fn new(context: AppContext) -> Self {
        Self { context }
    }

    pub async fn check_all(&self) -> HealthCheckResponse {
        let mut checks = BTreeMap::new();

        checks.insert("database".to_string(), self.check_database().await);
        checks.insert("message_broker".to_string(), self.check_broker());

        HealthCheckResponse::from_checks(checks)
    }

    async fn check_database(&self) -> ServiceHealth {
        let start = Instant::now();

        match self.context.store.ping().await {
            Ok(()) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(response_time_ms = elapsed, "Database health check passed");
                ServiceHealth::healthy(elapsed)
            }
            Err(e) => {
                warn!(error = %e, "Database health check failed");
                ServiceHealth::unhealthy(e.to_string())
            }
        }
    }

    fn check_broker(&self) -> ServiceHealth {
        if self.context.broker.is_connected() {
            ServiceHealth::healthy(0)
        } else {
            warn!("RabbitMQ connection is not open");
            ServiceHealth::unhealthy("No RabbitMQ connection".to_string())
        }
    }
}
