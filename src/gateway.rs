use tracing::{error, info};

use crate::{
    context::{AppContext, QueueRoutes},
    error::AppError,
    metrics,
    models::{message::DeliveryTask, request::SendRequest, validation::validate_send_request},
};

/// Ingress: validate, persist as `Pending`, then publish.
///
/// The record is written before the publish. If publishing fails the record
/// stays `Pending`; there is no rollback and no reconciliation.
#[derive(Clone)]
pub struct Gateway {
    context: AppContext,
    routes: QueueRoutes,
}

impl Gateway {
    pub fn new(context: AppContext, routes: QueueRoutes) -> Self {
        Self { context, routes }
    }

    pub async fn submit(&self, request: SendRequest) -> Result<i64, AppError> {
        let notification = validate_send_request(request).inspect_err(|_| {
            metrics::record_request("rejected");
        })?;

        let notification_id = self
            .context
            .store
            .create_pending(&notification)
            .await
            .map_err(|e| {
                metrics::record_request("error");
                AppError::DependencyUnavailable(format!("store: {:#}", e))
            })?;

        let queue = self.routes.queue_for(notification.channel);
        let task = DeliveryTask::new(notification_id, notification.recipient, notification.body)
            .with_metadata(notification.metadata);

        if let Err(e) = self.context.broker.publish(queue, &task).await {
            error!(
                notification_id,
                queue,
                error = %e,
                "Publish failed, record left pending"
            );
            metrics::record_request("error");
            return Err(AppError::DependencyUnavailable(format!("broker: {:#}", e)));
        }

        metrics::record_request("accepted");
        info!(
            notification_id,
            channel = %notification.channel,
            queue,
            "Notification queued"
        );

        Ok(notification_id)
    }
}
