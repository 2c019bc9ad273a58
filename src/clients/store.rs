use anyhow::Result;
use async_trait::async_trait;

use crate::models::{
    notification::{NewNotification, NotificationRecord, RecordSelector},
    status::NotificationStatus,
};

/// Persistent notification status. Implementations provide their own
/// concurrency safety; callers share one handle without locking.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Inserts a `Pending` record and returns its id.
    async fn create_pending(&self, notification: &NewNotification) -> Result<i64>;

    /// Sets the status of the selected record. Returns the number of rows
    /// changed (0 or 1).
    async fn update_status(
        &self,
        selector: &RecordSelector,
        status: NotificationStatus,
    ) -> Result<u64>;

    async fn find(&self, id: i64) -> Result<Option<NotificationRecord>>;

    async fn ping(&self) -> Result<()>;
}
