use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool, postgres::PgPoolOptions};
use tracing::{debug, error, info};

use crate::{
    clients::{connector::RetryConnector, store::NotificationStore},
    config::Config,
    models::{
        notification::{NewNotification, NotificationRecord, RecordSelector},
        status::NotificationStatus,
    },
};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS notifications (
        id BIGSERIAL PRIMARY KEY,
        channel TEXT NOT NULL,
        recipient TEXT NOT NULL,
        body TEXT NOT NULL,
        metadata JSONB,
        status TEXT NOT NULL DEFAULT 'pending',
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS notifications_content_lookup
        ON notifications (channel, recipient, status)
    "#,
];

#[derive(FromRow)]
struct NotificationRow {
    id: i64,
    channel: String,
    recipient: String,
    body: String,
    metadata: Option<JsonValue>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for NotificationRecord {
    type Error = Error;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            channel: row.channel.parse().map_err(|e: String| anyhow!(e))?,
            recipient: row.recipient,
            body: row.body,
            metadata: row.metadata,
            status: row.status.parse().map_err(|e: String| anyhow!(e))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub struct DatabaseClient {
    pool: PgPool,
}

impl DatabaseClient {
    pub async fn connect(config: &Config) -> Result<Self, Error> {
        info!("Connecting to PostgreSQL database");

        let mut connector = RetryConnector::new(
            "postgres",
            config.connect_max_attempts,
            config.connect_retry_delay(),
        );

        let pool = connector
            .connect(|| {
                PgPoolOptions::new()
                    .max_connections(config.database_max_connections)
                    .connect(&config.database_url)
            })
            .await?;

        Ok(Self { pool })
    }

    pub async fn ensure_schema(&self) -> Result<(), Error> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| anyhow!("Failed to apply schema: {}", e))?;
        }

        info!("Notification schema ready");

        Ok(())
    }
}

#[async_trait]
impl NotificationStore for DatabaseClient {
    async fn create_pending(&self, notification: &NewNotification) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO notifications (channel, recipient, body, metadata, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(notification.channel.as_str())
        .bind(&notification.recipient)
        .bind(&notification.body)
        .bind(&notification.metadata)
        .bind(NotificationStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, channel = %notification.channel, "Failed to insert notification");
            anyhow!("Database write failed: {}", e)
        })?;

        debug!(notification_id = id, "Pending notification stored");

        Ok(id)
    }

    async fn update_status(
        &self,
        selector: &RecordSelector,
        status: NotificationStatus,
    ) -> Result<u64> {
        let result = match selector {
            RecordSelector::Id(id) => {
                sqlx::query(
                    r#"
                    UPDATE notifications
                       SET status = $1, updated_at = now()
                     WHERE id = $2
                    "#,
                )
                .bind(status.as_str())
                .bind(id)
                .execute(&self.pool)
                .await
            }
            RecordSelector::LatestPendingByContent {
                channel,
                recipient,
                body,
            } => {
                sqlx::query(
                    r#"
                    UPDATE notifications
                       SET status = $1, updated_at = now()
                     WHERE id = (
                        SELECT id FROM notifications
                         WHERE channel = $2 AND recipient = $3 AND body = $4
                           AND status = 'pending'
                         ORDER BY created_at DESC, id DESC
                         LIMIT 1
                     )
                    "#,
                )
                .bind(status.as_str())
                .bind(channel.as_str())
                .bind(recipient)
                .bind(body)
                .execute(&self.pool)
                .await
            }
        }
        .map_err(|e| anyhow!("Status update failed: {}", e))?;

        Ok(result.rows_affected())
    }

    async fn find(&self, id: i64) -> Result<Option<NotificationRecord>> {
        let row = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, channel, recipient, body, metadata, status, created_at, updated_at
              FROM notifications
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!("Notification lookup failed: {}", e))?;

        row.map(NotificationRecord::try_from).transpose()
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| anyhow!("Database health check failed: {}", e))?;

        Ok(())
    }
}
