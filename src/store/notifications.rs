/// Notifications table: escalation alerts and workflow `notify` actions

use crate::store::database::timestamp;
use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use sqlx::{sqlite::SqlitePool, Row};

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: String,
    pub company_id: String,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub metadata: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub company_id: String,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub metadata: Value,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NotificationStore {
    pool: SqlitePool,
}

impl NotificationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, notification: NewNotification) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, company_id, type, title, message, metadata, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&notification.user_id)
        .bind(&notification.company_id)
        .bind(&notification.kind)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(serde_json::to_string(&notification.metadata)?)
        .bind(timestamp(chrono::Utc::now()))
        .execute(&self.pool)
        .await?;

        tracing::info!("🔔 Notification '{}' created for {}", notification.title, notification.user_id);

        Ok(id)
    }

    pub async fn list(&self) -> Result<Vec<Notification>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, company_id, type, title, message, metadata, created_at
            FROM notifications ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut notifications = Vec::with_capacity(rows.len());
        for row in rows {
            let metadata: String = row.get("metadata");
            notifications.push(Notification {
                id: row.get("id"),
                user_id: row.get("user_id"),
                company_id: row.get("company_id"),
                kind: row.get("type"),
                title: row.get("title"),
                message: row.get("message"),
                metadata: serde_json::from_str(&metadata)?,
                created_at: row.get("created_at"),
            });
        }

        Ok(notifications)
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
