/// Agent task store
///
/// One row per dispatched task: inserted as `pending` when dispatch starts, then
/// finalised once as `completed` or `failed`.

use crate::agents::types::{Actor, AgentTask, TaskStatus};
use crate::store::database::timestamp;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::{sqlite::SqlitePool, Row};

/// A stored task row
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub id: String,
    pub agent_type: String,
    pub task_type: String,
    pub status: String,
    pub input_payload: Value,
    pub output_payload: Option<Value>,
    pub error_message: Option<String>,
    pub execution_time_ms: Option<i64>,
    pub user_id: String,
    pub company_id: String,
    pub started_at: String,
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TaskStore {
    pool: SqlitePool,
}

impl TaskStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert_pending(
        &self,
        id: &str,
        actor: &Actor,
        task: &AgentTask,
        started_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO agent_tasks
                (id, agent_type, task_type, status, input_payload, user_id, company_id, started_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(task.agent_type.as_str())
        .bind(&task.task_type)
        .bind(TaskStatus::Pending.as_str())
        .bind(serde_json::to_string(&task.context)?)
        .bind(&actor.user_id)
        .bind(&actor.company_id)
        .bind(timestamp(started_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn mark_completed(
        &self,
        id: &str,
        output: &Value,
        execution_time_ms: i64,
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE agent_tasks
            SET status = ?, output_payload = ?, execution_time_ms = ?, completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(TaskStatus::Completed.as_str())
        .bind(serde_json::to_string(output)?)
        .bind(execution_time_ms)
        .bind(timestamp(completed_at))
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn mark_failed(
        &self,
        id: &str,
        error: &str,
        execution_time_ms: i64,
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE agent_tasks
            SET status = ?, error_message = ?, execution_time_ms = ?, completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(TaskStatus::Failed.as_str())
        .bind(error)
        .bind(execution_time_ms)
        .bind(timestamp(completed_at))
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Failed tasks whose dispatch started at or after `since`
    pub async fn count_failed_since(&self, since: DateTime<Utc>) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM agent_tasks WHERE status = ? AND started_at >= ?",
        )
        .bind(TaskStatus::Failed.as_str())
        .bind(timestamp(since))
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    pub async fn get(&self, id: &str) -> Result<Option<TaskRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, agent_type, task_type, status, input_payload, output_payload, error_message,
                   execution_time_ms, user_id, company_id, started_at, completed_at
            FROM agent_tasks WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let input: String = row.get("input_payload");
        let output: Option<String> = row.get("output_payload");

        Ok(Some(TaskRecord {
            id: row.get("id"),
            agent_type: row.get("agent_type"),
            task_type: row.get("task_type"),
            status: row.get("status"),
            input_payload: serde_json::from_str(&input)?,
            output_payload: output.map(|raw| serde_json::from_str(&raw)).transpose()?,
            error_message: row.get("error_message"),
            execution_time_ms: row.get("execution_time_ms"),
            user_id: row.get("user_id"),
            company_id: row.get("company_id"),
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::types::AgentType;
    use crate::store::test_utils::setup_test_pool;
    use chrono::Duration;
    use serde_json::json;

    #[tokio::test]
    async fn pending_row_is_finalised_once() {
        let store = TaskStore::new(setup_test_pool().await);
        let actor = Actor::new("u1", "acme");
        let task = AgentTask::new(AgentType::Sales, "score_lead", json!({ "lead_id": "l1" }));
        let now = Utc::now();

        store.insert_pending("t1", &actor, &task, now).await.unwrap();
        let pending = store.get("t1").await.unwrap().unwrap();
        assert_eq!(pending.status, "pending");
        assert!(pending.output_payload.is_none());

        store.mark_completed("t1", &json!({ "score": 80 }), 12, now).await.unwrap();
        let done = store.get("t1").await.unwrap().unwrap();
        assert_eq!(done.status, "completed");
        assert_eq!(done.output_payload, Some(json!({ "score": 80 })));
        assert_eq!(done.execution_time_ms, Some(12));
        assert_eq!(done.input_payload["lead_id"], "l1");
    }

    #[tokio::test]
    async fn counts_only_recent_failures() {
        let store = TaskStore::new(setup_test_pool().await);
        let actor = Actor::new("u1", "acme");
        let task = AgentTask::new(AgentType::Automation, "sync", json!({}));
        let now = Utc::now();

        store.insert_pending("old", &actor, &task, now - Duration::hours(2)).await.unwrap();
        store.mark_failed("old", "timeout", 5, now).await.unwrap();
        store.insert_pending("new", &actor, &task, now).await.unwrap();
        store.mark_failed("new", "timeout", 5, now).await.unwrap();
        store.insert_pending("ok", &actor, &task, now).await.unwrap();

        let count = store.count_failed_since(now - Duration::hours(1)).await.unwrap();
        assert_eq!(count, 1);
    }
}
