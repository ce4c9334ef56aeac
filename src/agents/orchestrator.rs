/// Agent task dispatcher
///
/// Routes tasks to the external agent service, times each call, and keeps the task
/// store, metrics and escalation notifications in step with the outcome. Every
/// public entry point absorbs failures: callers always get a [`TaskResult`] back.

use crate::agents::caller::AgentCaller;
use crate::agents::types::{
    Actor, AgentRequest, AgentTask, AgentType, HealthReport, PerformanceMetrics, ScheduledTask,
    TaskFeedback, TaskResult, TaskStatus,
};
use crate::store::{LogEntry, LogStore, NewNotification, NotificationStore, TaskStore, Visibility};
use anyhow::Result;
use chrono::{DateTime, Duration, TimeDelta, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Error text fragments that mark a failure as critical
pub const CRITICAL_ERROR_MARKERS: [&str; 3] = ["timeout", "service_unavailable", "authentication_failed"];

/// Task type sent to the developer agent when a critical failure is escalated
pub const CRITICAL_ERROR_TASK: &str = "handle_critical_error";

pub fn is_critical_error(message: &str) -> bool {
    let message = message.to_lowercase();
    CRITICAL_ERROR_MARKERS.iter().any(|marker| message.contains(marker))
}

pub struct AgentOrchestrator {
    caller: Arc<dyn AgentCaller>,
    tasks: TaskStore,
    logs: LogStore,
    notifications: NotificationStore,
    /// Deferred tasks; not durable across restarts
    queue: Mutex<Vec<ScheduledTask>>,
    metrics: RwLock<HashMap<AgentType, PerformanceMetrics>>,
    /// Failed tasks per hour tolerated before the health check escalates
    failure_threshold: i64,
    /// Recipient of escalations not tied to a single task
    system_actor: Actor,
}

impl AgentOrchestrator {
    pub fn new(
        caller: Arc<dyn AgentCaller>,
        tasks: TaskStore,
        logs: LogStore,
        notifications: NotificationStore,
        failure_threshold: i64,
    ) -> Self {
        Self {
            caller,
            tasks,
            logs,
            notifications,
            queue: Mutex::new(Vec::new()),
            metrics: RwLock::new(HashMap::new()),
            failure_threshold,
            system_actor: Actor::new("system", "system"),
        }
    }

    /// Dispatch one task and wait for its outcome
    ///
    /// Never fails: agent errors become a `failed` result, audit write errors are logged.
    pub async fn execute_task(&self, actor: &Actor, task: AgentTask) -> TaskResult {
        let id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();

        tracing::info!("🚀 Dispatching task {} to {} agent: {}", id, task.agent_type, task.task_type);

        if let Err(e) = self.tasks.insert_pending(&id, actor, &task, started_at).await {
            tracing::warn!("⚠️ Failed to record pending task {}: {}", id, e);
        }

        let request = AgentRequest {
            task_type: task.task_type.clone(),
            context: task.context.clone(),
            user_id: actor.user_id.clone(),
            company_id: actor.company_id.clone(),
        };

        let clock = std::time::Instant::now();
        let outcome = match self.caller.execute(task.agent_type, request).await {
            Ok(response) if response.success => Ok(response.output.unwrap_or(Value::Null)),
            Ok(response) => Err(response
                .error
                .unwrap_or_else(|| "Agent reported an unsuccessful run".to_string())),
            Err(e) => Err(e.to_string()),
        };
        let execution_time_ms = clock.elapsed().as_millis() as i64;
        let completed_at = Utc::now();

        self.record_metrics(task.agent_type, outcome.is_ok(), execution_time_ms, completed_at)
            .await;

        match outcome {
            Ok(output) => {
                if let Err(e) = self
                    .tasks
                    .mark_completed(&id, &output, execution_time_ms, completed_at)
                    .await
                {
                    tracing::warn!("⚠️ Failed to record completion of task {}: {}", id, e);
                }

                tracing::info!("✅ Task {} completed in {}ms", id, execution_time_ms);

                TaskResult {
                    id,
                    agent_type: task.agent_type,
                    task_type: task.task_type,
                    status: TaskStatus::Completed,
                    result: Some(output),
                    error: None,
                    execution_time_ms,
                    started_at,
                    completed_at: Some(completed_at),
                }
            }
            Err(error) => {
                if let Err(e) = self
                    .tasks
                    .mark_failed(&id, &error, execution_time_ms, completed_at)
                    .await
                {
                    tracing::warn!("⚠️ Failed to record failure of task {}: {}", id, e);
                }

                if is_critical_error(&error) {
                    tracing::error!("🚨 Critical failure in task {}: {}", id, error);
                    self.escalate_critical(actor, &id, &task, &error).await;
                } else {
                    tracing::warn!("❌ Task {} failed: {}", id, error);
                }

                TaskResult {
                    id,
                    agent_type: task.agent_type,
                    task_type: task.task_type,
                    status: TaskStatus::Failed,
                    result: None,
                    error: Some(error),
                    execution_time_ms,
                    started_at,
                    completed_at: Some(completed_at),
                }
            }
        }
    }

    /// Store user feedback on a finished task for later review
    pub async fn record_feedback(&self, actor: &Actor, task_id: &str, feedback: TaskFeedback) -> Result<()> {
        let verdict = if feedback.positive { "👍" } else { "👎" };

        self.logs
            .record(
                LogEntry::new(
                    "agent_feedback",
                    format!("Feedback {} on task {}", verdict, task_id),
                    json!({
                        "task_id": task_id,
                        "user_id": actor.user_id,
                        "positive": feedback.positive,
                        "comment": feedback.comment,
                    }),
                )
                .for_company(Some(&actor.company_id))
                .with_visibility(Visibility::Private),
            )
            .await?;

        Ok(())
    }

    /// Queue a task to run once `delay_ms` has elapsed
    ///
    /// Fails when the delay puts `ready_at` beyond the representable calendar range.
    pub async fn schedule_task(&self, actor: &Actor, mut task: AgentTask, delay_ms: u64) -> Result<ScheduledTask> {
        let ready_at = i64::try_from(delay_ms)
            .ok()
            .and_then(TimeDelta::try_milliseconds)
            .and_then(|delay| Utc::now().checked_add_signed(delay))
            .ok_or_else(|| anyhow::anyhow!("delay of {}ms is out of range", delay_ms))?;
        task.scheduled_for = Some(ready_at);

        let scheduled = ScheduledTask {
            id: uuid::Uuid::new_v4().to_string(),
            actor: actor.clone(),
            task,
            ready_at,
        };

        tracing::info!("⏳ Scheduled task {} ({}) for {}", scheduled.id, scheduled.task.task_type, ready_at);

        self.queue.lock().await.push(scheduled.clone());
        Ok(scheduled)
    }

    /// Execute every queued task that is due, highest priority first
    pub async fn process_scheduled_tasks(&self) -> Vec<TaskResult> {
        let mut ready = self.take_ready(Utc::now()).await;
        if ready.is_empty() {
            return Vec::new();
        }

        ready.sort_by(|a, b| {
            b.task
                .priority
                .cmp(&a.task.priority)
                .then_with(|| a.ready_at.cmp(&b.ready_at))
        });

        tracing::info!("🔄 Running {} scheduled tasks", ready.len());

        let mut results = Vec::with_capacity(ready.len());
        for scheduled in ready {
            results.push(self.execute_task(&scheduled.actor, scheduled.task).await);
        }
        results
    }

    async fn take_ready(&self, now: DateTime<Utc>) -> Vec<ScheduledTask> {
        let mut queue = self.queue.lock().await;
        let (ready, waiting): (Vec<_>, Vec<_>) =
            std::mem::take(&mut *queue).into_iter().partition(|t| t.ready_at <= now);
        *queue = waiting;
        ready
    }

    pub async fn pending_tasks(&self) -> Vec<ScheduledTask> {
        self.queue.lock().await.clone()
    }

    /// Ping the agent service only
    pub async fn ping(&self) -> bool {
        self.caller.health_check().await
    }

    /// Ping the agent service and escalate when too many tasks failed in the last hour
    pub async fn health_check(&self) -> HealthReport {
        let checked_at = Utc::now();
        let agent_service_healthy = self.caller.health_check().await;

        if !agent_service_healthy {
            tracing::warn!("⚠️ Agent service reported unhealthy");
        }

        let failed_last_hour = match self.tasks.count_failed_since(checked_at - Duration::hours(1)).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!("⚠️ Could not count recent task failures: {}", e);
                0
            }
        };

        let escalated = failed_last_hour > self.failure_threshold;
        if escalated {
            tracing::error!(
                "🚨 {} tasks failed in the last hour (threshold {})",
                failed_last_hour,
                self.failure_threshold
            );
            self.notify_escalation(
                &self.system_actor,
                "High agent failure rate",
                format!(
                    "{} agent tasks failed in the last hour (threshold {})",
                    failed_last_hour, self.failure_threshold
                ),
                json!({ "failed_last_hour": failed_last_hour, "threshold": self.failure_threshold }),
            )
            .await;
        }

        HealthReport {
            agent_service_healthy,
            failed_last_hour,
            escalated,
            checked_at,
        }
    }

    pub async fn metrics(&self) -> HashMap<AgentType, PerformanceMetrics> {
        self.metrics.read().await.clone()
    }

    pub async fn metrics_for(&self, agent_type: AgentType) -> Option<PerformanceMetrics> {
        self.metrics.read().await.get(&agent_type).cloned()
    }

    async fn record_metrics(&self, agent_type: AgentType, success: bool, execution_time_ms: i64, at: DateTime<Utc>) {
        let mut metrics = self.metrics.write().await;
        metrics
            .entry(agent_type)
            .or_default()
            .record(success, execution_time_ms, at);
    }

    /// Alert a human and hand the failure to the developer agent
    async fn escalate_critical(&self, actor: &Actor, task_id: &str, task: &AgentTask, error: &str) {
        let details = json!({
            "task_id": task_id,
            "agent_type": task.agent_type,
            "task_type": task.task_type,
            "error": error,
        });

        self.notify_escalation(
            actor,
            "Critical agent failure",
            format!("{} agent task '{}' failed: {}", task.agent_type, task.task_type, error),
            details.clone(),
        )
        .await;

        let request = AgentRequest {
            task_type: CRITICAL_ERROR_TASK.to_string(),
            context: json!({ "failure": details, "original_context": task.context }),
            user_id: actor.user_id.clone(),
            company_id: actor.company_id.clone(),
        };

        match self.caller.execute(AgentType::Developer, request).await {
            Ok(response) if response.success => {
                tracing::info!("🛠️ Developer agent accepted escalation for task {}", task_id)
            }
            Ok(response) => tracing::warn!(
                "⚠️ Developer agent rejected escalation for task {}: {}",
                task_id,
                response.error.unwrap_or_default()
            ),
            Err(e) => tracing::warn!("⚠️ Could not reach developer agent for task {}: {}", task_id, e),
        }
    }

    async fn notify_escalation(&self, actor: &Actor, title: &str, message: String, metadata: Value) {
        let notification = NewNotification {
            user_id: actor.user_id.clone(),
            company_id: actor.company_id.clone(),
            kind: "agent_escalation".to_string(),
            title: title.to_string(),
            message,
            metadata,
        };

        if let Err(e) = self.notifications.insert(notification).await {
            tracing::error!("❌ Failed to write escalation notification: {}", e);
        }
    }
}
