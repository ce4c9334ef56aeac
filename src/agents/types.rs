/// Agent task type definitions
///
/// Tasks are routed by [`AgentType`] to the external agent service and audited as
/// [`TaskResult`] rows in the task store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The four agent categories a task can be routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Sales,
    Automation,
    Manager,
    Developer,
}

impl AgentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Sales => "sales",
            AgentType::Automation => "automation",
            AgentType::Manager => "manager",
            AgentType::Developer => "developer",
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// A unit of work for one agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTask {
    pub agent_type: AgentType,
    /// Free-form task name understood by the agent (e.g. "score_lead")
    pub task_type: String,
    /// Task input; expected to be a JSON object
    #[serde(default = "empty_object")]
    pub context: Value,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
}

impl AgentTask {
    pub fn new(agent_type: AgentType, task_type: impl Into<String>, context: Value) -> Self {
        Self {
            agent_type,
            task_type: task_type.into(),
            context,
            priority: Priority::default(),
            scheduled_for: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

/// The user and company a task runs on behalf of
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub company_id: String,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, company_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            company_id: company_id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

/// Outcome of one dispatched task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub id: String,
    pub agent_type: AgentType,
    pub task_type: String,
    pub status: TaskStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub execution_time_ms: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Request body handed to an agent caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRequest {
    pub task_type: String,
    pub context: Value,
    pub user_id: String,
    pub company_id: String,
}

/// What an agent caller reports back
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentResponse {
    pub success: bool,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
}

/// Per-agent statistics, lost on restart
///
/// `success_rate` and `avg_execution_time_ms` are simple incremental averages: the
/// first task seeds them, then each new sample is averaged against the prior
/// aggregate with equal weight. Recent tasks therefore dominate; these are not
/// means over all tasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_tasks: u64,
    /// In [0, 1]
    pub success_rate: f64,
    pub avg_execution_time_ms: f64,
    pub last_active: Option<DateTime<Utc>>,
}

impl PerformanceMetrics {
    pub fn record(&mut self, success: bool, execution_time_ms: i64, at: DateTime<Utc>) {
        let outcome = if success { 1.0 } else { 0.0 };
        let duration = execution_time_ms as f64;

        if self.total_tasks == 0 {
            self.success_rate = outcome;
            self.avg_execution_time_ms = duration;
        } else {
            self.success_rate = (self.success_rate + outcome) / 2.0;
            self.avg_execution_time_ms = (self.avg_execution_time_ms + duration) / 2.0;
        }

        self.total_tasks += 1;
        self.last_active = Some(at);
    }
}

/// Thumbs up/down left by a user on a finished task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFeedback {
    pub positive: bool,
    #[serde(default)]
    pub comment: Option<String>,
}

/// A deferred task waiting in the in-memory queue
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledTask {
    pub id: String,
    pub actor: Actor,
    pub task: AgentTask,
    pub ready_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub agent_service_healthy: bool,
    pub failed_last_hour: i64,
    pub escalated: bool,
    pub checked_at: DateTime<Utc>,
}
