/// Core workflow type definitions
///
/// A workflow is a directed graph of typed steps joined by connections. Definitions
/// are stored as JSON and validated into a step graph before they can run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A complete, stored workflow definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Owning company; also stamped on every log row the workflow produces
    #[serde(default)]
    pub company_id: Option<String>,
    pub steps: Vec<Step>,
    pub connections: Vec<Connection>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a workflow; id and timestamps are generated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWorkflow {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub company_id: Option<String>,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

/// Partial update; `None` fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub steps: Option<Vec<Step>>,
    #[serde(default)]
    pub connections: Option<Vec<Connection>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

fn default_active() -> bool {
    true
}

/// A single node in the workflow graph
///
/// `config` is free-form; which keys matter depends on `step_type`:
/// - trigger:   { "triggerType": "form_submitted", "formId": "..." }
/// - condition: { "conditionType": "has_tag", "conditionValue": "hot", "field": "..." }
/// - action:    { "actionType": "send_email", ... }
/// - ai_action: { "aiActionType": "draft_reply", ... }
/// - delay:     { "delayAmount": 2, "delayUnit": "hours" }
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub step_type: StepType,
    #[serde(default = "empty_config")]
    pub config: Value,
}

impl Step {
    pub fn new(id: impl Into<String>, step_type: StepType, config: Value) -> Self {
        Self {
            id: id.into(),
            name: None,
            step_type,
            config,
        }
    }

    /// String config value, if present
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(Value::as_str)
    }

    /// Config value rendered as text (numbers and booleans included)
    pub fn config_text(&self, key: &str) -> Option<String> {
        match self.config.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

fn empty_config() -> Value {
    Value::Object(Default::default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    /// Entry point; evaluated against the trigger payload
    Trigger,
    /// Gate; a failure diverts to the "no" branch and halts the main flow
    Condition,
    /// Side effect through the action port
    Action,
    /// Generated content through the AI port
    AiAction,
    /// Computes a resume time; does not suspend execution
    Delay,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::Trigger => "trigger",
            StepType::Condition => "condition",
            StepType::Action => "action",
            StepType::AiAction => "ai_action",
            StepType::Delay => "delay",
        }
    }
}

/// Directed edge between two steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub from: String,
    pub to: String,
    /// Branch of a condition step this edge leaves from
    #[serde(default)]
    pub handle: Option<BranchHandle>,
}

impl Connection {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            handle: None,
        }
    }

    pub fn branch(from: impl Into<String>, to: impl Into<String>, handle: BranchHandle) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            handle: Some(handle),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchHandle {
    Yes,
    No,
}

/// Runtime context shared by every step of one execution
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionContext {
    pub execution_id: String,
    pub workflow_id: String,
    pub company_id: Option<String>,
    /// Event payload the workflow runs against (lead fields, message content, ...)
    pub trigger_data: Value,
    pub started_at: DateTime<Utc>,
}

impl ExecutionContext {
    pub fn new(workflow: &Workflow, trigger_data: Value) -> Self {
        Self {
            execution_id: uuid::Uuid::new_v4().to_string(),
            workflow_id: workflow.id.clone(),
            company_id: workflow.company_id.clone(),
            trigger_data,
            started_at: Utc::now(),
        }
    }
}

/// Result of running one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step_id: String,
    pub step_type: StepType,
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub data: Value,
}

impl StepOutcome {
    pub fn success(step: &Step, message: impl Into<String>, data: Value) -> Self {
        Self {
            step_id: step.id.clone(),
            step_type: step.step_type,
            success: true,
            message: message.into(),
            data,
        }
    }

    pub fn failure(step: &Step, message: impl Into<String>) -> Self {
        Self {
            step_id: step.id.clone(),
            step_type: step.step_type,
            success: false,
            message: message.into(),
            data: Value::Null,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Every step in the main flow ran
    Completed,
    /// A condition failed and the main flow stopped
    Halted,
}

/// Summary of one workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub execution_id: String,
    pub workflow_id: String,
    pub status: ExecutionStatus,
    pub steps: Vec<StepOutcome>,
    /// Condition step that halted the main flow
    pub halted_at: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl WorkflowExecution {
    /// Step ids in the order they ran
    pub fn executed_step_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.step_id.as_str()).collect()
    }
}
