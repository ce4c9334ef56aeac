/// Domain error types
///
/// Infrastructure code propagates `anyhow::Error`; these enums exist where callers
/// (API handlers, tests) need to branch on the failure kind.

/// Failures surfaced by workflow CRUD and execution
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("workflow not found: {0}")]
    NotFound(String),
    #[error("workflow is not active: {0}")]
    Inactive(String),
    #[error("invalid workflow: {0}")]
    Invalid(String),
    #[error("trigger step `{step_id}` did not match: {message}")]
    TriggerFailed { step_id: String, message: String },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for WorkflowError {
    fn from(err: sqlx::Error) -> Self {
        WorkflowError::Other(err.into())
    }
}

impl From<serde_json::Error> for WorkflowError {
    fn from(err: serde_json::Error) -> Self {
        WorkflowError::Other(err.into())
    }
}

/// Failures reported by an external agent caller
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("agent service request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("agent service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("{0}")]
    Rejected(String),
}
