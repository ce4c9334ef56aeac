/// Workflow Management Layer
///
/// Workflow definitions, their SQLite persistence, the hot-reload registry of
/// validated step graphs, and the service that ties CRUD to execution.

// Core workflow type definitions
pub mod types;

// SQLite persistence layer for workflow storage
pub mod storage;

// Hot-reload registry using ArcSwap for zero-downtime updates
pub mod registry;

// CRUD + execution entry point
pub mod service;

pub use registry::{CompiledWorkflow, WorkflowRegistry};
pub use service::WorkflowService;
pub use storage::WorkflowStorage;
pub use types::{
    BranchHandle, Connection, ExecutionContext, ExecutionStatus, NewWorkflow, Step, StepOutcome, StepType,
    Workflow, WorkflowExecution, WorkflowUpdate,
};
