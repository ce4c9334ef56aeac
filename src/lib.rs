/// Dealflow: agent task dispatch and workflow automation for sales teams
///
/// This library routes typed tasks to an external AI agent service, interprets
/// stored sales workflows (triggers, conditions, actions, AI actions, delays)
/// as petgraph step graphs, and records every outcome in SQLite.

// Core configuration and setup
pub mod config;

// Domain error types
pub mod error;

// SQLite persistence - logs, agent tasks, notifications
pub mod store;

// Agent task dispatcher, health checks and startup initialization
pub mod agents;

// Workflow management layer - definitions, storage, registry, service
pub mod workflow;

// Runtime execution engine - step graph traversal and step handlers
pub mod runtime;

// HTTP API layer - REST endpoints for workflows and agent tasks
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use agents::{Actor, AgentOrchestrator, AgentTask, AgentType, TaskResult};
pub use error::{AgentError, WorkflowError};
pub use runtime::WorkflowEngine;
pub use server::start_server;
pub use workflow::{Workflow, WorkflowExecution, WorkflowService};
