/// Runtime Execution Engine
///
/// This module runs workflows and keeps background work ticking:
/// - Converting workflows to petgraph step graphs
/// - Depth-first execution from trigger steps with condition branching
/// - Per-step dispatch to the action and AI ports
/// - Repeated jobs for the deferred task queue and health checks

// Petgraph step graph and traversal orders
pub mod graph;

// Core execution engine walking the step graph
pub mod engine;

// Individual step handlers
pub mod executor;

// External side-effect ports and canned implementations
pub mod integrations;

// Background jobs for queued tasks and health checks
pub mod scheduler;

pub use engine::WorkflowEngine;
pub use executor::StepExecutor;
pub use graph::StepGraph;
pub use integrations::{ActionPort, AiPort, CannedActions, CannedAi};
pub use scheduler::BackgroundScheduler;
