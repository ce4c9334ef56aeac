/// Agent Task Dispatch
///
/// Routes typed tasks to the external agent service and audits every run:
/// - Task, result and metrics types
/// - AgentCaller port with an HTTP implementation
/// - AgentOrchestrator: dispatch, feedback, deferred queue, health checks
/// - AgentInitializationService: startup check with a single retry

pub mod types;

pub mod caller;

pub mod orchestrator;

pub mod initialization;

#[cfg(test)]
pub(crate) mod testing;

pub use caller::{AgentCaller, HttpAgentCaller};
pub use initialization::AgentInitializationService;
pub use orchestrator::AgentOrchestrator;
pub use types::{Actor, AgentTask, AgentType, Priority, TaskResult, TaskStatus};
