/// Workflow execution engine
///
/// Walks the step graph depth-first from every trigger step and runs each step in
/// that order, one at a time. Control flow rules:
/// - every step outcome is written to the log store
/// - a failed trigger aborts the run with [`WorkflowError::TriggerFailed`]
/// - a failed condition replaces the rest of the main flow with its "no" branch,
///   after which the run halts
/// - any other failure is logged and the run continues

use crate::error::WorkflowError;
use crate::runtime::executor::StepExecutor;
use crate::runtime::graph::StepGraph;
use crate::store::{LogEntry, LogStore};
use crate::workflow::registry::CompiledWorkflow;
use crate::workflow::types::{
    ExecutionContext, ExecutionStatus, StepOutcome, StepType, Workflow, WorkflowExecution,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

pub struct WorkflowEngine {
    executor: Arc<StepExecutor>,
    logs: LogStore,
}

impl WorkflowEngine {
    pub fn new(executor: Arc<StepExecutor>, logs: LogStore) -> Self {
        Self { executor, logs }
    }

    /// Execute a validated workflow from the registry
    pub async fn execute_compiled(
        &self,
        compiled: &CompiledWorkflow,
        trigger_data: Value,
    ) -> Result<WorkflowExecution, WorkflowError> {
        self.execute(&compiled.workflow, &compiled.graph, trigger_data).await
    }

    /// Execute `workflow` against `trigger_data`
    pub async fn execute(
        &self,
        workflow: &Workflow,
        graph: &StepGraph,
        trigger_data: Value,
    ) -> Result<WorkflowExecution, WorkflowError> {
        if graph.triggers().is_empty() {
            return Err(WorkflowError::Invalid(format!(
                "workflow '{}' has no trigger steps",
                workflow.id
            )));
        }

        let context = ExecutionContext::new(workflow, trigger_data);
        let mut pending: VecDeque<_> = graph.main_flow().into();

        tracing::info!(
            "🚀 Starting workflow '{}' (execution {}) with {} steps in main flow",
            workflow.id,
            context.execution_id,
            pending.len()
        );

        let mut executed = HashSet::new();
        let mut outcomes: Vec<StepOutcome> = Vec::new();
        let mut halted_at: Option<String> = None;

        while let Some(index) = pending.pop_front() {
            if !executed.insert(index) {
                continue;
            }

            let step = graph.step(index);
            let outcome = self.executor.execute_step(step, &context).await;
            self.log_step(&context, &outcome).await;
            let success = outcome.success;
            let message = outcome.message.clone();
            outcomes.push(outcome);

            if success {
                continue;
            }

            match step.step_type {
                StepType::Trigger => {
                    tracing::warn!("⛔ Trigger '{}' did not match, aborting workflow '{}'", step.id, workflow.id);
                    self.log_run(&context, "aborted", &outcomes).await;
                    return Err(WorkflowError::TriggerFailed {
                        step_id: step.id.clone(),
                        message,
                    });
                }
                StepType::Condition => {
                    let mut visited = executed.clone();
                    let branch = graph.no_branch(index, &mut visited);

                    tracing::info!(
                        "🔀 Condition '{}' failed, running {} 'no' branch steps and halting",
                        step.id,
                        branch.len()
                    );

                    halted_at.get_or_insert_with(|| step.id.clone());
                    pending = branch.into();
                }
                _ => {
                    tracing::debug!("⏭️ Continuing past failed step '{}'", step.id);
                }
            }
        }

        let status = if halted_at.is_some() {
            ExecutionStatus::Halted
        } else {
            ExecutionStatus::Completed
        };

        let execution = WorkflowExecution {
            execution_id: context.execution_id.clone(),
            workflow_id: workflow.id.clone(),
            status,
            steps: outcomes,
            halted_at,
            started_at: context.started_at,
            completed_at: Utc::now(),
        };

        let status_label = match status {
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Halted => "halted",
        };
        self.log_run(&context, status_label, &execution.steps).await;

        tracing::info!(
            "🎉 Workflow '{}' {} after {} steps in {:?}",
            workflow.id,
            status_label,
            execution.steps.len(),
            (execution.completed_at - execution.started_at).to_std().unwrap_or_default()
        );

        Ok(execution)
    }

    async fn log_step(&self, context: &ExecutionContext, outcome: &StepOutcome) {
        let entry = LogEntry::new(
            "workflow_step",
            format!(
                "Step {} ({}) {}: {}",
                outcome.step_id,
                outcome.step_type.as_str(),
                if outcome.success { "succeeded" } else { "failed" },
                outcome.message
            ),
            json!({
                "workflow_id": context.workflow_id,
                "execution_id": context.execution_id,
                "step_id": outcome.step_id,
                "step_type": outcome.step_type,
                "success": outcome.success,
                "message": outcome.message,
                "data": outcome.data,
            }),
        )
        .for_company(context.company_id.as_deref());

        if let Err(e) = self.logs.record(entry).await {
            tracing::warn!("⚠️ Failed to log step '{}': {}", outcome.step_id, e);
        }
    }

    async fn log_run(&self, context: &ExecutionContext, status: &str, outcomes: &[StepOutcome]) {
        let failed = outcomes.iter().filter(|o| !o.success).count();
        let entry = LogEntry::new(
            "workflow_execution",
            format!("Workflow {} {} ({} steps, {} failed)", context.workflow_id, status, outcomes.len(), failed),
            json!({
                "workflow_id": context.workflow_id,
                "execution_id": context.execution_id,
                "status": status,
                "steps": outcomes.len(),
                "failed_steps": failed,
                "trigger_data": context.trigger_data,
            }),
        )
        .for_company(context.company_id.as_deref());

        if let Err(e) = self.logs.record(entry).await {
            tracing::warn!("⚠️ Failed to log execution {}: {}", context.execution_id, e);
        }
    }
}
