/// Workflow CRUD and execution entry point
///
/// Every write goes storage first, then the registry is hot-reloaded so the
/// next execution sees the new definition. Definitions are validated before
/// they reach storage; an invalid workflow is never saved.

use crate::error::WorkflowError;
use crate::runtime::engine::WorkflowEngine;
use crate::store::{LogEntry, LogStore};
use crate::workflow::registry::{CompiledWorkflow, WorkflowRegistry};
use crate::workflow::storage::WorkflowStorage;
use crate::workflow::types::{NewWorkflow, Workflow, WorkflowExecution, WorkflowUpdate};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct WorkflowService {
    storage: WorkflowStorage,
    registry: Arc<WorkflowRegistry>,
    engine: Arc<WorkflowEngine>,
    logs: LogStore,
}

impl WorkflowService {
    pub fn new(
        storage: WorkflowStorage,
        registry: Arc<WorkflowRegistry>,
        engine: Arc<WorkflowEngine>,
        logs: LogStore,
    ) -> Self {
        Self {
            storage,
            registry,
            engine,
            logs,
        }
    }

    pub async fn create_workflow(&self, input: NewWorkflow) -> Result<Workflow, WorkflowError> {
        let now = Utc::now();
        let workflow = Workflow {
            id: uuid::Uuid::new_v4().to_string(),
            name: input.name,
            description: input.description,
            company_id: input.company_id,
            steps: input.steps,
            connections: input.connections,
            is_active: input.is_active,
            created_at: now,
            updated_at: now,
        };

        self.store(&workflow).await?;
        self.audit("workflow_created", &workflow, format!("Workflow '{}' created", workflow.name))
            .await;

        tracing::info!("✅ Created workflow '{}' ({})", workflow.name, workflow.id);
        Ok(workflow)
    }

    pub async fn update_workflow(&self, id: &str, update: WorkflowUpdate) -> Result<Workflow, WorkflowError> {
        let mut workflow = self
            .storage
            .get_workflow(id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(id.to_string()))?;

        if let Some(name) = update.name {
            workflow.name = name;
        }
        if let Some(description) = update.description {
            workflow.description = Some(description);
        }
        if let Some(steps) = update.steps {
            workflow.steps = steps;
        }
        if let Some(connections) = update.connections {
            workflow.connections = connections;
        }
        if let Some(is_active) = update.is_active {
            workflow.is_active = is_active;
        }
        workflow.updated_at = Utc::now();

        self.store(&workflow).await?;
        self.audit("workflow_updated", &workflow, format!("Workflow '{}' updated", workflow.name))
            .await;

        Ok(workflow)
    }

    /// Newest update first; all companies when `company_id` is `None`
    pub async fn get_workflows(&self, company_id: Option<&str>) -> Result<Vec<Workflow>, WorkflowError> {
        Ok(self.storage.list_workflows(company_id).await?)
    }

    pub async fn get_workflow(&self, id: &str) -> Result<Option<Workflow>, WorkflowError> {
        Ok(self.storage.get_workflow(id).await?)
    }

    /// Returns whether a workflow was removed; deleting an unknown id is a no-op
    pub async fn delete_workflow(&self, id: &str) -> Result<bool, WorkflowError> {
        let existing = self.storage.get_workflow(id).await?;
        let removed = self.storage.delete_workflow(id).await?;
        self.registry.remove_workflow(id);

        if let Some(workflow) = existing.filter(|_| removed) {
            self.audit("workflow_deleted", &workflow, format!("Workflow '{}' deleted", workflow.name))
                .await;
        }

        Ok(removed)
    }

    /// Run an active workflow against `trigger_data`
    pub async fn execute_workflow(&self, id: &str, trigger_data: Value) -> Result<WorkflowExecution, WorkflowError> {
        let compiled = match self.registry.get_workflow(id) {
            Some(compiled) => compiled,
            None => {
                // Stored by another process, or registry not initialized yet
                self.registry.reload_workflow(id).await?;
                self.registry
                    .get_workflow(id)
                    .ok_or_else(|| WorkflowError::NotFound(id.to_string()))?
            }
        };

        if !compiled.workflow.is_active {
            return Err(WorkflowError::Inactive(id.to_string()));
        }

        self.engine.execute_compiled(&compiled, trigger_data).await
    }

    async fn store(&self, workflow: &Workflow) -> Result<(), WorkflowError> {
        CompiledWorkflow::compile(workflow.clone())?;
        self.storage.save_workflow(workflow).await?;
        self.registry.reload_workflow(&workflow.id).await
    }

    async fn audit(&self, kind: &str, workflow: &Workflow, summary: String) {
        let entry = LogEntry::new(
            kind,
            summary,
            json!({
                "workflow_id": workflow.id,
                "name": workflow.name,
                "is_active": workflow.is_active,
                "steps": workflow.steps.len(),
                "connections": workflow.connections.len(),
            }),
        )
        .for_company(workflow.company_id.as_deref());

        if let Err(e) = self.logs.record(entry).await {
            tracing::warn!("⚠️ Failed to write {} audit row for {}: {}", kind, workflow.id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::executor::StepExecutor;
    use crate::runtime::integrations::{CannedActions, CannedAi};
    use crate::store::{test_utils::setup_test_pool, NotificationStore};
    use crate::workflow::types::{Connection, ExecutionStatus, Step, StepType};

    async fn service() -> (WorkflowService, LogStore) {
        let pool = setup_test_pool().await;
        let logs = LogStore::new(pool.clone());
        let storage = WorkflowStorage::new(pool.clone());
        let registry = Arc::new(WorkflowRegistry::new(storage.clone()));
        let executor = StepExecutor::new(
            Arc::new(CannedActions),
            Arc::new(CannedAi),
            NotificationStore::new(pool),
        );
        let engine = Arc::new(WorkflowEngine::new(Arc::new(executor), logs.clone()));
        (WorkflowService::new(storage, registry, engine, logs.clone()), logs)
    }

    fn lead_workflow() -> NewWorkflow {
        NewWorkflow {
            name: "New lead follow-up".to_string(),
            description: Some("Tag and email new leads".to_string()),
            company_id: Some("acme".to_string()),
            steps: vec![
                Step::new("t", StepType::Trigger, json!({ "triggerType": "new_lead_added" })),
                Step::new("tag", StepType::Action, json!({ "actionType": "apply_tag", "tag": "new" })),
                Step::new("mail", StepType::Action, json!({ "actionType": "send_email", "subject": "Hi" })),
            ],
            connections: vec![Connection::new("t", "tag"), Connection::new("tag", "mail")],
            is_active: true,
        }
    }

    #[tokio::test]
    async fn created_workflow_can_be_read_back_and_executed() {
        let (service, logs) = service().await;

        let created = service.create_workflow(lead_workflow()).await.unwrap();
        let fetched = service.get_workflow(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);

        let listed = service.get_workflows(Some("acme")).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(service.get_workflows(Some("globex")).await.unwrap().is_empty());

        let execution = service
            .execute_workflow(&created.id, json!({ "lead_id": "l1", "email": "ann@acme.io" }))
            .await
            .unwrap();
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(execution.executed_step_ids(), vec!["t", "tag", "mail"]);

        assert_eq!(logs.list_by_kind("workflow_created").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_revalidates_and_reloads() {
        let (service, logs) = service().await;
        let created = service.create_workflow(lead_workflow()).await.unwrap();

        let cyclic = WorkflowUpdate {
            connections: Some(vec![Connection::new("t", "tag"), Connection::new("tag", "t")]),
            ..Default::default()
        };
        assert!(matches!(
            service.update_workflow(&created.id, cyclic).await,
            Err(WorkflowError::Invalid(_))
        ));

        let rename = WorkflowUpdate {
            name: Some("Renamed".to_string()),
            connections: Some(vec![Connection::new("t", "mail")]),
            ..Default::default()
        };
        let updated = service.update_workflow(&created.id, rename).await.unwrap();
        assert_eq!(updated.name, "Renamed");
        assert!(updated.updated_at >= created.updated_at);

        let execution = service.execute_workflow(&created.id, json!({ "lead_id": "l1" })).await.unwrap();
        // "tag" is no longer reachable from the trigger
        assert_eq!(execution.executed_step_ids(), vec!["t", "mail"]);
        assert_eq!(logs.list_by_kind("workflow_updated").await.unwrap().len(), 1);

        assert!(matches!(
            service.update_workflow("missing", WorkflowUpdate::default()).await,
            Err(WorkflowError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn invalid_workflows_are_never_stored() {
        let (service, _) = service().await;

        let mut no_trigger = lead_workflow();
        no_trigger.steps.remove(0);
        no_trigger.connections = vec![Connection::new("tag", "mail")];
        assert!(matches!(service.create_workflow(no_trigger).await, Err(WorkflowError::Invalid(_))));

        let mut cyclic = lead_workflow();
        cyclic.connections.push(Connection::new("mail", "tag"));
        assert!(matches!(service.create_workflow(cyclic).await, Err(WorkflowError::Invalid(_))));

        assert!(service.get_workflows(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (service, logs) = service().await;
        let created = service.create_workflow(lead_workflow()).await.unwrap();

        assert!(service.delete_workflow(&created.id).await.unwrap());
        assert!(!service.delete_workflow(&created.id).await.unwrap());
        assert!(service.get_workflow(&created.id).await.unwrap().is_none());
        assert_eq!(logs.list_by_kind("workflow_deleted").await.unwrap().len(), 1);

        assert!(matches!(
            service.execute_workflow(&created.id, json!({})).await,
            Err(WorkflowError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn inactive_workflow_refuses_to_run() {
        let (service, logs) = service().await;
        let mut input = lead_workflow();
        input.is_active = false;
        let created = service.create_workflow(input).await.unwrap();

        assert!(matches!(
            service.execute_workflow(&created.id, json!({ "lead_id": "l1" })).await,
            Err(WorkflowError::Inactive(_))
        ));
        assert!(logs.list_by_kind("workflow_step").await.unwrap().is_empty());
    }
}
