/// Hot-reload workflow registry using ArcSwap
///
/// Holds every stored workflow with its step graph already built and validated.
/// Updates swap the whole map pointer, so executions that already loaded a
/// definition keep running against it while the new one becomes visible.

use crate::error::WorkflowError;
use crate::runtime::graph::StepGraph;
use crate::workflow::{storage::WorkflowStorage, types::Workflow};
use anyhow::Result;
use arc_swap::ArcSwap;
use std::{collections::HashMap, sync::Arc};

#[derive(Debug)]
pub struct WorkflowRegistry {
    /// Key: workflow id
    workflows: ArcSwap<HashMap<String, CompiledWorkflow>>,
    storage: WorkflowStorage,
}

/// Workflow definition plus its execution-ready step graph
#[derive(Debug, Clone)]
pub struct CompiledWorkflow {
    pub workflow: Workflow,
    pub graph: Arc<StepGraph>,
}

impl CompiledWorkflow {
    /// Build and validate the step graph for `workflow`
    pub fn compile(workflow: Workflow) -> Result<Self, WorkflowError> {
        let graph = StepGraph::build(&workflow)?;
        graph.validate()?;

        Ok(Self {
            workflow,
            graph: Arc::new(graph),
        })
    }
}

impl WorkflowRegistry {
    pub fn new(storage: WorkflowStorage) -> Self {
        Self {
            workflows: ArcSwap::new(Arc::new(HashMap::new())),
            storage,
        }
    }

    /// Populate the registry from storage at startup
    ///
    /// Stored definitions that no longer compile are skipped with a warning
    /// rather than failing startup.
    pub async fn init_from_storage(&self) -> Result<()> {
        let stored = self.storage.load_all_workflows().await?;
        let mut compiled = HashMap::with_capacity(stored.len());

        for (id, workflow) in stored {
            match CompiledWorkflow::compile(workflow) {
                Ok(entry) => {
                    compiled.insert(id, entry);
                }
                Err(e) => tracing::warn!("⚠️ Skipping stored workflow '{}': {}", id, e),
            }
        }

        self.workflows.store(Arc::new(compiled));

        tracing::info!("📚 Initialized workflow registry with {} workflows", self.workflows.load().len());

        Ok(())
    }

    /// Reload one workflow from storage; drops it from the map if it was deleted
    pub async fn reload_workflow(&self, workflow_id: &str) -> Result<(), WorkflowError> {
        let Some(workflow) = self.storage.get_workflow(workflow_id).await? else {
            self.remove_workflow(workflow_id);
            return Err(WorkflowError::NotFound(workflow_id.to_string()));
        };

        let compiled = CompiledWorkflow::compile(workflow)?;

        let current = self.workflows.load();
        let mut next = (**current).clone();
        next.insert(workflow_id.to_string(), compiled);
        self.workflows.store(Arc::new(next));

        tracing::info!("🔄 Hot-reloaded workflow: {}", workflow_id);

        Ok(())
    }

    /// Lock-free read; the clone shares the step graph
    pub fn get_workflow(&self, workflow_id: &str) -> Option<CompiledWorkflow> {
        self.workflows.load().get(workflow_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.workflows.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remove_workflow(&self, workflow_id: &str) {
        let current = self.workflows.load();
        if !current.contains_key(workflow_id) {
            return;
        }

        let mut next = (**current).clone();
        next.remove(workflow_id);
        self.workflows.store(Arc::new(next));

        tracing::info!("🗑️ Removed workflow from registry: {}", workflow_id);
    }
}
