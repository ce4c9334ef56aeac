use crate::agents::caller::AgentCaller;
use crate::agents::orchestrator::AgentOrchestrator;
use crate::agents::types::{AgentRequest, AgentResponse, AgentType};
use crate::error::AgentError;
use crate::store::{test_utils::setup_test_pool, LogStore, NotificationStore, TaskStore};
use async_trait::async_trait;
use serde_json::json;
use sqlx::SqlitePool;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Scripted agent caller: replays queued responses, then succeeds by default
#[derive(Clone, Default)]
pub(crate) struct FakeCaller {
    responses: Arc<Mutex<VecDeque<Result<AgentResponse, AgentError>>>>,
    calls: Arc<Mutex<Vec<(AgentType, AgentRequest)>>>,
    healthy: Arc<AtomicBool>,
    health_checks: Arc<AtomicUsize>,
}

impl FakeCaller {
    pub(crate) fn healthy() -> Self {
        let caller = Self::default();
        caller.healthy.store(true, Ordering::SeqCst);
        caller
    }

    pub(crate) fn unhealthy() -> Self {
        Self::default()
    }

    pub(crate) fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub(crate) fn push(&self, response: Result<AgentResponse, AgentError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub(crate) fn calls(&self) -> Vec<(AgentType, AgentRequest)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn health_checks(&self) -> usize {
        self.health_checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentCaller for FakeCaller {
    async fn execute(&self, agent_type: AgentType, request: AgentRequest) -> Result<AgentResponse, AgentError> {
        self.calls.lock().unwrap().push((agent_type, request));
        let scripted = self.responses.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(AgentResponse {
                success: true,
                output: Some(json!({ "ok": true })),
                ..Default::default()
            })
        })
    }

    async fn health_check(&self) -> bool {
        self.health_checks.fetch_add(1, Ordering::SeqCst);
        self.healthy.load(Ordering::SeqCst)
    }
}

pub(crate) struct TestStores {
    pub(crate) pool: SqlitePool,
    pub(crate) tasks: TaskStore,
    pub(crate) logs: LogStore,
    pub(crate) notifications: NotificationStore,
}

pub(crate) async fn orchestrator_with(caller: FakeCaller) -> (Arc<AgentOrchestrator>, TestStores) {
    let pool = setup_test_pool().await;
    let stores = TestStores {
        pool: pool.clone(),
        tasks: TaskStore::new(pool.clone()),
        logs: LogStore::new(pool.clone()),
        notifications: NotificationStore::new(pool),
    };

    let orchestrator = AgentOrchestrator::new(
        Arc::new(caller),
        stores.tasks.clone(),
        stores.logs.clone(),
        stores.notifications.clone(),
        5,
    );

    (Arc::new(orchestrator), stores)
}
