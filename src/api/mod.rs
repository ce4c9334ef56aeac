/// HTTP API Layer
///
/// REST endpoints over the workflow service and the agent dispatcher:
/// - Workflow CRUD and execution
/// - Task dispatch, deferral, feedback
/// - Agent metrics and health
///
/// The acting user and company come from the `x-user-id` / `x-company-id` headers.

use crate::agents::{Actor, AgentOrchestrator};
use crate::error::WorkflowError;
use crate::workflow::WorkflowService;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
    Router,
};
use std::sync::Arc;

// Workflow management endpoints (POST/GET/PUT/DELETE + execute)
pub mod workflows;

// Agent task and health endpoints
pub mod tasks;

pub use tasks::create_task_routes;
pub use workflows::create_workflow_routes;

pub const USER_HEADER: &str = "x-user-id";
pub const COMPANY_HEADER: &str = "x-company-id";

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub workflows: Arc<WorkflowService>,
    pub orchestrator: Arc<AgentOrchestrator>,
}

/// All API routes with state applied
pub fn create_api_routes(state: AppState) -> Router {
    Router::new()
        .merge(create_workflow_routes())
        .merge(create_task_routes())
        .with_state(state)
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// The caller's company, taken from `x-company-id`
///
/// Workflow routes only need the tenant, not the acting user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Company(pub String);

impl<S> FromRequestParts<S> for Company
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        header(&parts.headers, COMPANY_HEADER).map(Company).ok_or_else(|| {
            tracing::debug!("🔒 Rejected request without {} header", COMPANY_HEADER);
            StatusCode::UNAUTHORIZED
        })
    }
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(&parts.headers, USER_HEADER);
        let company_id = header(&parts.headers, COMPANY_HEADER);

        match (user_id, company_id) {
            (Some(user_id), Some(company_id)) => Ok(Actor::new(user_id, company_id)),
            _ => {
                tracing::debug!("🔒 Rejected request without actor headers");
                Err(StatusCode::UNAUTHORIZED)
            }
        }
    }
}

/// Map a workflow error onto its HTTP status
pub(crate) fn workflow_error_status(error: &WorkflowError) -> StatusCode {
    match error {
        WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
        WorkflowError::Inactive(_) => StatusCode::CONFLICT,
        WorkflowError::Invalid(_) => StatusCode::BAD_REQUEST,
        WorkflowError::TriggerFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        WorkflowError::Other(e) => {
            tracing::error!("❌ Internal workflow error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
