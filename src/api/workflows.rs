/// Workflow management REST API endpoints
///
/// CRUD over workflow definitions plus the execution entry point. Every write
/// goes through the workflow service, which validates and hot-reloads.
///
/// All routes are scoped to the caller's `x-company-id`. A workflow owned by
/// another company answers exactly like a missing one.

use crate::api::{workflow_error_status, AppState, Company};
use crate::workflow::types::{NewWorkflow, Workflow, WorkflowExecution, WorkflowUpdate};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};

/// Response for workflow creation/update operations
#[derive(Debug, Serialize)]
pub struct WorkflowResponse {
    pub id: String,
    pub message: String,
}

pub fn create_workflow_routes() -> Router<AppState> {
    Router::new()
        .route("/api/workflows", post(create_workflow).get(list_workflows))
        .route(
            "/api/workflows/{id}",
            get(get_workflow).put(update_workflow).delete(delete_workflow),
        )
        .route("/api/workflows/{id}/execute", post(execute_workflow))
}

/// Load a workflow only if `company` owns it
async fn owned_workflow(state: &AppState, company: &Company, id: &str) -> Result<Option<Workflow>, StatusCode> {
    let workflow = state
        .workflows
        .get_workflow(id)
        .await
        .map_err(|e| workflow_error_status(&e))?;

    Ok(workflow.filter(|w| w.company_id.as_deref() == Some(company.0.as_str())))
}

/// POST /api/workflows
///
/// Body: { "name": "...", "steps": [...], "connections": [...] }
/// The workflow always belongs to the caller's company.
async fn create_workflow(
    State(state): State<AppState>,
    company: Company,
    Json(mut payload): Json<NewWorkflow>,
) -> Result<(StatusCode, Json<WorkflowResponse>), StatusCode> {
    if payload.name.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    payload.company_id = Some(company.0);

    let workflow = state.workflows.create_workflow(payload).await.map_err(|e| {
        tracing::warn!("Failed to create workflow: {}", e);
        workflow_error_status(&e)
    })?;

    Ok((
        StatusCode::CREATED,
        Json(WorkflowResponse {
            id: workflow.id.clone(),
            message: format!("Workflow '{}' created successfully", workflow.name),
        }),
    ))
}

/// GET /api/workflows
async fn list_workflows(State(state): State<AppState>, company: Company) -> Result<Json<Value>, StatusCode> {
    let workflows = state
        .workflows
        .get_workflows(Some(&company.0))
        .await
        .map_err(|e| workflow_error_status(&e))?;

    Ok(Json(json!({ "workflows": workflows })))
}

async fn get_workflow(
    State(state): State<AppState>,
    company: Company,
    Path(id): Path<String>,
) -> Result<Json<Workflow>, StatusCode> {
    owned_workflow(&state, &company, &id)
        .await?
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// PUT /api/workflows/{id}
///
/// Body: any subset of { "name", "description", "steps", "connections", "is_active" }
async fn update_workflow(
    State(state): State<AppState>,
    company: Company,
    Path(id): Path<String>,
    Json(update): Json<WorkflowUpdate>,
) -> Result<Json<WorkflowResponse>, StatusCode> {
    if owned_workflow(&state, &company, &id).await?.is_none() {
        return Err(StatusCode::NOT_FOUND);
    }

    let workflow = state.workflows.update_workflow(&id, update).await.map_err(|e| {
        tracing::warn!("Failed to update workflow {}: {}", id, e);
        workflow_error_status(&e)
    })?;

    Ok(Json(WorkflowResponse {
        id: workflow.id,
        message: format!("Workflow '{}' updated successfully", workflow.name),
    }))
}

/// DELETE /api/workflows/{id}
///
/// Succeeds whether or not the workflow existed.
async fn delete_workflow(
    State(state): State<AppState>,
    company: Company,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    if owned_workflow(&state, &company, &id).await?.is_none() {
        return Ok(Json(json!({ "deleted": false })));
    }

    let deleted = state
        .workflows
        .delete_workflow(&id)
        .await
        .map_err(|e| workflow_error_status(&e))?;

    Ok(Json(json!({ "deleted": deleted })))
}

/// POST /api/workflows/{id}/execute
///
/// Body: trigger data the workflow runs against
async fn execute_workflow(
    State(state): State<AppState>,
    company: Company,
    Path(id): Path<String>,
    Json(trigger_data): Json<Value>,
) -> Result<Json<WorkflowExecution>, StatusCode> {
    if owned_workflow(&state, &company, &id).await?.is_none() {
        return Err(StatusCode::NOT_FOUND);
    }

    match state.workflows.execute_workflow(&id, trigger_data).await {
        Ok(execution) => Ok(Json(execution)),
        Err(e) => {
            tracing::info!("Workflow {} did not run: {}", id, e);
            Err(workflow_error_status(&e))
        }
    }
}
