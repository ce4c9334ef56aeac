/// Agent task REST API endpoints
///
/// Thin handlers over the dispatcher. Task execution never returns an HTTP error
/// for an agent failure: the failure is reported in the task result body.

use crate::agents::types::{Actor, AgentTask, ScheduledTask, TaskFeedback, TaskResult};
use crate::api::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// Body for POST /api/tasks/schedule: the task fields plus a delay
#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    #[serde(flatten)]
    pub task: AgentTask,
    #[serde(default)]
    pub delay_ms: u64,
}

pub fn create_task_routes() -> Router<AppState> {
    Router::new()
        .route("/api/tasks", post(execute_task))
        .route("/api/tasks/schedule", post(schedule_task))
        .route("/api/tasks/scheduled", get(list_scheduled))
        .route("/api/tasks/{id}/feedback", post(record_feedback))
        .route("/api/agents/metrics", get(agent_metrics))
        .route("/api/agents/health", get(agent_health))
}

/// POST /api/tasks
///
/// Body: { "agent_type": "sales", "task_type": "...", "context": {...}, "priority": "high" }
async fn execute_task(State(state): State<AppState>, actor: Actor, Json(task): Json<AgentTask>) -> Json<TaskResult> {
    Json(state.orchestrator.execute_task(&actor, task).await)
}

async fn schedule_task(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<ScheduleRequest>,
) -> Result<(StatusCode, Json<ScheduledTask>), StatusCode> {
    match state
        .orchestrator
        .schedule_task(&actor, request.task, request.delay_ms)
        .await
    {
        Ok(scheduled) => Ok((StatusCode::ACCEPTED, Json(scheduled))),
        Err(e) => {
            tracing::info!("Rejected task schedule: {}", e);
            Err(StatusCode::BAD_REQUEST)
        }
    }
}

/// Pending deferred tasks of the caller's company
async fn list_scheduled(State(state): State<AppState>, actor: Actor) -> Json<Value> {
    let tasks: Vec<ScheduledTask> = state
        .orchestrator
        .pending_tasks()
        .await
        .into_iter()
        .filter(|t| t.actor.company_id == actor.company_id)
        .collect();

    Json(json!({ "tasks": tasks }))
}

async fn record_feedback(
    State(state): State<AppState>,
    actor: Actor,
    Path(task_id): Path<String>,
    Json(feedback): Json<TaskFeedback>,
) -> Result<Json<Value>, StatusCode> {
    match state.orchestrator.record_feedback(&actor, &task_id, feedback).await {
        Ok(()) => Ok(Json(json!({ "message": "Feedback recorded" }))),
        Err(e) => {
            tracing::error!("Failed to record feedback for task {}: {}", task_id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn agent_metrics(State(state): State<AppState>, _actor: Actor) -> Json<Value> {
    Json(json!({ "metrics": state.orchestrator.metrics().await }))
}

async fn agent_health(State(state): State<AppState>, _actor: Actor) -> Json<Value> {
    let report = state.orchestrator.health_check().await;
    Json(json!(report))
}

#[cfg(test)]
mod tests {
    use crate::agents::testing::FakeCaller;
    use crate::agents::types::AgentResponse;
    use crate::api::test_support::{app_with, send};
    use crate::error::AgentError;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn executed_task_reports_agent_failure_in_body() {
        let caller = FakeCaller::healthy();
        caller.push(Ok(AgentResponse {
            success: true,
            output: Some(json!({ "draft": "Hello" })),
            ..Default::default()
        }));
        caller.push(Err(AgentError::Rejected("quota exceeded".to_string())));
        caller.push(Err(AgentError::Rejected("quota exceeded".to_string())));
        let (router, stores) = app_with(caller).await;

        let task = json!({ "agent_type": "sales", "task_type": "draft_email", "context": { "lead_id": "l1" } });
        let (status, body) = send(&router, "POST", "/api/tasks", Some(task.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
        assert_eq!(body["result"]["draft"], "Hello");

        let (status, body) = send(&router, "POST", "/api/tasks", Some(task.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "failed");
        assert_eq!(body["error"], "quota exceeded");

        let record = stores.tasks.get(body["id"].as_str().unwrap()).await.unwrap().unwrap();
        assert_eq!(record.company_id, "acme");

        let (_, body) = send(&router, "POST", "/api/tasks", Some(task)).await;
        assert_eq!(body["status"], "failed");

        // 1.0, then (1.0 + 0) / 2, then (0.5 + 0) / 2
        let (_, metrics) = send(&router, "GET", "/api/agents/metrics", None).await;
        assert_eq!(metrics["metrics"]["sales"]["total_tasks"], 3);
        assert_eq!(metrics["metrics"]["sales"]["success_rate"], 0.25);
    }

    #[tokio::test]
    async fn scheduled_tasks_are_listed_until_drained() {
        let (router, _) = app_with(FakeCaller::healthy()).await;

        let body = json!({ "agent_type": "manager", "task_type": "weekly_report", "delay_ms": 60_000 });
        let (status, scheduled) = send(&router, "POST", "/api/tasks/schedule", Some(body)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(scheduled["task"]["task_type"], "weekly_report");

        let (_, listed) = send(&router, "GET", "/api/tasks/scheduled", None).await;
        assert_eq!(listed["tasks"].as_array().unwrap().len(), 1);
        assert_eq!(listed["tasks"][0]["id"], scheduled["id"]);
    }

    #[tokio::test]
    async fn out_of_range_delay_is_a_bad_request() {
        let (router, _) = app_with(FakeCaller::healthy()).await;

        for delay_ms in [u64::MAX, 1u64 << 62] {
            let body = json!({ "agent_type": "sales", "task_type": "never", "delay_ms": delay_ms });
            let (status, _) = send(&router, "POST", "/api/tasks/schedule", Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }

        let (_, listed) = send(&router, "GET", "/api/tasks/scheduled", None).await;
        assert!(listed["tasks"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn feedback_and_health_endpoints() {
        let (router, stores) = app_with(FakeCaller::healthy()).await;

        let (status, _) = send(
            &router,
            "POST",
            "/api/tasks/task-1/feedback",
            Some(json!({ "positive": false, "comment": "Too pushy" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let rows = stores.logs.list_by_kind("agent_feedback").await.unwrap();
        assert_eq!(rows[0].payload["comment"], "Too pushy");

        let (status, report) = send(&router, "GET", "/api/agents/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["agent_service_healthy"], true);
        assert_eq!(report["escalated"], false);
    }
}
