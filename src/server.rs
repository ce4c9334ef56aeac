/// Server setup and initialization
///
/// Wires together all components: stores, agent dispatcher, workflow engine and
/// service, background jobs, and HTTP routes.

use crate::{
    agents::{AgentInitializationService, AgentOrchestrator, HttpAgentCaller},
    api::{create_api_routes, AppState},
    config::Config,
    runtime::{BackgroundScheduler, CannedActions, CannedAi, StepExecutor, WorkflowEngine},
    store::{database, LogStore, NotificationStore, TaskStore},
    workflow::{WorkflowRegistry, WorkflowService, WorkflowStorage},
};
use anyhow::Result;
use axum::{routing::get, Router};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Build the application router and start its background jobs
pub async fn create_app(config: Config) -> Result<Router> {
    tracing::info!("📁 Connecting to database: {}", config.database.url);
    let pool = database::connect(&config.database.url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open database: {}", e))?;

    let logs = LogStore::new(pool.clone());
    let tasks = TaskStore::new(pool.clone());
    let notifications = NotificationStore::new(pool.clone());

    tracing::info!("🤖 Initializing agent dispatcher ({})", config.agents.service_url);
    let caller = Arc::new(HttpAgentCaller::new(&config.agents.service_url)?);
    let orchestrator = Arc::new(AgentOrchestrator::new(
        caller,
        tasks,
        logs.clone(),
        notifications.clone(),
        config.agents.failure_threshold,
    ));

    tracing::info!("⚙️ Initializing workflow engine");
    let executor = Arc::new(StepExecutor::new(
        Arc::new(CannedActions),
        Arc::new(CannedAi),
        notifications,
    ));
    let engine = Arc::new(WorkflowEngine::new(executor, logs.clone()));

    tracing::info!("📊 Initializing workflow registry");
    let storage = WorkflowStorage::new(pool);
    let registry = Arc::new(WorkflowRegistry::new(storage.clone()));
    registry
        .init_from_storage()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load workflows from storage: {}", e))?;

    let workflows = Arc::new(WorkflowService::new(storage, registry, engine, logs));

    tracing::info!("⏰ Initializing background scheduler");
    let scheduler = Arc::new(
        BackgroundScheduler::new(Arc::clone(&orchestrator), &config.agents)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to initialize background scheduler: {}", e))?,
    );
    tokio::spawn(async move {
        if let Err(e) = scheduler.start().await {
            tracing::error!("❌ Failed to start background scheduler: {}", e);
        }
    });

    let initialization = AgentInitializationService::new(
        Arc::clone(&orchestrator),
        Duration::from_secs(config.agents.init_retry_delay_secs),
    );
    tokio::spawn(async move {
        initialization.initialize().await;
    });

    let app = build_router(AppState {
        workflows,
        orchestrator,
    });

    tracing::info!("✅ Application initialized successfully");

    Ok(app)
}

/// Health check plus the full API, with state applied
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .merge(create_api_routes(state))
}

/// Start the HTTP server with the given configuration
pub async fn start_server(config: Config) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting Dealflow server...");

    let app = create_app(config.clone()).await?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "ok"
}
