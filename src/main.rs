/// Dealflow: agent task dispatch and workflow automation for sales teams
///
/// Main entry point. Loads configuration from the environment and starts the
/// HTTP server:
/// - Workflow management and execution at /api/workflows/*
/// - Agent task dispatch at /api/tasks/*
/// - Agent metrics and health at /api/agents/*
/// - Health check at /healthz

use dealflow::{config::Config, server::start_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // DEALFLOW_* env vars override the defaults (localhost:3004, data/dealflow.db)
    let config = Config::default();

    start_server(config).await?;

    Ok(())
}
