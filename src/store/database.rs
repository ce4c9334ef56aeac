/// SQLite connection and schema management
///
/// A single database holds every table the engine writes:
/// - logs: generic audit/event log
/// - agent_tasks: one row per dispatched agent task
/// - notifications: escalation alerts
/// - workflows: workflow definitions as JSON

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Open the connection pool, creating the database file and its directory if needed
pub async fn connect(url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)
        .map_err(|e| anyhow::anyhow!("Invalid database url '{}': {}", url, e))?
        .create_if_missing(true);

    if let Some(parent) = Path::new(options.get_filename()).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                anyhow::anyhow!("Failed to create database directory '{}': {}", parent.display(), e)
            })?;
        }
    }

    tracing::info!("🗄️ Opening database: {}", options.get_filename().display());

    // Every connection to ":memory:" opens its own empty database
    let max_connections = if url.contains(":memory:") { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;
    init_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes
///
/// Safe to call multiple times (uses IF NOT EXISTS).
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS logs (
            id TEXT PRIMARY KEY,
            type TEXT NOT NULL,
            event_summary TEXT NOT NULL,
            payload JSON NOT NULL,
            company_id TEXT,
            visibility TEXT NOT NULL,
            timestamp TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS agent_tasks (
            id TEXT PRIMARY KEY,
            agent_type TEXT NOT NULL,
            task_type TEXT NOT NULL,
            status TEXT NOT NULL,
            input_payload JSON NOT NULL,
            output_payload JSON,
            error_message TEXT,
            execution_time_ms INTEGER,
            user_id TEXT NOT NULL,
            company_id TEXT NOT NULL,
            started_at TEXT NOT NULL,
            completed_at TEXT
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS notifications (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            company_id TEXT NOT NULL,
            type TEXT NOT NULL,
            title TEXT NOT NULL,
            message TEXT NOT NULL,
            metadata JSON NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS workflows (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            company_id TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            definition JSON NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_logs_type ON logs(type)",
        "CREATE INDEX IF NOT EXISTS idx_agent_tasks_status ON agent_tasks(status, started_at)",
        "CREATE INDEX IF NOT EXISTS idx_workflows_company ON workflows(company_id)",
    ];

    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}

/// Fixed-width RFC3339 UTC timestamp so stored values compare lexicographically
pub fn timestamp(at: chrono::DateTime<chrono::Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
