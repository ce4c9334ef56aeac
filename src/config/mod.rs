/// Configuration management for the dealflow engine
///
/// Handles server configuration, database connection, and agent runtime parameters.

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Agent dispatcher configuration
    pub agents: AgentConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// SQLite database holding logs, agent tasks, notifications and workflows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx connection URL (default: "sqlite://data/dealflow.db")
    pub url: String,
}

/// Agent dispatcher and background job settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Base URL of the external agent service
    pub service_url: String,
    /// How often ready deferred tasks are drained (seconds)
    pub queue_poll_interval_secs: u64,
    /// How often the health check runs (seconds)
    pub health_check_interval_secs: u64,
    /// Failed tasks tolerated in the last hour before escalating
    pub failure_threshold: i64,
    /// Delay before the single initialization retry (seconds)
    pub init_retry_delay_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            service_url: "http://localhost:8787".to_string(),
            queue_poll_interval_secs: 5,
            health_check_interval_secs: 300,
            failure_threshold: 5,
            init_retry_delay_secs: 300,
        }
    }
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for container deployment
    fn default() -> Self {
        let agent_defaults = AgentConfig::default();

        Self {
            server: ServerConfig {
                host: std::env::var("DEALFLOW_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_or("DEALFLOW_PORT", 3004),
            },
            database: DatabaseConfig {
                url: std::env::var("DEALFLOW_DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/dealflow.db".to_string()),
            },
            agents: AgentConfig {
                service_url: std::env::var("DEALFLOW_AGENT_URL")
                    .unwrap_or(agent_defaults.service_url),
                queue_poll_interval_secs: env_or(
                    "DEALFLOW_QUEUE_POLL_SECS",
                    agent_defaults.queue_poll_interval_secs,
                ),
                health_check_interval_secs: env_or(
                    "DEALFLOW_HEALTH_CHECK_SECS",
                    agent_defaults.health_check_interval_secs,
                ),
                failure_threshold: env_or(
                    "DEALFLOW_FAILURE_THRESHOLD",
                    agent_defaults.failure_threshold,
                ),
                init_retry_delay_secs: env_or(
                    "DEALFLOW_INIT_RETRY_SECS",
                    agent_defaults.init_retry_delay_secs,
                ),
            },
        }
    }
}

/// Read and parse an env var, falling back to `default` when missing or malformed
fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
