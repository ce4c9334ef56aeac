/// External agent service port
///
/// The dispatcher never talks to agents directly; it goes through an [`AgentCaller`].
/// [`HttpAgentCaller`] is the production implementation, tests plug in fakes.

use crate::agents::types::{AgentRequest, AgentResponse, AgentType};
use crate::error::AgentError;
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait AgentCaller: Send + Sync {
    /// Run one task on the agent selected by `agent_type`
    async fn execute(&self, agent_type: AgentType, request: AgentRequest) -> Result<AgentResponse, AgentError>;

    /// Whether the agent service is reachable and healthy
    async fn health_check(&self) -> bool;
}

/// Agent caller backed by the agent service's HTTP API
///
/// - POST {base_url}/agents/{agent_type}/execute
/// - GET  {base_url}/health
#[derive(Debug, Clone)]
pub struct HttpAgentCaller {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAgentCaller {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn execute_url(&self, agent_type: AgentType) -> String {
        format!("{}/agents/{}/execute", self.base_url, agent_type)
    }
}

#[async_trait]
impl AgentCaller for HttpAgentCaller {
    async fn execute(&self, agent_type: AgentType, request: AgentRequest) -> Result<AgentResponse, AgentError> {
        let url = self.execute_url(agent_type);
        tracing::debug!("🌐 Calling {} agent: {} ({})", agent_type, request.task_type, url);

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<AgentResponse>().await?)
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.base_url);

        match self.client.get(&url).timeout(Duration::from_secs(10)).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!("⚠️ Agent service health check failed: {}", e);
                false
            }
        }
    }
}
