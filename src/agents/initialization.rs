/// Startup check of the agent service
///
/// Pings the service once; on failure waits a fixed delay and tries exactly once more.

use crate::agents::orchestrator::AgentOrchestrator;
use std::sync::Arc;
use std::time::Duration;

pub struct AgentInitializationService {
    orchestrator: Arc<AgentOrchestrator>,
    retry_delay: Duration,
}

impl AgentInitializationService {
    pub fn new(orchestrator: Arc<AgentOrchestrator>, retry_delay: Duration) -> Self {
        Self {
            orchestrator,
            retry_delay,
        }
    }

    /// Returns whether the agent service came up healthy
    pub async fn initialize(&self) -> bool {
        tracing::info!("🤖 Initializing agent service connection");

        if self.orchestrator.ping().await {
            tracing::info!("✅ Agent service healthy");
            return true;
        }

        tracing::warn!("⚠️ Agent service unhealthy, retrying in {:?}", self.retry_delay);
        tokio::time::sleep(self.retry_delay).await;

        let healthy = self.orchestrator.ping().await;
        if healthy {
            tracing::info!("✅ Agent service healthy after retry");
        } else {
            tracing::error!("❌ Agent service still unhealthy, agents unavailable");
        }
        healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::{orchestrator_with, FakeCaller};

    #[tokio::test]
    async fn healthy_service_is_checked_once() {
        let caller = FakeCaller::healthy();
        let (orchestrator, _) = orchestrator_with(caller.clone()).await;

        let service = AgentInitializationService::new(orchestrator, Duration::from_millis(1));
        assert!(service.initialize().await);
        assert_eq!(caller.health_checks(), 1);
    }

    #[tokio::test]
    async fn unhealthy_service_is_retried_exactly_once() {
        let caller = FakeCaller::unhealthy();
        let (orchestrator, _) = orchestrator_with(caller.clone()).await;

        let service = AgentInitializationService::new(orchestrator, Duration::from_millis(1));
        assert!(!service.initialize().await);
        assert_eq!(caller.health_checks(), 2);
    }

    #[tokio::test]
    async fn recovery_during_retry_delay_is_reported_healthy() {
        let caller = FakeCaller::unhealthy();
        let (orchestrator, _) = orchestrator_with(caller.clone()).await;

        let service = AgentInitializationService::new(orchestrator, Duration::from_millis(50));
        let flip = caller.clone();
        let handle = tokio::spawn(async move { service.initialize().await });
        tokio::time::sleep(Duration::from_millis(5)).await;
        flip.set_healthy(true);

        assert!(handle.await.unwrap());
        assert_eq!(caller.health_checks(), 2);
    }
}
