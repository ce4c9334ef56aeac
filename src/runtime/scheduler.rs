/// Background scheduler service
///
/// Two repeated tokio-cron-scheduler jobs keep the dispatcher moving without a
/// caller: one drains deferred tasks whose time has come, the other runs the
/// agent health check and escalates when too many tasks failed recently.

use crate::agents::AgentOrchestrator;
use crate::config::AgentConfig;
use anyhow::Result;
use std::{sync::Arc, time::Duration};
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

pub struct BackgroundScheduler {
    scheduler: Arc<RwLock<JobScheduler>>,
    /// Registered job ids, cleared on stop
    job_ids: RwLock<Vec<Uuid>>,
    orchestrator: Arc<AgentOrchestrator>,
    queue_poll_interval: Duration,
    health_check_interval: Duration,
}

impl BackgroundScheduler {
    pub async fn new(orchestrator: Arc<AgentOrchestrator>, config: &AgentConfig) -> Result<Self> {
        Self::with_intervals(
            orchestrator,
            Duration::from_secs(config.queue_poll_interval_secs),
            Duration::from_secs(config.health_check_interval_secs),
        )
        .await
    }

    pub async fn with_intervals(
        orchestrator: Arc<AgentOrchestrator>,
        queue_poll_interval: Duration,
        health_check_interval: Duration,
    ) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler: Arc::new(RwLock::new(scheduler)),
            job_ids: RwLock::new(Vec::new()),
            orchestrator,
            queue_poll_interval,
            health_check_interval,
        })
    }

    /// Register both jobs and start ticking
    pub async fn start(&self) -> Result<()> {
        tracing::info!(
            "⏰ Starting background scheduler (queue every {:?}, health every {:?})",
            self.queue_poll_interval,
            self.health_check_interval
        );

        let queue_job = {
            let orchestrator = Arc::clone(&self.orchestrator);
            Job::new_repeated_async(self.queue_poll_interval, move |_uuid, _l| {
                let orchestrator = Arc::clone(&orchestrator);
                Box::pin(async move {
                    drain_ready_tasks(&orchestrator).await;
                })
            })?
        };

        let health_job = {
            let orchestrator = Arc::clone(&self.orchestrator);
            Job::new_repeated_async(self.health_check_interval, move |_uuid, _l| {
                let orchestrator = Arc::clone(&orchestrator);
                Box::pin(async move {
                    run_health_check(&orchestrator).await;
                })
            })?
        };

        {
            let scheduler = self.scheduler.write().await;
            let mut job_ids = self.job_ids.write().await;
            job_ids.push(scheduler.add(queue_job).await?);
            job_ids.push(scheduler.add(health_job).await?);
            scheduler.start().await?;
        }

        tracing::info!("✅ Background scheduler started");
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        tracing::info!("⏹️ Stopping background scheduler");

        {
            let mut job_ids = self.job_ids.write().await;
            let scheduler = self.scheduler.read().await;
            for job_id in job_ids.drain(..) {
                if let Err(e) = scheduler.remove(&job_id).await {
                    tracing::warn!("⚠️ Failed to remove job {}: {}", job_id, e);
                }
            }
        }

        {
            let mut scheduler = self.scheduler.write().await;
            scheduler.shutdown().await?;
        }

        tracing::info!("✅ Background scheduler stopped");
        Ok(())
    }
}

/// Run every deferred task that is ready now
pub async fn drain_ready_tasks(orchestrator: &AgentOrchestrator) -> usize {
    let results = orchestrator.process_scheduled_tasks().await;
    if !results.is_empty() {
        let failed = results.iter().filter(|r| r.error.is_some()).count();
        tracing::info!("📤 Processed {} scheduled tasks ({} failed)", results.len(), failed);
    }
    results.len()
}

pub async fn run_health_check(orchestrator: &AgentOrchestrator) {
    let report = orchestrator.health_check().await;
    if report.escalated {
        tracing::warn!(
            "🚨 Health check escalated: {} failed tasks in the last hour",
            report.failed_last_hour
        );
    } else {
        tracing::debug!(
            "💓 Health check: service healthy={}, failed last hour={}",
            report.agent_service_healthy,
            report.failed_last_hour
        );
    }
}
