use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing::{error, info};

use crate::config::PipelineConfig;
use crate::pipeline::run_once;

/// A scheduler running the full pipeline on `config.cron`, or `None` when
/// scheduling is disabled. The caller starts it.
pub async fn maybe_build_scheduler(config: &PipelineConfig) -> Result<Option<JobScheduler>> {
    if !config.scheduler_enabled {
        return Ok(None);
    }

    let sched = JobScheduler::new().await.context("creating scheduler")?;
    let shared = Arc::new(config.clone());
    let job = CronJob::new_async(config.cron.as_str(), move |_uuid, _lock| {
        let config = PipelineConfig::clone(&shared);
        Box::pin(async move {
            info!("scheduled pipeline run triggered");
            match run_once(config).await {
                Ok(summary) => info!(
                    new_jobs = summary.scrape.new_jobs,
                    matches = summary.matched.matches,
                    letters = summary.generate.generated.len(),
                    "scheduled pipeline run finished"
                ),
                Err(err) => error!(error = %format!("{err:#}"), "scheduled pipeline run failed"),
            }
        })
    })
    .with_context(|| format!("creating scheduler job for cron {}", config.cron))?;
    sched.add(job).await.context("adding scheduler job")?;
    Ok(Some(sched))
}
