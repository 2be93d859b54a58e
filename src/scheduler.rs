use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{Duration, interval};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::config::SchedulerConfig;
use crate::pipeline::Pipeline;

/// Runs the pipeline on a cron expression, or on a fixed interval when no
/// expression is configured. Overlapping runs are skipped.
pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    config: SchedulerConfig,
    running: Arc<RwLock<bool>>,
    in_flight: Arc<Mutex<()>>,
}

impl Scheduler {
    pub fn new(pipeline: Arc<Pipeline>, config: SchedulerConfig) -> Self {
        Self {
            pipeline,
            config,
            running: Arc::new(RwLock::new(false)),
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    pub async fn start(&self) -> Result<()> {
        if !self.config.enabled {
            info!("Scheduler is disabled in config");
            return Ok(());
        }

        *self.running.write().await = true;
        info!("Starting pipeline scheduler");

        if let Some(cron_expr) = &self.config.cron_expression {
            self.run_with_cron(cron_expr).await
        } else {
            self.run_with_interval().await
        }
    }

    async fn run_with_cron(&self, cron_expr: &str) -> Result<()> {
        let mut sched = JobScheduler::new().await?;

        let pipeline = Arc::clone(&self.pipeline);
        let running = Arc::clone(&self.running);
        let in_flight = Arc::clone(&self.in_flight);

        let job = Job::new_async(cron_expr, move |_uuid, _lock| {
            let pipeline = Arc::clone(&pipeline);
            let running = Arc::clone(&running);
            let in_flight = Arc::clone(&in_flight);
            Box::pin(async move {
                if !*running.read().await {
                    return;
                }
                scheduled_run(&pipeline, &in_flight).await;
            })
        })?;

        sched.add(job).await?;
        sched.start().await?;

        info!("Scheduler running with cron: {}", cron_expr);

        loop {
            if !*self.running.read().await {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        sched.shutdown().await?;
        Ok(())
    }

    async fn run_with_interval(&self) -> Result<()> {
        let interval_mins = self.config.interval_minutes;

        info!("Scheduler running every {} minutes", interval_mins);

        let mut run_interval = interval(Duration::from_secs(u64::from(interval_mins) * 60));

        loop {
            run_interval.tick().await;
            if !*self.running.read().await {
                break;
            }
            scheduled_run(&self.pipeline, &self.in_flight).await;
        }

        Ok(())
    }

    pub async fn stop(&self) {
        info!("Stopping scheduler...");
        *self.running.write().await = false;
    }
}

async fn scheduled_run(pipeline: &Pipeline, in_flight: &Mutex<()>) {
    let Ok(_guard) = in_flight.try_lock() else {
        warn!("Previous pipeline run still in progress, skipping");
        return;
    };

    match pipeline.run_once().await {
        Ok(report) => info!(
            run_id = %report.run_id,
            status = report.status.as_str(),
            "Scheduled pipeline run complete"
        ),
        Err(e) => error!("Scheduled pipeline run failed: {:#}", e),
    }
}
