//! Engine facade wiring the queue and the worker pool.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use mediaq_models::{EngineMetrics, Job, JobId, JobSpec};
use mediaq_queue::{JobQueue, QueueConfig};

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::metrics;
use crate::pool::WorkerPool;
use crate::runner::{CommandRunner, ProcessRunner};

/// The media job scheduling and execution engine.
///
/// A plain object with an explicit lifecycle: construct, `start()`,
/// submit and poll jobs, `shutdown()`. One engine per service instance;
/// all shared state lives behind the queue and pool APIs.
pub struct MediaEngine {
    queue: Arc<JobQueue>,
    pool: Arc<WorkerPool>,
}

impl MediaEngine {
    /// Create an engine executing jobs through real OS processes.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        Self::with_runner(config, Arc::new(ProcessRunner::new()))
    }

    /// Create an engine with a custom runner (used by tests to avoid
    /// spawning real external binaries).
    pub fn with_runner(config: EngineConfig, runner: Arc<dyn CommandRunner>) -> EngineResult<Self> {
        config.validate()?;
        let queue = Arc::new(JobQueue::new(QueueConfig {
            max_history: config.max_history,
        }));
        let pool = Arc::new(WorkerPool::new(config, Arc::clone(&queue), runner));
        Ok(Self { queue, pool })
    }

    /// Spawn the minimum worker set and start autoscaling.
    pub fn start(&self) {
        self.pool.start();
        info!("media engine started");
    }

    /// Validate and enqueue a job. Fire-and-forget: returns as soon as the
    /// job is queued, never blocking on execution.
    pub fn submit(&self, spec: JobSpec) -> EngineResult<JobId> {
        let kind = spec.kind.clone();
        let priority = spec.priority;
        let id = self.queue.submit(spec)?;
        metrics::record_job_submitted(&kind);
        info!(job_id = %id, kind = %kind, priority = %priority, "job submitted");
        Ok(id)
    }

    /// Most recent observable state of a job.
    pub fn job(&self, id: &JobId) -> EngineResult<Job> {
        Ok(self.queue.get(id)?)
    }

    /// Cancel a job that has not started executing. Returns `true` only if
    /// the job was still pending.
    pub fn cancel(&self, id: &JobId) -> EngineResult<bool> {
        Ok(self.queue.cancel(id)?)
    }

    /// Point-in-time metrics snapshot. Never blocks worker execution.
    pub fn metrics(&self) -> EngineMetrics {
        let stats = self.queue.stats();
        let terminal = stats.total_processed + stats.total_failed;
        let average_job_duration = if terminal > 0 {
            stats.total_duration / terminal as u32
        } else {
            Duration::ZERO
        };

        EngineMetrics {
            active_workers: self.pool.active_workers(),
            queue_size: stats.queue_size,
            total_jobs_processed: stats.total_processed,
            total_jobs_failed: stats.total_failed,
            average_job_duration,
        }
    }

    /// Shut the engine down. No new submissions are accepted afterwards.
    ///
    /// With `wait = true` this returns only after every previously
    /// submitted job reached a terminal state and all workers exited.
    /// With `wait = false` it returns immediately; in-flight jobs run to
    /// completion (or timeout) in the background and pending jobs stay
    /// queryable as Pending.
    pub async fn shutdown(&self, wait: bool) {
        info!(wait, "engine shutdown requested");
        self.queue.close();
        self.pool.shutdown(wait).await;
    }
}
