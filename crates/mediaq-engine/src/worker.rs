//! Worker loop: dequeue, execute, record.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info};

use mediaq_models::{Job, JobError};
use mediaq_queue::JobQueue;

use crate::metrics;
use crate::pool::Shutdown;
use crate::runner::CommandRunner;

/// One worker execution context.
///
/// The worker holds only channel ends and shared handles, never a
/// reference back to the pool that owns it.
pub(crate) struct Worker {
    id: u64,
    queue: Arc<JobQueue>,
    runner: Arc<dyn CommandRunner>,
    dequeue_wait: Duration,
    busy: Arc<AtomicBool>,
    retire: watch::Receiver<bool>,
    shutdown: watch::Receiver<Shutdown>,
}

impl Worker {
    pub(crate) fn new(
        id: u64,
        queue: Arc<JobQueue>,
        runner: Arc<dyn CommandRunner>,
        dequeue_wait: Duration,
        busy: Arc<AtomicBool>,
        retire: watch::Receiver<bool>,
        shutdown: watch::Receiver<Shutdown>,
    ) -> Self {
        Self {
            id,
            queue,
            runner,
            dequeue_wait,
            busy,
            retire,
            shutdown,
        }
    }

    /// Run until retired or shut down. Signals are only observed between
    /// jobs, so a worker is never stopped mid-execution.
    pub(crate) async fn run(self) {
        debug!(worker_id = self.id, "worker started");
        loop {
            let shutdown = *self.shutdown.borrow();
            match shutdown {
                Shutdown::Immediate => break,
                Shutdown::Drain => {
                    while let Some(job) = self.queue.try_dequeue() {
                        self.run_job(job).await;
                    }
                    break;
                }
                Shutdown::No => {}
            }
            if *self.retire.borrow() {
                debug!(worker_id = self.id, "worker retiring");
                break;
            }

            if let Some(job) = self.queue.dequeue(self.dequeue_wait).await {
                self.run_job(job).await;
            }
        }
        debug!(worker_id = self.id, "worker stopped");
    }

    /// Execute one job and record its terminal state. Every runner outcome
    /// is handled as a value; nothing escapes this method, so one bad job
    /// cannot end the worker loop.
    async fn run_job(&self, job: Job) {
        self.busy.store(true, Ordering::SeqCst);
        info!(
            worker_id = self.id,
            job_id = %job.id,
            kind = %job.kind,
            priority = %job.priority,
            "executing job"
        );
        let started = std::time::Instant::now();

        let outcome = self.runner.execute(&job.command_args, job.timeout).await;
        let elapsed = started.elapsed();

        let result = match outcome {
            Ok(out) if out.success() => {
                info!(
                    worker_id = self.id,
                    job_id = %job.id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "job completed"
                );
                metrics::record_job_completed(&job.kind);
                metrics::record_job_duration(&job.kind, elapsed.as_secs_f64());
                self.queue.complete(&job.id)
            }
            Ok(out) => {
                let err = JobError::Tool {
                    exit_code: out.exit_code,
                    stderr: out.stderr,
                };
                error!(worker_id = self.id, job_id = %job.id, "job failed: {err}");
                metrics::record_job_failed(&job.kind, err.kind());
                self.queue.fail(&job.id, err)
            }
            Err(runner_err) => {
                let err = JobError::from(runner_err);
                error!(worker_id = self.id, job_id = %job.id, "job failed: {err}");
                metrics::record_job_failed(&job.kind, err.kind());
                self.queue.fail(&job.id, err)
            }
        };

        if let Err(e) = result {
            error!(worker_id = self.id, job_id = %job.id, "failed to record job outcome: {e}");
        }
        self.busy.store(false, Ordering::SeqCst);
    }
}
