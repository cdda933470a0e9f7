//! Thread-safe stable priority queue with a job record store.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, warn};

use mediaq_models::{Job, JobError, JobId, JobSpec, JobStatus};

use crate::error::{QueueError, QueueResult};

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// How many terminal jobs to retain for status lookup
    pub max_history: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { max_history: 1024 }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_history: std::env::var("MEDIAQ_MAX_HISTORY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1024),
        }
    }
}

/// Heap entry ordering: priority rank first, then submission order.
#[derive(Debug)]
struct QueuedEntry {
    priority: mediaq_models::JobPriority,
    seq: u64,
    id: JobId,
}

impl PartialEq for QueuedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for QueuedEntry {}

impl Ord for QueuedEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher priority wins, then the lower sequence number
        // (earlier submission).
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
struct QueueState {
    jobs: HashMap<JobId, Job>,
    heap: BinaryHeap<QueuedEntry>,
    seq: u64,
    pending: usize,
    closed: bool,
    history: VecDeque<JobId>,
    total_processed: u64,
    total_failed: u64,
    total_duration: Duration,
}

/// Aggregate counters read under one short lock.
#[derive(Debug, Clone, Copy)]
pub struct QueueStats {
    pub queue_size: usize,
    pub total_processed: u64,
    pub total_failed: u64,
    pub total_duration: Duration,
}

/// Concurrency-safe job queue.
///
/// All job mutation goes through this API: submission, dequeue (which
/// atomically transitions Pending -> Running), pre-execution cancellation,
/// and terminal recording. Terminal jobs stay readable until evicted from
/// the bounded history.
pub struct JobQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    config: QueueConfig,
}

impl JobQueue {
    /// Create a new empty queue.
    pub fn new(config: QueueConfig) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            config,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> Self {
        Self::new(QueueConfig::from_env())
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validate and enqueue a new job. Never blocks on execution.
    pub fn submit(&self, spec: JobSpec) -> QueueResult<JobId> {
        if spec.command_args.is_empty() {
            return Err(QueueError::invalid_job("command_args must not be empty"));
        }
        if spec.timeout.is_zero() {
            return Err(QueueError::invalid_job("timeout must be positive"));
        }

        let job = Job::new(spec);
        let id = job.id.clone();

        {
            let mut state = self.lock();
            if state.closed {
                return Err(QueueError::Closed);
            }
            let seq = state.seq;
            state.seq += 1;
            state.heap.push(QueuedEntry {
                priority: job.priority,
                seq,
                id: id.clone(),
            });
            state.pending += 1;
            state.jobs.insert(id.clone(), job);
        }

        debug!(job_id = %id, "job enqueued");
        self.notify.notify_one();
        Ok(id)
    }

    /// Pop the highest-priority pending job, if any, marking it Running.
    ///
    /// The Pending -> Running transition and the `started_at` stamp happen
    /// under the queue lock, so no caller can observe a Running job without
    /// `started_at` and `cancel` cannot race a dequeue.
    pub fn try_dequeue(&self) -> Option<Job> {
        let mut state = self.lock();
        while let Some(entry) = state.heap.pop() {
            match state.jobs.get_mut(&entry.id) {
                Some(job) if job.status == JobStatus::Pending => {
                    job.start();
                    let job = job.clone();
                    state.pending -= 1;
                    return Some(job);
                }
                // Stale entry: the job was cancelled after enqueueing (or
                // already evicted). Skip it.
                _ => continue,
            }
        }
        None
    }

    /// Dequeue with a bounded wait.
    ///
    /// Suspends until a job arrives, the wait elapses, or the queue is
    /// closed and drained. Returns `None` on timeout so callers can re-check
    /// their shutdown signals.
    pub async fn dequeue(&self, wait: Duration) -> Option<Job> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            // Register for wakeup before checking, so a submit landing
            // between the check and the await is not missed.
            let notified = self.notify.notified();

            if let Some(job) = self.try_dequeue() {
                return Some(job);
            }
            {
                let state = self.lock();
                if state.closed && state.pending == 0 {
                    return None;
                }
            }

            match tokio::time::timeout_at(deadline, notified).await {
                Ok(()) => continue,
                Err(_) => return self.try_dequeue(),
            }
        }
    }

    /// Cancel a job that has not started executing.
    ///
    /// Returns `true` and transitions the job to Cancelled only if it is
    /// still Pending. Running or terminal jobs are untouched and yield
    /// `false`. Unknown IDs are an error.
    pub fn cancel(&self, id: &JobId) -> QueueResult<bool> {
        let mut state = self.lock();
        let job = state
            .jobs
            .get_mut(id)
            .ok_or_else(|| QueueError::not_found(id))?;

        if job.status != JobStatus::Pending {
            return Ok(false);
        }

        job.cancel();
        state.pending -= 1;
        // The heap entry stays behind and is skipped on dequeue.
        Self::retire(&mut state, id.clone(), self.config.max_history);
        debug!(job_id = %id, "job cancelled");
        Ok(true)
    }

    /// Snapshot of the most recent observable state of a job.
    pub fn get(&self, id: &JobId) -> QueueResult<Job> {
        let state = self.lock();
        state
            .jobs
            .get(id)
            .cloned()
            .ok_or_else(|| QueueError::not_found(id))
    }

    /// Record successful completion of a running job.
    pub fn complete(&self, id: &JobId) -> QueueResult<()> {
        let mut state = self.lock();
        let job = state
            .jobs
            .get_mut(id)
            .ok_or_else(|| QueueError::not_found(id))?;

        if job.status != JobStatus::Running {
            warn!(job_id = %id, status = %job.status, "ignoring completion for non-running job");
            return Ok(());
        }

        job.complete();
        let duration = job.duration().unwrap_or_default();
        state.total_processed += 1;
        state.total_duration += duration;
        Self::retire(&mut state, id.clone(), self.config.max_history);
        Ok(())
    }

    /// Record failure of a running job.
    pub fn fail(&self, id: &JobId, error: JobError) -> QueueResult<()> {
        let mut state = self.lock();
        let job = state
            .jobs
            .get_mut(id)
            .ok_or_else(|| QueueError::not_found(id))?;

        if job.status != JobStatus::Running {
            warn!(job_id = %id, status = %job.status, "ignoring failure for non-running job");
            return Ok(());
        }

        job.fail(error);
        let duration = job.duration().unwrap_or_default();
        state.total_failed += 1;
        state.total_duration += duration;
        Self::retire(&mut state, id.clone(), self.config.max_history);
        Ok(())
    }

    /// Number of jobs waiting to be dequeued.
    pub fn len(&self) -> usize {
        self.lock().pending
    }

    /// Check if no jobs are waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close the queue: further submissions fail, waiting dequeuers wake.
    /// Pending jobs remain dequeuable so workers can drain.
    pub fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_waiters();
    }

    /// Check if the queue has been closed.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Aggregate counters for the metrics snapshot.
    pub fn stats(&self) -> QueueStats {
        let state = self.lock();
        QueueStats {
            queue_size: state.pending,
            total_processed: state.total_processed,
            total_failed: state.total_failed,
            total_duration: state.total_duration,
        }
    }

    /// Move a terminal job into the bounded history, evicting oldest-first.
    fn retire(state: &mut QueueState, id: JobId, max_history: usize) {
        state.history.push_back(id);
        while state.history.len() > max_history {
            if let Some(old) = state.history.pop_front() {
                state.jobs.remove(&old);
            }
        }
    }
}
