//! Autoscaling worker pool.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use mediaq_queue::JobQueue;

use crate::config::EngineConfig;
use crate::metrics;
use crate::runner::CommandRunner;
use crate::worker::Worker;

/// Global shutdown signal observed by every worker between jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Shutdown {
    /// Normal operation
    No,
    /// Drain the queue, then exit
    Drain,
    /// Exit without picking up new work; the current job still finishes
    Immediate,
}

/// Pool-side handle to one spawned worker. The worker itself only holds
/// the receiving ends, avoiding an ownership cycle.
struct WorkerHandle {
    id: u64,
    busy: Arc<AtomicBool>,
    retire_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
    retiring: bool,
}

/// Owns the set of live workers and adjusts it to observed queue depth.
pub(crate) struct WorkerPool {
    config: EngineConfig,
    queue: Arc<JobQueue>,
    runner: Arc<dyn CommandRunner>,
    workers: Mutex<Vec<WorkerHandle>>,
    scaler: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<Shutdown>,
    next_id: AtomicU64,
}

impl WorkerPool {
    pub(crate) fn new(
        config: EngineConfig,
        queue: Arc<JobQueue>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(Shutdown::No);
        Self {
            config,
            queue,
            runner,
            workers: Mutex::new(Vec::new()),
            scaler: Mutex::new(None),
            shutdown_tx,
            next_id: AtomicU64::new(0),
        }
    }

    fn lock_workers(&self) -> MutexGuard<'_, Vec<WorkerHandle>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn the minimum worker set and the autoscaler tick task.
    pub(crate) fn start(self: &Arc<Self>) {
        {
            let mut workers = self.lock_workers();
            for _ in 0..self.config.min_workers {
                self.spawn_worker(&mut workers);
            }
        }
        info!(
            min_workers = self.config.min_workers,
            max_workers = self.config.max_workers,
            "worker pool started"
        );

        let pool = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval(pool.config.scale_interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = tick.tick() => pool.evaluate(),
                }
            }
        });
        *self
            .scaler
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    fn spawn_worker(&self, workers: &mut Vec<WorkerHandle>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let busy = Arc::new(AtomicBool::new(false));
        let (retire_tx, retire_rx) = watch::channel(false);

        let worker = Worker::new(
            id,
            Arc::clone(&self.queue),
            Arc::clone(&self.runner),
            self.config.dequeue_wait,
            Arc::clone(&busy),
            retire_rx,
            self.shutdown_tx.subscribe(),
        );
        let join = tokio::spawn(worker.run());

        workers.push(WorkerHandle {
            id,
            busy,
            retire_tx,
            join,
            retiring: false,
        });
        debug!(worker_id = id, "spawned worker");
    }

    /// One autoscaling evaluation: at most one worker added or removed,
    /// so the pool cannot oscillate within a tick.
    pub(crate) fn evaluate(&self) {
        let mut workers = self.lock_workers();
        // Reap retired workers that have finished their last job.
        workers.retain(|h| !(h.retiring && h.join.is_finished()));

        let total = workers.len();
        let live = workers.iter().filter(|h| !h.retiring).count();
        let depth = self.queue.len();

        if depth >= self.config.scale_up_threshold && total < self.config.max_workers {
            info!(queue_depth = depth, active_workers = live, "scaling up");
            self.spawn_worker(&mut workers);
        } else if depth < self.config.scale_down_threshold && live > self.config.min_workers {
            // Retire the most recently spawned idle worker; a retiring
            // worker finishes its current job before exiting.
            if let Some(handle) = workers
                .iter_mut()
                .rev()
                .find(|h| !h.retiring && !h.busy.load(Ordering::SeqCst))
            {
                info!(worker_id = handle.id, queue_depth = depth, "scaling down");
                handle.retiring = true;
                let _ = handle.retire_tx.send(true);
            }
        }

        metrics::set_queue_depth(depth);
        metrics::set_active_workers(workers.iter().filter(|h| !h.retiring).count());
    }

    /// Workers currently in the pool, excluding ones already retiring.
    pub(crate) fn active_workers(&self) -> usize {
        self.lock_workers().iter().filter(|h| !h.retiring).count()
    }

    /// Stop the pool.
    ///
    /// With `wait`, workers drain the queue and this call returns only
    /// after every worker and the autoscaler have exited. Without it,
    /// workers are signalled to stop picking up new jobs and the call
    /// returns immediately; each in-flight job still runs to completion
    /// or its timeout in the background.
    pub(crate) async fn shutdown(&self, wait: bool) {
        let signal = if wait {
            Shutdown::Drain
        } else {
            Shutdown::Immediate
        };
        let _ = self.shutdown_tx.send(signal);

        let scaler = self
            .scaler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if !wait {
            info!("worker pool shutdown signalled");
            return;
        }

        if let Some(handle) = scaler {
            let _ = handle.await;
        }
        let handles: Vec<WorkerHandle> = self.lock_workers().drain(..).collect();
        for handle in handles {
            let _ = handle.join.await;
        }
        info!("worker pool stopped");
    }
}
