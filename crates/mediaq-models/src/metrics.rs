//! Point-in-time engine metrics snapshot.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Read-only aggregate view of the engine, safe to take at any time.
///
/// Assembled from atomic-style counters and short-lived locks; taking a
/// snapshot never blocks worker execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineMetrics {
    /// Workers currently in the pool (excluding ones retiring)
    pub active_workers: usize,
    /// Jobs waiting in the queue
    pub queue_size: usize,
    /// Jobs that reached Completed since startup
    pub total_jobs_processed: u64,
    /// Jobs that reached Failed since startup
    pub total_jobs_failed: u64,
    /// Mean execution duration over all Completed and Failed jobs
    pub average_job_duration: Duration,
}

impl EngineMetrics {
    /// Jobs that ran to a terminal state since startup.
    pub fn total_terminal(&self) -> u64 {
        self.total_jobs_processed + self.total_jobs_failed
    }
}
